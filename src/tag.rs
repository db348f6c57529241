/// Joins a namespace and a value with a colon.
///
///   tag("foo:bar", "baz")  →  "foo:bar:baz"
///
/// Nothing is escaped; values containing `:` are passed through as-is.
pub fn tag(namespace: &str, value: &str) -> String {
    format!("{namespace}:{value}")
}

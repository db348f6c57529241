pub mod request_key;
pub mod timing;

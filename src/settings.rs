//! Demo server settings.
//!
//! ```bash
//! rover --listen 127.0.0.1:8081 --queue-capacity 4096
//! ROVER_LISTEN=127.0.0.1:8081 rover
//! ```

use std::net::SocketAddr;

use clap::Parser;

/// Command-line flags, each with an environment fallback.
#[derive(Debug, Clone, Parser)]
#[command(name = "rover")]
#[command(about = "Demo API with per-request timing metrics")]
pub struct Settings {
    /// Address the demo API binds to
    #[arg(long, default_value = "0.0.0.0:3000", env = "ROVER_LISTEN")]
    pub listen: SocketAddr,

    /// Samples buffered between the timing layer and the histogram sink
    #[arg(long = "queue-capacity", default_value = "1024", env = "ROVER_QUEUE_CAPACITY")]
    pub queue_capacity: usize,
}

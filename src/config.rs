use std::time::Duration;

use clap::Parser;

use crate::cache::CacheConfig;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "callcache",
    about = "Watches contract reads and re-fetches them on every new block"
)]
pub struct Config {
    /// Port for the status endpoints
    #[arg(long, env = "CALLCACHE_PORT", default_value = "9100")]
    pub port: u16,

    /// JSON-RPC node used for eth_call and for watching the chain head
    #[arg(long, env = "CALLCACHE_RPC_URL", default_value = "http://localhost:8545")]
    pub rpc_url: String,

    /// Chain head polling interval in milliseconds
    #[arg(long, env = "CALLCACHE_POLL_INTERVAL", default_value = "2000")]
    pub poll_interval: u64,

    /// Node request timeout in seconds
    #[arg(long, env = "CALLCACHE_REQUEST_TIMEOUT", default_value = "10")]
    pub request_timeout: u64,

    /// Maximum number of unobserved entries kept in memory
    #[arg(long, env = "CALLCACHE_IDLE_CAPACITY", default_value = "10000")]
    pub idle_capacity: u64,

    /// Seconds an unobserved entry is kept before it is dropped
    #[arg(long, env = "CALLCACHE_IDLE_TTL", default_value = "300")]
    pub idle_ttl: u64,

    /// Calls to keep observed, as `<target>:<signature>[:<arg>,<arg>...]`.
    /// Repeat the flag for several calls; the env var takes them space-separated.
    #[arg(long, env = "CALLCACHE_WATCH", value_delimiter = ' ')]
    pub watch: Vec<String>,

    /// Enable verbose logging of every fetch, subscription and block.
    /// When off, only lifecycle messages and failures are logged.
    #[arg(short, long, env = "CALLCACHE_VERBOSE", default_value = "false")]
    pub verbose: bool,
}

impl Config {
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            idle_capacity: self.idle_capacity,
            idle_ttl: Duration::from_secs(self.idle_ttl),
            ..CacheConfig::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

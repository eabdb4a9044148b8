use dotenv::dotenv;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

const BIND_ADDR: &str = "BIND_ADDR";
const QUEUE_CAPACITY: &str = "QUEUE_CAPACITY";
const WEBHOOK_TIMEOUT_MS: &str = "WEBHOOK_TIMEOUT_MS";
const NODE_ID: &str = "NODE_ID";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:6006";
const DEFAULT_QUEUE_CAPACITY: usize = 1024;
const DEFAULT_WEBHOOK_TIMEOUT_MS: u64 = 5000;
const DEFAULT_NODE_ID: &str = "ledger-stream";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Bound of each connection's outbound queue.
    pub queue_capacity: usize,
    pub webhook_timeout: Duration,
    pub node_id: String,
}

impl Config {
    pub fn from_env() -> Config {
        match Self::try_from_env() {
            Ok(config) => config,
            Err(err) => panic!("{}", err),
        }
    }

    pub fn try_from_env() -> Result<Config, String> {
        // Load .env file
        dotenv().ok();

        let bind_addr = match env::var(BIND_ADDR) {
            Ok(value) => value
                .trim()
                .parse::<SocketAddr>()
                .map_err(|_| format!("failed to parse {}: {}", BIND_ADDR, value))?,
            Err(_) => default_bind_addr(),
        };

        let queue_capacity = match env::var(QUEUE_CAPACITY) {
            Ok(value) => match value.trim().parse::<usize>() {
                Ok(capacity) if capacity > 0 => capacity,
                _ => return Err(format!("failed to parse {}: {}", QUEUE_CAPACITY, value)),
            },
            Err(_) => DEFAULT_QUEUE_CAPACITY,
        };

        let webhook_timeout_ms = match env::var(WEBHOOK_TIMEOUT_MS) {
            Ok(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|_| format!("failed to parse {}: {}", WEBHOOK_TIMEOUT_MS, value))?,
            Err(_) => DEFAULT_WEBHOOK_TIMEOUT_MS,
        };

        let node_id = env::var(NODE_ID).unwrap_or_else(|_| DEFAULT_NODE_ID.to_string());

        info!(
            "Loaded config: bind_addr={}, queue_capacity={}, webhook_timeout_ms={}",
            bind_addr, queue_capacity, webhook_timeout_ms
        );

        Ok(Config {
            bind_addr,
            queue_capacity,
            webhook_timeout: Duration::from_millis(webhook_timeout_ms),
            node_id,
        })
    }

    pub fn default() -> Config {
        Config {
            bind_addr: default_bind_addr(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            webhook_timeout: Duration::from_millis(DEFAULT_WEBHOOK_TIMEOUT_MS),
            node_id: DEFAULT_NODE_ID.to_string(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6006))
}

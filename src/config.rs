//! Configuration for Relaygate
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::time::Duration;
use uuid::Uuid;

/// Relaygate - coordinator for relay-connected automation devices
#[derive(Parser, Debug, Clone)]
#[command(name = "relaygate")]
#[command(about = "Keeps one supervised worker running per relay-connected device")]
pub struct Args {
    /// Unique identifier for this coordinator instance
    #[arg(long, env = "INSTANCE_ID", default_value_t = Uuid::new_v4())]
    pub instance_id: Uuid,

    /// Base URL of the relay communicator service
    #[arg(long, env = "RELAY_URL", default_value = "http://localhost:8090")]
    pub relay_url: String,

    /// Seconds between relay device-list polls
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "5")]
    pub poll_interval_secs: u64,

    /// Timeout for the relay device-list request in seconds
    #[arg(long, env = "RELAY_LIST_TIMEOUT_SECS", default_value = "30")]
    pub relay_list_timeout_secs: u64,

    /// Default timeout for a single device command in seconds
    #[arg(long, env = "COMMAND_TIMEOUT_SECS", default_value = "30")]
    pub command_timeout_secs: u64,

    /// Start every new device in the reduced (paused) mode
    #[arg(long, env = "ENABLE_CONFIGMODE", default_value = "false")]
    pub enable_configmode: bool,

    /// Shared-state cache configuration
    #[command(flatten)]
    pub cache: CacheArgs,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "relaygate")]
    pub mongodb_db: String,

    /// Encounters allowed per account before rotation (0 disables the budget)
    #[arg(long, env = "ACCOUNT_ENCOUNTER_LIMIT", default_value = "0")]
    pub account_encounter_limit: u64,

    /// Collect game statistics derived from telemetry
    #[arg(long, env = "GAME_STATS", default_value = "false")]
    pub game_stats: bool,

    /// Serve player stat reads from the shared cache
    #[arg(long, env = "GAME_STATS_VIA_CACHE", default_value = "false")]
    pub game_stats_via_cache: bool,

    /// Seconds between stats collector runs
    #[arg(long, env = "STATS_FLUSH_INTERVAL_SECS", default_value = "60")]
    pub stats_flush_interval_secs: u64,

    /// Command sent by the built-in probe worker
    #[arg(long, env = "PROBE_COMMAND", default_value = "passthrough echo OK")]
    pub probe_command: String,

    /// Seconds between probe commands
    #[arg(long, env = "PROBE_INTERVAL_SECS", default_value = "10")]
    pub probe_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (text, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,
}

/// Redis cache connection configuration
#[derive(Parser, Debug, Clone)]
pub struct CacheArgs {
    /// Enable the shared-state cache
    #[arg(long, env = "ENABLE_CACHE", default_value = "false")]
    pub enable_cache: bool,

    /// Cache server host
    #[arg(long, env = "CACHE_HOST", default_value = "localhost")]
    pub cache_host: String,

    /// Cache server port
    #[arg(long, env = "CACHE_PORT", default_value = "6379")]
    pub cache_port: u16,

    /// Cache database index
    #[arg(long, env = "CACHE_DATABASE", default_value = "0")]
    pub cache_database: i64,

    /// Connection establishment timeout in milliseconds
    #[arg(long, env = "CACHE_CONNECT_TIMEOUT_MS", default_value = "3000")]
    pub cache_connect_timeout_ms: u64,
}

impl Default for CacheArgs {
    fn default() -> Self {
        Self {
            enable_cache: false,
            cache_host: "localhost".to_string(),
            cache_port: 6379,
            cache_database: 0,
            cache_connect_timeout_ms: 3000,
        }
    }
}

impl CacheArgs {
    /// Connection URL understood by the redis client
    pub fn url(&self) -> String {
        format!(
            "redis://{}:{}/{}",
            self.cache_host, self.cache_port, self.cache_database
        )
    }

    /// Memo key identifying one cache endpoint
    pub fn endpoint_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.cache_host, self.cache_port, self.cache_database
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_connect_timeout_ms)
    }
}

impl Args {
    /// Relay base URL without a trailing slash
    pub fn relay_base(&self) -> &str {
        self.relay_url.trim_end_matches('/')
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn relay_list_timeout(&self) -> Duration {
        Duration::from_secs(self.relay_list_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn stats_flush_interval(&self) -> Duration {
        Duration::from_secs(self.stats_flush_interval_secs)
    }

    /// Encounter limit, or None when the budget feature is off
    pub fn encounter_limit(&self) -> Option<u64> {
        (self.account_encounter_limit > 0).then_some(self.account_encounter_limit)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_secs == 0 {
            return Err("POLL_INTERVAL_SECS must be greater than zero".to_string());
        }

        if !self.relay_url.starts_with("http://") && !self.relay_url.starts_with("https://") {
            return Err("RELAY_URL must be an http(s) URL".to_string());
        }

        if self.game_stats_via_cache && !self.cache.enable_cache {
            return Err("GAME_STATS_VIA_CACHE requires ENABLE_CACHE".to_string());
        }

        if self.log_format != "text" && self.log_format != "json" {
            return Err("LOG_FORMAT must be 'text' or 'json'".to_string());
        }

        Ok(())
    }
}

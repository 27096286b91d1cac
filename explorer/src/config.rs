use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ExplorerError, Result};
use crate::models::ChainParams;
use crate::websocket::subscriptions::SlowConsumerPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub hub: HubConfig,
    pub chain: ChainConfig,
    pub templates: TemplateConfig,
    pub logging: LoggingConfig,
    pub mempool: MempoolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Pending requests the hub control channel holds before producers wait.
    pub control_capacity: usize,
    /// Envelopes buffered per subscriber.
    pub subscriber_queue: usize,
    pub slow_consumer: SlowConsumerPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub window_size: i64,
    pub reward_window_size: i64,
    pub target_pool_size: i64,
    pub target_block_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub dir: PathBuf,
    pub names: Vec<String>,
    /// Template parsed alongside every named template.
    pub shared: String,
    pub reload_on_sighup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MempoolConfig {
    pub latest_limit: usize,
}

impl Config {
    /// Load configuration from file if it exists, otherwise use defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hub.control_capacity == 0 {
            return Err(ExplorerError::Config("hub.control_capacity must be at least 1".to_string()));
        }
        if self.hub.subscriber_queue == 0 {
            return Err(ExplorerError::Config("hub.subscriber_queue must be at least 1".to_string()));
        }
        if self.templates.names.is_empty() {
            return Err(ExplorerError::Config("templates.names must not be empty".to_string()));
        }
        Ok(())
    }

    /// Override config with CLI arguments
    pub fn apply_cli_overrides(&mut self, args: &crate::cli::Args) {
        if let Some(port) = args.port {
            self.server.port = port;
        }

        if let Some(bind_address) = &args.bind_address {
            self.server.bind_address = bind_address.clone();
        }

        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }

        if let Some(dir) = &args.templates_dir {
            self.templates.dir = dir.clone();
        }

        if let Some(queue) = args.subscriber_queue {
            self.hub.subscriber_queue = queue;
        }

        if args.no_template_reload {
            self.templates.reload_on_sighup = false;
        }
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }
}

impl ChainConfig {
    pub fn params(&self) -> ChainParams {
        ChainParams {
            window_size: self.window_size,
            reward_window_size: self.reward_window_size,
            target_pool_size: self.target_pool_size,
            block_time: self.target_block_time,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 7777,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            control_capacity: 16,
            subscriber_queue: 3,
            slow_consumer: SlowConsumerPolicy::Skip,
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        // Mainnet values
        Self {
            window_size: 144,
            reward_window_size: 6144,
            target_pool_size: 40960,
            target_block_time: 300,
        }
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("views"),
            names: ["home", "explorer", "block", "tx", "address", "rawtx", "error"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            shared: "extras".to_string(),
            reload_on_sighup: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self { latest_limit: 5 }
    }
}

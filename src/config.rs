//! Runtime configuration loaded from `config.toml` plus environment overrides.
//!
//! Lookup order:
//! 1. `$SPL_TOOLKIT_CONFIG`, or `./config.toml` when it exists
//! 2. built-in defaults (a broken file is reported and ignored)
//! 3. environment overrides: `YOUTUBE_API_KEY`, `SPL_TOOLKIT_EXECUTOR`,
//!    `SPL_TOOLKIT_RPC_URL`, `SPL_TOOLKIT_SEED`

use std::path::{Path, PathBuf};
use std::time::Duration;

use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub const CONFIG_PATH_ENV: &str = "SPL_TOOLKIT_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which executor resolves submitted operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorMode {
    #[default]
    Simulated,
    Rpc,
}

impl std::str::FromStr for ExecutorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simulated" | "mock" => Ok(ExecutorMode::Simulated),
            "rpc" | "real" => Ok(ExecutorMode::Rpc),
            other => Err(format!("unknown executor mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    #[default]
    Devnet,
    Testnet,
    MainnetBeta,
}

impl Network {
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Devnet => "https://api.devnet.solana.com",
            Network::Testnet => "https://api.testnet.solana.com",
            Network::MainnetBeta => "https://api.mainnet-beta.solana.com",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Wall-clock length of one latency unit.
    pub time_unit_ms: u64,
    /// Fixed seed for outcome draws; random when unset.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_unit_ms: 1_000,
            seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    /// `maxResults` for the comment-thread page.
    pub page_size: u32,
    pub request_timeout_ms: u64,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            api_base: "https://www.googleapis.com/youtube/v3".to_string(),
            api_key: None,
            page_size: 100,
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub executor: ExecutorMode,
    pub network: Network,
    /// Explicit RPC endpoints; the network default is used when empty.
    pub rpc_endpoints: Vec<String>,
    pub rpc_timeout_ms: u64,
    pub rpc_retry_attempts: usize,
    /// Payer keypair (JSON byte array file) for the RPC executor.
    pub keypair_path: Option<String>,
    /// Rows shown in the recent-transactions view.
    pub history_limit: usize,
    pub simulation: SimulationConfig,
    pub youtube: YouTubeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            executor: ExecutorMode::default(),
            network: Network::default(),
            rpc_endpoints: Vec::new(),
            rpc_timeout_ms: 8_000,
            rpc_retry_attempts: 3,
            keypair_path: None,
            history_limit: 5,
            simulation: SimulationConfig::default(),
            youtube: YouTubeConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default locations, never failing: problems are logged and
    /// defaults are used instead.
    pub fn load() -> Self {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .ok()
            .or_else(|| {
                let p = PathBuf::from(DEFAULT_CONFIG_FILE);
                p.exists().then_some(p)
            });

        let mut cfg = match path {
            Some(p) => match Self::from_file(&p) {
                Ok(cfg) => {
                    info!(path=%p.display(), "Loaded config file");
                    cfg
                }
                Err(e) => {
                    warn!(error=%e, "Falling back to default config");
                    Self::default()
                }
            },
            None => Self::default(),
        };
        cfg.apply_env();
        cfg
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup` (the process environment in `load`).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("YOUTUBE_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.youtube.api_key = Some(key);
        }
        if let Some(mode) = lookup("SPL_TOOLKIT_EXECUTOR") {
            match mode.parse() {
                Ok(m) => self.executor = m,
                Err(e) => warn!(error=%e, "Ignoring SPL_TOOLKIT_EXECUTOR"),
            }
        }
        if let Some(url) = lookup("SPL_TOOLKIT_RPC_URL").filter(|u| !u.trim().is_empty()) {
            self.rpc_endpoints = vec![url];
        }
        if let Some(seed) = lookup("SPL_TOOLKIT_SEED") {
            match seed.parse() {
                Ok(s) => self.simulation.seed = Some(s),
                Err(e) => warn!(error=%e, "Ignoring SPL_TOOLKIT_SEED"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid("history_limit must be > 0".to_string()));
        }
        if self.youtube.page_size == 0 {
            return Err(ConfigError::Invalid("youtube.page_size must be > 0".to_string()));
        }
        if self.executor == ExecutorMode::Rpc && self.keypair_path.is_none() {
            return Err(ConfigError::Invalid(
                "keypair_path is required for the rpc executor".to_string(),
            ));
        }
        Ok(())
    }

    /// Configured endpoints, or the selected network's public endpoint.
    pub fn rpc_endpoints(&self) -> NonEmpty<String> {
        NonEmpty::from_vec(self.rpc_endpoints.clone())
            .unwrap_or_else(|| NonEmpty::new(self.network.default_rpc_url().to_string()))
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.executor, ExecutorMode::Simulated);
        assert_eq!(cfg.history_limit, 5);
        assert_eq!(cfg.youtube.page_size, 100);
        assert_eq!(cfg.rpc_endpoints().head, "https://api.devnet.solana.com");
    }

    #[test]
    fn parses_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
executor = "rpc"
network = "mainnet-beta"
keypair_path = "/tmp/payer.json"

[simulation]
seed = 42

[youtube]
page_size = 50
"#
        )
        .unwrap();

        let cfg = Config::from_file(file.path()).unwrap();
        assert_eq!(cfg.executor, ExecutorMode::Rpc);
        assert_eq!(cfg.network, Network::MainnetBeta);
        assert_eq!(cfg.simulation.seed, Some(42));
        assert_eq!(cfg.simulation.time_unit_ms, 1_000);
        assert_eq!(cfg.youtube.page_size, 50);
        assert_eq!(cfg.youtube.api_base, YouTubeConfig::default().api_base);
        assert_eq!(cfg.rpc_endpoints().head, "https://api.mainnet-beta.solana.com");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "executor = [").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn rpc_without_keypair_is_rejected() {
        let cfg = Config {
            executor: ExecutorMode::Rpc,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("YOUTUBE_API_KEY", "k-123"),
            ("SPL_TOOLKIT_EXECUTOR", "rpc"),
            ("SPL_TOOLKIT_RPC_URL", "http://127.0.0.1:8899"),
            ("SPL_TOOLKIT_SEED", "not-a-number"),
        ]);
        let mut cfg = Config::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.youtube.api_key.as_deref(), Some("k-123"));
        assert_eq!(cfg.executor, ExecutorMode::Rpc);
        assert_eq!(cfg.rpc_endpoints().head, "http://127.0.0.1:8899");
        assert_eq!(cfg.simulation.seed, None);
    }
}

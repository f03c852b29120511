use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that overrides `reputation.api_key`
pub const API_KEY_ENV: &str = "ABUSEIPDB_API_KEY";

/// Errors that can occur while loading or saving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Configuration for trailwatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log input configuration
    pub input: InputConfig,
    /// Per-file report output configuration
    pub output: OutputConfig,
    /// IP reputation lookup configuration
    pub reputation: ReputationConfig,
    /// Tor exit-node check configuration
    pub tor: TorConfig,
}

/// Log input configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Directory holding CloudTrail log files
    pub log_dir: PathBuf,
    /// Extension of the files to analyze
    pub file_extension: String,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format: "console", "json", or "jsonl"
    pub format: String,
    /// Output file path (stdout when unset or when format is "console")
    pub file_path: Option<PathBuf>,
}

/// IP reputation lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationConfig {
    /// Check endpoint of the reputation service
    pub endpoint: String,
    /// API key sent in the `Key` header
    pub api_key: Option<String>,
    /// Lookback window for abuse reports
    pub max_age_days: u32,
    /// Number of most frequently seen IPs to look up
    pub top_n: usize,
    /// Where the reputation document is written
    pub output_path: PathBuf,
    /// Per-request timeout; no timeout when unset
    pub timeout_secs: Option<u64>,
}

/// Tor exit-node check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorConfig {
    /// Directory listing of exit-list snapshots
    pub directory_url: String,
    /// Suffix selecting on-the-hour snapshots
    pub snapshot_suffix: String,
    /// Timeout for the snapshot download
    pub timeout_secs: u64,
    /// Batch results file; a numbered name is used if it already exists
    pub results_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input: InputConfig {
                log_dir: PathBuf::from("cloudtrail"),
                file_extension: "json".to_string(),
            },
            output: OutputConfig {
                format: "console".to_string(),
                file_path: None,
            },
            reputation: ReputationConfig::default(),
            tor: TorConfig::default(),
        }
    }
}

impl Default for ReputationConfig {
    fn default() -> Self {
        ReputationConfig {
            endpoint: crate::reputation::DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            max_age_days: 90,
            top_n: 100,
            output_path: PathBuf::from("ip_reputation_summary.json"),
            timeout_secs: None,
        }
    }
}

impl Default for TorConfig {
    fn default() -> Self {
        TorConfig {
            directory_url: crate::tor::DEFAULT_DIRECTORY_URL.to_string(),
            snapshot_suffix: "00".to_string(),
            timeout_secs: 10,
            results_path: PathBuf::from("results.csv"),
        }
    }
}

impl ReputationConfig {
    /// API key from the environment, falling back to the configured one
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .or_else(|| self.api_key.clone())
            .filter(|key| !key.trim().is_empty())
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file, or fall back to defaults if it doesn't exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            log::warn!("Config file {:?} not found, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

//! Configuration for the default monitor

use crate::{Error, Result};
use lending_core::KeyPair;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Oracle keypair file (JSON array of 32 or 64 bytes)
    pub oracle_keypair_path: PathBuf,

    /// Seconds between cycles
    pub poll_interval_secs: u64,

    /// Seconds past the due date before a loan is defaulted
    pub grace_period_secs: i64,

    /// Log a metrics snapshot on shutdown
    pub metrics_enabled: bool,

    /// Node API to poll; when unset the monitor hosts the ledger itself
    pub ledger_url: Option<String>,

    /// Request timeout against `ledger_url`
    pub http_timeout_secs: u64,

    /// Ledger hosted in-process when `ledger_url` is unset
    pub ledger: lending_core::Config,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "default-monitor".to_string(),
            oracle_keypair_path: PathBuf::from("./keys/oracle.json"),
            poll_interval_secs: 300,
            grace_period_secs: 3600,
            metrics_enabled: true,
            ledger_url: None,
            http_timeout_secs: 30,
            ledger: lending_core::Config::default(),
        }
    }
}

impl Config {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables (and `.env` if present)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Config::default();

        if let Ok(dir) = env::var("MONITOR_LEDGER_DIR") {
            config.ledger.data_dir = PathBuf::from(dir);
        }

        if let Ok(url) = env::var("MONITOR_LEDGER_URL") {
            config.ledger_url = Some(url);
        }

        if let Ok(addr) = env::var("MONITOR_BIND_ADDR") {
            config.ledger.http.bind_addr = addr;
        }

        if let Ok(path) = env::var("ORACLE_KEYPAIR_PATH") {
            config.oracle_keypair_path = PathBuf::from(path);
        }

        if let Some(secs) = parse_secs("CHECK_INTERVAL_SECS", "CHECK_INTERVAL_MINUTES")? {
            config.poll_interval_secs = secs;
        }

        if let Some(secs) = parse_secs("GRACE_PERIOD_SECS", "GRACE_PERIOD_MINUTES")? {
            config.grace_period_secs = i64::try_from(secs)
                .map_err(|_| Error::Config("GRACE_PERIOD_SECS out of range".to_string()))?;
        }

        if let Ok(flag) = env::var("MONITOR_METRICS_ENABLED") {
            config.metrics_enabled = flag
                .parse()
                .map_err(|e| Error::Config(format!("Invalid MONITOR_METRICS_ENABLED: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject unusable values
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(Error::Config("poll_interval_secs must be positive".to_string()));
        }
        if self.grace_period_secs < 0 {
            return Err(Error::Config("grace_period_secs must not be negative".to_string()));
        }
        if self.http_timeout_secs == 0 {
            return Err(Error::Config("http_timeout_secs must be positive".to_string()));
        }
        if let Some(url) = &self.ledger_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(Error::Config(format!("ledger_url must be http(s): {}", url)));
            }
        }
        self.ledger.validate()?;
        Ok(())
    }

    /// Cycle interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Request timeout against the node API
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Read the oracle keypair file
    pub fn load_oracle_keypair(&self) -> Result<KeyPair> {
        load_keypair(&self.oracle_keypair_path)
    }
}

/// Parse a keypair stored as a JSON byte array
pub fn load_keypair(path: impl AsRef<Path>) -> Result<KeyPair> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let bytes: Vec<u8> = serde_json::from_str(&content)
        .map_err(|e| Error::Keypair(format!("{}: {}", path.display(), e)))?;
    KeyPair::from_bytes(&bytes).map_err(|e| Error::Keypair(format!("{}: {}", path.display(), e)))
}

/// `secs_var` wins over `minutes_var`
fn parse_secs(secs_var: &str, minutes_var: &str) -> Result<Option<u64>> {
    if let Ok(value) = env::var(secs_var) {
        let secs = value
            .parse()
            .map_err(|e| Error::Config(format!("Invalid {}: {}", secs_var, e)))?;
        return Ok(Some(secs));
    }

    if let Ok(value) = env::var(minutes_var) {
        let minutes: u64 = value
            .parse()
            .map_err(|e| Error::Config(format!("Invalid {}: {}", minutes_var, e)))?;
        let secs = minutes
            .checked_mul(60)
            .ok_or_else(|| Error::Config(format!("{} out of range", minutes_var)))?;
        return Ok(Some(secs));
    }

    Ok(None)
}

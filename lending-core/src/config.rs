//! Configuration for the ledger

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Writer mailbox capacity (instructions)
    pub mailbox_capacity: usize,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Node API configuration
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/lending"),
            service_name: "lending-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            mailbox_capacity: 1024,
            rocksdb: RocksDBConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

/// Node API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Listen address
    pub bind_addr: String,

    /// Worker threads
    pub workers: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            workers: 2,
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// fsync every commit
    pub sync_writes: bool,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 3,
            max_background_jobs: 2,
            sync_writes: true,
            enable_statistics: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("LENDING_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(capacity) = std::env::var("LENDING_MAILBOX_CAPACITY") {
            config.mailbox_capacity = capacity.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid LENDING_MAILBOX_CAPACITY: {}", e))
            })?;
        }

        if let Ok(addr) = std::env::var("LENDING_BIND_ADDR") {
            config.http.bind_addr = addr;
        }

        config.validate()?;
        Ok(config)
    }

    /// Config pointing at `data_dir`, everything else default
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Reject unusable values
    pub fn validate(&self) -> crate::Result<()> {
        if self.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "mailbox_capacity must be positive".to_string(),
            ));
        }
        if self.http.workers == 0 {
            return Err(crate::Error::Config("http.workers must be positive".to_string()));
        }
        self.http.bind_addr.parse::<SocketAddr>().map_err(|e| {
            crate::Error::Config(format!("Invalid http.bind_addr {}: {}", self.http.bind_addr, e))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "lending-core");
        assert_eq!(config.mailbox_capacity, 1024);
        assert!(config.rocksdb.sync_writes);
    }

    #[test]
    fn test_from_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lending.toml");
        std::fs::write(
            &path,
            "data_dir = \"/var/lib/lending\"\n\n[rocksdb]\nsync_writes = false\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/lending"));
        assert!(!config.rocksdb.sync_writes);
        assert_eq!(config.mailbox_capacity, 1024);
    }

    #[test]
    fn test_zero_mailbox_rejected() {
        let config = Config {
            mailbox_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_bind_addr_rejected() {
        let mut config = Config::default();
        config.http.bind_addr = "localhost".to_string();
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));

        config.http.bind_addr = "0.0.0.0:9000".to_string();
        assert!(config.validate().is_ok());
    }
}

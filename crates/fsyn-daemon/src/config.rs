// config.rs - Daemon configuration loaded from fsyn.toml.
//
// Example:
//
//   address = "0.0.0.0:8080"
//   max_hash_size = 52428800
//   containment = "resolved"
//   tokens = ["change-me"]
//
//   [endpoints]
//   docs = "/srv/docs"
//   media = "/srv/media"
//
// Every field has a default, so an empty file is a valid (if useless)
// configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use fsyn_core::digest::DEFAULT_MAX_HASH_SIZE;
use fsyn_core::transfer::DEFAULT_MAX_UPLOAD_SIZE;
use fsyn_core::{
    ContainmentMode, EndpointError, EndpointTable, TokenSet, TransferSettings, TreeOptions,
};

use crate::api::Limits;

/// Errors raised while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid endpoint configuration: {0}")]
    Endpoints(#[from] EndpointError),

    #[error("request_timeout_secs must be greater than zero")]
    ZeroTimeout,
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Socket address to listen on.
    #[serde(default = "default_address")]
    pub address: String,

    /// Files larger than this are not hashed. 0 disables the ceiling.
    #[serde(default = "default_max_hash_size")]
    pub max_hash_size: u64,

    /// Largest accepted upload body, in bytes. 0 disables the ceiling.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,

    /// Per-request timeout, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Deepest directory level a tree listing may descend to.
    #[serde(default)]
    pub max_tree_depth: Option<usize>,

    /// "resolved" (default) or "lexical".
    #[serde(default)]
    pub containment: ContainmentMode,

    /// Accepted bearer tokens. Empty disables authentication.
    #[serde(default)]
    pub tokens: Vec<String>,

    /// Endpoint name -> absolute root directory.
    #[serde(default)]
    pub endpoints: BTreeMap<String, PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            max_hash_size: default_max_hash_size(),
            max_upload_size: default_max_upload_size(),
            request_timeout_secs: default_request_timeout_secs(),
            max_tree_depth: None,
            containment: ContainmentMode::default(),
            tokens: Vec::new(),
            endpoints: BTreeMap::new(),
        }
    }
}

// Serde default functions
fn default_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_hash_size() -> u64 {
    DEFAULT_MAX_HASH_SIZE
}

fn default_max_upload_size() -> u64 {
    DEFAULT_MAX_UPLOAD_SIZE
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl DaemonConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate config text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        self.endpoint_table()?;
        Ok(())
    }

    pub fn endpoint_table(&self) -> Result<EndpointTable, ConfigError> {
        Ok(EndpointTable::new(
            self.endpoints
                .iter()
                .map(|(name, root)| (name.as_str(), root.clone())),
        )?)
    }

    pub fn token_set(&self) -> TokenSet {
        TokenSet::new(self.tokens.iter().cloned())
    }

    pub fn transfer_settings(&self) -> TransferSettings {
        TransferSettings {
            max_hash_size: self.max_hash_size,
            max_upload_size: self.max_upload_size,
            containment: self.containment,
            tree: TreeOptions {
                max_depth: self.max_tree_depth,
            },
        }
    }

    pub fn limits(&self) -> Limits {
        Limits {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_file_uses_defaults() {
        let config = DaemonConfig::from_toml_str("").unwrap();
        assert_eq!(config.address, "127.0.0.1:8080");
        assert_eq!(config.max_hash_size, 50 * 1024 * 1024);
        assert_eq!(config.request_timeout_secs, 15);
        assert_eq!(config.containment, ContainmentMode::Resolved);
        assert!(config.endpoints.is_empty());
        assert!(config.token_set().is_empty());
    }

    #[test]
    fn full_file_parses() {
        let config = DaemonConfig::from_toml_str(
            r#"
            address = "0.0.0.0:9000"
            max_hash_size = 0
            max_upload_size = 1024
            request_timeout_secs = 30
            max_tree_depth = 12
            containment = "lexical"
            tokens = ["abc", "def"]

            [endpoints]
            docs = "/srv/docs"
            media = "/srv/media"
            "#,
        )
        .unwrap();

        assert_eq!(config.address, "0.0.0.0:9000");
        assert_eq!(config.containment, ContainmentMode::Lexical);
        assert_eq!(config.token_set().len(), 2);

        let table = config.endpoint_table().unwrap();
        assert_eq!(table.names(), vec!["docs".to_string(), "media".to_string()]);

        let settings = config.transfer_settings();
        assert_eq!(settings.max_hash_size, 0);
        assert_eq!(settings.max_upload_size, 1024);
        assert_eq!(settings.tree.max_depth, Some(12));

        let limits = config.limits();
        assert_eq!(limits.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn relative_endpoint_roots_are_rejected() {
        let err = DaemonConfig::from_toml_str("[endpoints]\ndocs = \"srv/docs\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Endpoints(EndpointError::RelativeRoot { .. })));
    }

    #[test]
    fn unknown_containment_mode_is_a_parse_error() {
        let err = DaemonConfig::from_toml_str("containment = \"loose\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = DaemonConfig::from_toml_str("request_timeout_secs = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroTimeout));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempdir().unwrap();
        let err = DaemonConfig::load(&dir.path().join("fsyn.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}

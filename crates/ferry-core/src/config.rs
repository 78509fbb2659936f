//! Node configuration.
//!
//! A node is started with the path to its config document, a TOML file naming
//! the node's own identity, the files it serves, and the static list of peers
//! it may fetch from. Files are served from, and received files are written
//! to, the directory the config file lives in.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// UDP port this node binds.
    pub port: u16,

    /// Hostname this node binds. "localhost" maps to the IPv4 loopback.
    pub hostname: String,

    /// Filenames this node serves out of its config directory.
    #[serde(default)]
    pub content_info: Vec<String>,

    /// Peers this node knows about and what they advertise.
    #[serde(default)]
    pub peer_info: Vec<PeerConfig>,
}

/// One peer record in the config document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    pub hostname: String,
    pub port: u16,
    #[serde(default)]
    pub content_info: Vec<String>,
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load and validate a config document.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        let config: NodeConfig =
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".into()));
        }
        if self.hostname.is_empty() {
            return Err(ConfigError::Invalid("hostname must not be empty".into()));
        }
        for peer in &self.peer_info {
            if peer.port == 0 {
                return Err(ConfigError::Invalid(format!(
                    "peer {} has a zero port",
                    peer.hostname
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        port = 8001
        hostname = "localhost"
        content_info = ["alpha.txt", "beta.bin"]

        [[peer_info]]
        hostname = "localhost"
        port = 8002
        content_info = ["gamma.txt"]
    "#;

    #[test]
    fn sample_config_parses() {
        let config: NodeConfig = toml::from_str(SAMPLE).unwrap();
        config.validate().unwrap();
        assert_eq!(config.port, 8001);
        assert_eq!(config.content_info, vec!["alpha.txt", "beta.bin"]);
        assert_eq!(config.peer_info.len(), 1);
        assert_eq!(config.peer_info[0].port, 8002);
    }

    #[test]
    fn zero_port_is_rejected() {
        let config: NodeConfig = toml::from_str(
            r#"
            port = 0
            hostname = "localhost"
            "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_port_fails_to_parse() {
        let result: Result<NodeConfig, _> = toml::from_str(r#"hostname = "localhost""#);
        assert!(result.is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = NodeConfig::load(Path::new("/nonexistent/ferry-node.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFailed(_, _)));
    }
}

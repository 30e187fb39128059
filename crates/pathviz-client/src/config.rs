//! Client configuration.
//!
//! All settings live in a single `config.toml` at
//! `~/.config/pathviz/config.toml` by default:
//!
//! ```toml
//! [knowledge_base]
//! address = "127.0.0.1:7777"
//!
//! [requests]
//! reply_timeout_ms = 1500
//! max_retries = 5
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use pathviz_protocol::DEFAULT_PORT;

use crate::error::{ClientError, ClientResult};

/// Configuration for the pathviz client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Knowledge-base daemon settings.
    pub knowledge_base: KnowledgeBaseSettings,

    /// Request queue settings.
    pub requests: RequestSettings,

    /// Debug mode.
    pub debug: bool,
}

/// Where and how to reach the knowledge-base daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeBaseSettings {
    /// `host:port` of the daemon; the port may be omitted.
    pub address: String,

    /// UDP receive buffer size in bytes.
    pub recv_buffer: usize,
}

impl Default for KnowledgeBaseSettings {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{}", DEFAULT_PORT),
            recv_buffer: 65536,
        }
    }
}

/// Request queue timing and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestSettings {
    /// How long to wait for a reply before retrying.
    pub reply_timeout_ms: u64,

    /// Queue polling interval; also the retry cadence after a timeout.
    pub poll_interval_ms: u64,

    /// Give up on a command after this many timeouts. `None` retries
    /// forever, which is the daemon protocol's native behavior.
    pub max_retries: Option<u32>,

    /// How often `watch` re-requests the resource list.
    pub list_refresh_ms: u64,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            reply_timeout_ms: 1500,
            poll_interval_ms: 250,
            max_retries: None,
            list_refresh_ms: 5000,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if the file
    /// does not exist.
    pub fn load() -> ClientResult<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Loads configuration from a specific file.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&contents)
            .map_err(|e| ClientError::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Splits the configured address into host and port.
    ///
    /// A missing port falls back to the daemon default; an empty host is a
    /// configuration error surfaced later as `NoAddress` by the transport.
    pub fn host_port(&self) -> ClientResult<(String, u16)> {
        let address = self.knowledge_base.address.trim();
        match address.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    ClientError::Config(format!("invalid port in address {:?}", address))
                })?;
                Ok((host.to_string(), port))
            }
            None => Ok((address.to_string(), DEFAULT_PORT)),
        }
    }

    /// Reply timeout as a [`Duration`].
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.requests.reply_timeout_ms)
    }

    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.requests.poll_interval_ms)
    }

    /// List refresh interval as a [`Duration`].
    pub fn list_refresh(&self) -> Duration {
        Duration::from_millis(self.requests.list_refresh_ms)
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pathviz").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.knowledge_base.address, "127.0.0.1:7777");
        assert_eq!(config.reply_timeout(), Duration::from_millis(1500));
        assert_eq!(config.requests.max_retries, None);
        assert_eq!(config.list_refresh(), Duration::from_millis(5000));
    }

    #[test]
    fn host_port_split() {
        let mut config = ClientConfig::default();
        assert_eq!(
            config.host_port().unwrap(),
            ("127.0.0.1".to_string(), 7777)
        );

        config.knowledge_base.address = "kb.example.net".to_string();
        assert_eq!(
            config.host_port().unwrap(),
            ("kb.example.net".to_string(), DEFAULT_PORT)
        );

        config.knowledge_base.address = "localhost:nope".to_string();
        assert!(config.host_port().is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [knowledge_base]
            address = "10.0.0.1:7778"

            [requests]
            reply_timeout_ms = 500
            max_retries = 3
            "#
        )
        .unwrap();

        let config = ClientConfig::load_from(file.path()).unwrap();
        assert_eq!(config.knowledge_base.address, "10.0.0.1:7778");
        assert_eq!(config.requests.reply_timeout_ms, 500);
        assert_eq!(config.requests.max_retries, Some(3));
        // Unset sections keep their defaults
        assert_eq!(config.requests.list_refresh_ms, 5000);
    }

    #[test]
    fn load_from_missing_file() {
        let result = ClientConfig::load_from(Path::new("/nonexistent/pathviz.toml"));
        assert!(matches!(result, Err(ClientError::Config(_))));
    }
}

//! Configuration types for blocksync.
//!
//! [`Config`] holds the server location, the workspace to operate on and the
//! credentials sent on connect. It is persisted as TOML (typically at
//! `~/.config/blocksync/config.toml` on Unix systems).
//!
//! # Example
//!
//! ```ignore
//! use blocksync_core::config::Config;
//!
//! let mut config = Config::load()?;
//! config.server_url = Some("https://sync.example.com".into());
//! config.save()?;
//!
//! let endpoint = config.socket_endpoint()?;
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{BlocksyncError, Result};

/// Client version announced when joining a space.
pub const DEFAULT_CLIENT_VERSION: &str = "0.20.0";

/// Default bound for connecting and for each acknowledged request.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

const SOCKET_PATH: &str = "/socket.io/";

/// `Config` is the user-editable part of blocksync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Sync server URL (e.g. "https://sync.example.com")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,

    /// Workspace whose documents are mutated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,

    /// Bearer token sent on the upgrade request and in the connect payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Raw `Cookie` header value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,

    /// Client version reported to the server
    #[serde(default = "default_client_version")]
    pub client_version: String,

    /// Bound for the WebSocket handshake and Socket.IO connect, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Bound for each acknowledged request, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_client_version() -> String {
    DEFAULT_CLIENT_VERSION.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: None,
            workspace_id: None,
            token: None,
            cookie: None,
            client_version: default_client_version(),
            connect_timeout_ms: DEFAULT_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// Create a config pointing at `server_url` and `workspace_id`.
    pub fn new(server_url: impl Into<String>, workspace_id: impl Into<String>) -> Self {
        Self {
            server_url: Some(server_url.into()),
            workspace_id: Some(workspace_id.into()),
            ..Self::default()
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| BlocksyncError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save config to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// The configured workspace id.
    pub fn require_workspace(&self) -> Result<String> {
        self.workspace_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or(BlocksyncError::MissingSetting("workspace_id"))
    }

    /// WebSocket URL of the Socket.IO endpoint.
    ///
    /// `http` becomes `ws` and `https` becomes `wss`; a `ws`/`wss` URL is
    /// taken as given. Any path on the server URL is replaced.
    pub fn socket_endpoint(&self) -> Result<String> {
        let raw = self
            .server_url
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(BlocksyncError::MissingSetting("server_url"))?;
        let mut url = Url::parse(raw)
            .map_err(|e| BlocksyncError::Connect(format!("Invalid server URL '{raw}': {e}")))?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(BlocksyncError::Connect(format!(
                    "Unsupported server URL scheme '{other}'"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| BlocksyncError::Connect(format!("Cannot use '{raw}' as a socket URL")))?;
        url.set_path(SOCKET_PATH);
        url.set_query(Some("EIO=4&transport=websocket"));
        url.set_fragment(None);
        Ok(url.to_string())
    }
}

// ============================================================================
// Native-only implementation (not available in WASM)
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
impl Config {
    /// Get the config file path (~/.config/blocksync/config.toml)
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("blocksync").join("config.toml"))
    }

    /// Load config from the default location, or defaults if there is no file.
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            return Self::load_from(&path);
        }

        Ok(Config::default())
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().ok_or(BlocksyncError::NoConfigDir)?;
        self.save_to(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: Config = toml::from_str("server_url = \"https://sync.example.com\"").unwrap();
        assert_eq!(config.client_version, DEFAULT_CLIENT_VERSION);
        assert_eq!(config.connect_timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.request_timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(config.workspace_id.is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::new("https://sync.example.com", "ws-1");
        config.token = Some("secret".into());
        config.request_timeout_ms = 2500;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, BlocksyncError::ConfigRead { .. }));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "server_url = [").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(BlocksyncError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_socket_endpoint() {
        let config = Config::new("https://sync.example.com", "ws");
        assert_eq!(
            config.socket_endpoint().unwrap(),
            "wss://sync.example.com/socket.io/?EIO=4&transport=websocket"
        );

        let config = Config::new("http://127.0.0.1:3010/app", "ws");
        assert_eq!(
            config.socket_endpoint().unwrap(),
            "ws://127.0.0.1:3010/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_socket_endpoint_requires_server() {
        assert!(matches!(
            Config::default().socket_endpoint(),
            Err(BlocksyncError::MissingSetting("server_url"))
        ));
        let config = Config::new("ftp://example.com", "ws");
        assert!(config.socket_endpoint().is_err());
    }

    #[test]
    fn test_require_workspace() {
        assert!(Config::default().require_workspace().is_err());
        assert_eq!(
            Config::new("http://x", "abc").require_workspace().unwrap(),
            "abc"
        );
    }
}

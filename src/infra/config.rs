// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub realtime: RealtimeConfig,

    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 3000,
            cors_origins: vec![
                "http://localhost:5173".into(),
                "http://127.0.0.1:5173".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Overrides the default `<data dir>/pairup.db`.
    #[serde(default)]
    pub path: Option<String>,
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> PathBuf {
        match self.path {
            Some(ref p) => PathBuf::from(p),
            None => paths::db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Header set by the upstream auth proxy, carrying the provider user id.
    pub identity_header: String,
    /// Shared bearer token the proxy must present. Unset disables the check.
    #[serde(default)]
    pub api_token: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            identity_header: "x-user-id".into(),
            api_token: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RealtimeProviderKind {
    /// In-process resources, for development and tests.
    Local,
    /// Stream chat + video REST APIs.
    Stream,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    pub provider: RealtimeProviderKind,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the server token.
    pub token_env: String,
    pub chat_base_url: String,
    pub video_base_url: String,
    pub call_type: String,
    pub channel_type: String,
    pub timeout_seconds: u64,
    #[serde(default)]
    pub retry: RetryTomlConfig,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            provider: RealtimeProviderKind::Local,
            api_key: None,
            token_env: "PAIRUP_REALTIME_TOKEN".into(),
            chat_base_url: "https://chat.stream-io-api.com".into(),
            video_base_url: "https://video.stream-io-api.com/api/v2/video".into(),
            call_type: "default".into(),
            channel_type: "messaging".into(),
            timeout_seconds: 10,
            retry: RetryTomlConfig::default(),
        }
    }
}

impl RealtimeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Read the server token from the configured environment variable.
    pub fn server_token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryTomlConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryTomlConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 200,
            max_delay_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    pub batch_size: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 60,
            batch_size: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Config {
    /// Load config from the default location, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.auth.identity_header.trim().is_empty() {
            anyhow::bail!("auth.identity_header cannot be empty");
        }
        if self.reconciler.enabled && self.reconciler.interval_seconds == 0 {
            anyhow::bail!("reconciler.interval_seconds must be greater than zero");
        }
        if self.realtime.provider == RealtimeProviderKind::Stream && self.realtime.api_key.is_none()
        {
            anyhow::bail!("realtime.api_key is required for the stream provider");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_reasonable() {
        let c = Config::default();
        assert_eq!(c.server.port, 3000);
        assert_eq!(c.auth.identity_header, "x-user-id");
        assert!(c.auth.api_token.is_none());
        assert_eq!(c.realtime.provider, RealtimeProviderKind::Local);
        assert_eq!(c.realtime.retry.max_retries, 2);
        assert!(c.reconciler.enabled);
        assert_eq!(c.reconciler.batch_size, 50);
        assert_eq!(c.logging.level, "info");
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.realtime.channel_type, "messaging");
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[server]
bind = "0.0.0.0"
port = 8080
cors_origins = ["https://app.example.com"]

[database]
path = "/var/lib/pairup/pairup.db"

[auth]
identity_header = "x-clerk-user-id"
api_token = "proxy-secret"

[realtime]
provider = "stream"
api_key = "key-123"
token_env = "STREAM_TOKEN"
chat_base_url = "https://chat.example.com"
video_base_url = "https://video.example.com"
call_type = "default"
channel_type = "messaging"
timeout_seconds = 5

[realtime.retry]
max_retries = 4
initial_delay_ms = 100
max_delay_ms = 1000

[reconciler]
enabled = false
interval_seconds = 30
batch_size = 10

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.cors_origins.len(), 1);
        assert_eq!(
            config.database.resolved_path(),
            PathBuf::from("/var/lib/pairup/pairup.db")
        );
        assert_eq!(config.auth.identity_header, "x-clerk-user-id");
        assert_eq!(config.realtime.provider, RealtimeProviderKind::Stream);
        assert_eq!(config.realtime.timeout(), Duration::from_secs(5));
        assert_eq!(config.realtime.retry.max_retries, 4);
        assert!(!config.reconciler.enabled);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_stream_provider_requires_api_key() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[realtime]\nprovider = \"stream\"\ntoken_env = \"X\"\nchat_base_url = \"a\"\nvideo_base_url = \"b\"\ncall_type = \"default\"\nchannel_type = \"messaging\"\ntimeout_seconds = 5").unwrap();
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("api_key"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nbind = \"0.0.0.0\"\nport = 9000").unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert!(config.server.cors_origins.is_empty());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.server.port, config.server.port);
        assert_eq!(deserialized.realtime.token_env, config.realtime.token_env);
    }
}

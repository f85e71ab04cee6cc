//! Configuration parsing and structures

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::adl::ENDPOINT_SCHEME;
use crate::auth::{AnonymousProvider, CredentialProvider, StaticTokenProvider};
use crate::transport::http::DEFAULT_API_VERSION;

/// Default multipart part size used by the command line tool
pub const DEFAULT_UPLOAD_PART_SIZE: u64 = 4 * 1024 * 1024;

// =============================================================================
// Raw Config (Deserialized from YAML)
// =============================================================================

/// Raw configuration as deserialized from YAML.
/// This is converted to `Config` via `resolve()`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Data lake backend
    pub backend: RawBackendConfig,
}

/// Backend section before validation
#[derive(Debug, Clone, Deserialize)]
pub struct RawBackendConfig {
    /// `adl://account.dns-suffix`; the scheme is optional
    pub endpoint: String,

    /// Root prefix all keys live under
    #[serde(default)]
    pub bucket: Option<String>,

    /// Octal mode for created files
    pub file_mode: Option<String>,

    /// Octal mode for created directories
    pub dir_mode: Option<String>,

    /// `https`, or `http` for local emulators
    pub scheme: Option<String>,

    pub api_version: Option<String>,

    /// Per-request deadline
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,

    /// Part size for multipart uploads, e.g. "4MB"
    pub upload_part_size: Option<String>,

    #[serde(default)]
    pub auth: AuthConfig,
}

/// Credential source (tagged enum)
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    /// No authorization header
    #[default]
    Anonymous,

    /// Fixed bearer token
    Static { token: String },
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// =============================================================================
// Resolved Config (Ready for use)
// =============================================================================

/// Top-level configuration (resolved from RawConfig)
#[derive(Debug, Clone)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Backend configuration (fully resolved)
    pub backend: BackendConfig,
}

/// Backend configuration (fully resolved)
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Account name, the first label of the endpoint host
    pub account: String,

    /// Rest of the endpoint host, e.g. `azuredatalakestore.net`
    pub dns_suffix: String,

    /// Root prefix without leading or trailing delimiters (empty for none)
    pub bucket: String,

    pub file_mode: u32,
    pub dir_mode: u32,
    pub scheme: String,
    pub api_version: String,
    pub request_timeout: Option<Duration>,
    pub upload_part_size: u64,
    pub auth: AuthConfig,
}

impl BackendConfig {
    /// Configuration with every optional setting at its default
    pub fn new(account: impl Into<String>, dns_suffix: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            dns_suffix: dns_suffix.into(),
            bucket: String::new(),
            file_mode: 0o644,
            dir_mode: 0o755,
            scheme: "https".to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            request_timeout: None,
            upload_part_size: DEFAULT_UPLOAD_PART_SIZE,
            auth: AuthConfig::Anonymous,
        }
    }

    /// Root URL of the account's REST endpoint
    pub fn base_url(&self) -> String {
        format!("{}://{}.{}", self.scheme, self.account, self.dns_suffix)
    }

    /// Build the credential provider named by `auth`
    pub fn credentials(&self) -> Arc<dyn CredentialProvider> {
        match &self.auth {
            AuthConfig::Anonymous => Arc::new(AnonymousProvider),
            AuthConfig::Static { token } => Arc::new(StaticTokenProvider::new(token.clone())),
        }
    }
}

// =============================================================================
// Resolution Logic
// =============================================================================

impl RawConfig {
    /// Resolve raw config into final config, validating every field
    pub fn resolve(self) -> Result<Config, ConfigError> {
        let RawConfig { logging, backend } = self;
        Ok(Config {
            logging,
            backend: Self::resolve_backend(backend)?,
        })
    }

    fn resolve_backend(raw: RawBackendConfig) -> Result<BackendConfig, ConfigError> {
        let host = raw
            .endpoint
            .trim()
            .trim_start_matches(ENDPOINT_SCHEME)
            .trim_end_matches('/');
        let (account, dns_suffix) = host
            .split_once('.')
            .filter(|(account, suffix)| !account.is_empty() && !suffix.is_empty())
            .ok_or_else(|| {
                ConfigError::ValidationError(format!("Invalid endpoint: {}", raw.endpoint))
            })?;

        let mut config = BackendConfig::new(account, dns_suffix);

        if let Some(bucket) = raw.bucket {
            config.bucket = bucket.trim_matches('/').to_string();
        }
        if let Some(mode) = raw.file_mode {
            config.file_mode = parse_mode("file_mode", &mode)?;
        }
        if let Some(mode) = raw.dir_mode {
            config.dir_mode = parse_mode("dir_mode", &mode)?;
        }
        if let Some(scheme) = raw.scheme {
            if scheme != "http" && scheme != "https" {
                return Err(ConfigError::ValidationError(format!(
                    "scheme must be http or https, got {:?}",
                    scheme
                )));
            }
            config.scheme = scheme;
        }
        if let Some(version) = raw.api_version {
            config.api_version = version;
        }
        config.request_timeout = raw.request_timeout;
        if let Some(size) = raw.upload_part_size {
            config.upload_part_size = parse_size(&size)
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    ConfigError::ValidationError(format!("Invalid upload_part_size: {:?}", size))
                })?;
        }
        config.auth = raw.auth;

        Ok(config)
    }
}

fn parse_mode(field: &str, value: &str) -> Result<u32, ConfigError> {
    u32::from_str_radix(value.trim(), 8)
        .ok()
        .filter(|mode| *mode <= 0o7777)
        .ok_or_else(|| {
            ConfigError::ValidationError(format!("{} must be an octal mode, got {:?}", field, value))
        })
}

/// Parse a size string like "4MB", "512KB" or "1024" into bytes
pub fn parse_size(s: &str) -> Option<u64> {
    let s = s.trim().to_uppercase();
    let (num_part, suffix) = if let Some(n) = s.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = s.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = s.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = s.strip_suffix('B') {
        (n, 1)
    } else {
        (s.as_str(), 1)
    };

    num_part.trim().parse::<u64>().ok()?.checked_mul(suffix)
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.clone(), e.to_string()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a YAML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        raw.resolve()
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
logging:
  level: debug

backend:
  endpoint: "adl://myaccount.azuredatalakestore.net"
  bucket: "/tenant-a/"
  file_mode: "0600"
  dir_mode: "0700"
  scheme: http
  api_version: "2018-05-01"
  request_timeout: 30s
  upload_part_size: 8MB
  auth:
    type: static
    token: secret
"#;

        let config = Config::from_str(yaml).unwrap();
        assert_eq!(config.logging.level, "debug");

        let backend = &config.backend;
        assert_eq!(backend.account, "myaccount");
        assert_eq!(backend.dns_suffix, "azuredatalakestore.net");
        assert_eq!(backend.bucket, "tenant-a");
        assert_eq!(backend.file_mode, 0o600);
        assert_eq!(backend.dir_mode, 0o700);
        assert_eq!(backend.api_version, "2018-05-01");
        assert_eq!(backend.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(backend.upload_part_size, 8 * 1024 * 1024);
        assert_eq!(
            backend.auth,
            AuthConfig::Static {
                token: "secret".to_string()
            }
        );
        assert_eq!(backend.base_url(), "http://myaccount.azuredatalakestore.net");
    }

    #[test]
    fn test_defaults() {
        let yaml = r#"
backend:
  endpoint: "acct.azuredatalakestore.net"
"#;

        let config = Config::from_str(yaml).unwrap();
        assert_eq!(config.logging.level, "info");

        let backend = &config.backend;
        assert_eq!(backend.account, "acct");
        assert_eq!(backend.bucket, "");
        assert_eq!(backend.file_mode, 0o644);
        assert_eq!(backend.dir_mode, 0o755);
        assert_eq!(backend.scheme, "https");
        assert_eq!(backend.api_version, DEFAULT_API_VERSION);
        assert_eq!(backend.request_timeout, None);
        assert_eq!(backend.upload_part_size, DEFAULT_UPLOAD_PART_SIZE);
        assert_eq!(backend.auth, AuthConfig::Anonymous);
        assert_eq!(backend.base_url(), "https://acct.azuredatalakestore.net");
    }

    #[test]
    fn test_invalid_endpoint() {
        for endpoint in ["adl://nodots", "adl://.suffix", "adl://acct.", ""] {
            let yaml = format!("backend:\n  endpoint: \"{}\"\n", endpoint);
            let err = Config::from_str(&yaml).unwrap_err();
            assert!(
                err.to_string().contains("Invalid endpoint"),
                "endpoint {:?}: {}",
                endpoint,
                err
            );
        }
    }

    #[test]
    fn test_invalid_modes() {
        let yaml = r#"
backend:
  endpoint: "adl://acct.azuredatalakestore.net"
  file_mode: "0999"
"#;
        assert!(matches!(
            Config::from_str(yaml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_invalid_scheme_and_part_size() {
        let yaml = r#"
backend:
  endpoint: "adl://acct.azuredatalakestore.net"
  scheme: ftp
"#;
        assert!(Config::from_str(yaml).is_err());

        let yaml = r#"
backend:
  endpoint: "adl://acct.azuredatalakestore.net"
  upload_part_size: 0MB
"#;
        assert!(Config::from_str(yaml).is_err());
    }

    #[test]
    fn test_unknown_auth_type() {
        let yaml = r#"
backend:
  endpoint: "adl://acct.azuredatalakestore.net"
  auth:
    type: oauth
"#;
        assert!(matches!(
            Config::from_str(yaml),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_backend() {
        let result = Config::from_str("logging:\n  level: warn\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "backend:\n  endpoint: adl://acct.example.net\n  bucket: b").unwrap();

        let config = Config::from_file(&file.path().to_path_buf()).unwrap();
        assert_eq!(config.backend.account, "acct");
        assert_eq!(config.backend.bucket, "b");

        let missing = PathBuf::from("/nonexistent/config.yaml");
        assert!(matches!(
            Config::from_file(&missing),
            Err(ConfigError::ReadError(_, _))
        ));
    }

    #[test]
    fn test_credentials_follow_auth() {
        let mut config = BackendConfig::new("acct", "example.net");
        let token = tokio_test::block_on(config.credentials().token()).unwrap();
        assert_eq!(token, None);

        config.auth = AuthConfig::Static {
            token: "abc".to_string(),
        };
        let token = tokio_test::block_on(config.credentials().token()).unwrap();
        assert_eq!(token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1GB"), Some(1024 * 1024 * 1024));
        assert_eq!(parse_size("500MB"), Some(500 * 1024 * 1024));
        assert_eq!(parse_size("100KB"), Some(100 * 1024));
        assert_eq!(parse_size("4mb"), Some(4 * 1024 * 1024));
        assert_eq!(parse_size("1024B"), Some(1024));
        assert_eq!(parse_size("1024"), Some(1024));
        assert_eq!(parse_size("lots"), None);
    }
}

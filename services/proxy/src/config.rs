//! Proxy configuration loading.
//!
//! TOML is the sole config source; no environment variable overrides.
//! Default config path: `/etc/wrap-proxy/proxy.toml`.
//!
//! # Required fields
//! - `destination`
//! - `secret_key_file`
//! - at least one `[[relays]]` entry

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use wrap_crypto::SecretKeyHex;

// ---------------------------------------------------------------------------
// Config types (validated, defaulted)
// ---------------------------------------------------------------------------

/// Top-level proxy configuration — the injected configuration table of §6.
#[derive(Clone)]
pub struct ProxyConfig {
    pub destination: String,
    pub secret_key: SecretKeyHex,
    pub relays: Vec<String>,
    pub allowed_routes: Vec<String>,
    pub timeout: Duration,
    pub nprofile_max_relays: usize,
    pub status_http: StatusHttpConfig,
}

#[derive(Debug, Clone)]
pub struct StatusHttpConfig {
    pub bind: String,
}

// ---------------------------------------------------------------------------
// Raw TOML deserialization types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawConfig {
    destination: Option<String>,
    secret_key_file: Option<String>,
    relays: Option<Vec<String>>,
    allowed_routes: Option<Vec<String>>,
    timeout_ms: Option<u64>,
    nprofile_max_relays: Option<usize>,
    status_http: Option<RawStatusHttpConfig>,
}

#[derive(Debug, Deserialize)]
struct RawStatusHttpConfig {
    bind: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn load_config_from_path(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {}", path.display(), e)))?;
    load_config_from_str(&toml_str)
}

pub fn load_config() -> Result<ProxyConfig, ConfigError> {
    load_config_from_path(Path::new("/etc/wrap-proxy/proxy.toml"))
}

pub fn load_config_from_str(toml_str: &str) -> Result<ProxyConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let destination = raw.destination.ok_or_else(|| ConfigError::MissingField("destination".to_owned()))?;
    if !destination.starts_with("http://") && !destination.starts_with("https://") {
        return Err(ConfigError::InvalidValue(format!(
            "destination must start with http:// or https://, got '{}'",
            destination
        )));
    }

    let secret_key_file =
        raw.secret_key_file.ok_or_else(|| ConfigError::MissingField("secret_key_file".to_owned()))?;
    let secret_key = read_secret_key_file(&secret_key_file)?;

    let relays = raw.relays.ok_or_else(|| ConfigError::MissingField("relays".to_owned()))?;
    if relays.is_empty() {
        return Err(ConfigError::InvalidValue("at least one relay is required".to_owned()));
    }

    let allowed_routes = raw.allowed_routes.unwrap_or_default();
    let timeout = Duration::from_millis(raw.timeout_ms.unwrap_or(300_000));
    let nprofile_max_relays = raw.nprofile_max_relays.unwrap_or(3);

    let status_http = match raw.status_http {
        Some(s) => StatusHttpConfig { bind: s.bind.unwrap_or_else(|| "0.0.0.0:8080".to_owned()) },
        None => StatusHttpConfig { bind: "0.0.0.0:8080".to_owned() },
    };

    Ok(ProxyConfig { destination, secret_key, relays, allowed_routes, timeout, nprofile_max_relays, status_http })
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    MissingField(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {}", s),
            ConfigError::Parse(s) => write!(f, "parse error: {}", s),
            ConfigError::MissingField(s) => write!(f, "missing required field: {}", s),
            ConfigError::InvalidValue(s) => write!(f, "invalid config value: {}", s),
        }
    }
}

impl std::error::Error for ConfigError {}

fn read_secret_key_file(path: &str) -> Result<SecretKeyHex, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading secret key file '{}': {}", path, e)))?;
    SecretKeyHex::from_hex(content.trim()).map_err(|e| ConfigError::InvalidValue(format!("secret key: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_key() -> tempfile::NamedTempFile {
        let secret = wrap_crypto::random_secret();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", secret.to_hex()).unwrap();
        file
    }

    #[test]
    fn missing_destination_is_an_error() {
        let key_file = write_temp_key();
        let toml = format!("secret_key_file = \"{}\"\nrelays = [\"wss://r\"]\n", key_file.path().display());
        let err = load_config_from_str(&toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "destination"));
    }

    #[test]
    fn rejects_non_http_destination() {
        let key_file = write_temp_key();
        let toml = format!(
            "destination = \"ftp://origin\"\nsecret_key_file = \"{}\"\nrelays = [\"wss://r\"]\n",
            key_file.path().display()
        );
        let err = load_config_from_str(&toml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn applies_defaults_for_optional_fields() {
        let key_file = write_temp_key();
        let toml = format!(
            "destination = \"http://origin.example\"\nsecret_key_file = \"{}\"\nrelays = [\"wss://r\"]\n",
            key_file.path().display()
        );
        let config = load_config_from_str(&toml).unwrap();
        assert_eq!(config.timeout, Duration::from_millis(300_000));
        assert_eq!(config.nprofile_max_relays, 3);
        assert_eq!(config.status_http.bind, "0.0.0.0:8080");
        assert!(config.allowed_routes.is_empty());
    }
}

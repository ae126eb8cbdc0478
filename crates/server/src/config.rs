use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use object_store::ObjectStoreScheme;
use serde::{Deserialize, Serialize};
use url::Url;

pub const CONFIG_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub version: u32,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Host to bind, without the port.
    pub bind_addr: Option<String>,
    /// `s3://bucket[/root]`, `file:///path` or `memory:///`.
    pub store_url: String,
    pub region: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub allow_http: bool,
    pub request_timeout_secs: u64,
    pub mapping_ttl_secs: u64,
    pub signed_url_ttl_secs: u64,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            port: 3000,
            bind_addr: None,
            store_url: "s3://music".to_string(),
            region: "us-east-1".to_string(),
            endpoint: "".to_string(),
            access_key_id: "".to_string(),
            secret_access_key: "".to_string(),
            allow_http: false,
            request_timeout_secs: 30,
            mapping_ttl_secs: 5 * 60,
            signed_url_ttl_secs: 60 * 60,
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn mapping_ttl(&self) -> Duration {
        Duration::from_secs(self.mapping_ttl_secs)
    }

    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }

    pub fn listen_addr(&self) -> String {
        match self.bind_addr.as_deref().map(str::trim) {
            Some(host) if !host.is_empty() => format!("{}:{}", host, self.port),
            _ => format!("0.0.0.0:{}", self.port),
        }
    }

    /// Applies `PORT` and `TUNEVAULT_STORE_URL` over file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = env::var("PORT") {
            if let Ok(port) = port.trim().parse::<u16>() {
                self.port = port;
            }
        }
        if let Ok(store_url) = env::var("TUNEVAULT_STORE_URL") {
            if !store_url.trim().is_empty() {
                self.store_url = store_url.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".to_string()));
        }
        let url = Url::parse(self.store_url.trim())
            .map_err(|err| ConfigError::Invalid(format!("store_url: {}", err)))?;
        let (scheme, _) = ObjectStoreScheme::parse(&url)
            .map_err(|err| ConfigError::Invalid(format!("store_url: {}", err)))?;
        match scheme {
            ObjectStoreScheme::AmazonS3 => {
                if url.host_str().map(str::is_empty).unwrap_or(true) {
                    return Err(ConfigError::Invalid(
                        "store_url must name a bucket".to_string(),
                    ));
                }
            }
            ObjectStoreScheme::Local | ObjectStoreScheme::Memory => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unsupported store scheme: {:?}",
                    other
                )))
            }
        }
        if self.mapping_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "mapping_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.signed_url_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "signed_url_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.access_key_id.is_empty() != self.secret_access_key.is_empty() {
            return Err(ConfigError::Invalid(
                "access_key_id and secret_access_key must be set together".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
            ConfigError::Invalid(message) => write!(f, "invalid config: {}", message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("TUNEVAULT_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

pub fn load_or_create_config(path: &Path) -> Result<(ServerConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: ServerConfig = serde_yaml::from_str(&contents)?;
        if config.version < CONFIG_VERSION {
            config.version = CONFIG_VERSION;
        }
        return Ok((config, false));
    }

    let config = ServerConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &ServerConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{load_or_create_config, ConfigError, ServerConfig};

    fn temp_config_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("tunevault-config-{}-{}", name, std::process::id()))
            .join("config.yaml")
    }

    #[test]
    fn defaults_are_valid() {
        ServerConfig::default().validate().unwrap();
        assert_eq!(ServerConfig::default().mapping_ttl().as_secs(), 300);
    }

    #[test]
    fn creates_default_file_then_reloads_it() {
        let path = temp_config_path("create");
        let _ = std::fs::remove_file(&path);
        let (config, created) = load_or_create_config(&path).unwrap();
        assert!(created);
        assert_eq!(config.port, 3000);
        let (reloaded, created) = load_or_create_config(&path).unwrap();
        assert!(!created);
        assert_eq!(reloaded.store_url, config.store_url);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let path = temp_config_path("partial");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "store_url: \"memory:///\"\nbind_addr: 127.0.0.1\n").unwrap();
        let (config, _) = load_or_create_config(&path).unwrap();
        assert_eq!(config.store_url, "memory:///");
        assert_eq!(config.port, 3000);
        assert_eq!(config.listen_addr(), "127.0.0.1:3000");
        assert_eq!(config.mapping_ttl_secs, 300);
        config.validate().unwrap();
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = ServerConfig::default();
        config.mapping_ttl_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ServerConfig::default();
        config.store_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ServerConfig::default();
        config.access_key_id = "AKIA".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn listen_addr_prefers_bind_host() {
        let mut config = ServerConfig::default();
        assert_eq!(config.listen_addr(), "0.0.0.0:3000");
        config.bind_addr = Some("127.0.0.1".to_string());
        assert_eq!(config.listen_addr(), "127.0.0.1:3000");
    }
}

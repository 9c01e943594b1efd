use anyhow::{bail, Result};
use classcast_registry::config::{
    DEFAULT_MAX_CODE_ATTEMPTS, DEFAULT_MAX_PIN_LEN, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL_SECS,
    MAX_TTL_SECS,
};
use classcast_registry::RegistryConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
    /// Directory with the presenter/student pages, served at `/`.
    pub static_dir: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub upload_dir: String,
    pub max_upload_bytes: u64,
    pub allowed_mime_types: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub max_pin_len: usize,
    pub max_code_attempts: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SecurityConfig {
    /// Peers allowed to talk to the server (single IPs or CIDR blocks).
    pub allowed_ips: Vec<String>,
    /// LAN addresses to allow and advertise on top of the detected one, for
    /// hosts on more than one network (e.g. Wi-Fi and Ethernet).
    pub lan_ips: Vec<String>,
    /// Origins accepted on top of the detected LAN and localhost ones.
    pub extra_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RateLimitConfig {
    pub download_burst: u32,
    pub download_window_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: "uploads".to_string(),
            max_upload_bytes: 50 * 1024 * 1024,
            allowed_mime_types: vec![
                "application/pdf".to_string(),
                "application/vnd.openxmlformats-officedocument.presentationml.presentation".to_string(),
                "image/png".to_string(),
                "image/jpeg".to_string(),
            ],
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_TTL_SECS as u64,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL.as_secs(),
            max_pin_len: DEFAULT_MAX_PIN_LEN,
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_ips: [
                "127.0.0.0/8",
                "::1/128",
                "10.0.0.0/8",
                "172.16.0.0/12",
                "192.168.0.0/16",
                "169.254.0.0/16",
                "fc00::/7",
                "fe80::/10",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            lan_ips: Vec::new(),
            extra_origins: Vec::new(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            download_burst: 10,
            download_window_seconds: 600,
        }
    }
}

impl Settings {
    /// Defaults, then `config/settings.{toml,yaml,json}` if present, then
    /// `CLASSCAST__SECTION__KEY` environment variables.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("CLASSCAST")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("storage.allowed_mime_types")
                    .with_list_parse_key("security.allowed_ips")
                    .with_list_parse_key("security.lan_ips")
                    .with_list_parse_key("security.extra_origins")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.session.ttl_seconds == 0 || self.session.ttl_seconds > MAX_TTL_SECS {
            bail!(
                "session.ttl_seconds must be between 1 and {} (got {})",
                MAX_TTL_SECS,
                self.session.ttl_seconds
            );
        }
        if self.session.sweep_interval_seconds == 0 {
            bail!("session.sweep_interval_seconds must be greater than zero");
        }
        if self.session.max_pin_len == 0 {
            bail!("session.max_pin_len must be greater than zero");
        }
        if self.storage.max_upload_bytes == 0 {
            bail!("storage.max_upload_bytes must be greater than zero");
        }
        if self.storage.allowed_mime_types.is_empty() {
            bail!("storage.allowed_mime_types must not be empty");
        }
        if self.rate_limit.download_burst == 0 || self.rate_limit.download_window_seconds == 0 {
            bail!("rate_limit values must be greater than zero");
        }
        Ok(())
    }

    pub fn registry_config(&self) -> Result<RegistryConfig> {
        let cfg = RegistryConfig {
            max_pin_len: self.session.max_pin_len,
            max_code_attempts: self.session.max_code_attempts,
            ..RegistryConfig::default()
        }
        .with_ttl_secs(self.session.ttl_seconds)?;
        Ok(cfg)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session.sweep_interval_seconds)
    }
}

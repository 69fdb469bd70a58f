use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            backend: BackendConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from multiple sources in order of priority:
    /// 1. Environment variables (highest priority)
    /// 2. Configuration file
    /// 3. Default values (lowest priority)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(file_config) = Self::load_from_file() {
            config = file_config;
        }

        config.apply_env_vars()?;
        config.validate()?;

        Ok(config)
    }

    /// Searches in order: ./meeting-rooms.toml, ~/.config/meeting-rooms/config.toml, /etc/meeting-rooms/config.toml
    fn load_from_file() -> Result<Self> {
        let mut possible_paths = vec![PathBuf::from("./meeting-rooms.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            possible_paths.push(config_dir.join("meeting-rooms").join("config.toml"));
        }

        possible_paths.push(PathBuf::from("/etc/meeting-rooms/config.toml"));

        for path in possible_paths {
            if path.exists() {
                let config = Self::load_from_path(&path)?;
                tracing::info!("Loaded configuration from: {}", path.display());
                return Ok(config);
            }
        }

        Err(anyhow!("No configuration file found"))
    }

    pub fn load_from_path(path: &std::path::Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        toml::from_str(&contents)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path.display(), e))
    }

    /// Apply environment variables to override config values
    pub fn apply_env_vars(&mut self) -> Result<()> {
        if let Ok(host) = env::var("MEETING_ROOMS_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("MEETING_ROOMS_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| anyhow!("Invalid MEETING_ROOMS_PORT: {}", e))?;
        }

        if let Ok(base_url) = env::var("MEETING_ROOMS_BACKEND_URL") {
            let base_url = base_url.trim().to_string();
            self.backend.base_url = if base_url.is_empty() { None } else { Some(base_url) };
        }
        if let Ok(timeout) = env::var("MEETING_ROOMS_REQUEST_TIMEOUT") {
            self.backend.request_timeout_seconds = timeout
                .parse()
                .map_err(|e| anyhow!("Invalid MEETING_ROOMS_REQUEST_TIMEOUT: {}", e))?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(anyhow!("Server host cannot be empty"));
        }

        if self.backend.request_timeout_seconds == 0 {
            return Err(anyhow!("Backend request timeout must be greater than zero"));
        }

        if let Some(base_url) = &self.backend.base_url {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(anyhow!("Backend base_url must be a valid HTTP/HTTPS URL"));
            }
            Url::parse(base_url)
                .map_err(|e| anyhow!("Invalid backend base_url {}: {}", base_url, e))?;
        }

        Ok(())
    }

    /// Create a sample configuration file
    pub fn create_sample_config() -> Result<String> {
        let sample_config = Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            backend: BackendConfig {
                base_url: Some("https://meetings.example.com/".to_string()),
                request_timeout_seconds: 10,
            },
        };

        toml::to_string_pretty(&sample_config)
            .map_err(|e| anyhow!("Failed to serialize sample config: {}", e))
    }

    pub fn backend_url(&self) -> Option<&str> {
        self.backend.base_url.as_deref()
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.backend.request_timeout_seconds)
    }

    /// Get server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_STATUS_URL: &str = "https://status.xeovo.com/";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub network: NetworkConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub level: String, // "debug", "info", "warning", "error"
    pub console_output: bool,
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub status_url: String,
    pub user_agent: String,
    pub status_timeout_seconds: u64,
    pub ping_timeout_seconds: u64,
    pub parallel_probes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub color: bool,
    pub pause_on_exit: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "warning".to_string(),
            console_output: true,
            file_path: None,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            status_url: DEFAULT_STATUS_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            status_timeout_seconds: 10,
            ping_timeout_seconds: 3,
            parallel_probes: false,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            color: true,
            // Console windows opened by double-click close as soon as we exit.
            pause_on_exit: cfg!(windows),
        }
    }
}

pub struct ConfigManager {
    config_path: Option<String>,
    config: AppConfig,
}

impl ConfigManager {
    /// Builds the configuration, reading `config_path` when one is given.
    ///
    /// Without a path the built-in defaults are used and nothing touches the
    /// filesystem. A path that cannot be read or fails validation is an error.
    pub fn new(config_path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut manager = Self {
            config_path: config_path.map(str::to_string),
            config: AppConfig::default(),
        };
        manager.load()?;
        Ok(manager)
    }

    pub fn get(&self) -> &AppConfig {
        &self.config
    }

    pub fn get_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    pub fn load(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(path) = self.config_path.as_deref() else {
            self.config = AppConfig::default();
            return Ok(());
        };

        if !Path::new(path).exists() {
            return Err(format!("Config file not found: {}", path).into());
        }

        let content = fs::read_to_string(path)?;
        self.config = serde_json::from_str(&content)?;

        self.validate()?;

        Ok(())
    }

    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        match self.config.logging.level.as_str() {
            "debug" | "info" | "warning" | "error" => {}
            _ => return Err("Invalid logging level".into()),
        }

        let network = &self.config.network;
        if !network.status_url.starts_with("http") {
            return Err("Status URL must be an http(s) URL".into());
        }

        if !(1..=60).contains(&network.status_timeout_seconds) {
            return Err("Status page timeout must be between 1 and 60 seconds".into());
        }

        if !(1..=60).contains(&network.ping_timeout_seconds) {
            return Err("Ping timeout must be between 1 and 60 seconds".into());
        }

        Ok(())
    }

    pub fn get_config_info(&self) -> String {
        format!(
            "Configuration Info:\n\
            - Config Path: {}\n\
            - Logging Level: {}\n\
            - Status URL: {}\n\
            - Status Timeout: {}s\n\
            - Ping Timeout: {}s\n\
            - Parallel Probes: {}",
            self.config_path.as_deref().unwrap_or("<defaults>"),
            self.config.logging.level,
            self.config.network.status_url,
            self.config.network.status_timeout_seconds,
            self.config.network.ping_timeout_seconds,
            self.config.network.parallel_probes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let manager = ConfigManager::new(None).expect("defaults should load");
        assert!(manager.validate().is_ok());
        assert_eq!(manager.get().network.ping_timeout_seconds, 3);
        assert_eq!(manager.get().network.status_url, DEFAULT_STATUS_URL);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "network": { "parallel_probes": true } }"#).unwrap();
        assert!(config.network.parallel_probes);
        assert_eq!(config.network.status_timeout_seconds, 10);
        assert_eq!(config.logging.level, "warning");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut manager = ConfigManager::new(None).unwrap();
        manager.get_mut().logging.level = "verbose".to_string();
        assert!(manager.validate().is_err());

        let mut manager = ConfigManager::new(None).unwrap();
        manager.get_mut().network.ping_timeout_seconds = 0;
        assert!(manager.validate().is_err());

        let mut manager = ConfigManager::new(None).unwrap();
        manager.get_mut().network.status_url = "ftp://example.com".to_string();
        assert!(manager.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(ConfigManager::new(Some("/nonexistent/xeovo-latency.json")).is_err());
    }
}

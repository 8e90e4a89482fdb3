use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const API_URL_ENV: &str = "CHAT_API_URL";

/// Persisted user configuration (`<config dir>/sitechat/config.json`)
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn save_api_url(url: &str) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.api_url = Some(url.to_string());
        config.save()
    }

    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn get_log_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("sitechat.log"))
    }

    fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("sitechat"))
    }
}

/// Effective connection settings after layering flag/env, file and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub timeout: Duration,
}

impl Settings {
    /// `api_url_override` is the `--api-url` flag, which clap already falls
    /// back to `CHAT_API_URL` for.
    pub fn resolve(api_url_override: Option<&str>, config: &Config) -> Self {
        let api_url = api_url_override
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .or_else(|| config.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let timeout_secs = config
            .timeout_secs
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            api_url,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::resolve(None, &Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_when_nothing_configured() {
        let settings = Settings::default();
        assert_eq!(settings.api_url, "http://localhost:5000/api");
        assert_eq!(settings.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_override_beats_config_file() {
        let config = Config {
            api_url: Some("http://file:5000/api".to_string()),
            timeout_secs: Some(5),
        };
        let settings = Settings::resolve(Some("http://flag:8080/api"), &config);
        assert_eq!(settings.api_url, "http://flag:8080/api");
        assert_eq!(settings.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_file_beats_default() {
        let config = Config {
            api_url: Some("http://file:5000/api".to_string()),
            timeout_secs: None,
        };
        let settings = Settings::resolve(None, &config);
        assert_eq!(settings.api_url, "http://file:5000/api");
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let settings = Settings::resolve(Some("   "), &Config::default());
        assert_eq!(settings.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_zero_timeout_falls_back() {
        let config = Config { api_url: None, timeout_secs: Some(0) };
        assert_eq!(Settings::resolve(None, &config).timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            api_url: Some("http://example.test/api".to_string()),
            timeout_secs: Some(12),
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}

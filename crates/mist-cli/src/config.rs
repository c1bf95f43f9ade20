//! Configuration file support

use mist_chat::ReadinessConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

/// Configuration for mist
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the chat service
    pub server_url: Option<String>,
    /// Language to start with when none has been chosen yet (pt, en)
    pub language: Option<String>,
    /// Whether to use TUI mode by default
    pub tui: Option<bool>,
    pub connection: ConnectionSettings,
}

/// Streaming connection tuning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Readiness checks before falling back to a plain request
    pub ready_attempts: Option<u32>,
    /// Milliseconds between readiness checks
    pub ready_interval_ms: Option<u64>,
}

impl Config {
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mist")
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("MIST_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Read a config file. A missing or broken file yields the defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Write the commented example if no config exists yet
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, example_config())?;
        Ok(path)
    }

    /// Server URL with the CLI flag taking precedence
    pub fn server_url(&self, flag: Option<&str>) -> String {
        flag.map(str::to_string)
            .or_else(|| self.server_url.clone())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
    }

    pub fn readiness(&self) -> ReadinessConfig {
        let defaults = ReadinessConfig::default();
        ReadinessConfig {
            attempts: self
                .connection
                .ready_attempts
                .unwrap_or(defaults.attempts)
                .max(1),
            interval: self
                .connection
                .ready_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.interval),
        }
    }
}

pub fn example_config() -> &'static str {
    r#"# mist configuration file
# Place at ~/.config/mist/config.toml (Linux), ~/Library/Application Support/mist/config.toml (macOS)
# or %APPDATA%\mist\config.toml (Windows). MIST_CONFIG_PATH overrides the location.

# Chat service to connect to
server_url = "http://localhost:8000"

# Language used until you pick one with /lang (pt, en)
language = "pt"

# Whether to use TUI mode by default (true by default)
# Set to false for simple stdin/stdout mode
tui = true

[connection]
# How many times to check whether a new streaming connection is ready
# before sending the message as a plain request instead
ready_attempts = 10
# Milliseconds between those checks
ready_interval_ms = 300
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(example_config()).unwrap();
        assert_eq!(config.server_url.as_deref(), Some(DEFAULT_SERVER_URL));
        assert_eq!(config.tui, Some(true));
        assert_eq!(config.readiness(), ReadinessConfig::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str("[connection]\nready_interval_ms = 50\n").unwrap();
        let readiness = config.readiness();
        assert_eq!(readiness.attempts, 10);
        assert_eq!(readiness.interval, Duration::from_millis(50));
        assert_eq!(config.server_url(None), DEFAULT_SERVER_URL);
    }

    #[test]
    fn test_flag_overrides_server_url() {
        let config = Config {
            server_url: Some("https://chat.example.com".into()),
            ..Default::default()
        };
        assert_eq!(config.server_url(None), "https://chat.example.com");
        assert_eq!(
            config.server_url(Some("http://127.0.0.1:9000")),
            "http://127.0.0.1:9000"
        );
    }

    #[test]
    fn test_broken_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "server_url = [").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
        assert_eq!(Config::load_from(&dir.path().join("missing.toml")), Config::default());
    }
}

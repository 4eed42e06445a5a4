//! Configuration loading and defaults for cream-sessiond.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::activity;
use crate::domain::{LaunchSpec, RestartPolicy};

/// One configured launch entry (session module or autostart application).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchEntry {
    /// Argv tokens; the first one is the executable.
    pub command: Vec<String>,

    /// Display name used in logs and crash reports.
    pub name: Option<String>,

    /// Restart policy offered by the crash report (default: on-demand).
    #[serde(default)]
    pub restart: RestartPolicy,
}

impl LaunchEntry {
    /// Convert to the spec handed to the supervisor.
    pub fn to_spec(&self) -> LaunchSpec {
        LaunchSpec {
            command: self.command.clone(),
            identity: self.name.clone(),
            restart_policy: self.restart,
        }
    }
}

/// Main configuration for cream-sessiond.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds of inactivity before the session counts as idle (default: 5).
    pub idle_time_seconds: u64,

    /// Poll interval while active, in milliseconds (default: 1000).
    pub active_poll_ms: u64,

    /// Poll interval while idle, in milliseconds (default: 100).
    pub idle_poll_ms: u64,

    /// Session modules, launched before autostart entries.
    pub module: Vec<LaunchEntry>,

    /// Autostart applications, launched after modules.
    pub autostart: Vec<LaunchEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idle_time_seconds: activity::IDLE_TIME,
            active_poll_ms: 1000,
            idle_poll_ms: 100,
            module: Vec::new(),
            autostart: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from the default path, or return defaults if not found.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }

        // Try default config path
        if let Some(config_dir) = dirs::config_dir() {
            let default_path = config_dir.join("cream-sessiond").join("config.toml");
            if default_path.exists() {
                return Self::load(&default_path);
            }
        }

        Ok(Self::default())
    }

    pub fn active_poll(&self) -> Duration {
        Duration::from_millis(self.active_poll_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.idle_time_seconds, 5);
        assert_eq!(config.active_poll(), Duration::from_millis(1000));
        assert_eq!(config.idle_poll(), Duration::from_millis(100));
        assert!(config.module.is_empty());
        assert!(config.autostart.is_empty());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            idle_time_seconds = 10

            [[module]]
            command = ["cream-network-module"]
            name = "Network"

            [[autostart]]
            command = ["nm-applet"]
            name = "Network Applet"
            restart = "none"

            [[autostart]]
            command = ["sh", "-c", "xsetroot -solid grey"]
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.idle_time_seconds, 10);
        assert_eq!(config.active_poll_ms, 1000); // untouched default

        assert_eq!(config.module.len(), 1);
        let spec = config.module[0].to_spec();
        assert_eq!(spec.identity.as_deref(), Some("Network"));
        assert_eq!(spec.restart_policy, RestartPolicy::OnDemand);

        assert_eq!(config.autostart.len(), 2);
        assert_eq!(config.autostart[0].to_spec().restart_policy, RestartPolicy::None);
        assert!(config.autostart[1].name.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "idle_time_seconds = 30").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.idle_time_seconds, 30);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(Config::load(Path::new("/nonexistent/config.toml")).is_err());
    }
}

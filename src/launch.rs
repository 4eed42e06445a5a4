//! Startup launch sets.
//!
//! The session queries two ordered, read-only sources exactly once at
//! startup: the module registry (longer-lived companion processes registered
//! by configuration) and the autostart enumerator (applications to launch
//! once at session start). Both are traits so the configuration-backed
//! implementations here can be swapped for desktop-file sources without
//! touching the core.

use crate::config::Config;
use crate::domain::LaunchSpec;

/// Ordered set of configured session modules.
pub trait ModuleRegistry {
    fn entries(&self) -> Vec<LaunchSpec>;
}

/// Ordered set of autostart applications.
pub trait AutostartEnumerator {
    fn entries(&self) -> Vec<LaunchSpec>;
}

/// Module registry read from the `[[module]]` config entries.
pub struct ConfigModules {
    specs: Vec<LaunchSpec>,
}

impl ConfigModules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            specs: config.module.iter().map(|e| e.to_spec()).collect(),
        }
    }
}

impl ModuleRegistry for ConfigModules {
    fn entries(&self) -> Vec<LaunchSpec> {
        self.specs.clone()
    }
}

/// Autostart set read from the `[[autostart]]` config entries.
pub struct ConfigAutostart {
    specs: Vec<LaunchSpec>,
}

impl ConfigAutostart {
    pub fn from_config(config: &Config) -> Self {
        Self {
            specs: config.autostart.iter().map(|e| e.to_spec()).collect(),
        }
    }
}

impl AutostartEnumerator for ConfigAutostart {
    fn entries(&self) -> Vec<LaunchSpec> {
        self.specs.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LaunchEntry;
    use crate::domain::RestartPolicy;

    #[test]
    fn test_config_sources_preserve_order() {
        let config = Config {
            module: vec![
                LaunchEntry {
                    command: vec!["first".to_string()],
                    name: Some("First".to_string()),
                    restart: RestartPolicy::OnDemand,
                },
                LaunchEntry {
                    command: vec!["second".to_string()],
                    name: None,
                    restart: RestartPolicy::None,
                },
            ],
            ..Default::default()
        };

        let entries = ConfigModules::from_config(&config).entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].identity.as_deref(), Some("First"));
        assert_eq!(entries[1].command, vec!["second".to_string()]);
        assert_eq!(entries[1].restart_policy, RestartPolicy::None);

        assert!(ConfigAutostart::from_config(&config).entries().is_empty());
    }
}

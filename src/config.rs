use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use spacedrep::queue::{DEFAULT_FUZZY_WINDOW_MILLIS, DEFAULT_QUEUE_LIMIT, QueueConfig};
use spacedrep::reduce::ReviewPolicy;
use spacedrep::schedule::{DEFAULT_RETRY_DELAY_MILLIS, DEFAULT_SCHEDULE, ScheduleRegistry};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schedule: ScheduleConfig,
    pub store: StoreConfig,
    pub queue: QueueSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub name: String,
    pub retry_delay_millis: i64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_SCHEDULE.to_string(),
            retry_delay_millis: DEFAULT_RETRY_DELAY_MILLIS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("spacedrep")
                .join("prompt-states.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub limit: usize,
    pub fuzzy_window_millis: i64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            limit: DEFAULT_QUEUE_LIMIT,
            fuzzy_window_millis: DEFAULT_FUZZY_WINDOW_MILLIS,
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate(&ScheduleRegistry::new())?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    pub fn validate(&self, registry: &ScheduleRegistry) -> Result<()> {
        if !registry.contains(&self.schedule.name) {
            bail!(
                "Unknown schedule '{}' (available: {})",
                self.schedule.name,
                registry.names().join(", ")
            );
        }
        if self.schedule.retry_delay_millis <= 0 {
            bail!("schedule.retry_delay_millis must be positive");
        }
        if self.queue.limit == 0 {
            bail!("queue.limit must be at least 1");
        }
        if self.queue.fuzzy_window_millis < 0 {
            bail!("queue.fuzzy_window_millis must not be negative");
        }
        Ok(())
    }

    pub fn review_policy(&self, registry: &ScheduleRegistry) -> Result<ReviewPolicy> {
        let schedule = registry
            .get(&self.schedule.name)
            .ok_or_else(|| eyre::eyre!("Unknown schedule '{}'", self.schedule.name))?;
        Ok(ReviewPolicy::new(schedule, self.schedule.retry_delay_millis))
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            limit: self.queue.limit,
            fuzzy_window_millis: self.queue.fuzzy_window_millis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.schedule.name, "default");
        assert_eq!(config.schedule.retry_delay_millis, 600_000);
        assert_eq!(config.queue.limit, 100);
        assert!(config.store.path.ends_with("spacedrep/prompt-states.db"));
        assert!(config.validate(&ScheduleRegistry::new()).is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let file = write_config("schedule:\n  name: aggressiveStart\n");
        let path = file.path().to_path_buf();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.schedule.name, "aggressiveStart");
        assert_eq!(config.schedule.retry_delay_millis, 600_000);
        assert_eq!(config.queue.fuzzy_window_millis, DEFAULT_FUZZY_WINDOW_MILLIS);
    }

    #[test]
    fn test_unknown_schedule_rejected() {
        let file = write_config("schedule:\n  name: turbo\n");
        let path = file.path().to_path_buf();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(format!("{err:?}").contains("turbo"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let registry = ScheduleRegistry::new();
        let mut config = Config::default();
        config.schedule.retry_delay_millis = 0;
        assert!(config.validate(&registry).is_err());

        let mut config = Config::default();
        config.queue.limit = 0;
        assert!(config.validate(&registry).is_err());

        let mut config = Config::default();
        config.queue.fuzzy_window_millis = -1;
        assert!(config.validate(&registry).is_err());
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let path = PathBuf::from("/nonexistent/spacedrep.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_review_policy_uses_configured_schedule() {
        let mut config = Config::default();
        config.schedule.name = "aggressiveStart".to_string();
        config.schedule.retry_delay_millis = 1234;
        let policy = config.review_policy(&ScheduleRegistry::new()).unwrap();
        assert_eq!(policy.schedule.name(), "aggressiveStart");
        assert_eq!(policy.retry_delay_millis, 1234);
    }
}

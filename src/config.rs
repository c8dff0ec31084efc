//! Configuration management with YAML support

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::aggregate::UnexpectedShiftPolicy;
use crate::shift::WindowResolution;

/// Cost centers excluded from the productive utilization total
pub const DEFAULT_NON_PRODUCTIVE: [&str; 8] = [
    "EXTER", "MEDIC", "SINDI", "JUNTA", "MANTO", "ORGAN", "INVEN", "TRAIN",
];

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub shifts: ShiftConfig,

    #[serde(default)]
    pub productivity: ProductivityConfig,

    #[serde(default)]
    pub utilization: UtilizationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

/// Recurring job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_assign_interval")]
    pub assign_interval_secs: u64,
}

/// Shift window matching configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShiftConfig {
    #[serde(default)]
    pub resolution: WindowResolution,
}

/// Production count aggregation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductivityConfig {
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub unexpected_shift: UnexpectedShiftPolicy,
}

/// Worked-time aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilizationConfig {
    #[serde(default = "default_non_productive")]
    pub non_productive: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_database_path() -> String {
    "~/.local/share/plantpulse/plantpulse.db".to_string()
}

fn default_assign_interval() -> u64 {
    60 * 60
}

fn default_non_productive() -> Vec<String> {
    DEFAULT_NON_PRODUCTIVE.iter().map(|c| c.to_string()).collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            assign_interval_secs: default_assign_interval(),
        }
    }
}

impl Default for UtilizationConfig {
    fn default() -> Self {
        Self {
            non_productive: default_non_productive(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./plantpulse.yaml (current directory)
    /// 3. <config dir>/plantpulse/plantpulse.yaml
    pub fn load(path: &str) -> Result<Self> {
        let mut search_paths = vec![
            PathBuf::from(shellexpand::tilde(path).to_string()),
            PathBuf::from("plantpulse.yaml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            search_paths.push(dir.join("plantpulse").join("plantpulse.yaml"));
        }

        for search_path in &search_paths {
            if search_path.exists() {
                let content = std::fs::read_to_string(search_path)
                    .with_context(|| format!("reading {}", search_path.display()))?;
                let config: Config = serde_yaml::from_str(&content)
                    .with_context(|| format!("parsing {}", search_path.display()))?;
                return Ok(config);
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    /// Get the database path, expanding ~ to home directory
    pub fn database_path(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.database.path).to_string();
        PathBuf::from(expanded)
    }

    pub fn assign_interval(&self) -> std::time::Duration {
        // a zero interval would make tokio panic
        std::time::Duration::from_secs(self.scheduler.assign_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scheduler.assign_interval_secs, 3600);
        assert_eq!(config.shifts.resolution, WindowResolution::FirstMatch);
        assert_eq!(
            config.productivity.unexpected_shift,
            UnexpectedShiftPolicy::MergeInto(3)
        );
        assert_eq!(config.utilization.non_productive.len(), 8);
        assert!(config
            .utilization
            .non_productive
            .contains(&"TRAIN".to_string()));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
database:
  path: ~/plant/test.db

scheduler:
  assign_interval_secs: 900

shifts:
  resolution: narrowest

productivity:
  unexpected_shift: drop

utilization:
  non_productive: [TRAIN, MEDIC]
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.database.path, "~/plant/test.db");
        assert_eq!(config.assign_interval().as_secs(), 900);
        assert_eq!(config.shifts.resolution, WindowResolution::Narrowest);
        assert_eq!(
            config.productivity.unexpected_shift,
            UnexpectedShiftPolicy::Drop
        );
        assert_eq!(config.utilization.non_productive, vec!["TRAIN", "MEDIC"]);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_merge_policy_parsing() {
        let yaml = "productivity:\n  unexpected_shift:\n    merge_into: 2\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.productivity.unexpected_shift,
            UnexpectedShiftPolicy::MergeInto(2)
        );
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let mut config = Config::default();
        config.scheduler.assign_interval_secs = 0;
        assert_eq!(config.assign_interval().as_secs(), 1);
    }
}

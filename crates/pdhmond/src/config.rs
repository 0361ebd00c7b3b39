//! Daemon configuration: JSON file or a single group from the command line.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use pdhmon_core::config::CounterGroup;

pub const DEFAULT_INTERVAL_SECS: u64 = 10;

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Collection interval in seconds.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    pub groups: Vec<CounterGroup>,
}

impl DaemonConfig {
    /// Loads and validates a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a one-group config from command line flags.
    pub fn single(group: CounterGroup, interval_secs: u64) -> Result<Self> {
        let config = Self {
            interval_secs,
            groups: vec![group],
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            bail!("interval must be at least one second");
        }
        if self.groups.is_empty() {
            bail!("no counter groups configured");
        }
        for group in &self.groups {
            if group.object.is_empty() {
                bail!("counter group with empty object name");
            }
            if group.counters.is_empty() {
                bail!("no counters configured for object {}", group.object);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_config_file() {
        let file = write_config(
            r#"{
                "interval_secs": 15,
                "groups": [
                    {"object": "LogicalDisk", "instances": ["C:", "D:"], "counters": ["% Free Space"]},
                    {"object": "System", "counters": ["System Up Time"]}
                ]
            }"#,
        );

        let config = DaemonConfig::load(file.path()).unwrap();

        assert_eq!(config.interval_secs, 15);
        assert_eq!(config.groups.len(), 2);
        assert_eq!(config.groups[0].instances, vec!["C:", "D:"]);
        assert!(config.groups[1].instances.is_empty());
    }

    #[test]
    fn test_interval_defaults() {
        let file = write_config(r#"{"groups": [{"object": "System", "counters": ["Processes"]}]}"#);
        let config = DaemonConfig::load(file.path()).unwrap();
        assert_eq!(config.interval_secs, DEFAULT_INTERVAL_SECS);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        for content in [
            "not json",
            r#"{"groups": []}"#,
            r#"{"interval_secs": 0, "groups": [{"object": "System", "counters": ["Processes"]}]}"#,
            r#"{"groups": [{"object": "System", "counters": []}]}"#,
            r#"{"groups": [{"object": "System", "counters": ["Processes"]}], "extra": 1}"#,
        ] {
            let file = write_config(content);
            assert!(DaemonConfig::load(file.path()).is_err(), "{}", content);
        }
    }

    #[test]
    fn test_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let err = DaemonConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("missing.json"));
    }

    #[test]
    fn test_single_group() {
        let group = CounterGroup::new("System").with_counters(["Processes"]);
        let config = DaemonConfig::single(group.clone(), 5).unwrap();
        assert_eq!(config.groups, vec![group]);
        assert!(DaemonConfig::single(CounterGroup::new("System"), 5).is_err());
    }
}

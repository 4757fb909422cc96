use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for the `fsadmin` tool. Every field has a default, so a config
/// file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Volume used when a command does not name one.
    pub default_volume: String,
    /// Subvolume group used when a command does not name one. `None` is the
    /// volume's default group.
    pub default_group: Option<String>,
    /// Client entity used for mirror bootstrap tokens.
    pub mirror_client: String,
    /// Log every envelope and reply.
    pub trace_commands: bool,
    /// Log filter used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            default_volume: String::from("cephfs"),
            default_group: None,
            mirror_client: String::from("client.mirror_remote"),
            trace_commands: false,
            log_filter: String::from("info"),
        }
    }
}

impl AdminConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => {
                let config: AdminConfig = toml::from_str(&contents)?;
                Ok(config)
            }
            "json" => {
                let config: AdminConfig = serde_json::from_str(&contents)?;
                Ok(config)
            }
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        }
    }

    /// `group` if given, else the configured default group.
    pub fn group_or_default<'a>(&'a self, group: Option<&'a str>) -> Option<&'a str> {
        group.or(self.default_group.as_deref())
    }

    /// `volume` if given, else the configured default volume.
    pub fn volume_or_default<'a>(&'a self, volume: Option<&'a str>) -> &'a str {
        volume.unwrap_or(self.default_volume.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_values() {
        let config = AdminConfig::default();
        assert_eq!(config.default_volume, "cephfs");
        assert!(config.default_group.is_none());
        assert_eq!(config.mirror_client, "client.mirror_remote");
        assert!(!config.trace_commands);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_from_file_json() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        writeln!(
            file,
            r#"{{
                "default_volume": "tank",
                "default_group": "park",
                "trace_commands": true
            }}"#
        )
        .unwrap();

        let config = AdminConfig::from_file(file.path()).unwrap();
        assert_eq!(config.default_volume, "tank");
        assert_eq!(config.default_group.as_deref(), Some("park"));
        assert!(config.trace_commands);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_from_file_toml() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
default_volume = "altfs"
mirror_client = "client.site_b"
log_filter = "fsadmin=debug"
            "#
        )
        .unwrap();

        let config = AdminConfig::from_file(file.path()).unwrap();
        assert_eq!(config.default_volume, "altfs");
        assert_eq!(config.mirror_client, "client.site_b");
        assert_eq!(config.log_filter, "fsadmin=debug");
        assert!(config.default_group.is_none());
    }

    #[test]
    fn test_from_file_unsupported_extension() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(file, "default_volume: x").unwrap();
        let err = AdminConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Unsupported config file extension"));
    }

    #[test]
    fn test_defaults_fill_in() {
        let config = AdminConfig {
            default_group: Some("park".into()),
            ..AdminConfig::default()
        };
        assert_eq!(config.group_or_default(None), Some("park"));
        assert_eq!(config.group_or_default(Some("zoo")), Some("zoo"));
        assert_eq!(config.volume_or_default(None), "cephfs");
        assert_eq!(config.volume_or_default(Some("tank")), "tank");
    }
}

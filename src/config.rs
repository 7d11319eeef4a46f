use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::plugin::WriteStrategy;

/// File name of the configuration stored next to the executable.
pub const CONFIG_FILE_NAME: &str = "metaprobe.json";

/// Top-level configuration for the metaprobe tools.
///
/// Controls how schemas are dumped, how resolutions are displayed, and how
/// writers are driven when a resolution is embedded.
///
/// # Loading
///
/// ```rust,no_run
/// use metaprobe::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("metaprobe.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.output.backup_originals = true;
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema dump layout.
    pub schema: SchemaConfig,
    /// Resolution report formatting.
    pub resolution: ResolutionConfig,
    /// Write behavior (writer strategy, backups).
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Indent depth of a schema's root element, in 4-space steps.
    pub base_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Decimal places printed for pixels per inch.
    pub display_precision: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Which qualifying writers are invoked for an output suffix.
    pub write_strategy: WriteStrategy,
    /// If `true`, an existing output file is copied to `<name>.bak` before it is replaced.
    pub backup_originals: bool,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self { base_depth: 3 }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self { display_precision: 1 }
    }
}

impl Config {
    /// Resolve the config file path, in the same directory as the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join(CONFIG_FILE_NAME))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::debug!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.schema.base_depth, 3);
        assert_eq!(config.resolution.display_precision, 1);
        assert_eq!(config.output.write_strategy, WriteStrategy::All);
        assert!(!config.output.backup_originals);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.json"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut config = Config::default();
        config.output.write_strategy = WriteStrategy::First;
        config.resolution.display_precision = 3;
        config.save(Some(&path)).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"write_strategy\": \"first\""));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{ "output": { "backup_originals": true } }"#).unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert!(config.output.backup_originals);
        assert_eq!(config.output.write_strategy, WriteStrategy::All);
        assert_eq!(config.schema.base_depth, 3);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}

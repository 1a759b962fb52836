use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::training::Hyperparameters;

/// User-supplied plugin configuration, usually the `plugin` section of a
/// training config YAML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Optimizer to train with; prompted for when absent.
    pub optimizer: Option<String>,
    /// Take the optimizer's defaults without prompting or overrides.
    pub use_default_config: bool,
    /// Values that replace the optimizer's defaults key by key.
    pub hyperparameters: Option<Hyperparameters>,
}

impl PluginConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).context("plugin config yaml could not be parsed")
    }
}

pub fn load_plugin_config(path: &Path) -> Result<PluginConfig> {
    let text = fs::read_to_string(path).with_context(|| format!("failed reading {path:?}"))?;
    PluginConfig::from_yaml(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::ParamValue;

    #[test]
    fn parses_full_config() {
        let config = PluginConfig::from_yaml(
            "optimizer: adam\nuse_default_config: false\nhyperparameters:\n  batch_size: 4\n  learning_rate_base: 0.001\n",
        )
        .unwrap();
        assert_eq!(config.optimizer.as_deref(), Some("adam"));
        assert!(!config.use_default_config);
        let params = config.hyperparameters.unwrap();
        assert_eq!(params.get("batch_size"), Some(&ParamValue::Int(4)));
        assert_eq!(params.keys().collect::<Vec<_>>(), ["batch_size", "learning_rate_base"]);
    }

    #[test]
    fn missing_fields_default() {
        let config = PluginConfig::from_yaml("use_default_config: true\n").unwrap();
        assert_eq!(config.optimizer, None);
        assert!(config.use_default_config);
        assert!(config.hyperparameters.is_none());
        assert_eq!(PluginConfig::from_yaml("\n").unwrap(), PluginConfig::default());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_plugin_config(&dir.path().join("plugin.yml")).is_err());
    }
}

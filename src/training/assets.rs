//! Hyperparameter defaults and pipeline templates.
//!
//! A release binary carries the bundled set from `assets/`. Pointing the CLI
//! at a directory with the same `model_defaults/` and `pipeline_templates/`
//! layout swaps them out without a rebuild.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use super::hyperparameters::ModelDefaults;
use crate::error::AssetError;

const DEFAULTS_DIR: &str = "model_defaults";
const TEMPLATES_DIR: &str = "pipeline_templates";

const BUNDLED_DEFAULTS: &[(&str, &str)] = &[
    (
        "ssd_mobilenet_v2_fpnlite_defaults.yml",
        include_str!("../../assets/model_defaults/ssd_mobilenet_v2_fpnlite_defaults.yml"),
    ),
    (
        "efficientdet_d0_defaults.yml",
        include_str!("../../assets/model_defaults/efficientdet_d0_defaults.yml"),
    ),
];

const BUNDLED_TEMPLATES: &[(&str, &str)] = &[
    (
        "ssd_mobilenet_v2_fpnlite_momentum.config",
        include_str!("../../assets/pipeline_templates/ssd_mobilenet_v2_fpnlite_momentum.config"),
    ),
    (
        "ssd_mobilenet_v2_fpnlite_adam.config",
        include_str!("../../assets/pipeline_templates/ssd_mobilenet_v2_fpnlite_adam.config"),
    ),
    (
        "efficientdet_d0_momentum.config",
        include_str!("../../assets/pipeline_templates/efficientdet_d0_momentum.config"),
    ),
];

#[derive(Debug, Clone)]
enum Store {
    Bundled,
    Directory(PathBuf),
    InMemory {
        defaults: Vec<(String, String)>,
        templates: Vec<(String, String)>,
    },
}

#[derive(Debug, Clone)]
pub struct Assets {
    store: Store,
}

impl Default for Assets {
    fn default() -> Self {
        Self::bundled()
    }
}

impl Assets {
    pub fn bundled() -> Self {
        Self {
            store: Store::Bundled,
        }
    }

    pub fn from_dir(root: impl Into<PathBuf>) -> Self {
        Self {
            store: Store::Directory(root.into()),
        }
    }

    /// Assets keyed by model type (defaults) and template file stem.
    pub fn in_memory(defaults: &[(&str, &str)], templates: &[(&str, &str)]) -> Self {
        Self {
            store: Store::InMemory {
                defaults: owned_entries(defaults, "_defaults.yml"),
                templates: owned_entries(templates, ".config"),
            },
        }
    }

    pub fn load_defaults(&self, model_type: &str) -> Result<ModelDefaults> {
        let file_name = defaults_file_name(model_type);
        let text = self.read(DEFAULTS_DIR, &file_name, "model defaults")?;
        ModelDefaults::from_yaml(&text).with_context(|| format!("parse {file_name}"))
    }

    pub fn template(&self, model_type: &str, optimizer: &str) -> Result<String> {
        self.read(
            TEMPLATES_DIR,
            &template_file_name(model_type, optimizer),
            "pipeline template",
        )
    }

    fn read(&self, subdir: &str, file_name: &str, kind: &'static str) -> Result<String> {
        let not_found = || AssetError::NotFound {
            kind,
            name: file_name.to_string(),
        };
        match &self.store {
            Store::Bundled => {
                let table = if subdir == DEFAULTS_DIR {
                    BUNDLED_DEFAULTS
                } else {
                    BUNDLED_TEMPLATES
                };
                lookup(table.iter().copied(), file_name)
                    .map(str::to_string)
                    .ok_or_else(|| not_found().into())
            }
            Store::InMemory {
                defaults,
                templates,
            } => {
                let table = if subdir == DEFAULTS_DIR {
                    defaults
                } else {
                    templates
                };
                let entries = table.iter().map(|(name, text)| (name.as_str(), text.as_str()));
                lookup(entries, file_name)
                    .map(str::to_string)
                    .ok_or_else(|| not_found().into())
            }
            Store::Directory(root) => {
                let path = root.join(subdir).join(file_name);
                if !path.exists() {
                    return Err(not_found().into());
                }
                fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
            }
        }
    }
}

fn owned_entries(entries: &[(&str, &str)], suffix: &str) -> Vec<(String, String)> {
    entries
        .iter()
        .map(|(name, text)| (format!("{name}{suffix}"), text.to_string()))
        .collect()
}

fn lookup<'a>(
    mut entries: impl Iterator<Item = (&'a str, &'a str)>,
    file_name: &str,
) -> Option<&'a str> {
    entries
        .find(|(name, _)| *name == file_name)
        .map(|(_, text)| text)
}

#[must_use]
pub fn defaults_file_name(model_type: &str) -> String {
    format!("{model_type}_defaults.yml")
}

#[must_use]
pub fn template_file_name(model_type: &str, optimizer: &str) -> String {
    format!("{model_type}_{}.config", optimizer.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::model_types;

    #[test]
    fn every_catalog_model_has_bundled_defaults_and_templates() {
        let assets = Assets::bundled();
        for model in model_types() {
            let defaults = assets.load_defaults(model.name).unwrap();
            for optimizer in defaults.optimizer_names() {
                let template = assets.template(model.name, &optimizer).unwrap();
                for (key, _) in defaults.optimizer(&optimizer).unwrap().iter() {
                    assert!(
                        template.contains(&format!("<replace_{key}>")),
                        "{} has no placeholder for {key}",
                        template_file_name(model.name, &optimizer)
                    );
                }
            }
        }
    }

    #[test]
    fn template_name_lowercases_optimizer() {
        assert_eq!(
            template_file_name("efficientdet_d0", "Momentum"),
            "efficientdet_d0_momentum.config"
        );
    }

    #[test]
    fn missing_bundled_asset_is_reported() {
        let err = Assets::bundled().load_defaults("yolo").unwrap_err();
        assert_eq!(
            err.downcast_ref::<AssetError>(),
            Some(&AssetError::NotFound {
                kind: "model defaults",
                name: "yolo_defaults.yml".into()
            })
        );
    }

    #[test]
    fn directory_assets_are_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(TEMPLATES_DIR)).unwrap();
        fs::write(
            dir.path().join(TEMPLATES_DIR).join("custom_sgd.config"),
            "steps: <replace_num_steps>",
        )
        .unwrap();
        let assets = Assets::from_dir(dir.path());
        assert_eq!(
            assets.template("custom", "SGD").unwrap(),
            "steps: <replace_num_steps>"
        );
        assert!(assets.load_defaults("custom").is_err());
    }
}

use std::path::PathBuf;

use anyhow::Result;
use serde_json::{Map, Value};

use super::assets::Assets;
use super::hyperparameters::{resolve_hyperparameters, ConfigSource, Hyperparameters};
use super::pipeline::{render_pipeline, RenderRequest, RenderSummary};
use crate::core::settings::PluginConfig;
use crate::prompt::Prompter;

pub const HYPERPARAMETERS_FIELD: &str = "hyperparameters";

#[derive(Debug, Clone)]
pub struct TrainingRequest {
    /// Root of the training directory to create.
    pub base_dir: PathBuf,
    /// Dataset root holding `label_map.pbtxt` and `splits/`.
    pub data_path: PathBuf,
    /// Unpacked pretrained architecture.
    pub arch_path: PathBuf,
    pub model_type: String,
    pub config: PluginConfig,
}

#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub optimizer: String,
    pub hyperparameters: Hyperparameters,
    pub source: ConfigSource,
    pub pipeline: RenderSummary,
}

/// Resolves hyperparameters, renders the pipeline into `request.base_dir`, and
/// records what was chosen under `metadata["hyperparameters"]`.
pub fn prepare_for_training(
    request: &TrainingRequest,
    assets: &Assets,
    prompter: &mut dyn Prompter,
    metadata: &mut Map<String, Value>,
) -> Result<PreparedRun> {
    let resolved = resolve_hyperparameters(assets, &request.model_type, &request.config, prompter)?;

    let pipeline = render_pipeline(
        assets,
        &RenderRequest {
            base_dir: &request.base_dir,
            data_path: &request.data_path,
            arch_path: &request.arch_path,
            model_type: &request.model_type,
            optimizer: &resolved.optimizer,
            hyperparameters: &resolved.hyperparameters,
        },
    )?;

    let mut hp_metadata = Map::new();
    hp_metadata.insert("optimizer".into(), Value::String(resolved.optimizer.clone()));
    hp_metadata.extend(resolved.hyperparameters.to_json());
    metadata.insert(HYPERPARAMETERS_FIELD.into(), Value::Object(hp_metadata));

    Ok(PreparedRun {
        optimizer: resolved.optimizer,
        hyperparameters: resolved.hyperparameters,
        source: resolved.source,
        pipeline,
    })
}

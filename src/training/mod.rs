pub mod assets;
pub mod hyperparameters;
pub mod pipeline;
mod prepare;

pub use assets::Assets;
pub use hyperparameters::{
    apply_overrides, resolve_hyperparameters, ConfigSource, Hyperparameters, ModelDefaults,
    ParamValue, ResolvedConfig,
};
pub use pipeline::{render_pipeline, EvalExampleCount, RecordCounts, RenderRequest, RenderSummary};
pub use prepare::{prepare_for_training, PreparedRun, TrainingRequest, HYPERPARAMETERS_FIELD};

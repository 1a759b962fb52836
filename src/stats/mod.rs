//! Recomputing bounding-box statistics from a saved evaluation dump.

mod dump;
pub mod metrics;

use std::path::{Path, PathBuf};

use anyhow::Result;

pub use dump::{
    ClassStatistics, DefaultStatistics, Detection, DumpEvaluator, EvaluationDump,
    GroundTruthBox, ImageRecord, RateSummary, ThresholdStatistics, DEFAULT_IOU_THRESHOLDS,
    DEFAULT_SCORE_THRESHOLD, STATS_FILE,
};

pub trait BoundingBoxEvaluator: Sized {
    fn load_from_dump(path: &Path) -> Result<Self>;
    /// Computes the default statistics and writes them under `output_path`,
    /// returning the file written.
    fn calculate_default_and_save(&self, output_path: &Path) -> Result<PathBuf>;
}

pub fn recalculate_statistics_from_dump<E: BoundingBoxEvaluator>(
    dump_path: &Path,
    output_path: &Path,
) -> Result<PathBuf> {
    let evaluator = E::load_from_dump(dump_path)?;
    evaluator.calculate_default_and_save(output_path)
}

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::metrics::{average_precision, match_detections, BBox, MatchCounts};
use super::BoundingBoxEvaluator;

pub const DEFAULT_IOU_THRESHOLDS: [f32; 2] = [0.5, 0.75];
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;
pub const STATS_FILE: &str = "stats.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationDump {
    /// Class id → display name.
    #[serde(default)]
    pub categories: BTreeMap<u32, String>,
    pub images: Vec<ImageRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub image_id: String,
    #[serde(default)]
    pub ground_truth: Vec<GroundTruthBox>,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthBox {
    pub class_id: u32,
    pub bbox: BBox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub score: f32,
    pub bbox: BBox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSummary {
    #[serde(flatten)]
    pub counts: MatchCounts,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl From<MatchCounts> for RateSummary {
    fn from(counts: MatchCounts) -> Self {
        Self {
            precision: counts.precision(),
            recall: counts.recall(),
            f1: counts.f1(),
            counts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassStatistics {
    pub class_id: u32,
    pub name: String,
    pub num_ground_truth: usize,
    #[serde(flatten)]
    pub rates: RateSummary,
    pub average_precision: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdStatistics {
    pub iou_threshold: f32,
    pub overall: RateSummary,
    pub mean_average_precision: Option<f64>,
    pub per_class: Vec<ClassStatistics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultStatistics {
    pub num_images: usize,
    pub score_threshold: f32,
    pub thresholds: Vec<ThresholdStatistics>,
}

/// Evaluator over a JSON dump of per-image ground truth and detections.
#[derive(Debug, Clone)]
pub struct DumpEvaluator {
    dump: EvaluationDump,
}

impl DumpEvaluator {
    pub fn new(dump: EvaluationDump) -> Self {
        Self { dump }
    }

    pub fn dump(&self) -> &EvaluationDump {
        &self.dump
    }

    pub fn calculate_default(&self) -> DefaultStatistics {
        DefaultStatistics {
            num_images: self.dump.images.len(),
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            thresholds: DEFAULT_IOU_THRESHOLDS
                .iter()
                .map(|iou| self.calculate_at(*iou, DEFAULT_SCORE_THRESHOLD))
                .collect(),
        }
    }

    pub fn calculate_at(&self, iou_threshold: f32, score_threshold: f32) -> ThresholdStatistics {
        let mut overall = MatchCounts::default();
        let mut per_class = Vec::new();
        let mut precisions = Vec::new();

        for class_id in self.class_ids() {
            let mut counts = MatchCounts::default();
            let mut ranked: Vec<(f32, bool)> = Vec::new();
            let mut num_ground_truth = 0usize;

            for image in &self.dump.images {
                let gt: Vec<BBox> = image
                    .ground_truth
                    .iter()
                    .filter(|gt| gt.class_id == class_id)
                    .map(|gt| gt.bbox)
                    .collect();
                num_ground_truth += gt.len();

                let mut detections: Vec<&Detection> = image
                    .detections
                    .iter()
                    .filter(|det| det.class_id == class_id)
                    .collect();
                detections.sort_by(|a, b| b.score.total_cmp(&a.score));

                // Ranking for AP uses every detection regardless of confidence.
                let boxes: Vec<BBox> = detections.iter().map(|det| det.bbox).collect();
                let hits = match_detections(&gt, &boxes, iou_threshold);
                ranked.extend(detections.iter().map(|det| det.score).zip(hits));

                let confident: Vec<BBox> = detections
                    .iter()
                    .filter(|det| det.score >= score_threshold)
                    .map(|det| det.bbox)
                    .collect();
                let confident_hits = match_detections(&gt, &confident, iou_threshold);
                let tp = confident_hits.iter().filter(|hit| **hit).count() as u64;
                counts.add(MatchCounts {
                    true_positives: tp,
                    false_positives: confident_hits.len() as u64 - tp,
                    false_negatives: gt.len() as u64 - tp,
                });
            }

            ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
            let hits: Vec<bool> = ranked.iter().map(|(_, hit)| *hit).collect();
            let ap = average_precision(&hits, num_ground_truth);
            if let Some(ap) = ap {
                precisions.push(ap);
            }

            overall.add(counts);
            per_class.push(ClassStatistics {
                class_id,
                name: self.class_name(class_id),
                num_ground_truth,
                rates: counts.into(),
                average_precision: ap,
            });
        }

        let mean_average_precision = if precisions.is_empty() {
            None
        } else {
            Some(precisions.iter().sum::<f64>() / precisions.len() as f64)
        };

        ThresholdStatistics {
            iou_threshold,
            overall: overall.into(),
            mean_average_precision,
            per_class,
        }
    }

    /// Every class that appears in the categories, ground truth or detections.
    fn class_ids(&self) -> BTreeSet<u32> {
        let mut ids: BTreeSet<u32> = self.dump.categories.keys().copied().collect();
        for image in &self.dump.images {
            ids.extend(image.ground_truth.iter().map(|gt| gt.class_id));
            ids.extend(image.detections.iter().map(|det| det.class_id));
        }
        ids
    }

    fn class_name(&self, class_id: u32) -> String {
        self.dump
            .categories
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{class_id}"))
    }
}

impl BoundingBoxEvaluator for DumpEvaluator {
    fn load_from_dump(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("open evaluation dump {}", path.display()))?;
        let dump: EvaluationDump = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parse evaluation dump {}", path.display()))?;
        info!("Loaded dump with {} images from {}", dump.images.len(), path.display());
        Ok(Self::new(dump))
    }

    fn calculate_default_and_save(&self, output_path: &Path) -> Result<PathBuf> {
        let stats = self.calculate_default();
        fs::create_dir_all(output_path)
            .with_context(|| format!("create output directory {}", output_path.display()))?;
        let target = output_path.join(STATS_FILE);
        let file = File::create(&target).with_context(|| format!("create {}", target.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &stats)
            .with_context(|| format!("write {}", target.display()))?;

        for threshold in &stats.thresholds {
            println!(
                "IoU {:.2}: precision={:.3} recall={:.3} f1={:.3} mAP={}",
                threshold.iou_threshold,
                threshold.overall.precision,
                threshold.overall.recall,
                threshold.overall.f1,
                threshold
                    .mean_average_precision
                    .map(|map| format!("{map:.3}"))
                    .unwrap_or_else(|| "n/a".into())
            );
        }
        Ok(target)
    }
}

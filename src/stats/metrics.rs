use serde::{Deserialize, Serialize};

/// Box as `[x0, y0, x1, y1]`; corners may come in either order.
pub type BBox = [f32; 4];

pub fn iou_xyxy(a: BBox, b: BBox) -> f32 {
    let (ax0, ay0, ax1, ay1) = normalize(a);
    let (bx0, by0, bx1, by1) = normalize(b);

    let inter_w = (ax1.min(bx1) - ax0.max(bx0)).max(0.0);
    let inter_h = (ay1.min(by1) - ay0.max(by0)).max(0.0);
    let inter_area = inter_w * inter_h;

    let area_a = (ax1 - ax0) * (ay1 - ay0);
    let area_b = (bx1 - bx0) * (by1 - by0);
    let union = area_a + area_b - inter_area;
    if union <= 0.0 {
        0.0
    } else {
        inter_area / union
    }
}

fn normalize(b: BBox) -> (f32, f32, f32, f32) {
    (b[0].min(b[2]), b[1].min(b[3]), b[0].max(b[2]), b[1].max(b[3]))
}

/// Greedy one-to-one matching. `detections` must be sorted by descending
/// score; each detection takes the unmatched ground truth it overlaps most,
/// provided the overlap reaches `iou_threshold`.
///
/// Returns whether each detection is a true positive.
pub fn match_detections(
    ground_truth: &[BBox],
    detections: &[BBox],
    iou_threshold: f32,
) -> Vec<bool> {
    let mut taken = vec![false; ground_truth.len()];
    detections
        .iter()
        .map(|detection| {
            let best = ground_truth
                .iter()
                .enumerate()
                .filter(|(index, _)| !taken[*index])
                .map(|(index, gt)| (index, iou_xyxy(*detection, *gt)))
                .filter(|(_, iou)| *iou >= iou_threshold)
                .max_by(|a, b| a.1.total_cmp(&b.1));
            match best {
                Some((index, _)) => {
                    taken[index] = true;
                    true
                }
                None => false,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCounts {
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
}

impl MatchCounts {
    pub fn add(&mut self, other: MatchCounts) {
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.false_negatives += other.false_negatives;
    }

    #[must_use]
    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    #[must_use]
    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    #[must_use]
    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// All-point interpolated average precision from ranked hit flags.
///
/// `hits` is in descending score order across the whole dataset; `num_ground_truth`
/// is the number of boxes that could have been found. `None` when there is
/// nothing to find.
pub fn average_precision(hits: &[bool], num_ground_truth: usize) -> Option<f64> {
    if num_ground_truth == 0 {
        return None;
    }
    let mut recalls = Vec::with_capacity(hits.len());
    let mut precisions = Vec::with_capacity(hits.len());
    let mut tp = 0usize;
    for (rank, hit) in hits.iter().enumerate() {
        if *hit {
            tp += 1;
        }
        recalls.push(tp as f64 / num_ground_truth as f64);
        precisions.push(tp as f64 / (rank + 1) as f64);
    }

    // Precision envelope, right to left.
    for i in (0..precisions.len().saturating_sub(1)).rev() {
        precisions[i] = precisions[i].max(precisions[i + 1]);
    }

    let mut ap = 0.0;
    let mut previous_recall = 0.0;
    for (recall, precision) in recalls.iter().zip(&precisions) {
        ap += (recall - previous_recall) * precision;
        previous_recall = *recall;
    }
    Some(ap)
}

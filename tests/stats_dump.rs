use std::fs;

use bbox_train_prep::stats::{
    recalculate_statistics_from_dump, DefaultStatistics, DumpEvaluator, STATS_FILE,
};
use serde_json::json;

fn write_dump(dir: &std::path::Path, dump: serde_json::Value) -> std::path::PathBuf {
    let path = dir.join("dump.json");
    fs::write(&path, serde_json::to_vec(&dump).unwrap()).unwrap();
    path
}

#[test]
fn recalculated_statistics_are_saved_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let dump = write_dump(
        dir.path(),
        json!({
            "categories": {"1": "person", "2": "car"},
            "images": [
                {
                    "image_id": "0001.jpg",
                    "ground_truth": [
                        {"class_id": 1, "bbox": [0.0, 0.0, 10.0, 20.0]},
                        {"class_id": 2, "bbox": [30.0, 30.0, 60.0, 50.0]}
                    ],
                    "detections": [
                        {"class_id": 1, "score": 0.97, "bbox": [0.0, 0.0, 10.0, 20.0]},
                        {"class_id": 2, "score": 0.88, "bbox": [30.0, 30.0, 60.0, 50.0]}
                    ]
                },
                {"image_id": "0002.jpg"}
            ]
        }),
    );
    let output = dir.path().join("stats");

    let written = recalculate_statistics_from_dump::<DumpEvaluator>(&dump, &output).unwrap();

    assert_eq!(written, output.join(STATS_FILE));
    let stats: DefaultStatistics =
        serde_json::from_slice(&fs::read(&written).unwrap()).unwrap();
    assert_eq!(stats.num_images, 2);
    assert_eq!(stats.thresholds.len(), 2);
    for threshold in &stats.thresholds {
        assert_eq!(threshold.overall.precision, 1.0);
        assert_eq!(threshold.overall.recall, 1.0);
        assert_eq!(threshold.mean_average_precision, Some(1.0));
        let names: Vec<_> = threshold.per_class.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["person", "car"]);
    }
}

#[test]
fn missing_dump_reports_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.json");
    let err = recalculate_statistics_from_dump::<DumpEvaluator>(&missing, dir.path()).unwrap_err();
    assert!(err.to_string().contains("nope.json"));
    assert!(!dir.path().join(STATS_FILE).exists());
}

#[test]
fn malformed_dump_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let dump = write_dump(dir.path(), json!({"images": [{"detections": []}]}));
    let err = recalculate_statistics_from_dump::<DumpEvaluator>(&dump, dir.path()).unwrap_err();
    assert!(format!("{err:#}").contains("parse evaluation dump"));
}

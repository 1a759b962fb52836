use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use super::assets::Assets;
use super::hyperparameters::Hyperparameters;

pub const LABEL_MAP_FILE: &str = "label_map.pbtxt";
pub const PIPELINE_FILE: &str = "pipeline.config";
const CLASS_ID_MARKER: &str = "id:";
const RECORD_PAD_WIDTH: usize = 5;

static LEFTOVER_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<replace_[A-Za-z0-9_]+>").expect("placeholder pattern"));

/// Layout of a prepared training directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingLayout {
    pub base_dir: PathBuf,
}

impl TrainingLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn model_dir(&self) -> PathBuf {
        self.base_dir.join("models").join("model")
    }

    pub fn eval_dir(&self) -> PathBuf {
        self.model_dir().join("eval")
    }

    pub fn train_dir(&self) -> PathBuf {
        self.model_dir().join("train")
    }

    pub fn pipeline_path(&self) -> PathBuf {
        self.model_dir().join(PIPELINE_FILE)
    }

    pub fn create(&self) -> Result<()> {
        for dir in [self.eval_dir(), self.train_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("create training directory {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Where the dataset keeps its complete training split.
pub fn records_dir(data_path: &Path) -> PathBuf {
    data_path
        .join("splits")
        .join("complete")
        .join("train")
}

pub fn eval_examples_path(data_path: &Path) -> PathBuf {
    records_dir(data_path).join("test.record.numexamples")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalExampleCount {
    /// Read from the dataset's sidecar file.
    Present(u64),
    /// Sidecar missing or unreadable.
    Defaulted,
}

impl EvalExampleCount {
    pub const DEFAULT: u64 = 1;

    #[must_use]
    pub fn value(&self) -> u64 {
        match self {
            EvalExampleCount::Present(count) => *count,
            EvalExampleCount::Defaulted => Self::DEFAULT,
        }
    }
}

pub fn read_eval_example_count(path: &Path) -> EvalExampleCount {
    let parsed = fs::read_to_string(path).ok().and_then(|text| {
        text.lines()
            .next()
            .and_then(|line| line.trim().parse::<u64>().ok())
    });
    match parsed {
        Some(count) => EvalExampleCount::Present(count),
        None => {
            warn!(
                "Could not read eval example count from {}; using {}",
                path.display(),
                EvalExampleCount::DEFAULT
            );
            EvalExampleCount::Defaulted
        }
    }
}

/// Number of label-map lines carrying a class id.
pub fn count_classes(label_map: &Path) -> Result<usize> {
    let text = fs::read_to_string(label_map)
        .with_context(|| format!("read label map {}", label_map.display()))?;
    Ok(text
        .lines()
        .filter(|line| line.contains(CLASS_ID_MARKER))
        .count())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCounts {
    pub train: usize,
    pub test: usize,
}

impl RecordCounts {
    #[must_use]
    pub fn padded_train(&self) -> String {
        zero_pad(self.train)
    }

    #[must_use]
    pub fn padded_test(&self) -> String {
        zero_pad(self.test)
    }
}

fn zero_pad(count: usize) -> String {
    format!("{count:0width$}", width = RECORD_PAD_WIDTH)
}

pub fn count_records(dir: &Path) -> Result<RecordCounts> {
    let mut counts = RecordCounts::default();
    let entries =
        fs::read_dir(dir).with_context(|| format!("list record shards in {}", dir.display()))?;
    for entry in entries {
        let entry = entry.context("read record shard entry")?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with("train.record-") {
            counts.train += 1;
        }
        if name.starts_with("test.record-") {
            counts.test += 1;
        }
    }
    Ok(counts)
}

/// Directory path as the templates expect it: always ending in a separator.
#[must_use]
pub fn dir_with_separator(path: &Path) -> String {
    let mut text = path.display().to_string();
    if !text.ends_with(MAIN_SEPARATOR) && !text.ends_with('/') {
        text.push(MAIN_SEPARATOR);
    }
    text
}

/// Everything substituted into a template besides the paths.
#[derive(Debug, Clone)]
pub struct TemplateValues<'a> {
    pub data_path: &'a Path,
    pub arch_path: &'a Path,
    pub hyperparameters: &'a Hyperparameters,
    pub records: RecordCounts,
    pub num_classes: usize,
    pub num_eval_examples: u64,
}

/// Pure text substitution of every `<replace_...>` placeholder the values know.
#[must_use]
pub fn fill_template(template: &str, values: &TemplateValues<'_>) -> String {
    let mut contents = template
        .replace("<replace_data_path>", &dir_with_separator(values.data_path))
        .replace("<replace_arch_path>", &dir_with_separator(values.arch_path));

    let records = [
        ("num_train_records", values.records.padded_train()),
        ("num_test_records", values.records.padded_test()),
    ];
    let params = values
        .hyperparameters
        .iter()
        .map(|(key, value)| (key, value.to_string()))
        .chain(records.iter().map(|(key, value)| (*key, value.clone())));
    for (key, value) in params {
        contents = contents.replace(&format!("<replace_{key}>"), &value);
    }

    contents
        .replace("<replace_num_classes>", &values.num_classes.to_string())
        .replace(
            "<replace_num_eval_examples>",
            &values.num_eval_examples.to_string(),
        )
}

pub fn unresolved_placeholders(contents: &str) -> Vec<String> {
    let mut found: Vec<String> = LEFTOVER_PLACEHOLDER
        .find_iter(contents)
        .map(|placeholder| placeholder.as_str().to_string())
        .collect();
    found.sort();
    found.dedup();
    found
}

#[derive(Debug, Clone)]
pub struct RenderRequest<'a> {
    pub base_dir: &'a Path,
    pub data_path: &'a Path,
    pub arch_path: &'a Path,
    pub model_type: &'a str,
    pub optimizer: &'a str,
    pub hyperparameters: &'a Hyperparameters,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSummary {
    pub pipeline_path: PathBuf,
    pub num_classes: usize,
    pub eval_examples: EvalExampleCount,
    pub records: RecordCounts,
    pub unresolved: Vec<String>,
}

/// Lays out `base_dir` and writes its `pipeline.config` from the template for
/// `model_type` and `optimizer`.
pub fn render_pipeline(assets: &Assets, request: &RenderRequest<'_>) -> Result<RenderSummary> {
    let layout = TrainingLayout::new(request.base_dir);
    layout.create()?;

    let label_map = request.data_path.join(LABEL_MAP_FILE);
    fs::copy(&label_map, request.base_dir.join(LABEL_MAP_FILE))
        .with_context(|| format!("copy {} into training directory", label_map.display()))?;
    let num_classes = count_classes(&label_map)?;

    let eval_examples = read_eval_example_count(&eval_examples_path(request.data_path));
    let records = count_records(&records_dir(request.data_path))?;

    let template = assets.template(request.model_type, request.optimizer)?;
    let contents = fill_template(
        &template,
        &TemplateValues {
            data_path: request.data_path,
            arch_path: request.arch_path,
            hyperparameters: request.hyperparameters,
            records,
            num_classes,
            num_eval_examples: eval_examples.value(),
        },
    );

    let unresolved = unresolved_placeholders(&contents);
    if !unresolved.is_empty() {
        warn!(
            "Pipeline template left placeholders unfilled: {}",
            unresolved.join(", ")
        );
    }

    let pipeline_path = layout.pipeline_path();
    fs::write(&pipeline_path, contents)
        .with_context(|| format!("write {}", pipeline_path.display()))?;
    info!(
        "Wrote {} ({num_classes} classes, {} train / {} test shards)",
        pipeline_path.display(),
        records.train,
        records.test
    );

    Ok(RenderSummary {
        pipeline_path,
        num_classes,
        eval_examples,
        records,
        unresolved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::hyperparameters::ParamValue;

    fn params() -> Hyperparameters {
        [
            ("batch_size", ParamValue::Int(8)),
            ("learning_rate_base", ParamValue::Float(0.004)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn separator_is_appended_once() {
        let with = dir_with_separator(Path::new("/data/set/"));
        let without = dir_with_separator(Path::new("/data/set"));
        assert_eq!(with, "/data/set/");
        assert_eq!(without, format!("/data/set{MAIN_SEPARATOR}"));
    }

    #[test]
    fn records_are_zero_padded() {
        let counts = RecordCounts { train: 3, test: 12 };
        assert_eq!(counts.padded_train(), "00003");
        assert_eq!(counts.padded_test(), "00012");
    }

    #[test]
    fn fill_template_substitutes_every_value() {
        let template = "bs: <replace_batch_size>\nlr: <replace_learning_rate_base>\n\
            data: \"<replace_data_path>x\"\narch: \"<replace_arch_path>ckpt\"\n\
            shards: <replace_num_train_records>/<replace_num_test_records>\n\
            classes: <replace_num_classes>\neval: <replace_num_eval_examples>\n";
        let params = params();
        let out = fill_template(
            template,
            &TemplateValues {
                data_path: Path::new("/data/"),
                arch_path: Path::new("/arch/"),
                hyperparameters: &params,
                records: RecordCounts { train: 3, test: 2 },
                num_classes: 4,
                num_eval_examples: 250,
            },
        );
        assert_eq!(
            out,
            "bs: 8\nlr: 0.004\ndata: \"/data/x\"\narch: \"/arch/ckpt\"\n\
             shards: 00003/00002\nclasses: 4\neval: 250\n"
        );
        assert!(unresolved_placeholders(&out).is_empty());
    }

    #[test]
    fn unresolved_placeholders_are_listed_once() {
        let found = unresolved_placeholders("<replace_a> <replace_b> <replace_a>");
        assert_eq!(found, vec!["<replace_a>", "<replace_b>"]);
    }

    #[test]
    fn eval_count_distinguishes_missing_from_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.record.numexamples");
        assert_eq!(read_eval_example_count(&path), EvalExampleCount::Defaulted);

        fs::write(&path, "1\n").unwrap();
        assert_eq!(read_eval_example_count(&path), EvalExampleCount::Present(1));

        fs::write(&path, "").unwrap();
        assert_eq!(read_eval_example_count(&path), EvalExampleCount::Defaulted);

        fs::write(&path, "many\n").unwrap();
        assert_eq!(read_eval_example_count(&path).value(), 1);
    }

    #[test]
    fn class_count_uses_id_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LABEL_MAP_FILE);
        fs::write(
            &path,
            "item {\n  id: 1\n  name: 'cat'\n}\nitem {\n  id: 2\n  name: 'dog'\n}\n",
        )
        .unwrap();
        assert_eq!(count_classes(&path).unwrap(), 2);
    }
}

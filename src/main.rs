use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use bbox_train_prep::core::{logging::setup_logging, settings};
use bbox_train_prep::models::{self, ArchCache, HttpSource};
use bbox_train_prep::prompt::{NoPrompt, Prompter, TerminalPrompter};
use bbox_train_prep::stats::{recalculate_statistics_from_dump, DumpEvaluator};
use bbox_train_prep::training::{prepare_for_training, Assets, TrainingRequest};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "bbox-train-prep",
    about = "Prepare bounding-box detection training runs"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download a pretrained architecture into the cache if it is not there yet.
    Fetch {
        /// Archive name, e.g. ssd_mobilenet_v2_fpnlite_320x320_coco17_tpu-8.
        model_name: String,
        /// Cache root; defaults to the platform cache directory.
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    /// Lay out a training directory and render its pipeline.config.
    Prepare {
        /// Training directory to create.
        #[arg(long)]
        base_dir: PathBuf,
        /// Dataset root containing label_map.pbtxt and splits/.
        #[arg(long)]
        data_path: PathBuf,
        /// Model type, see `models`.
        #[arg(long)]
        model_type: String,
        /// Architecture archive name; defaults to the model type's catalog entry.
        #[arg(long)]
        arch: Option<String>,
        /// Plugin config YAML (optimizer, use_default_config, hyperparameters).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Directory with model_defaults/ and pipeline_templates/ replacing the bundled set.
        #[arg(long)]
        assets: Option<PathBuf>,
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// Write the run metadata as JSON to this file.
        #[arg(long)]
        metadata: Option<PathBuf>,
        /// Fail instead of asking when the config leaves a question open.
        #[arg(long, default_value_t = false)]
        no_input: bool,
    },
    /// Recompute default statistics from an evaluation dump.
    RecalculateStats { dump_path: PathBuf, output_path: PathBuf },
    /// List known model types.
    Models,
}

fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Fetch {
            model_name,
            cache_dir,
        } => {
            let cache = open_cache(cache_dir)?;
            let source = HttpSource::new()?;
            let path = models::download_model_arch(&model_name, &cache, &source)?;
            println!("{}", path.display());
        }
        Command::Prepare {
            base_dir,
            data_path,
            model_type,
            arch,
            config,
            assets,
            cache_dir,
            metadata,
            no_input,
        } => {
            let arch = match arch {
                Some(arch) => arch,
                None => models::lookup_model_type(&model_type)
                    .map(|model| model.arch.to_string())
                    .ok_or_else(|| {
                        anyhow!("unknown model type {model_type}; pass --arch to name its archive")
                    })?,
            };
            let plugin_config = match config {
                Some(path) => settings::load_plugin_config(&path)?,
                None => settings::PluginConfig::default(),
            };
            let assets = assets.map(Assets::from_dir).unwrap_or_default();

            let cache = open_cache(cache_dir)?;
            let source = HttpSource::new()?;
            let arch_path = models::download_model_arch(&arch, &cache, &source)?;

            let request = TrainingRequest {
                base_dir,
                data_path,
                arch_path,
                model_type,
                config: plugin_config,
            };
            let mut terminal;
            let mut unattended = NoPrompt;
            let prompter: &mut dyn Prompter = if no_input {
                &mut unattended
            } else {
                terminal = TerminalPrompter::stdio();
                &mut terminal
            };

            let mut run_metadata = Map::new();
            let run = prepare_for_training(&request, &assets, prompter, &mut run_metadata)?;
            info!(
                "Prepared {} with {} ({} classes, {} eval examples)",
                request.base_dir.display(),
                run.optimizer,
                run.pipeline.num_classes,
                run.pipeline.eval_examples.value()
            );
            println!("{}", run.pipeline.pipeline_path.display());

            if let Some(path) = metadata {
                write_metadata(&path, &run_metadata)?;
            }
        }
        Command::RecalculateStats {
            dump_path,
            output_path,
        } => {
            let written =
                recalculate_statistics_from_dump::<DumpEvaluator>(&dump_path, &output_path)?;
            println!("{}", written.display());
        }
        Command::Models => {
            for model in models::model_types() {
                println!("{:<28} {:<48} {}", model.name, model.arch, model.description);
            }
        }
    }
    Ok(())
}

fn open_cache(cache_dir: Option<PathBuf>) -> Result<ArchCache> {
    match cache_dir {
        Some(dir) => Ok(ArchCache::new(dir)),
        None => ArchCache::from_platform_dirs(),
    }
}

fn write_metadata(path: &Path, metadata: &Map<String, Value>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create dir {parent:?}"))?;
    }
    let serialized = serde_json::to_vec_pretty(metadata).context("serialize metadata to json")?;
    fs::write(path, serialized).with_context(|| format!("write metadata to {path:?}"))?;
    Ok(())
}

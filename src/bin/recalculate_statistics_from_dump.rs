use std::path::PathBuf;

use bbox_train_prep::core::logging::setup_logging;
use bbox_train_prep::stats::{recalculate_statistics_from_dump, DumpEvaluator};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "recalculate_statistics_from_dump",
    about = "Recompute default bounding-box statistics from an evaluation dump"
)]
struct Args {
    dump_path: PathBuf,
    output_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    setup_logging();
    let args = Args::parse();
    recalculate_statistics_from_dump::<DumpEvaluator>(&args.dump_path, &args.output_path)?;
    Ok(())
}

use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info, warn};

use super::{catalog, download_and_extract_with_progress, ArchCache, ArchiveSource, DownloadPlan};

pub const ARCHS_SUBDIR: &str = "bbox_model_archs";

const PROGRESS_LOG_STEP: u64 = 16 * 1024 * 1024;

/// Returns the cached architecture directory for `model_name`, downloading and
/// unpacking it first when the cache does not have it yet.
///
/// An existing cache entry is trusted as-is and never refreshed.
pub fn download_model_arch(
    model_name: &str,
    cache: &ArchCache,
    source: &dyn ArchiveSource,
) -> Result<PathBuf> {
    let archs_path = cache.ensure_subpath_exists(ARCHS_SUBDIR)?;
    let untarred_path = archs_path.join(model_name);

    if cache.subpath_exists(&untarred_path) {
        info!("Model checkpoint found in cache.");
        return Ok(untarred_path);
    }

    info!("Model checkpoint not found in cache. Downloading...");
    let plan = DownloadPlan::new(catalog::arch_url(model_name), &archs_path)?;
    let mut next_report = PROGRESS_LOG_STEP;
    let outcome = download_and_extract_with_progress(source, &plan, |downloaded| {
        if downloaded >= next_report {
            debug!("Downloaded {} MiB of {model_name}", downloaded / (1024 * 1024));
            next_report = downloaded + PROGRESS_LOG_STEP;
        }
    })?;
    info!(
        "Unpacked {model_name} ({} bytes, sha256 {})",
        outcome.archive_size_bytes, outcome.checksum
    );

    if !untarred_path.exists() {
        warn!(
            "Archive for {model_name} did not contain a top-level {model_name} directory under {}",
            outcome.extracted_into.display()
        );
    }
    Ok(untarred_path)
}

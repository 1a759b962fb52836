mod cache;
pub mod catalog;
mod checksum;
mod download;
mod fetch;

pub use cache::ArchCache;
pub use catalog::{lookup as lookup_model_type, model_types, ModelType};
pub use checksum::compute_sha256;
pub use download::{
    download_and_extract, download_and_extract_with_progress, ArchiveFormat, ArchiveSource,
    DownloadOutcome, DownloadPlan, HttpSource,
};
pub use fetch::{download_model_arch, ARCHS_SUBDIR};

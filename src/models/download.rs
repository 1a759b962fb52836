use std::{
    fs::{self, File},
    io::{Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use tar::Archive;

use super::checksum::compute_sha256;
use crate::error::ArchiveError;

const CHUNK_SIZE: usize = 32 * 1024;

/// Transport that puts the bytes behind a URI into a local file.
pub trait ArchiveSource {
    /// Returns the number of bytes written to `path`.
    fn fetch(&self, uri: &str, path: &Path, progress: &mut dyn FnMut(u64)) -> Result<u64>;
}

pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new() -> Result<Self> {
        let client = Client::builder().build().context("create http client")?;
        Ok(Self { client })
    }
}

impl ArchiveSource for HttpSource {
    fn fetch(&self, uri: &str, path: &Path, progress: &mut dyn FnMut(u64)) -> Result<u64> {
        let mut response = self
            .client
            .get(uri)
            .send()
            .with_context(|| format!("request {uri}"))?
            .error_for_status()
            .with_context(|| format!("download {uri}"))?;

        let mut file = File::create(path).context("create staging file")?;
        let mut downloaded = 0u64;
        let mut buffer = vec![0u8; CHUNK_SIZE];
        loop {
            let read = response.read(&mut buffer).context("read download chunk")?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read])
                .context("write download chunk")?;
            downloaded += read as u64;
            progress(downloaded);
        }
        file.flush().context("flush staging file")?;
        Ok(downloaded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
}

impl ArchiveFormat {
    /// Only gzip tarballs are published for model architectures.
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveFormat::TarGz)
        } else {
            None
        }
    }

    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    pub uri: String,
    /// Where the archive is written before extraction. Removed afterwards.
    pub staging: PathBuf,
    /// Directory the archive is unpacked into.
    pub extract_into: PathBuf,
}

impl DownloadPlan {
    pub fn new(uri: impl Into<String>, extract_into: impl Into<PathBuf>) -> Result<Self> {
        let uri = uri.into();
        let extract_into = extract_into.into();
        let filename = filename_from_uri(&uri)
            .ok_or_else(|| anyhow!("cannot derive a file name from {uri}"))?;
        Ok(Self {
            staging: extract_into.join(filename),
            uri,
            extract_into,
        })
    }
}

#[derive(Debug)]
pub struct DownloadOutcome {
    pub extracted_into: PathBuf,
    pub archive_size_bytes: u64,
    pub bytes_downloaded: u64,
    pub checksum: String,
}

pub fn download_and_extract(
    source: &dyn ArchiveSource,
    plan: &DownloadPlan,
) -> Result<DownloadOutcome> {
    download_and_extract_with_progress(source, plan, |_| {})
}

pub fn download_and_extract_with_progress<F>(
    source: &dyn ArchiveSource,
    plan: &DownloadPlan,
    mut progress: F,
) -> Result<DownloadOutcome>
where
    F: FnMut(u64),
{
    fs::create_dir_all(&plan.extract_into).context("create extraction directory")?;

    let fetched = source.fetch(&plan.uri, &plan.staging, &mut progress);
    let outcome = fetched.and_then(|bytes_downloaded| unpack_staged(plan, bytes_downloaded));

    if plan.staging.exists() {
        fs::remove_file(&plan.staging).with_context(|| {
            format!("remove downloaded archive {}", plan.staging.display())
        })?;
    }
    outcome
}

fn unpack_staged(plan: &DownloadPlan, bytes_downloaded: u64) -> Result<DownloadOutcome> {
    let size = fs::metadata(&plan.staging)
        .context("stat downloaded file")?
        .len();
    let checksum = compute_sha256(&plan.staging)?;

    let format = plan
        .staging
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(ArchiveFormat::from_file_name)
        .ok_or_else(|| ArchiveError::UnsupportedFormat(plan.staging.clone()))?;

    extract_archive(format, &plan.staging, &plan.extract_into)?;

    Ok(DownloadOutcome {
        extracted_into: plan.extract_into.clone(),
        archive_size_bytes: size,
        bytes_downloaded,
        checksum,
    })
}

fn extract_archive(format: ArchiveFormat, archive_path: &Path, destination: &Path) -> Result<()> {
    let file = File::open(archive_path).context("open archive")?;
    match format {
        ArchiveFormat::TarGz => extract_tar(GzDecoder::new(file), destination),
    }
}

fn extract_tar<R: Read>(reader: R, destination: &Path) -> Result<()> {
    let mut archive = Archive::new(reader);
    for entry in archive.entries().context("iterate tar entries")? {
        let mut entry = entry.context("read tar entry")?;
        let path = entry.path().context("read entry path")?.into_owned();
        let unpacked = entry
            .unpack_in(destination)
            .with_context(|| format!("unpack tar entry {}", path.display()))?;
        if !unpacked {
            tracing::warn!("Skipped tar entry outside destination: {}", path.display());
        }
    }
    Ok(())
}

fn filename_from_uri(uri: &str) -> Option<String> {
    let last_segment = uri.split('/').last()?;
    let clean = last_segment.split('?').next()?.split('#').next()?.trim();
    if clean.is_empty() {
        None
    } else {
        Some(clean.to_string())
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;

/// Root directory that downloaded artifacts live under.
#[derive(Debug, Clone)]
pub struct ArchCache {
    root: PathBuf,
}

impl ArchCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache under the platform cache directory, e.g. `~/.cache/bbox-train-prep`.
    pub fn from_platform_dirs() -> Result<Self> {
        Ok(Self::new(resolve_cache_dir()?))
    }

    pub fn path(&self) -> &Path {
        self.root.as_path()
    }

    pub fn ensure_subpath_exists(&self, subpath: impl AsRef<Path>) -> Result<PathBuf> {
        let path = self.root.join(subpath);
        fs::create_dir_all(&path)
            .with_context(|| format!("create cache directory {}", path.display()))?;
        Ok(path)
    }

    /// Relative subpaths are resolved against the cache root; absolute ones are
    /// checked as given.
    pub fn subpath_exists(&self, subpath: impl AsRef<Path>) -> bool {
        self.root.join(subpath).exists()
    }
}

fn resolve_cache_dir() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("org", "BoundingBox", "bbox-train-prep")
        .context("missing project directories")?;
    let dir = project_dirs.cache_dir().to_path_buf();
    fs::create_dir_all(&dir).context("create cache dir")?;
    Ok(dir)
}

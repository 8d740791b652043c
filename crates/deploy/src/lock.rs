//! Per-chain run lock.
//!
//! Only guards runs sharing the same output directory on one host.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::Context;
use fs2::FileExt;

use crate::error::{DeployError, DeployResult};

/// Exclusive lock on `<outdata>/.<chain>.lock`, released on drop.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    pub fn lock_path(outdata: &Path, chain: &str) -> PathBuf {
        outdata.join(format!(".{chain}.lock"))
    }

    /// Take the lock for `chain`, failing immediately if another run holds it.
    pub fn acquire(outdata: &Path, chain: &str) -> DeployResult<Self> {
        std::fs::create_dir_all(outdata)
            .context(format!("Failed to create output directory {}", outdata.display()))
            .map_err(|e| DeployError::InvalidConfiguration(format!("{e:#}")))?;

        let path = Self::lock_path(outdata, chain);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .context(format!("Failed to open lock file {}", path.display()))
            .map_err(|e| DeployError::InvalidConfiguration(format!("{e:#}")))?;

        file.try_lock_exclusive().map_err(|_| DeployError::RunLocked {
            chain: chain.to_string(),
        })?;

        tracing::debug!(path = %path.display(), "Run lock acquired");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release run lock");
        }
    }
}

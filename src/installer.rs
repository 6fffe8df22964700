//! Download the geoipupdate release for this platform and stage its binary
//! in the data directory.

use cadence::{prelude::*, StatsdClient};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use walkdir::WalkDir;

use crate::{
    archive::extract_tar_gz_async,
    data_dir::{DataDirectory, EXECUTABLE_NAME},
    errors::{ErrorKind, UpdaterError},
    metrics,
    platform::PlatformSuffix,
    release::{resolve_tar_gz_url, ReleaseSource},
};

pub struct Installer<S> {
    source: S,
    data_dir: DataDirectory,
    platform: Option<PlatformSuffix>,
    log: slog::Logger,
    metrics: Arc<StatsdClient>,
}

impl<S: ReleaseSource> Installer<S> {
    pub fn new(source: S, data_dir: DataDirectory, log: slog::Logger) -> Self {
        Self {
            source,
            data_dir,
            platform: None,
            log,
            metrics: metrics::nop_client(),
        }
    }

    /// Install the build for `platform` instead of the running host.
    pub fn platform(mut self, platform: Option<PlatformSuffix>) -> Self {
        self.platform = platform;
        self
    }

    pub fn metrics(mut self, metrics: Arc<StatsdClient>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn data_dir(&self) -> &DataDirectory {
        &self.data_dir
    }

    /// Fetch the release index and resolve the archive for our platform.
    pub async fn resolve_archive(&self) -> Result<url::Url, UpdaterError> {
        let index = self.source.fetch_index().await?;
        resolve_tar_gz_url(&index, self.platform.as_ref(), &self.log)
    }

    /// Download, unpack and install the executable, returning its path.
    ///
    /// Running this again replaces the binary with a fresh copy and leaves
    /// the data directory in the same state.
    pub async fn install_executable(&self) -> Result<PathBuf, UpdaterError> {
        let result = self.install().await;
        self.metrics
            .incr_with_tags("install")
            .with_tag("status", if result.is_ok() { "success" } else { "error" })
            .send();
        result
    }

    async fn install(&self) -> Result<PathBuf, UpdaterError> {
        let url = self.resolve_archive().await?;
        let archive = self.source.download(&url).await?;
        slog::debug!(self.log, "Downloaded release archive";
                     "url" => url.as_str(), "bytes" => archive.len());

        // Removed on drop, whichever way this function exits.
        let scratch = tempfile::Builder::new().prefix("geoipupdate-").tempdir()?;
        extract_tar_gz_async(archive, scratch.path().to_path_buf()).await?;
        let binary = find_executable(scratch.path())?;

        self.data_dir.ensure().await?;
        let dest = self.data_dir.ensure_executable_path().await?;

        // Stage next to the destination so the final rename never leaves a
        // partial binary at the installed path.
        let staged = tempfile::Builder::new()
            .prefix(".geoipupdate-")
            .tempfile_in(self.data_dir.path())?
            .into_temp_path();
        tokio::fs::copy(&binary, &staged).await?;
        mark_executable(&staged).await?;
        staged.persist(&dest).map_err(|err| err.error)?;

        slog::info!(self.log, "Installed geoipupdate"; "path" => %dest.display());
        Ok(dest)
    }
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o100 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    true
}

#[cfg(unix)]
async fn mark_executable(path: &Path) -> Result<(), UpdaterError> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn mark_executable(_path: &Path) -> Result<(), UpdaterError> {
    Ok(())
}

/// Pick the binary to install out of an unpacked release.
///
/// Only regular files with the owner-execute bit count. A file named like
/// the installed executable wins; otherwise there must be exactly one
/// candidate.
pub fn find_executable(root: &Path) -> Result<PathBuf, UpdaterError> {
    let mut candidates = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            UpdaterError::from_source(ErrorKind::ExtractionFailed, "Could not scan archive", err)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let metadata = entry.metadata().map_err(|err| {
            UpdaterError::from_source(ErrorKind::ExtractionFailed, "Could not scan archive", err)
        })?;
        if is_executable(&metadata) {
            candidates.push(entry.into_path());
        }
    }

    let mut named: Vec<&PathBuf> = candidates
        .iter()
        .filter(|path| path.file_name().and_then(|n| n.to_str()) == Some(EXECUTABLE_NAME.as_str()))
        .collect();
    if named.len() == 1 {
        return Ok(named.remove(0).clone());
    }
    if named.is_empty() && candidates.len() == 1 {
        return Ok(candidates.remove(0));
    }
    if candidates.is_empty() {
        return Err(UpdaterError::new(
            ErrorKind::NoExecutableFound,
            "release archive contains no executable file",
        ));
    }

    let listed: Vec<String> = candidates
        .iter()
        .map(|path| {
            path.strip_prefix(root)
                .unwrap_or(path)
                .display()
                .to_string()
        })
        .collect();
    Err(UpdaterError::new(
        ErrorKind::AmbiguousExecutable,
        format!(
            "cannot tell which file to install as {}: [{}]",
            EXECUTABLE_NAME.as_str(),
            listed.join(", ")
        ),
    ))
}

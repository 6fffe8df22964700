use flate2::read::GzDecoder;
use std::path::{Path, PathBuf};

use crate::errors::{ErrorKind, UpdaterError};

/// Unpack a gzip-compressed tarball into `dest_dir`, keeping entry modes.
pub fn extract_tar_gz(data: &[u8], dest_dir: &Path) -> Result<(), UpdaterError> {
    let mut archive = tar::Archive::new(GzDecoder::new(data));
    archive.set_preserve_permissions(true);
    archive.unpack(dest_dir).map_err(|err| {
        UpdaterError::from_source(
            ErrorKind::ExtractionFailed,
            format!("Could not unpack archive into {}", dest_dir.display()),
            err,
        )
    })
}

/// [`extract_tar_gz`] on the blocking pool.
pub async fn extract_tar_gz_async(data: Vec<u8>, dest_dir: PathBuf) -> Result<(), UpdaterError> {
    tokio::task::spawn_blocking(move || extract_tar_gz(&data, &dest_dir))
        .await
        .map_err(|err| UpdaterError::from_source(ErrorKind::ExtractionFailed, "Extraction task", err))?
}

//! The directory holding the geoipupdate binary, its config file and the
//! databases it downloads.
//!
//! Both `ensure_*` operations normalise whatever they find on disk instead
//! of failing: an entry of the wrong type is removed and replaced. The one
//! exception is a non-empty directory where the executable belongs.

use once_cell::sync::Lazy;
use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::fs;

use crate::errors::{ErrorKind, UpdaterError};

pub static EXECUTABLE_NAME: Lazy<String> =
    Lazy::new(|| format!("geoipupdate{}", std::env::consts::EXE_SUFFIX));

pub const CONFIG_FILE_NAME: &str = "maxmind.conf";

pub const CITY_DATABASE_NAME: &str = "GeoLite2-City.mmdb";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataDirectory {
    root: PathBuf,
}

impl DataDirectory {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn executable_path(&self) -> PathBuf {
        self.root.join(EXECUTABLE_NAME.as_str())
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    pub fn city_database_path(&self) -> PathBuf {
        self.root.join(CITY_DATABASE_NAME)
    }

    /// Make sure the data directory exists as a directory.
    ///
    /// Only the last path component is created; the parent must exist. A
    /// symlink to a directory counts as a directory.
    pub async fn ensure(&self) -> Result<PathBuf, UpdaterError> {
        if let Ok(metadata) = fs::metadata(&self.root).await {
            if metadata.is_dir() {
                return Ok(self.root.clone());
            }
        }
        match fs::symlink_metadata(&self.root).await {
            // A file, or a link that does not lead to a directory.
            Ok(_) => fs::remove_file(&self.root).await?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        match fs::create_dir(&self.root).await {
            Ok(()) => Ok(self.root.clone()),
            // Lost a race with another run; fine as long as it made a directory.
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists && self.root.is_dir() => {
                Ok(self.root.clone())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Clear the way for a fresh copy of the executable.
    ///
    /// A regular file is left for the installer to replace. An empty
    /// directory or any other entry occupying the path is removed; a
    /// directory with contents is an error.
    pub async fn ensure_executable_path(&self) -> Result<PathBuf, UpdaterError> {
        let path = self.executable_path();
        match fs::symlink_metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(metadata) if metadata.is_dir() => {
                fs::remove_dir(&path).await.map_err(|err| {
                    UpdaterError::from_source(
                        ErrorKind::Io,
                        format!("Could not clear directory at {}", path.display()),
                        err,
                    )
                })?;
            }
            Ok(_) => fs::remove_file(&path).await?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        Ok(path)
    }
}

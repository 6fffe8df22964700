use serde_derive::Deserialize;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::errors::{ErrorKind, UpdaterError};

/// Database editions requested from MaxMind on every update.
pub const EDITION_IDS: [&str; 3] = ["GeoLite2-ASN", "GeoLite2-City", "GeoLite2-Country"];

#[derive(Deserialize)]
struct RawCredentials {
    account_id: Option<String>,
    license_key: Option<String>,
}

/// MaxMind account credentials, read from `ACCOUNT_ID` and `LICENSE_KEY`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub account_id: String,
    pub license_key: String,
}

// The license key is a secret and must stay out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("account_id", &self.account_id)
            .field("license_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn from_vars<I>(vars: I) -> Result<Self, UpdaterError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let raw: RawCredentials = envy::from_iter(vars)?;
        Ok(Self {
            account_id: required("ACCOUNT_ID", raw.account_id)?,
            license_key: required("LICENSE_KEY", raw.license_key)?,
        })
    }

    /// The geoipupdate config file contents, one directive per line.
    pub fn render_config(&self) -> String {
        format!(
            "AccountID {}\nLicenseKey {}\nEditionIDs {}\n",
            self.account_id,
            self.license_key,
            EDITION_IDS.join(" ")
        )
    }

    /// Overwrite the config file at `path`. On Unix only the owner may read
    /// it, since it holds the license key.
    pub async fn write_config(&self, path: &Path) -> Result<(), UpdaterError> {
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(path).await?;
        file.write_all(self.render_config().as_bytes()).await?;
        file.flush().await?;

        // `mode` only applies to new files.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
        }
        Ok(())
    }
}

fn required(name: &str, value: Option<String>) -> Result<String, UpdaterError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(UpdaterError::new(
            ErrorKind::MissingCredential,
            format!("{} is not set", name),
        )),
    }
}

use serde_derive::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::UpdaterError;

fn default_data_dir() -> PathBuf {
    "./data".into()
}

fn default_release_index_url() -> String {
    "https://api.github.com/repos/maxmind/geoipupdate/releases/latest".to_owned()
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_release_index_url")]
    pub release_index_url: String,

    pub platform_suffix: Option<String>,

    #[serde(default)]
    pub human_logs: bool,

    pub statsd_host: Option<String>,

    pub sentry_dsn: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        // Produce a default value by creating a mock empty environment, and
        // then asking envy to deserialize it. Since all settings have a default
        // value specified in the struct, this works and keeps everything in sync.
        let empty_env: Vec<(String, String)> = Vec::new();
        envy::from_iter(empty_env).unwrap()
    }
}

impl Settings {
    /// Load settings from the environment.
    pub fn load() -> Result<Self, UpdaterError> {
        let settings: Self = envy::from_env()?;
        Ok(settings)
    }
}

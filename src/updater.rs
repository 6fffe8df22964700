use cadence::{prelude::*, StatsdClient};
use std::{path::Path, sync::Arc, time::Instant};
use tokio::process::Command;

use crate::{
    credentials::Credentials,
    errors::{ErrorKind, UpdaterError},
    installer::Installer,
    metrics,
    release::ReleaseSource,
};

/// Refreshes the GeoLite2 databases by installing geoipupdate and running it.
pub struct DatabaseUpdater<S> {
    installer: Installer<S>,
    log: slog::Logger,
    metrics: Arc<StatsdClient>,
}

impl<S: ReleaseSource> DatabaseUpdater<S> {
    pub fn new(installer: Installer<S>, log: slog::Logger) -> Self {
        Self {
            installer,
            log,
            metrics: metrics::nop_client(),
        }
    }

    pub fn metrics(mut self, metrics: Arc<StatsdClient>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Run a full refresh with credentials from the process environment.
    pub async fn update_database(&self) -> Result<(), UpdaterError> {
        self.update_database_with(std::env::vars()).await
    }

    /// Run a full refresh, reading credentials from `vars`.
    pub async fn update_database_with<I>(&self, vars: I) -> Result<(), UpdaterError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let started = Instant::now();
        let result = self.run(vars).await;
        self.metrics
            .incr_with_tags("update")
            .with_tag("status", if result.is_ok() { "success" } else { "error" })
            .send();
        self.metrics
            .time_with_tags("update.duration", started.elapsed())
            .send();
        result
    }

    async fn run<I>(&self, vars: I) -> Result<(), UpdaterError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let executable = self.installer.install_executable().await?;
        let credentials = Credentials::from_vars(vars)?;

        let data_dir = self.installer.data_dir();
        let config_path = data_dir.config_path();
        credentials.write_config(&config_path).await?;
        slog::debug!(self.log, "Wrote geoipupdate config"; "path" => %config_path.display());

        run_geoipupdate(&executable, &config_path, data_dir.path(), num_cpus::get(), &self.log)
            .await
    }
}

/// Run geoipupdate to completion. Only exit status 0 counts as success.
pub async fn run_geoipupdate(
    executable: &Path,
    config_path: &Path,
    database_dir: &Path,
    parallelism: usize,
    log: &slog::Logger,
) -> Result<(), UpdaterError> {
    slog::info!(log, "Running geoipupdate";
                "executable" => %executable.display(), "parallelism" => parallelism);

    let status = Command::new(executable)
        .arg("--config-file")
        .arg(config_path)
        .arg("--database-directory")
        .arg(database_dir)
        .arg("--parallelism")
        .arg(parallelism.to_string())
        .arg("--verbose")
        .status()
        .await
        .map_err(|err| {
            UpdaterError::from_source(
                ErrorKind::UpdaterProcessFailed,
                format!("Could not start {}", executable.display()),
                err,
            )
        })?;

    if status.success() {
        slog::info!(log, "geoipupdate finished");
        return Ok(());
    }
    let code = match status.code() {
        Some(code) => code.to_string(),
        None => "none (killed by signal)".to_owned(),
    };
    Err(UpdaterError::new(
        ErrorKind::UpdaterProcessFailed,
        format!("geoipupdate exited with code {}", code),
    ))
}

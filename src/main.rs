#![deny(clippy::all)]

//! Keeps a local copy of the MaxMind GeoLite2 databases up to date and
//! answers IP to city lookups against it.

use clap::{Parser, Subcommand};
use std::{process::ExitCode, sync::Arc};

use crate::{
    data_dir::DataDirectory,
    errors::UpdaterError,
    geoip::GeoIpLookup,
    installer::Installer,
    logging::MozLogger,
    platform::{resolve_platform_suffix, PlatformSuffix},
    release::HttpReleaseSource,
    settings::Settings,
    updater::DatabaseUpdater,
};

mod archive;
mod credentials;
mod data_dir;
mod errors;
mod geoip;
mod installer;
mod logging;
mod metrics;
mod platform;
mod release;
mod settings;
mod updater;

const APP_NAME: &str = "geoip-updater";

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Release platform to install, e.g. `linux_arm64`. Defaults to this host.
    #[arg(long, global = true)]
    platform: Option<PlatformSuffix>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Install geoipupdate and refresh the databases (the default).
    Update,
    /// Install geoipupdate into the data directory and print its path.
    Install,
    /// Print the location record for an IP address as JSON.
    Lookup { ip: String },
    /// Print the release platform suffix for this host.
    Platform,
    /// Print the URL of the release archive that would be installed.
    Resolve,
}

#[actix_rt::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("Could not load settings: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let _sentry = settings.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let app_log = MozLogger::from_settings(&settings);

    // Returning, rather than exiting, lets the log drain and the Sentry
    // transport flush when their guards drop.
    let result = run(cli, &settings, &app_log.log).await;
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_failure(&err, &app_log.log),
    }
}

fn report_failure(err: &UpdaterError, log: &slog::Logger) -> ExitCode {
    slog::error!(log, "{}", err.message(); "kind" => format!("{:?}", err.kind()));
    sentry::capture_error(err);
    eprintln!("{}", err);
    ExitCode::FAILURE
}

async fn run(cli: Cli, settings: &Settings, log: &slog::Logger) -> Result<(), UpdaterError> {
    let metrics = Arc::new(metrics::get_client(
        settings.statsd_host.as_deref(),
        log.clone(),
    )?);
    let data_dir = DataDirectory::new(&settings.data_dir);
    let platform = match cli.platform {
        Some(platform) => Some(platform),
        None => settings
            .platform_suffix
            .as_deref()
            .map(str::parse)
            .transpose()?,
    };
    let installer = || -> Result<_, UpdaterError> {
        Ok(Installer::new(
            HttpReleaseSource::new(settings.release_index_url.as_str())?,
            data_dir.clone(),
            log.clone(),
        )
        .platform(platform.clone())
        .metrics(metrics.clone()))
    };

    match cli.command.unwrap_or(Command::Update) {
        Command::Update => {
            DatabaseUpdater::new(installer()?, log.clone())
                .metrics(metrics.clone())
                .update_database()
                .await
        }
        Command::Install => {
            let path = installer()?.install_executable().await?;
            println!("{}", path.display());
            Ok(())
        }
        Command::Lookup { ip } => {
            let lookup = GeoIpLookup::builder()
                .data_dir(data_dir.clone())
                .metrics(metrics.clone())
                .build();
            let record = lookup.ip_to_city(&ip)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&record).map_err(|err| {
                    UpdaterError::from_source(errors::ErrorKind::LookupFailed, "Serialize", err)
                })?
            );
            Ok(())
        }
        Command::Platform => {
            let suffix = match platform.clone() {
                Some(suffix) => suffix,
                None => resolve_platform_suffix()?,
            };
            println!("{}", suffix);
            Ok(())
        }
        Command::Resolve => {
            let url = installer()?.resolve_archive().await?;
            println!("{}", url);
            Ok(())
        }
    }
}

use std::io;

use slog::{self, Drain};
use slog_mozlog_json::MozLogJson;

use crate::settings::Settings;

#[derive(Clone, Debug)]
pub struct MozLogger {
    pub log: slog::Logger,
}

impl MozLogger {
    pub fn from_settings(settings: &Settings) -> Self {
        if settings.human_logs {
            Self::new_human()
        } else {
            Self::new_json("geoip-updater:log")
        }
    }

    pub fn new_json(msg_type: &str) -> Self {
        let json_drain = MozLogJson::new(io::stderr())
            .logger_name(format!(
                "{}-{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .msg_type(msg_type.to_string())
            .build()
            .fuse();
        let drain = slog_async::Async::new(json_drain).build().fuse();
        Self {
            log: slog::Logger::root(drain, slog::o!()).new(slog::o!()),
        }
    }

    pub fn new_human() -> Self {
        let decorator = slog_term::TermDecorator::new().stderr().build();
        let drain = slog_term::CompactFormat::new(decorator).build().fuse();
        let drain = slog_async::Async::new(drain).build().fuse();

        Self {
            log: slog::Logger::root(drain, slog::o!()).new(slog::o!()),
        }
    }
}

impl Default for MozLogger {
    fn default() -> Self {
        Self {
            log: slog::Logger::root(slog::Discard, slog::o!()).new(slog::o!()),
        }
    }
}

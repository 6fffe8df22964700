use crate::{errors::UpdaterError, APP_NAME};
use cadence::{BufferedUdpMetricSink, NopMetricSink, QueuingMetricSink, StatsdClient};
use std::{net::UdpSocket, sync::Arc};

/// Build a StatsD client for `metrics_target`, or a client that discards
/// everything when no target is configured.
pub fn get_client(
    metrics_target: Option<&str>,
    log: slog::Logger,
) -> Result<StatsdClient, UpdaterError> {
    let builder = match metrics_target {
        Some(target) => {
            // Bind a socket to any/all interfaces (0.0.0.0) and an arbitrary
            // port, chosen by the OS (indicated by port 0). This port is used
            // only to send metrics data, and isn't used to receive anything.
            let socket = UdpSocket::bind("0.0.0.0:0")?;
            socket.set_nonblocking(true)?;
            match BufferedUdpMetricSink::from(target, socket) {
                Ok(udp_sink) => {
                    let sink = QueuingMetricSink::from(udp_sink);
                    StatsdClient::builder(APP_NAME, sink)
                }
                Err(err) => {
                    slog::error!(
                        log,
                        "Could not connect to metrics host on {}: {}",
                        target,
                        err,
                    );
                    StatsdClient::builder(APP_NAME, NopMetricSink)
                }
            }
        }
        None => StatsdClient::builder(APP_NAME, NopMetricSink),
    };
    Ok(builder
        .with_error_handler(move |error| slog::error!(log, "Could not send metric: {}", error))
        .build())
}

pub fn nop_client() -> Arc<StatsdClient> {
    Arc::new(StatsdClient::from_sink(APP_NAME, NopMetricSink))
}

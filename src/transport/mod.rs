//! Transports carrying raw request text to the [`Engine`](crate::rpc::Engine).
//!
//! - [`socket`]: Unix domain socket, one request per connection, peer
//!   credentials gate restricted handlers
//! - [`stdio`]: newline-delimited requests on stdin, for local debugging
//!
//! Both run until their input ends or the shutdown future passed to them
//! completes; [`shutdown_signal`] is the one the binary uses.

pub mod socket;
pub mod stdio;

pub use socket::{IpcSocketServer, LockFile};
pub use stdio::{LineTransport, StdioTransport};

/// Completes on SIGINT or SIGTERM.
///
/// If the handlers cannot be installed the failure is logged and the future
/// never completes; the transport then runs until its input ends.
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigint, mut sigterm) =
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "Failed to install signal handlers");
                return std::future::pending().await;
            }
        };

    tokio::select! {
        _ = sigint.recv() => tracing::info!("Received SIGINT, initiating graceful shutdown"),
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

//! Shutdown signalling for the HTTP listener
//!
//! The OS signal is observed once in the lifecycle; the listener only sees
//! a `ShutdownSignal`, so tests can stop a server without sending signals.

use tokio::sync::watch;
use tracing::info;

/// Receiving half, handed to the server's graceful-shutdown future
#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolve once shutdown is requested or the controller is gone
    pub async fn wait(&mut self) {
        while !*self.receiver.borrow() {
            if self.receiver.changed().await.is_err() {
                break;
            }
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }
}

pub struct ShutdownController {
    sender: watch::Sender<bool>,
}

impl ShutdownController {
    /// Stop accepting connections; in-flight requests keep running
    pub fn shutdown(&self) {
        let _ = self.sender.send(true);
        info!("Listener shutdown requested");
    }
}

pub fn shutdown_channel() -> (ShutdownController, ShutdownSignal) {
    let (sender, receiver) = watch::channel(false);
    (ShutdownController { sender }, ShutdownSignal { receiver })
}

/// Wait for SIGTERM or SIGINT
///
/// Returns the name of the signal received, or an error if the handlers
/// cannot be registered.
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    info!(signal = name, "Received signal");
    Ok(name)
}

/// Wait for Ctrl+C (non-unix)
#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C");
    Ok("CTRL_C")
}

// Unix signal handling for graceful shutdown
// Captures SIGTERM and SIGINT so the in-flight reconciliation pass can
// finish before the engine stops issuing scale intents

use anyhow::Result;
use futures::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use tracing::{debug, info};

/// Human-readable name of a handled shutdown signal
pub fn signal_name(signal: i32) -> &'static str {
    match signal {
        SIGTERM => "SIGTERM",
        SIGINT => "SIGINT",
        _ => "signal",
    }
}

/// Create a future that resolves with the shutdown signal received.
/// Handlers are installed immediately, before the future is awaited, so a
/// signal arriving during startup is not lost.
pub fn create_shutdown_listener() -> Result<impl std::future::Future<Output = i32>> {
    let signals = Signals::new([SIGTERM, SIGINT])?;

    Ok(async move {
        let mut signals = signals;

        while let Some(signal) = signals.next().await {
            match signal {
                SIGTERM | SIGINT => {
                    info!(signal = signal_name(signal), "Shutdown signal received");
                    return signal;
                }
                other => {
                    debug!(signal = other, "Ignoring unexpected signal");
                }
            }
        }
        SIGTERM
    })
}

/// Fan-out channel notifying subsystems of an impending shutdown so each
/// can finish its current work
pub struct ShutdownCoordinator {
    tx: tokio::sync::broadcast::Sender<()>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(16);
        Self { tx }
    }

    /// Subscribe to shutdown notifications
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Notify every subscriber that shutdown has begun
    pub fn trigger(&self) {
        let _ = self.tx.send(());
        info!("Shutdown broadcast to all subsystems");
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

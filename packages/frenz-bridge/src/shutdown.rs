// Cooperative shutdown.
//
// The bridge uses one `CancellationToken` for the whole process. It is
// cancelled by the control listener, by OS termination signals, or by the
// controller itself, and is never reset. Long waits go through
// `sleep_or_cancel` so they observe cancellation promptly.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Sleep for `duration` unless the token is cancelled first.
///
/// Returns `true` when the wait ended because of cancellation.
pub async fn sleep_or_cancel(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => true,
        _ = tokio::time::sleep(duration) => token.is_cancelled(),
    }
}

/// Translate SIGINT/SIGTERM (Ctrl-C on non-Unix hosts) into a stop request.
///
/// Handlers are registered before this returns, so a signal delivered at any
/// later point is observed. Must be called from within the runtime.
pub fn spawn_signal_listener(token: CancellationToken) -> JoinHandle<()> {
    let signals = TerminationSignals::install();

    tokio::spawn(async move {
        let mut signals = match signals {
            Ok(signals) => signals,
            Err(e) => {
                log::warn!("Failed to install signal handlers: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = token.cancelled() => {}
            signal = signals.recv() => {
                log::info!("Received {}, initiating graceful shutdown", signal);
                token.cancel();
            }
        }
    })
}

#[cfg(unix)]
struct TerminationSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl TerminationSignals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

#[cfg(not(unix))]
struct TerminationSignals;

#[cfg(not(unix))]
impl TerminationSignals {
    fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "Ctrl-C",
            Err(e) => {
                log::warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending().await
            }
        }
    }
}

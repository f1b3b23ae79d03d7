// Device session lifecycle
//
// The device SDK is opaque to the bridge: it is started, polled for the rows
// accumulated since the previous poll, asked whether primary data has arrived,
// and stopped. New backends are added by:
// 1. Implementing `DeviceSession` for the connection itself
// 2. Implementing `SessionBackend` to construct it
// 3. Exposing it from the command line
//
// Current implementations:
// - Simulated: synthetic FRENZ-shaped data at nominal rates
// - Replay: recorded snapshots read from a JSON-lines file

mod replay;
mod simulated;

use crate::error::SessionResult;
use crate::shutdown::sleep_or_cancel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub use replay::ReplayBackend;
pub use simulated::SimulatedBackend;

/// Section key that carries the primary raw channel.
pub const PRIMARY_CHANNEL: &str = "EEG";

/// Rows per signal name, e.g. `"EEG" -> [[f32; 7], ...]`.
pub type SignalSection = BTreeMap<String, Vec<Vec<f32>>>;

/// Scores keyed by metric name; values are whatever the device reports.
pub type ScoreSection = serde_json::Map<String, serde_json::Value>;

/// Everything produced by the device since the previous poll.
///
/// Each section is optional: a device that has not computed scores yet, or a
/// firmware without filtered output, simply leaves the section out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<SignalSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtered: Option<SignalSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<ScoreSection>,
}

impl DataSnapshot {
    /// True when the raw section holds at least one primary channel row.
    pub fn has_primary_rows(&self) -> bool {
        self.raw
            .as_ref()
            .and_then(|raw| raw.get(PRIMARY_CHANNEL))
            .is_some_and(|rows| !rows.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_none() && self.filtered.is_none() && self.scores.is_none()
    }
}

/// Parameters handed to a backend when opening a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub device_id: String,
    pub product_key: String,
    /// Process-local scratch directory, removed when the bridge exits.
    pub data_dir: PathBuf,
}

/// A connection to one device.
pub trait DeviceSession: Send {
    /// Connect and begin data flow. May block for as long as the device needs.
    fn start(&mut self) -> SessionResult<()>;

    /// True once at least one row of the primary raw channel exists.
    fn primary_data_ready(&self) -> bool;

    /// Take the rows and scores produced since the previous poll.
    fn poll(&mut self) -> SessionResult<DataSnapshot>;

    fn stop(&mut self) -> SessionResult<()>;
}

/// Constructs sessions of one kind.
pub trait SessionBackend: Send + Sync {
    /// Short backend name reported while bootstrapping.
    fn name(&self) -> &'static str;

    /// Report whether everything the backend depends on is present.
    fn check_available(&self) -> SessionResult<()> {
        Ok(())
    }

    fn open(&self, config: &SessionConfig) -> SessionResult<Box<dyn DeviceSession>>;
}

/// Lifecycle phase of the device session, used for logging transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Connecting,
    AwaitingData,
    Streaming,
    Stopped,
    Error,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Connecting => "connecting",
            SessionPhase::AwaitingData => "awaiting_data",
            SessionPhase::Streaming => "streaming",
            SessionPhase::Stopped => "stopped",
            SessionPhase::Error => "error",
        };
        f.write_str(name)
    }
}

/// Owns a session and stops it exactly once, on `release` or on drop.
///
/// Stop failures are logged and never propagated.
pub struct SessionGuard {
    session: Box<dyn DeviceSession>,
    released: bool,
}

impl SessionGuard {
    pub fn new(session: Box<dyn DeviceSession>) -> Self {
        Self {
            session,
            released: false,
        }
    }

    pub fn session_mut(&mut self) -> &mut dyn DeviceSession {
        self.session.as_mut()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match self.session.stop() {
            Ok(()) => log::info!("Device session stopped"),
            Err(e) => log::warn!("Ignoring error while stopping device session: {}", e),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Outcome of waiting for the first primary rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataWait {
    Ready,
    TimedOut,
    Cancelled,
}

/// Poll `primary_data_ready` every `poll_interval` until data shows up, the
/// token is cancelled, or `timeout` has elapsed since entry.
pub async fn wait_for_initial_data(
    session: &mut dyn DeviceSession,
    token: &CancellationToken,
    timeout: Duration,
    poll_interval: Duration,
) -> DataWait {
    let started = Instant::now();

    loop {
        if token.is_cancelled() {
            return DataWait::Cancelled;
        }
        if session.primary_data_ready() {
            return DataWait::Ready;
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return DataWait::TimedOut;
        }

        if sleep_or_cancel(token, poll_interval.min(timeout - elapsed)).await {
            return DataWait::Cancelled;
        }
    }
}

/// Run a potentially blocking session call without stalling other tasks on
/// a multi-threaded runtime.
pub fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    use tokio::runtime::{Handle, RuntimeFlavor};

    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Probe {
        ready: AtomicBool,
        stops: AtomicUsize,
        fail_stop: AtomicBool,
    }

    struct ProbeSession(Arc<Probe>);

    impl DeviceSession for ProbeSession {
        fn start(&mut self) -> SessionResult<()> {
            Ok(())
        }

        fn primary_data_ready(&self) -> bool {
            self.0.ready.load(Ordering::SeqCst)
        }

        fn poll(&mut self) -> SessionResult<DataSnapshot> {
            Ok(DataSnapshot::default())
        }

        fn stop(&mut self) -> SessionResult<()> {
            self.0.stops.fetch_add(1, Ordering::SeqCst);
            if self.0.fail_stop.load(Ordering::SeqCst) {
                return Err(SessionError::Stop("device gone".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_guard_stops_once() {
        let probe = Arc::new(Probe::default());
        {
            let mut guard = SessionGuard::new(Box::new(ProbeSession(probe.clone())));
            guard.release();
            guard.release();
            assert!(guard.is_released());
        }
        assert_eq!(probe.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_stops_on_drop() {
        let probe = Arc::new(Probe::default());
        drop(SessionGuard::new(Box::new(ProbeSession(probe.clone()))));
        assert_eq!(probe.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_swallows_stop_error() {
        let probe = Arc::new(Probe::default());
        probe.fail_stop.store(true, Ordering::SeqCst);
        let mut guard = SessionGuard::new(Box::new(ProbeSession(probe.clone())));
        guard.release();
        assert_eq!(probe.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wait_ready() {
        let probe = Arc::new(Probe::default());
        probe.ready.store(true, Ordering::SeqCst);
        let mut session = ProbeSession(probe);
        let token = CancellationToken::new();
        let outcome = wait_for_initial_data(
            &mut session,
            &token,
            Duration::from_secs(5),
            Duration::from_millis(10),
        )
        .await;
        assert_eq!(outcome, DataWait::Ready);
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let mut session = ProbeSession(Arc::new(Probe::default()));
        let token = CancellationToken::new();
        let started = Instant::now();
        let outcome = wait_for_initial_data(
            &mut session,
            &token,
            Duration::from_millis(60),
            Duration::from_millis(10),
        )
        .await;
        assert_eq!(outcome, DataWait::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_wait_cancelled() {
        let mut session = ProbeSession(Arc::new(Probe::default()));
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });
        let outcome = wait_for_initial_data(
            &mut session,
            &token,
            Duration::from_secs(30),
            Duration::from_millis(500),
        )
        .await;
        assert_eq!(outcome, DataWait::Cancelled);
    }

    #[test]
    fn test_snapshot_primary_rows() {
        let mut snapshot = DataSnapshot::default();
        assert!(!snapshot.has_primary_rows());
        assert!(snapshot.is_empty());

        let mut raw = SignalSection::new();
        raw.insert("EEG".to_string(), vec![]);
        snapshot.raw = Some(raw);
        assert!(!snapshot.has_primary_rows());

        snapshot
            .raw
            .as_mut()
            .unwrap()
            .insert("EEG".to_string(), vec![vec![0.1; 7]]);
        assert!(snapshot.has_primary_rows());
    }

    #[test]
    fn test_snapshot_json_shape() {
        let snapshot: DataSnapshot = serde_json::from_str(
            r#"{"raw":{"EEG":[[1,2,3,4,5,6,7]]},"scores":{"posture":"upright"}}"#,
        )
        .unwrap();
        assert!(snapshot.has_primary_rows());
        assert!(snapshot.filtered.is_none());
        assert_eq!(snapshot.scores.unwrap()["posture"], "upright");
    }

    #[test]
    fn test_run_blocking_outside_runtime() {
        assert_eq!(run_blocking(|| 7), 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_blocking_multi_thread() {
        assert_eq!(run_blocking(|| 7), 7);
    }
}

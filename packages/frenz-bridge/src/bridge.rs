//! Bridge controller: drives one device session from configuration to shutdown.
//!
//! The controller owns the status channel, the session and the outlets. It
//! runs on the task that awaits [`Bridge::run`]; the only other core task is
//! the control listener, and the two share nothing but the shutdown token.

use crate::config::{BridgeConfig, BridgeSettings};
use crate::control::ControlChannel;
use crate::error::{Result, SessionError, SessionResult};
use crate::exit_codes;
use crate::extract::extract;
use crate::outlet::{catalog, OutletFactory, OutletRegistry};
use crate::session::{
    run_blocking, wait_for_initial_data, DataWait, DeviceSession, SessionBackend, SessionConfig,
    SessionGuard, SessionPhase,
};
use crate::shutdown::sleep_or_cancel;
use crate::status::{StatusEmitter, StatusMessage};
use std::io::Write;
use std::time::Instant;
use tempfile::TempDir;
use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;

const SCRATCH_DIR_PREFIX: &str = "frenz_bridge_";

pub struct Bridge<W: Write> {
    status: StatusEmitter<W>,
    backend: Box<dyn SessionBackend>,
    outlets: Box<dyn OutletFactory>,
    settings: BridgeSettings,
    token: CancellationToken,
    phase: SessionPhase,
}

impl<W: Write> Bridge<W> {
    pub fn new(
        status: StatusEmitter<W>,
        backend: Box<dyn SessionBackend>,
        outlets: Box<dyn OutletFactory>,
        settings: BridgeSettings,
        token: CancellationToken,
    ) -> Self {
        Self {
            status,
            backend,
            outlets,
            settings: settings.normalized(),
            token,
            phase: SessionPhase::Idle,
        }
    }

    /// Run the full lifecycle and return the process exit code.
    ///
    /// The token is cancelled before returning so auxiliary tasks wind down.
    pub async fn run<R>(mut self, mut control: ControlChannel<R>) -> i32
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        self.status.emit(&StatusMessage::WaitingForConfig);

        let read = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            read = control.read_config() => Some(read),
        };

        let config = match read {
            Some(Ok(config)) => config,
            Some(Err(e)) => return self.fail(e.to_string(), exit_codes::CONFIG_ERROR),
            None => {
                log::info!("Shutdown requested before configuration was received");
                self.enter(SessionPhase::Stopped);
                self.status.emit(&StatusMessage::Stopped);
                return exit_codes::SUCCESS;
            }
        };
        log::info!("Configuration received for device {}", config.device_id);

        let _listener = control.spawn_stop_listener(self.token.clone());

        let code = self.run_session(&config).await;
        self.token.cancel();
        code
    }

    async fn run_session(&mut self, config: &BridgeConfig) -> i32 {
        self.status.emit(&StatusMessage::bootstrapping(
            "loading_backend",
            Some(self.backend.name()),
        ));

        if let Err(e) = self.backend.check_available() {
            return self.fail(e.to_string(), exit_codes::BACKEND_UNAVAILABLE);
        }
        if let Err(e) = self.outlets.check_available() {
            return self.fail(e.to_string(), exit_codes::BACKEND_UNAVAILABLE);
        }

        if self.token.is_cancelled() {
            log::info!("Shutdown requested before connecting");
            self.enter(SessionPhase::Stopped);
            self.status.emit(&StatusMessage::Stopped);
            return exit_codes::SUCCESS;
        }

        self.enter(SessionPhase::Connecting);
        self.status
            .emit(&StatusMessage::connecting(&config.device_id, None));

        // Lives until the session is released at the end of this function.
        let scratch = match tempfile::Builder::new()
            .prefix(SCRATCH_DIR_PREFIX)
            .tempdir()
        {
            Ok(dir) => dir,
            Err(e) => {
                let e = SessionError::Create(format!("scratch directory: {}", e));
                return self.fail(e.to_string(), exit_codes::SESSION_ERROR);
            }
        };

        let session = match self.open_session(config, &scratch) {
            Ok(session) => session,
            Err(e) => return self.fail(e.to_string(), exit_codes::SESSION_ERROR),
        };
        let mut guard = SessionGuard::new(session);

        if self.token.is_cancelled() {
            return self.finish(&mut guard, exit_codes::SUCCESS);
        }

        let started = run_blocking(|| guard.session_mut().start());
        if let Err(e) = started {
            let e = match e {
                SessionError::Start(_) => e,
                other => SessionError::Start(other.to_string()),
            };
            return self.abort(&mut guard, e.to_string(), exit_codes::SESSION_ERROR);
        }

        self.enter(SessionPhase::AwaitingData);
        self.status.emit(&StatusMessage::connecting(
            &config.device_id,
            Some("waiting_for_data"),
        ));

        match wait_for_initial_data(
            guard.session_mut(),
            &self.token,
            self.settings.data_timeout,
            self.settings.data_poll_interval,
        )
        .await
        {
            DataWait::Ready => log::info!("Primary data available"),
            DataWait::TimedOut => log::warn!(
                "No primary data after {:?}, creating outlets anyway",
                self.settings.data_timeout
            ),
            DataWait::Cancelled => {
                log::info!("Shutdown requested while waiting for data");
                return self.finish(&mut guard, exit_codes::SUCCESS);
            }
        }

        self.status
            .emit(&StatusMessage::bootstrapping("creating_outlets", None));
        let mut registry =
            match OutletRegistry::create(catalog(&config.device_id), self.outlets.as_ref()) {
                Ok(registry) => registry,
                Err(e) => {
                    return self.abort(
                        &mut guard,
                        format!("Failed to create outlets: {}", e),
                        exit_codes::OUTLET_ERROR,
                    )
                }
            };

        self.stream(guard.session_mut(), &mut registry).await;

        let code = self.finish(&mut guard, exit_codes::SUCCESS);
        drop(registry);
        if let Err(e) = scratch.close() {
            log::debug!("Failed to remove scratch directory: {}", e);
        }
        code
    }

    fn open_session(
        &self,
        config: &BridgeConfig,
        scratch: &TempDir,
    ) -> SessionResult<Box<dyn DeviceSession>> {
        let session_config = SessionConfig {
            device_id: config.device_id.clone(),
            product_key: config.product_key.clone(),
            data_dir: scratch.path().to_path_buf(),
        };

        self.backend
            .open(&session_config)
            .map_err(|e| match e {
                SessionError::Create(_) => e,
                other => SessionError::Create(other.to_string()),
            })
    }

    async fn stream(&mut self, session: &mut dyn DeviceSession, registry: &mut OutletRegistry) {
        let streams = registry.stream_keys();
        let mut sample_count: u64 = 0;

        self.enter(SessionPhase::Streaming);
        self.status.emit(&StatusMessage::Streaming {
            streams: streams.clone(),
            sample_count,
        });

        let mut last_status = Instant::now();

        while !self.token.is_cancelled() {
            match pump_once(session, registry) {
                Ok(pushed) => {
                    sample_count += 1;
                    if pushed > 0 {
                        log::trace!("Iteration {}: pushed {} samples", sample_count, pushed);
                    }
                }
                Err(e) => {
                    log::warn!("Streaming iteration failed: {}", e);
                    self.status
                        .emit(&StatusMessage::error(format!("Push error: {}", e)));
                }
            }

            if last_status.elapsed() >= self.settings.heartbeat_interval {
                self.status.emit(&StatusMessage::Streaming {
                    streams: streams.clone(),
                    sample_count,
                });
                last_status = Instant::now();
            }

            if sleep_or_cancel(&self.token, self.settings.poll_interval).await {
                break;
            }
        }

        log::info!("Streaming stopped after {} iterations", sample_count);
    }

    fn enter(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            log::debug!("Session phase {} -> {}", self.phase, phase);
            self.phase = phase;
        }
    }

    /// Fatal error before a session exists.
    fn fail(&mut self, message: String, code: i32) -> i32 {
        log::error!("{}", message);
        self.enter(SessionPhase::Error);
        self.status.emit(&StatusMessage::error(message));
        self.token.cancel();
        code
    }

    /// Fatal error with a live session: report, then unwind through `finish`.
    fn abort(&mut self, guard: &mut SessionGuard, message: String, code: i32) -> i32 {
        log::error!("{}", message);
        self.enter(SessionPhase::Error);
        self.status.emit(&StatusMessage::error(message));
        self.token.cancel();
        self.finish(guard, code)
    }

    fn finish(&mut self, guard: &mut SessionGuard, code: i32) -> i32 {
        guard.release();
        self.enter(SessionPhase::Stopped);
        self.status.emit(&StatusMessage::Stopped);
        code
    }
}

/// One streaming iteration: poll the session and push every extracted sample.
///
/// Returns the number of samples delivered to an outlet. The first failure
/// aborts the iteration; samples pushed before it are not rolled back.
pub fn pump_once(session: &mut dyn DeviceSession, registry: &mut OutletRegistry) -> Result<usize> {
    let snapshot = session.poll()?;

    let mut pushed = 0;
    for item in extract(&snapshot) {
        if registry.push(item.key, &item.sample)? {
            pushed += 1;
        }
    }

    Ok(pushed)
}

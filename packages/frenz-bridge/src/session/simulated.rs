// Simulated FRENZ session
//
// Generates data shaped like a real brainband session so the bridge can be run
// end to end without hardware:
// - raw EEG/PPG/IMU and filtered EEG/EOG/EMG rows at their nominal rates
// - a scores update (metrics, posture, spectral bands) once per second
//
// Rows are produced lazily on each poll from the elapsed time, so pacing
// follows the wall clock regardless of how often the bridge polls.

use super::{
    DataSnapshot, DeviceSession, ScoreSection, SessionBackend, SessionConfig, SignalSection,
};
use crate::error::{SessionError, SessionResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::f32::consts::TAU;
use std::time::{Duration, Instant};

const SCORE_INTERVAL: Duration = Duration::from_secs(1);
/// Upper bound on rows generated per signal per poll, roughly one second of EEG.
const MAX_ROWS_PER_POLL: u64 = 125;
const POSTURES: [&str; 3] = ["upright", "slouched", "lying"];

#[derive(Debug, Clone, Copy)]
struct SignalShape {
    name: &'static str,
    channels: usize,
    rate_hz: f64,
    amplitude: f32,
    frequency_hz: f32,
}

const RAW_SIGNALS: [SignalShape; 3] = [
    SignalShape { name: "EEG", channels: 7, rate_hz: 125.0, amplitude: 20.0, frequency_hz: 10.0 },
    SignalShape { name: "PPG", channels: 4, rate_hz: 25.0, amplitude: 500.0, frequency_hz: 1.2 },
    SignalShape { name: "IMU", channels: 4, rate_hz: 50.0, amplitude: 1.0, frequency_hz: 0.3 },
];

const FILTERED_SIGNALS: [SignalShape; 3] = [
    SignalShape { name: "EEG", channels: 7, rate_hz: 125.0, amplitude: 10.0, frequency_hz: 10.0 },
    SignalShape { name: "EOG", channels: 2, rate_hz: 125.0, amplitude: 50.0, frequency_hz: 0.5 },
    SignalShape { name: "EMG", channels: 2, rate_hz: 125.0, amplitude: 5.0, frequency_hz: 40.0 },
];

/// Backend producing `SimulatedSession`s.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBackend {
    /// Delay between `start` and the first rows, mimicking BLE connection time.
    pub connect_delay: Duration,
}

impl SimulatedBackend {
    pub fn new(connect_delay: Duration) -> Self {
        Self { connect_delay }
    }
}

impl SessionBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn open(&self, config: &SessionConfig) -> SessionResult<Box<dyn DeviceSession>> {
        log::info!(
            "Opening simulated session for {} (data folder {})",
            config.device_id,
            config.data_dir.display()
        );
        Ok(Box::new(SimulatedSession::new(self.connect_delay)))
    }
}

/// Per-signal generator state: how many rows have been handed out so far.
#[derive(Debug, Clone, Copy)]
struct SignalCursor {
    shape: SignalShape,
    emitted: u64,
}

impl SignalCursor {
    fn new(shape: SignalShape) -> Self {
        Self { shape, emitted: 0 }
    }
}

pub struct SimulatedSession {
    connect_delay: Duration,
    started_at: Option<Instant>,
    raw: Vec<SignalCursor>,
    filtered: Vec<SignalCursor>,
    scores_emitted: u64,
    rng: StdRng,
}

impl SimulatedSession {
    pub fn new(connect_delay: Duration) -> Self {
        Self {
            connect_delay,
            started_at: None,
            raw: RAW_SIGNALS.iter().copied().map(SignalCursor::new).collect(),
            filtered: FILTERED_SIGNALS.iter().copied().map(SignalCursor::new).collect(),
            scores_emitted: 0,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Time since data started flowing, `None` while still "connecting".
    fn streaming_for(&self) -> Option<Duration> {
        let started_at = self.started_at?;
        started_at.elapsed().checked_sub(self.connect_delay)
    }

    fn generate_section(
        cursors: &mut [SignalCursor],
        elapsed: Duration,
        rng: &mut StdRng,
    ) -> SignalSection {
        let mut section = SignalSection::new();

        for cursor in cursors.iter_mut() {
            let shape = cursor.shape;
            let due = (elapsed.as_secs_f64() * shape.rate_hz).floor() as u64;
            let pending = due.saturating_sub(cursor.emitted);
            if pending == 0 {
                continue;
            }

            // After a stall, skip ahead instead of flooding the outlets.
            let count = pending.min(MAX_ROWS_PER_POLL);
            let first = due - count;

            let rows = (first..due)
                .map(|index| {
                    let t = index as f64 / shape.rate_hz;
                    (0..shape.channels)
                        .map(|channel| {
                            let phase = channel as f32 * 0.7;
                            let wave = (TAU * shape.frequency_hz * t as f32 + phase).sin();
                            shape.amplitude * wave
                                + rng.random_range(-0.05f32..0.05) * shape.amplitude
                        })
                        .collect()
                })
                .collect();

            cursor.emitted = due;
            section.insert(shape.name.to_string(), rows);
        }

        section
    }

    fn generate_scores(&mut self) -> ScoreSection {
        let rng = &mut self.rng;
        let band = |rng: &mut StdRng, base: f64| -> Value {
            Value::from(
                (0..5)
                    .map(|_| base + rng.random_range(-0.05f64..0.05))
                    .collect::<Vec<f64>>(),
            )
        };

        let scores = json!({
            "focus_score": rng.random_range(0.0..100.0),
            "sleep_stage": rng.random_range(0..5),
            "poas": rng.random_range(0.0..1.0),
            "sqc_scores": rng.random_range(0.0..1.0),
            "posture": POSTURES[rng.random_range(0..POSTURES.len())],
            "alpha": band(rng, 0.30),
            "beta": band(rng, 0.20),
            "theta": band(rng, 0.20),
            "gamma": band(rng, 0.10),
            "delta": band(rng, 0.20),
        });

        match scores {
            Value::Object(map) => map,
            _ => ScoreSection::new(),
        }
    }
}

impl DeviceSession for SimulatedSession {
    fn start(&mut self) -> SessionResult<()> {
        if self.started_at.is_some() {
            return Err(SessionError::Start("session already started".to_string()));
        }
        self.started_at = Some(Instant::now());
        log::info!(
            "Simulated session started (data after {} ms)",
            self.connect_delay.as_millis()
        );
        Ok(())
    }

    fn primary_data_ready(&self) -> bool {
        self.streaming_for()
            .is_some_and(|elapsed| elapsed.as_secs_f64() * RAW_SIGNALS[0].rate_hz >= 1.0)
    }

    fn poll(&mut self) -> SessionResult<DataSnapshot> {
        let Some(elapsed) = self.streaming_for() else {
            return Ok(DataSnapshot::default());
        };

        let raw = Self::generate_section(&mut self.raw, elapsed, &mut self.rng);
        let filtered = Self::generate_section(&mut self.filtered, elapsed, &mut self.rng);

        let due_scores = (elapsed.as_secs_f64() / SCORE_INTERVAL.as_secs_f64()).floor() as u64;
        let scores = if due_scores > self.scores_emitted {
            self.scores_emitted = due_scores;
            Some(self.generate_scores())
        } else {
            None
        };

        Ok(DataSnapshot {
            raw: (!raw.is_empty()).then_some(raw),
            filtered: (!filtered.is_empty()).then_some(filtered),
            scores,
        })
    }

    fn stop(&mut self) -> SessionResult<()> {
        if self.started_at.take().is_some() {
            log::info!("Simulated session stopped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_data_before_start() {
        let mut session = SimulatedSession::new(Duration::ZERO);
        assert!(!session.primary_data_ready());
        assert!(session.poll().unwrap().is_empty());
    }

    #[test]
    fn test_rows_have_declared_widths() {
        let mut session = SimulatedSession::new(Duration::ZERO);
        session.start().unwrap();
        std::thread::sleep(Duration::from_millis(120));

        assert!(session.primary_data_ready());
        let snapshot = session.poll().unwrap();
        let raw = snapshot.raw.unwrap();
        assert!(raw["EEG"].iter().all(|row| row.len() == 7));
        assert!(!raw["EEG"].is_empty());
        if let Some(ppg) = raw.get("PPG") {
            assert!(ppg.iter().all(|row| row.len() == 4));
        }

        let filtered = snapshot.filtered.unwrap();
        assert!(filtered["EOG"].iter().all(|row| row.len() == 2));
        assert!(filtered["EMG"].iter().all(|row| row.len() == 2));
    }

    #[test]
    fn test_rows_are_not_repeated() {
        let mut session = SimulatedSession::new(Duration::ZERO);
        session.start().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        let first = session.poll().unwrap();
        let second = session.poll().unwrap();

        let first_rows = first.raw.map(|raw| raw["EEG"].len()).unwrap_or(0);
        let second_rows = second
            .raw
            .and_then(|raw| raw.get("EEG").map(Vec::len))
            .unwrap_or(0);
        assert!(first_rows > 0);
        assert!(second_rows <= 2);
    }

    #[test]
    fn test_connect_delay_holds_back_data() {
        let mut session = SimulatedSession::new(Duration::from_secs(60));
        session.start().unwrap();
        assert!(!session.primary_data_ready());
        assert!(session.poll().unwrap().is_empty());
    }

    #[test]
    fn test_scores_shape() {
        let mut session = SimulatedSession::new(Duration::ZERO);
        let scores = session.generate_scores();
        assert!(scores["focus_score"].is_number());
        assert!(scores["posture"].is_string());
        assert_eq!(scores["alpha"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_double_start_rejected() {
        let mut session = SimulatedSession::new(Duration::ZERO);
        session.start().unwrap();
        assert!(session.start().is_err());
        session.stop().unwrap();
        session.stop().unwrap();
    }
}

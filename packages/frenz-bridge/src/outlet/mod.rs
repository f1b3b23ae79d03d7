// Output streams published by the bridge.
//
// The catalog is fixed: every FRENZ session exposes the same set of streams,
// named after the device. Sinks are pluggable through `OutletFactory`:
// - LSL: Lab Streaming Layer outlets (feature `lsl-support`)
// - Discard: accepts and counts samples, for dry runs without LSL

mod discard;
#[cfg(feature = "lsl-support")]
mod lsl;

use crate::error::{OutletError, OutletResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use discard::DiscardOutletFactory;
#[cfg(feature = "lsl-support")]
pub use lsl::LslOutletFactory;

pub const EEG_RAW: &str = "_EEG_raw";
pub const PPG_RAW: &str = "_PPG_raw";
pub const IMU_RAW: &str = "_IMU_raw";
pub const EEG_FILTERED: &str = "_EEG_filtered";
pub const EOG_FILTERED: &str = "_EOG_filtered";
pub const EMG_FILTERED: &str = "_EMG_filtered";
pub const FOCUS: &str = "_focus";
pub const SLEEP_STAGE: &str = "_sleep_stage";
pub const POAS: &str = "_poas";
pub const POSTURE: &str = "_POSTURE";
pub const SIGNAL_QUALITY: &str = "_signal_quality";
pub const ALPHA: &str = "_alpha";
pub const BETA: &str = "_beta";
pub const THETA: &str = "_theta";
pub const GAMMA: &str = "_gamma";
pub const DELTA: &str = "_delta";

/// Prefix of every outlet source id, keeps ids unique across bridges.
pub const SOURCE_ID_PREFIX: &str = "frenz-bridge-";

/// Semantic stream type advertised to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamType {
    EEG,
    PPG,
    IMU,
    EOG,
    EMG,
    Metrics,
    Markers,
    Quality,
}

impl StreamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::EEG => "EEG",
            StreamType::PPG => "PPG",
            StreamType::IMU => "IMU",
            StreamType::EOG => "EOG",
            StreamType::EMG => "EMG",
            StreamType::Metrics => "Metrics",
            StreamType::Markers => "Markers",
            StreamType::Quality => "Quality",
        }
    }
}

/// Placeholder used when the binary is built without `lsl-support`.
///
/// Reports itself unavailable so `--sink lsl` fails at startup instead of
/// silently dropping data.
#[cfg(not(feature = "lsl-support"))]
#[derive(Debug, Default)]
pub struct LslOutletFactory;

#[cfg(not(feature = "lsl-support"))]
impl LslOutletFactory {
    fn unavailable() -> OutletError {
        OutletError::Unavailable(
            "LSL support not compiled in (rebuild with --features lsl-support)".to_string(),
        )
    }
}

#[cfg(not(feature = "lsl-support"))]
impl OutletFactory for LslOutletFactory {
    fn name(&self) -> &'static str {
        "lsl"
    }

    fn check_available(&self) -> OutletResult<()> {
        Err(Self::unavailable())
    }

    fn create(&self, _spec: &OutletSpec) -> OutletResult<Box<dyn OutletSink>> {
        Err(Self::unavailable())
    }
}

/// Encoding of each channel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Float32,
    String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutletSpec {
    /// Suffix identifying the stream within one device (e.g. `_EEG_raw`).
    pub key: &'static str,
    /// `{device_id}{key}`
    pub name: String,
    /// `frenz-bridge-{device_id}{key}`
    pub source_id: String,
    pub stream_type: StreamType,
    pub channel_count: u32,
    /// Nominal sampling rate in Hz, 0 for irregular streams.
    pub nominal_rate_hz: f64,
    pub value_kind: ValueKind,
}

// (key, type, channels, rate, encoding)
const CATALOG: [(&str, StreamType, u32, f64, ValueKind); 16] = [
    // Raw physiological
    (EEG_RAW, StreamType::EEG, 7, 125.0, ValueKind::Float32),
    (PPG_RAW, StreamType::PPG, 4, 25.0, ValueKind::Float32),
    (IMU_RAW, StreamType::IMU, 4, 50.0, ValueKind::Float32),
    // Filtered physiological
    (EEG_FILTERED, StreamType::EEG, 7, 125.0, ValueKind::Float32),
    (EOG_FILTERED, StreamType::EOG, 2, 125.0, ValueKind::Float32),
    (EMG_FILTERED, StreamType::EMG, 2, 125.0, ValueKind::Float32),
    // Derived scores, irregular
    (FOCUS, StreamType::Metrics, 1, 0.0, ValueKind::Float32),
    (SLEEP_STAGE, StreamType::Metrics, 1, 0.0, ValueKind::Float32),
    (POAS, StreamType::Metrics, 1, 0.0, ValueKind::Float32),
    (POSTURE, StreamType::Markers, 1, 0.0, ValueKind::String),
    (SIGNAL_QUALITY, StreamType::Quality, 1, 0.0, ValueKind::Float32),
    // Spectral power, one value per electrode region
    (ALPHA, StreamType::EEG, 5, 0.0, ValueKind::Float32),
    (BETA, StreamType::EEG, 5, 0.0, ValueKind::Float32),
    (THETA, StreamType::EEG, 5, 0.0, ValueKind::Float32),
    (GAMMA, StreamType::EEG, 5, 0.0, ValueKind::Float32),
    (DELTA, StreamType::EEG, 5, 0.0, ValueKind::Float32),
];

/// Build the outlet specs for one device.
pub fn catalog(device_id: &str) -> Vec<OutletSpec> {
    CATALOG
        .iter()
        .map(
            |&(key, stream_type, channel_count, nominal_rate_hz, value_kind)| OutletSpec {
                key,
                name: format!("{}{}", device_id, key),
                source_id: format!("{}{}{}", SOURCE_ID_PREFIX, device_id, key),
                stream_type,
                channel_count,
                nominal_rate_hz,
                value_kind,
            },
        )
        .collect()
}

/// One row pushed to an outlet.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Float32(Vec<f32>),
    Text(Vec<String>),
}

impl Sample {
    pub fn len(&self) -> usize {
        match self {
            Sample::Float32(values) => values.len(),
            Sample::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A live output stream bound to one `OutletSpec`.
///
/// Not `Send`: LSL outlets must stay on the thread that created them, so the
/// registry lives on the controller task for its whole lifetime.
pub trait OutletSink {
    fn push(&mut self, sample: &Sample) -> OutletResult<()>;
}

/// Creates sinks for outlet specs.
pub trait OutletFactory: Send + Sync {
    /// Short backend name reported while bootstrapping.
    fn name(&self) -> &'static str;

    /// Report whether the backend can be used in this build/environment.
    fn check_available(&self) -> OutletResult<()> {
        Ok(())
    }

    fn create(&self, spec: &OutletSpec) -> OutletResult<Box<dyn OutletSink>>;
}

struct Outlet {
    spec: OutletSpec,
    sink: Box<dyn OutletSink>,
}

/// Owns every sink for the lifetime of the process.
///
/// Rows are routed by key and not re-validated against the declared
/// channel count; the extractor is responsible for producing well formed rows.
pub struct OutletRegistry {
    outlets: Vec<Outlet>,
    index: HashMap<&'static str, usize>,
}

impl OutletRegistry {
    /// Create a sink for every spec. Fails on the first sink that cannot be created.
    pub fn create(specs: Vec<OutletSpec>, factory: &dyn OutletFactory) -> OutletResult<Self> {
        let mut outlets = Vec::with_capacity(specs.len());
        let mut index = HashMap::with_capacity(specs.len());

        for spec in specs {
            if index.contains_key(spec.key) {
                return Err(OutletError::Create {
                    name: spec.name,
                    reason: "duplicate outlet key".to_string(),
                });
            }

            let sink = factory.create(&spec)?;
            log::debug!(
                "Created outlet {} ({}, {} ch @ {} Hz, source_id={})",
                spec.name,
                spec.stream_type.as_str(),
                spec.channel_count,
                spec.nominal_rate_hz,
                spec.source_id
            );
            index.insert(spec.key, outlets.len());
            outlets.push(Outlet { spec, sink });
        }

        log::info!(
            "Created {} outlets via {} backend",
            outlets.len(),
            factory.name()
        );

        Ok(Self { outlets, index })
    }

    /// Push one row to the outlet registered under `key`.
    ///
    /// Returns `Ok(false)` when no outlet has that key.
    pub fn push(&mut self, key: &str, sample: &Sample) -> OutletResult<bool> {
        let Some(&position) = self.index.get(key) else {
            log::trace!("No outlet for key {}, sample dropped", key);
            return Ok(false);
        };

        self.outlets[position].sink.push(sample)?;
        Ok(true)
    }

    /// Outlet keys in catalog order.
    pub fn stream_keys(&self) -> Vec<String> {
        self.outlets
            .iter()
            .map(|outlet| outlet.spec.key.to_string())
            .collect()
    }

    pub fn spec(&self, key: &str) -> Option<&OutletSpec> {
        self.index.get(key).map(|&position| &self.outlets[position].spec)
    }

    pub fn len(&self) -> usize {
        self.outlets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outlets.is_empty()
    }
}

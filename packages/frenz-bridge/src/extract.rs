//! Mapping from device snapshots to outlet samples.
//!
//! Each snapshot section is handled independently. Missing sections, missing
//! keys and empty row lists produce nothing; malformed score values are
//! dropped for that poll without raising an error.

use crate::outlet::{
    Sample, ALPHA, BETA, DELTA, EEG_FILTERED, EEG_RAW, EMG_FILTERED, EOG_FILTERED, FOCUS, GAMMA,
    IMU_RAW, POAS, POSTURE, PPG_RAW, SIGNAL_QUALITY, SLEEP_STAGE, THETA,
};
use crate::session::{DataSnapshot, ScoreSection, SignalSection};
use serde_json::Value;

/// Signal name in the raw section -> outlet key.
pub const RAW_STREAMS: [(&str, &str); 3] = [("EEG", EEG_RAW), ("PPG", PPG_RAW), ("IMU", IMU_RAW)];

/// Signal name in the filtered section -> outlet key.
pub const FILTERED_STREAMS: [(&str, &str); 3] = [
    ("EEG", EEG_FILTERED),
    ("EOG", EOG_FILTERED),
    ("EMG", EMG_FILTERED),
];

/// Score name -> outlet key for single-value metrics.
pub const SCALAR_SCORES: [(&str, &str); 4] = [
    ("focus_score", FOCUS),
    ("sleep_stage", SLEEP_STAGE),
    ("poas", POAS),
    ("sqc_scores", SIGNAL_QUALITY),
];

pub const POSTURE_SCORE: &str = "posture";

/// Score name -> outlet key for spectral power bands.
pub const BAND_SCORES: [(&str, &str); 5] = [
    ("alpha", ALPHA),
    ("beta", BETA),
    ("theta", THETA),
    ("gamma", GAMMA),
    ("delta", DELTA),
];

/// Values per spectral band, one per electrode region.
pub const SPECTRAL_BAND_WIDTH: usize = 5;

/// One sample bound for the outlet registered under `key`.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub key: &'static str,
    pub sample: Sample,
}

impl Extracted {
    fn new(key: &'static str, sample: Sample) -> Self {
        Self { key, sample }
    }
}

/// Turn one snapshot into the ordered list of samples to push.
///
/// Raw rows come first, then filtered rows, then scores. Within a signal the
/// rows keep their original order.
pub fn extract(snapshot: &DataSnapshot) -> Vec<Extracted> {
    let mut out = Vec::new();

    if let Some(raw) = &snapshot.raw {
        extract_signals(raw, &RAW_STREAMS, &mut out);
    }
    if let Some(filtered) = &snapshot.filtered {
        extract_signals(filtered, &FILTERED_STREAMS, &mut out);
    }
    if let Some(scores) = &snapshot.scores {
        extract_scores(scores, &mut out);
    }

    out
}

fn extract_signals(
    section: &SignalSection,
    mapping: &[(&str, &'static str)],
    out: &mut Vec<Extracted>,
) {
    for &(signal, key) in mapping {
        let Some(rows) = section.get(signal) else {
            continue;
        };
        out.extend(
            rows.iter()
                .map(|row| Extracted::new(key, Sample::Float32(row.clone()))),
        );
    }
}

fn extract_scores(scores: &ScoreSection, out: &mut Vec<Extracted>) {
    for &(name, key) in &SCALAR_SCORES {
        if let Some(value) = scores.get(name).and_then(scalar_value) {
            out.push(Extracted::new(key, Sample::Float32(vec![value])));
        }
    }

    if let Some(label) = scores.get(POSTURE_SCORE).and_then(posture_label) {
        out.push(Extracted::new(POSTURE, Sample::Text(vec![label])));
    }

    for &(name, key) in &BAND_SCORES {
        if let Some(powers) = scores.get(name).and_then(band_powers) {
            out.push(Extracted::new(key, Sample::Float32(powers)));
        }
    }
}

/// Coerce a score to `f32`.
///
/// Accepts numbers, numeric strings (including `nan` and `inf`) and booleans.
/// `null` and anything else yield `None`.
pub fn scalar_value(value: &Value) -> Option<f32> {
    match value {
        Value::Number(number) => number.as_f64().map(|v| v as f32),
        Value::String(text) => text.trim().parse::<f32>().ok(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Posture label as text; only `null` is treated as absent.
///
/// Booleans render as `True`/`False`, as the device toolkit prints them.
/// Numbers, arrays and objects use their compact JSON text.
pub fn posture_label(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(true) => Some("True".to_string()),
        Value::Bool(false) => Some("False".to_string()),
        other => Some(other.to_string()),
    }
}

/// Spectral band powers: an array of exactly five coercible values.
pub fn band_powers(value: &Value) -> Option<Vec<f32>> {
    let items = value.as_array()?;
    if items.len() != SPECTRAL_BAND_WIDTH {
        return None;
    }
    items.iter().map(scalar_value).collect()
}

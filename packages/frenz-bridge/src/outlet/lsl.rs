// Lab Streaming Layer (LSL) outlets
//
// Each catalog entry becomes one LSL outlet advertised on the local network.
// Consumers (LabRecorder, analysis tools) resolve them by name or source id.

use super::{OutletFactory, OutletSink, OutletSpec, Sample, ValueKind};
use crate::error::{OutletError, OutletResult};
use lsl::{ChannelFormat, Pushable, StreamInfo, StreamOutlet};

/// Samples per transmitted chunk; 0 lets LSL decide.
const CHUNK_SIZE: i32 = 0;
/// Seconds of data buffered for slow consumers.
const MAX_BUFFERED_SECS: i32 = 360;

#[derive(Debug, Default)]
pub struct LslOutletFactory;

impl OutletFactory for LslOutletFactory {
    fn name(&self) -> &'static str {
        "lsl"
    }

    fn create(&self, spec: &OutletSpec) -> OutletResult<Box<dyn OutletSink>> {
        let channel_format = match spec.value_kind {
            ValueKind::Float32 => ChannelFormat::Float32,
            ValueKind::String => ChannelFormat::String,
        };

        let info = StreamInfo::new(
            &spec.name,
            spec.stream_type.as_str(),
            spec.channel_count,
            spec.nominal_rate_hz,
            channel_format,
            &spec.source_id,
        )
        .map_err(|e| OutletError::Create {
            name: spec.name.clone(),
            reason: format!("{:?}", e),
        })?;

        let outlet =
            StreamOutlet::new(&info, CHUNK_SIZE, MAX_BUFFERED_SECS).map_err(|e| {
                OutletError::Create {
                    name: spec.name.clone(),
                    reason: format!("{:?}", e),
                }
            })?;

        log::info!(
            "LSL outlet ready: name='{}', type='{}', channels={}, rate={} Hz",
            spec.name,
            spec.stream_type.as_str(),
            spec.channel_count,
            spec.nominal_rate_hz
        );

        Ok(Box::new(LslSink {
            key: spec.key,
            outlet,
        }))
    }
}

struct LslSink {
    key: &'static str,
    outlet: StreamOutlet,
}

impl OutletSink for LslSink {
    fn push(&mut self, sample: &Sample) -> OutletResult<()> {
        let pushed = match sample {
            Sample::Float32(values) => self.outlet.push_sample(values),
            Sample::Text(values) => self.outlet.push_sample(values),
        };

        pushed.map_err(|e| OutletError::Push {
            key: self.key.to_string(),
            reason: format!("{:?}", e),
        })
    }
}

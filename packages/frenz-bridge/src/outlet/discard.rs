// Sink that accepts every sample and only counts it.
//
// Used when the bridge runs without LSL support, e.g. to exercise the
// control protocol and session lifecycle on a machine without liblsl.

use super::{OutletFactory, OutletSink, OutletSpec, Sample};
use crate::error::OutletResult;

#[derive(Debug, Default)]
pub struct DiscardOutletFactory;

impl OutletFactory for DiscardOutletFactory {
    fn name(&self) -> &'static str {
        "discard"
    }

    fn create(&self, spec: &OutletSpec) -> OutletResult<Box<dyn OutletSink>> {
        Ok(Box::new(DiscardSink {
            name: spec.name.clone(),
            pushed: 0,
        }))
    }
}

struct DiscardSink {
    name: String,
    pushed: u64,
}

impl OutletSink for DiscardSink {
    fn push(&mut self, sample: &Sample) -> OutletResult<()> {
        self.pushed += 1;
        log::trace!("{}: discarded {:?}", self.name, sample);
        Ok(())
    }
}

impl Drop for DiscardSink {
    fn drop(&mut self) {
        log::debug!("{}: {} samples discarded", self.name, self.pushed);
    }
}

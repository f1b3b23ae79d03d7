//! Bridge between a FRENZ brainband session and Lab Streaming Layer outlets.
//!
//! The bridge runs as a child process of a supervisor. It reads a one-line
//! JSON configuration from stdin, reports its lifecycle as JSON lines on
//! stdout, and republishes device data on sixteen typed outlets until told to
//! stop.

pub mod bridge;
pub mod config;
pub mod control;
pub mod error;
pub mod exit_codes;
pub mod extract;
pub mod outlet;
pub mod session;
pub mod shutdown;
pub mod status;

pub use bridge::{pump_once, Bridge};
pub use config::{BridgeConfig, BridgeSettings};
pub use control::{is_stop_command, ControlChannel};
pub use error::{BridgeError, ConfigError, OutletError, Result, SessionError};
pub use extract::{extract, Extracted};
pub use outlet::{catalog, OutletFactory, OutletRegistry, OutletSink, OutletSpec, Sample};
pub use session::{DataSnapshot, DeviceSession, SessionBackend, SessionGuard};
pub use status::{StatusEmitter, StatusMessage};

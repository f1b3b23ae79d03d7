// Status lines written to the parent process.
//
// Every lifecycle transition becomes one compact JSON object on its own line,
// flushed immediately. The parent only reads this channel; nothing is stored.

use serde::{Deserialize, Serialize};
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusMessage {
    WaitingForConfig,

    Bootstrapping {
        phase: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        package: Option<String>,
    },

    Connecting {
        device_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        phase: Option<String>,
    },

    Streaming {
        streams: Vec<String>,
        sample_count: u64,
    },

    Stopped,

    Error {
        message: String,
    },
}

impl StatusMessage {
    pub fn bootstrapping(phase: &str, package: Option<&str>) -> Self {
        Self::Bootstrapping {
            phase: phase.to_string(),
            package: package.map(str::to_string),
        }
    }

    pub fn connecting(device_id: &str, phase: Option<&str>) -> Self {
        Self::Connecting {
            device_id: device_id.to_string(),
            phase: phase.map(str::to_string),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Writes status lines to the control output (stdout in production).
pub struct StatusEmitter<W: Write> {
    out: W,
}

impl StatusEmitter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> StatusEmitter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Serialize and flush one status line. Write failures are not fatal.
    pub fn emit(&mut self, message: &StatusMessage) {
        let line = match serde_json::to_string(message) {
            Ok(line) => line,
            Err(e) => {
                log::debug!("Failed to serialize status {:?}: {}", message, e);
                return;
            }
        };

        let written = self
            .out
            .write_all(line.as_bytes())
            .and_then(|_| self.out.write_all(b"\n"))
            .and_then(|_| self.out.flush());

        if let Err(e) = written {
            log::debug!("Failed to write status line: {}", e);
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "frenz-bridge",
    version,
    about = "Stream a FRENZ brainband session to Lab Streaming Layer outlets",
    long_about = "Supervised bridge process. Reads {\"device_id\":..,\"product_key\":..} as the first\n\
                  line on stdin, reports status as JSON lines on stdout and stops on `stop`,\n\
                  end of input, SIGINT or SIGTERM. Logs go to stderr."
)]
pub struct Cli {
    /// Where device data comes from
    #[arg(long, value_enum, env = "FRENZ_BRIDGE_SOURCE", default_value_t = SourceKind::Simulated)]
    pub source: SourceKind,

    /// Recorded session for `--source replay` (JSON lines, one snapshot per line)
    #[arg(long, env = "FRENZ_BRIDGE_REPLAY_FILE")]
    pub replay_file: Option<PathBuf>,

    /// Restart the replay file when it is exhausted
    #[arg(long)]
    pub replay_loop: bool,

    /// Where samples are published
    #[arg(long, value_enum, env = "FRENZ_BRIDGE_SINK", default_value_t = SinkKind::default())]
    pub sink: SinkKind,

    /// Seconds to wait for the first raw EEG rows before creating outlets anyway
    #[arg(long, default_value_t = 30)]
    pub data_timeout_secs: u64,

    /// Seconds between periodic streaming status lines
    #[arg(long, default_value_t = 5)]
    pub heartbeat_secs: u64,

    /// Pause between streaming iterations in milliseconds (capped below 20)
    #[arg(long, default_value_t = 8)]
    pub poll_interval_ms: u64,

    /// Delay before the simulated device produces data
    #[arg(long, default_value_t = 0)]
    pub simulated_connect_delay_ms: u64,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Synthetic device data, no hardware needed
    Simulated,
    /// Recorded snapshots from --replay-file
    Replay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkKind {
    /// Lab Streaming Layer outlets
    Lsl,
    /// Accept and count samples without publishing them
    Discard,
}

impl Default for SinkKind {
    fn default() -> Self {
        if cfg!(feature = "lsl-support") {
            SinkKind::Lsl
        } else {
            SinkKind::Discard
        }
    }
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkKind::Lsl => f.write_str("lsl"),
            SinkKind::Discard => f.write_str("discard"),
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Simulated => f.write_str("simulated"),
            SourceKind::Replay => f.write_str("replay"),
        }
    }
}

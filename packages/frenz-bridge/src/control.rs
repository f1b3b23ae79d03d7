// Control input handling.
//
// The parent writes one JSON configuration line, then may write `stop` at any
// time. A single owner reads the configuration synchronously and only then
// moves the reader into the listener task, so no line is ever read by two
// consumers.

use crate::config::BridgeConfig;
use crate::error::ConfigResult;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// True when a control line requests shutdown (`stop`, any case, surrounding whitespace ignored).
pub fn is_stop_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("stop")
}

pub struct ControlChannel<R> {
    reader: R,
}

impl ControlChannel<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> ControlChannel<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read exactly one line and parse it as the bridge configuration.
    pub async fn read_config(&mut self) -> ConfigResult<BridgeConfig> {
        let mut line = String::new();
        self.reader.read_line(&mut line).await?;
        BridgeConfig::from_line(&line)
    }

    /// Hand the remaining input to a listener task that cancels `token` on
    /// `stop`, end-of-stream or a read error.
    pub fn spawn_stop_listener(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(listen_for_stop(self.reader, token))
    }
}

async fn listen_for_stop<R>(mut reader: R, token: CancellationToken)
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();

    loop {
        line.clear();

        tokio::select! {
            biased;

            _ = token.cancelled() => {
                log::debug!("Control listener exiting, shutdown already requested");
                return;
            }

            read = reader.read_line(&mut line) => match read {
                Ok(0) => {
                    log::info!("Control input closed, treating as stop");
                    break;
                }
                Ok(_) if is_stop_command(&line) => {
                    log::info!("Stop command received");
                    break;
                }
                Ok(_) => {
                    log::debug!("Ignoring control line: {}", line.trim());
                }
                Err(e) => {
                    log::warn!("Error reading control input, treating as stop: {}", e);
                    break;
                }
            }
        }
    }

    token.cancel();
}

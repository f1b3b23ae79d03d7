// Replay of a recorded session
//
// Reads a JSON-lines file where every line is one `DataSnapshot` and hands
// one snapshot out per poll. Useful for:
// - Reproducing a problematic recording against downstream tools
// - Deterministic integration tests of the bridge
//
// On start the file is read ahead up to the first snapshot carrying primary
// rows, so readiness reflects the recording rather than the poll rate. The
// read-ahead is bounded; a recording without early primary rows is reported
// as not ready and the data wait runs into its timeout.

use super::{DataSnapshot, DeviceSession, SessionBackend, SessionConfig};
use crate::error::{SessionError, SessionResult};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

/// Snapshots buffered by `start` while looking for the first primary rows.
const MAX_READ_AHEAD: usize = 1024;

#[derive(Debug, Clone)]
pub struct ReplayBackend {
    path: Option<PathBuf>,
    loop_playback: bool,
}

impl ReplayBackend {
    pub fn new(path: Option<PathBuf>, loop_playback: bool) -> Self {
        Self {
            path,
            loop_playback,
        }
    }

    fn resolved_path(&self) -> SessionResult<&PathBuf> {
        let path = self.path.as_ref().ok_or_else(|| {
            SessionError::Unavailable("no replay file configured (use --replay-file)".to_string())
        })?;

        if !path.is_file() {
            return Err(SessionError::Unavailable(format!(
                "replay file not found: {}",
                path.display()
            )));
        }

        Ok(path)
    }
}

impl SessionBackend for ReplayBackend {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn check_available(&self) -> SessionResult<()> {
        self.resolved_path().map(|_| ())
    }

    fn open(&self, config: &SessionConfig) -> SessionResult<Box<dyn DeviceSession>> {
        let path = self
            .resolved_path()
            .map_err(|e| SessionError::Create(e.to_string()))?;

        log::info!(
            "Opening replay session for {} from {}",
            config.device_id,
            path.display()
        );

        Ok(Box::new(ReplaySession::new(path.clone(), self.loop_playback)))
    }
}

pub struct ReplaySession {
    path: PathBuf,
    loop_playback: bool,
    reader: Option<BufReader<File>>,
    line_number: usize,
    queued: VecDeque<DataSnapshot>,
    read_ahead_limit: usize,
    primary_seen: bool,
}

impl ReplaySession {
    pub fn new(path: PathBuf, loop_playback: bool) -> Self {
        Self {
            path,
            loop_playback,
            reader: None,
            line_number: 0,
            queued: VecDeque::new(),
            read_ahead_limit: MAX_READ_AHEAD,
            primary_seen: false,
        }
    }

    fn open_reader(&mut self) -> SessionResult<()> {
        let file = File::open(&self.path)?;
        self.reader = Some(BufReader::new(file));
        self.line_number = 0;
        Ok(())
    }

    /// Next recorded snapshot, `None` at end of file.
    fn read_next(&mut self) -> SessionResult<Option<DataSnapshot>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            let snapshot: DataSnapshot = serde_json::from_str(line.trim()).map_err(|e| {
                SessionError::Poll(format!(
                    "{} line {}: {}",
                    self.path.display(),
                    self.line_number,
                    e
                ))
            })?;

            if snapshot.has_primary_rows() {
                self.primary_seen = true;
            }
            return Ok(Some(snapshot));
        }
    }
}

impl DeviceSession for ReplaySession {
    fn start(&mut self) -> SessionResult<()> {
        self.open_reader()
            .map_err(|e| SessionError::Start(e.to_string()))?;

        while !self.primary_seen {
            if self.queued.len() >= self.read_ahead_limit {
                log::warn!(
                    "No primary rows in the first {} snapshots of {}",
                    self.queued.len(),
                    self.path.display()
                );
                break;
            }
            match self.read_next() {
                Ok(Some(snapshot)) => self.queued.push_back(snapshot),
                Ok(None) => break,
                Err(e) => return Err(SessionError::Start(e.to_string())),
            }
        }

        log::info!(
            "Replay session started ({} snapshots read ahead)",
            self.queued.len()
        );
        Ok(())
    }

    fn primary_data_ready(&self) -> bool {
        self.primary_seen
    }

    fn poll(&mut self) -> SessionResult<DataSnapshot> {
        if let Some(snapshot) = self.queued.pop_front() {
            return Ok(snapshot);
        }

        match self.read_next()? {
            Some(snapshot) => Ok(snapshot),
            None if self.loop_playback && self.reader.is_some() && self.line_number > 0 => {
                log::debug!("Replay reached end of file, restarting");
                self.open_reader()?;
                Ok(self.read_next()?.unwrap_or_default())
            }
            None => Ok(DataSnapshot::default()),
        }
    }

    fn stop(&mut self) -> SessionResult<()> {
        self.reader = None;
        self.queued.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn recording(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_missing_file_unavailable() {
        let backend = ReplayBackend::new(Some(PathBuf::from("/nonexistent/session.jsonl")), false);
        let err = backend.check_available().unwrap_err();
        assert!(err.to_string().contains("not found"));

        let backend = ReplayBackend::new(None, false);
        assert!(backend.check_available().is_err());
    }

    #[test]
    fn test_read_ahead_until_primary() {
        let file = recording(&[
            r#"{"scores":{"focus_score":0.5}}"#,
            "",
            r#"{"raw":{"EEG":[[0.1,0.1,0.1,0.1,0.1,0.1,0.1]]}}"#,
            r#"{"raw":{"PPG":[[1,2,3,4]]}}"#,
        ]);
        let mut session = ReplaySession::new(file.path().to_path_buf(), false);
        assert!(!session.primary_data_ready());

        session.start().unwrap();
        assert!(session.primary_data_ready());

        assert!(session.poll().unwrap().scores.is_some());
        assert!(session.poll().unwrap().has_primary_rows());
        assert!(session.poll().unwrap().raw.unwrap().contains_key("PPG"));
        assert!(session.poll().unwrap().is_empty());
    }

    #[test]
    fn test_no_primary_rows_never_ready() {
        let file = recording(&[r#"{"scores":{"posture":"upright"}}"#]);
        let mut session = ReplaySession::new(file.path().to_path_buf(), false);
        session.start().unwrap();
        assert!(!session.primary_data_ready());
    }

    #[test]
    fn test_read_ahead_is_bounded() {
        let mut lines = vec![r#"{"scores":{"focus_score":0.5}}"#; 10];
        lines.push(r#"{"raw":{"EEG":[[1,1,1,1,1,1,1]]}}"#);
        let file = recording(&lines);

        let mut session = ReplaySession::new(file.path().to_path_buf(), false);
        session.read_ahead_limit = 3;
        session.start().unwrap();

        assert_eq!(session.queued.len(), 3);
        assert!(!session.primary_data_ready());

        let mut polls = 0;
        while !session.poll().unwrap().has_primary_rows() {
            polls += 1;
            assert!(polls < 20);
        }
        assert_eq!(polls, 10);
        assert!(session.primary_data_ready());
    }

    #[test]
    fn test_loop_playback_restarts() {
        let file = recording(&[r#"{"raw":{"EEG":[[1,1,1,1,1,1,1]]}}"#]);
        let mut session = ReplaySession::new(file.path().to_path_buf(), true);
        session.start().unwrap();

        assert!(session.poll().unwrap().has_primary_rows());
        assert!(session.poll().unwrap().has_primary_rows());
        assert!(session.poll().unwrap().has_primary_rows());
    }

    #[test]
    fn test_malformed_line_is_poll_error() {
        let file = recording(&[
            r#"{"raw":{"EEG":[[1,1,1,1,1,1,1]]}}"#,
            "not json",
            r#"{"raw":{"EEG":[[2,2,2,2,2,2,2]]}}"#,
        ]);
        let mut session = ReplaySession::new(file.path().to_path_buf(), false);
        session.start().unwrap();

        assert!(session.poll().is_ok());
        let err = session.poll().unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert!(session.poll().unwrap().has_primary_rows());
    }
}

//! Rotating event log.
//!
//! One structured line per processed event. When the live file reaches
//! 10 MiB it is rotated to `.0` with older backups shifted up; at most
//! five backups are kept.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use asi_events::{EventId, SystemSnapshot};
use tracing::warn;

/// Rotation threshold for the live file.
pub const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated backups kept (`.0` through `.4`).
pub const MAX_BACKUPS: usize = 5;

/// Append-only event log writer with size-based rotation.
#[derive(Debug)]
pub struct EventLogger {
    path: PathBuf,
    file: File,
}

impl EventLogger {
    /// Open (or create) the live log file for appending.
    ///
    /// # Errors
    ///
    /// Propagates filesystem errors.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    /// Append the line for a processed event.
    ///
    /// # Errors
    ///
    /// Propagates write failures; the fault manager logs and continues.
    pub fn log_event(
        &mut self,
        event: EventId,
        occurrence: u32,
        snapshot: Option<&SystemSnapshot>,
    ) -> io::Result<()> {
        let line = match snapshot {
            Some(snap) => format!(
                "{} | {} ({:#06x}) | occurrence={} | speed={:.2} gear={} state={}\n",
                snap.system_time,
                event,
                event.code(),
                occurrence,
                snap.vehicle_speed,
                snap.gear_position,
                snap.asi_state,
            ),
            None => format!(
                "- | {} ({:#06x}) | occurrence={} | no snapshot\n",
                event,
                event.code(),
                occurrence,
            ),
        };
        self.append(&line)
    }

    /// Append a `SKIPPED EVENT` line for queue contents dropped at
    /// shutdown.
    ///
    /// # Errors
    ///
    /// Propagates write failures.
    pub fn log_skipped(&mut self, event: EventId) -> io::Result<()> {
        self.append(&format!("SKIPPED EVENT | {} ({:#06x})\n", event, event.code()))
    }

    /// Append a watchdog timeout line.
    ///
    /// # Errors
    ///
    /// Propagates write failures.
    pub fn log_timeout(&mut self, event: EventId) -> io::Result<()> {
        self.append(&format!("timeout | {} ({:#06x})\n", event, event.code()))
    }

    fn append(&mut self, line: &str) -> io::Result<()> {
        self.rotate_if_needed()?;
        self.file.write_all(line.as_bytes())?;
        self.file.flush()
    }

    fn rotate_if_needed(&mut self) -> io::Result<()> {
        let size = self.file.metadata()?.len();
        if size < MAX_LOG_SIZE {
            return Ok(());
        }

        // Shift .N up by one, dropping the oldest; then the live file
        // becomes .0 and a fresh live file is opened.
        let backup = |n: usize| {
            let mut path = self.path.clone().into_os_string();
            path.push(format!(".{n}"));
            PathBuf::from(path)
        };

        let oldest = backup(MAX_BACKUPS - 1);
        if oldest.exists() {
            if let Err(err) = fs::remove_file(&oldest) {
                warn!(%err, "failed to drop oldest event log backup");
            }
        }
        for n in (0..MAX_BACKUPS - 1).rev() {
            let from = backup(n);
            if from.exists() {
                fs::rename(&from, backup(n + 1))?;
            }
        }

        fs::rename(&self.path, backup(0))?;
        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_line_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("Event_Logger.log");

        let mut logger = EventLogger::open(&path).expect("open");
        let snapshot = SystemSnapshot::new(12.5, 3, 2, "1754400000".to_owned());
        logger
            .log_event(EventId::MsgCrcCheck, 2, Some(&snapshot))
            .expect("log");

        let contents = fs::read_to_string(&path).expect("read");
        assert!(contents.contains("FAULT_MSG_CRC_CHECK"));
        assert!(contents.contains("occurrence=2"));
        assert!(contents.contains("speed=12.50"));
    }

    #[test]
    fn test_skipped_and_timeout_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("Event_Logger.log");

        let mut logger = EventLogger::open(&path).expect("open");
        logger.log_skipped(EventId::AckLoss).expect("skipped");
        logger.log_timeout(EventId::Overrun).expect("timeout");

        let contents = fs::read_to_string(&path).expect("read");
        assert!(contents.contains("SKIPPED EVENT | INFO_ACK_LOSS"));
        assert!(contents.contains("timeout | FAULT_OVERRUN"));
    }

    #[test]
    fn test_rotation_shifts_backups() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("Event_Logger.log");

        // Pre-fill the live file past the threshold so the next append
        // rotates.
        fs::write(&path, vec![b'x'; MAX_LOG_SIZE as usize]).expect("prefill");

        let mut logger = EventLogger::open(&path).expect("open");
        logger.log_skipped(EventId::AckLoss).expect("append");

        let rotated = dir.path().join("Event_Logger.log.0");
        assert!(rotated.exists());
        assert_eq!(
            fs::metadata(&rotated).expect("metadata").len(),
            MAX_LOG_SIZE
        );

        let live = fs::read_to_string(&path).expect("read live");
        assert!(live.contains("SKIPPED EVENT"));
    }

    #[test]
    fn test_backup_count_bounded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("Event_Logger.log");

        for _ in 0..(MAX_BACKUPS + 2) {
            fs::write(&path, vec![b'x'; MAX_LOG_SIZE as usize]).expect("prefill");
            let mut logger = EventLogger::open(&path).expect("open");
            logger.log_skipped(EventId::AckLoss).expect("append");
        }

        let backups = (0..10)
            .filter(|n| dir.path().join(format!("Event_Logger.log.{n}")).exists())
            .count();
        assert_eq!(backups, MAX_BACKUPS);
    }
}

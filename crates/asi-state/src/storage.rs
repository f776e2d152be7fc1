//! Region snapshot and event checkpoint persistence.
//!
//! Snapshots are bincode-encoded with the fixed-width legacy config and
//! written through a temp file plus rename, so a crash mid-write can
//! never leave a torn file where a valid one stood. Load validation is
//! by successful decode; on restart the child's copy wins whenever it is
//! valid.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StateError, StateResult};
use crate::region::{InFlightEvent, RegionSnapshot};

fn config() -> impl bincode::config::Config {
    bincode::config::legacy()
}

/// Directory layout under the data root.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    /// Lay out storage under `root` (the files land in
    /// `<root>/ASI_DATA/STORAGE` and `<root>/ASI_DATA/LOG`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the storage and log directories.
    ///
    /// # Errors
    ///
    /// Propagates filesystem errors.
    pub fn ensure(&self) -> StateResult<()> {
        fs::create_dir_all(self.storage_dir())?;
        fs::create_dir_all(self.log_dir())?;
        Ok(())
    }

    /// `<root>/ASI_DATA/STORAGE`.
    pub fn storage_dir(&self) -> PathBuf {
        self.root.join("ASI_DATA").join("STORAGE")
    }

    /// `<root>/ASI_DATA/LOG`.
    pub fn log_dir(&self) -> PathBuf {
        self.root.join("ASI_DATA").join("LOG")
    }

    /// The parent's region snapshot file.
    pub fn parent_storage(&self) -> PathBuf {
        self.storage_dir().join("parent_storage.bin")
    }

    /// The child's region snapshot file.
    pub fn child_storage(&self) -> PathBuf {
        self.storage_dir().join("child_storage.bin")
    }

    /// The event checkpoint file.
    pub fn event_data(&self) -> PathBuf {
        self.storage_dir().join("event_data.bin")
    }

    /// The parent process log file.
    pub fn parent_log(&self) -> PathBuf {
        self.log_dir().join("parent_process.log")
    }

    /// The child process log file.
    pub fn child_log(&self) -> PathBuf {
        self.log_dir().join("child_process.log")
    }

    /// The rotating event log file.
    pub fn event_log(&self) -> PathBuf {
        self.log_dir().join("Event_Logger.log")
    }
}

/// Which copy a restored region came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    /// The child's storage file.
    Child,
    /// The parent's storage file.
    Parent,
    /// Neither file was valid; a zero-initialised region was produced.
    Fresh,
}

fn write_atomically(path: &Path, bytes: &[u8]) -> StateResult<()> {
    let tmp = path.with_extension("bin.tmp");

    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o644))?;
    }

    fs::rename(&tmp, path)?;
    Ok(())
}

/// Persist a region snapshot.
///
/// # Errors
///
/// Returns encode or I/O errors; a failed write leaves any previous
/// snapshot file intact.
pub fn save_region(path: &Path, snapshot: &RegionSnapshot) -> StateResult<()> {
    let bytes = bincode::serde::encode_to_vec(snapshot, config())
        .map_err(|e| StateError::Encode(e.to_string()))?;
    write_atomically(path, &bytes)?;
    debug!(path = %path.display(), bytes = bytes.len(), "region snapshot written");
    Ok(())
}

/// Load a region snapshot.
///
/// # Errors
///
/// Returns I/O errors for unreadable files and decode errors for
/// invalid contents.
pub fn load_region(path: &Path) -> StateResult<RegionSnapshot> {
    let bytes = fs::read(path)?;
    let (snapshot, consumed): (RegionSnapshot, usize) =
        bincode::serde::decode_from_slice(&bytes, config())
            .map_err(|e| StateError::Decode(e.to_string()))?;
    if consumed != bytes.len() {
        return Err(StateError::Decode(format!(
            "trailing bytes: decoded {consumed} of {}",
            bytes.len()
        )));
    }
    Ok(snapshot)
}

/// Restore a region from the parent/child pair.
///
/// The child's copy is preferred whenever it is valid: it is the most
/// recent writer. The parent's copy backs it up; with neither valid a
/// zero-initialised region is produced.
pub fn load_preferring_child(
    parent_path: &Path,
    child_path: &Path,
) -> (RegionSnapshot, SnapshotSource) {
    let child = load_region(child_path);
    let parent = load_region(parent_path);

    match (child, parent) {
        (Ok(child), Ok(parent)) => {
            if child.cycle_counter != parent.cycle_counter {
                debug!("parent and child snapshots differ, preferring child");
            }
            (child, SnapshotSource::Child)
        }
        (Ok(child), Err(err)) => {
            debug!(%err, "parent snapshot invalid, using child");
            (child, SnapshotSource::Child)
        }
        (Err(err), Ok(parent)) => {
            debug!(%err, "child snapshot invalid, using parent");
            (parent, SnapshotSource::Parent)
        }
        (Err(child_err), Err(parent_err)) => {
            warn!(%child_err, %parent_err, "no valid snapshot, starting fresh");
            (RegionSnapshot::default(), SnapshotSource::Fresh)
        }
    }
}

/// The event checkpoint file contents.
///
/// The flag is an `i16` for on-disk compatibility with the original
/// record layout; in memory it only ever holds 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCheckpoint {
    /// 1 when an event was in flight at checkpoint time.
    pub processing_flag: i16,
    /// The in-flight event record, present when the flag is 1.
    pub record: Option<InFlightEvent>,
}

impl EventCheckpoint {
    /// A checkpoint with nothing in flight.
    pub fn idle() -> Self {
        Self {
            processing_flag: 0,
            record: None,
        }
    }

    /// A checkpoint for an in-flight event.
    pub fn in_flight(record: InFlightEvent) -> Self {
        Self {
            processing_flag: 1,
            record: Some(record),
        }
    }
}

/// Persist the event checkpoint.
///
/// # Errors
///
/// Returns encode or I/O errors.
pub fn save_checkpoint(path: &Path, checkpoint: &EventCheckpoint) -> StateResult<()> {
    let bytes = bincode::serde::encode_to_vec(checkpoint, config())
        .map_err(|e| StateError::Encode(e.to_string()))?;
    write_atomically(path, &bytes)
}

/// Load the event checkpoint; a missing or invalid file reads as idle.
pub fn load_checkpoint(path: &Path) -> EventCheckpoint {
    let Ok(bytes) = fs::read(path) else {
        return EventCheckpoint::idle();
    };
    match bincode::serde::decode_from_slice(&bytes, config()) {
        Ok((checkpoint, _)) => checkpoint,
        Err(err) => {
            warn!(%err, "event checkpoint invalid, treating as idle");
            EventCheckpoint::idle()
        }
    }
}

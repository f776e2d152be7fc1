//! Per-process log files behind one subscriber.
//!
//! The subscriber is installed once, before the fork. The writer routes
//! each line to `parent_process.log` or `child_process.log` depending on
//! which process is writing, so the child does not have to (and cannot)
//! re-install a global subscriber after the fork.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;

static IS_CHILD: AtomicBool = AtomicBool::new(false);

/// Mark this process as the worker child (called right after the fork).
pub fn mark_child() {
    IS_CHILD.store(true, Ordering::Release);
}

/// Writer that picks the per-process log file at write time.
#[derive(Debug)]
pub struct RoleLogWriter {
    parent: Mutex<File>,
    child: Mutex<File>,
}

impl RoleLogWriter {
    /// Open both per-process log files for appending.
    ///
    /// # Errors
    ///
    /// Fails when either file cannot be opened.
    pub fn open(parent_log: &Path, child_log: &Path) -> Result<Self> {
        let open = |path: &Path| -> Result<File> {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log {}", path.display()))
        };
        Ok(Self {
            parent: Mutex::new(open(parent_log)?),
            child: Mutex::new(open(child_log)?),
        })
    }
}

/// One write handle into the role-selected file.
#[derive(Debug)]
pub struct RoleWriteHandle<'a> {
    writer: &'a RoleLogWriter,
}

impl Write for RoleWriteHandle<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if IS_CHILD.load(Ordering::Acquire) {
            self.writer.child.lock().write(buf)
        } else {
            self.writer.parent.lock().write(buf)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if IS_CHILD.load(Ordering::Acquire) {
            self.writer.child.lock().flush()
        } else {
            self.writer.parent.lock().flush()
        }
    }
}

impl<'a> MakeWriter<'a> for RoleLogWriter {
    type Writer = RoleWriteHandle<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RoleWriteHandle { writer: self }
    }
}

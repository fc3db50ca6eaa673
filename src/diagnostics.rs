//! Diagnostics sink shared by every job.
//!
//! Faults are appended to a timestamped error log and mirrored to the `log`
//! facade. The sink is opened once at startup and handed to every component
//! that reports faults.

use std::{
    fmt,
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use anyhow::{Context, Result};
use chrono::Local;
use log::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Load,
    Record { index: usize },
    CreateDir,
    Save,
    Panic,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::Load => f.write_str("load"),
            FaultKind::Record { index } => write!(f, "record {index}"),
            FaultKind::CreateDir => f.write_str("create-dir"),
            FaultKind::Save => f.write_str("save"),
            FaultKind::Panic => f.write_str("panic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub file: PathBuf,
    pub kind: FaultKind,
    pub message: String,
}

impl Fault {
    pub fn new(file: &Path, kind: FaultKind, message: impl Into<String>) -> Self {
        Fault {
            file: file.to_path_buf(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.file.display(), self.message)
    }
}

pub trait DiagnosticsSink: Send + Sync {
    fn report(&self, fault: &Fault);

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Append-only error log. A single mutex serialises writers so concurrent
/// jobs never interleave partial lines.
pub struct FileSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileSink {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Opening error log {path:?}"))?;
        Ok(FileSink {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DiagnosticsSink for FileSink {
    fn report(&self, fault: &Fault) {
        error!("{fault}");
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        // Line-at-a-time flush keeps the log useful if the batch hangs.
        if let Err(err) = writeln!(writer, "{stamp} ERROR {fault}").and_then(|()| writer.flush())
        {
            error!("Failed to append to error log {:?}: {err}", self.path);
        }
    }

    fn flush(&self) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer
            .flush()
            .with_context(|| format!("Flushing error log {:?}", self.path))
    }
}

/// Keeps faults in memory; used by tests and embedding callers.
#[derive(Default)]
pub struct MemorySink {
    faults: Mutex<Vec<Fault>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> Vec<Fault> {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DiagnosticsSink for MemorySink {
    fn report(&self, fault: &Fault) {
        error!("{fault}");
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(fault.clone());
    }
}

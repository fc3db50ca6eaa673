use std::{
    fs::OpenOptions,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use log::{debug, warn};

/// Marker file whose absence means the tool has never run from this
/// working directory.
#[derive(Debug, Clone)]
pub struct FirstRunMarker {
    path: PathBuf,
}

impl FirstRunMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FirstRunMarker { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` on the first run and leaves the marker behind so later
    /// runs return `false`. A marker that cannot be written is logged and
    /// still counts as a first run.
    pub fn check_and_mark(&self) -> bool {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(_) => {
                debug!("First run; created marker {:?}", self.path);
                true
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => false,
            Err(err) => {
                warn!("Could not create first-run marker {:?}: {err}", self.path);
                true
            }
        }
    }
}

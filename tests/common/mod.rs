#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use dbf_column_filler::dbf;
use dbf_column_filler::table::{FieldDef, FieldKind, RecordTable, Row};
use encoding_rs::UTF_8;
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    /// Writes a dBase table with a `STATUS` (C4) and `ID` (N5) column.
    pub fn write_dbf(&self, name: &str, rows: &[(&str, &str)]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        let mut bytes = Vec::new();
        dbf::write_table(&status_table(rows), &mut bytes).expect("encode dbf");
        fs::write(&path, bytes).expect("write dbf");
        path
    }

    pub fn output(&self, dir: &str, name: &str) -> PathBuf {
        self.path().join(dir).join("changed").join(name)
    }
}

pub fn status_table(rows: &[(&str, &str)]) -> RecordTable {
    RecordTable::with_rows(
        vec![
            FieldDef::fixed("STATUS", FieldKind::Character, 4, 0),
            FieldDef::fixed("ID", FieldKind::Numeric, 5, 0),
        ],
        rows.iter().map(|(status, id)| Row {
            values: vec![status.to_string(), id.to_string()],
            deleted: false,
        }),
        UTF_8,
    )
}

/// Decodes a dBase file into `(STATUS, ID)` pairs.
pub fn read_dbf(path: &Path) -> Vec<(String, String)> {
    let bytes = fs::read(path).expect("read dbf");
    let table = dbf::read_table(&bytes, UTF_8).expect("decode dbf");
    table
        .rows()
        .iter()
        .map(|row| (row.values[0].clone(), row.values[1].clone()))
        .collect()
}

pub fn pairs(expected: &[(&str, &str)]) -> Vec<(String, String)> {
    expected
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

//! Typed errors raised by the library layers.
//!
//! Application code composes these through `anyhow`; the enums exist so that
//! callers (and tests) can match on the failure that actually occurred.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while turning operator input into a [`crate::rules::RuleSet`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    /// Nothing was entered.
    #[error("no rule tokens were entered")]
    Empty,

    /// Token count is not a multiple of three.
    #[error("expected `column match replacement` triples, got {count} token(s)")]
    Malformed { count: usize },
}

/// Failures while validating the list of files handed to the process.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("no input files were supplied")]
    NoFiles,

    #[error("{path:?} does not have the required .{extension} extension")]
    WrongExtension { path: PathBuf, extension: String },
}

/// Failures raised by the table access port.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("record {index} is out of range (table holds {count} record(s))")]
    RecordOutOfRange { index: usize, count: usize },

    #[error("field '{name}' is not part of the table schema")]
    UnknownField { name: String },

    /// Value does not fit the declared field width once encoded.
    #[error("value '{value}' needs {needed} byte(s) but field '{field}' holds {width}")]
    ValueTooWide {
        field: String,
        value: String,
        needed: usize,
        width: usize,
    },

    #[error("value '{value}' cannot be encoded as {encoding} for field '{field}'")]
    Unencodable {
        field: String,
        value: String,
        encoding: &'static str,
    },
}

/// Failures while decoding or encoding dBase files.
#[derive(Debug, Error)]
pub enum DbfError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file is too short for a dBase header ({len} byte(s))")]
    TruncatedHeader { len: usize },

    #[error("field descriptor array is not terminated before offset {header_len}")]
    MissingTerminator { header_len: usize },

    #[error("field '{name}' has zero length")]
    ZeroLengthField { name: String },

    #[error("declared record length {declared} does not match field widths ({computed})")]
    RecordLengthMismatch { declared: usize, computed: usize },

    #[error("record {index} is truncated")]
    TruncatedRecord { index: usize },

    #[error("unknown deletion flag 0x{flag:02X} on record {index}")]
    BadDeletionFlag { index: usize, flag: u8 },

    #[error("text in field '{field}' is not valid {encoding}")]
    Undecodable {
        field: String,
        encoding: &'static str,
    },

    #[error("field name '{name}' does not fit in 10 bytes")]
    FieldNameTooLong { name: String },

    #[error("table has {count} field(s); dBase allows at most {max}")]
    TooManyFields { count: usize, max: usize },

    #[error("record layout of {len} byte(s) exceeds the dBase limit")]
    RecordTooLong { len: usize },

    #[error("{count} record(s) exceed the dBase record counter")]
    TooManyRecords { count: usize },

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Failures while loading the YAML configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

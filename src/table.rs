//! Table access port.
//!
//! The duplication engine only talks to a [`Table`]; file formats plug in
//! through [`TableStore`]. [`RecordTable`] is the in-memory table every store
//! loads into and saves from.

use std::path::Path;

use anyhow::Result;
use encoding_rs::Encoding;

use crate::{dbf::DbfPreamble, error::TableError};

/// dBase-style field type. CSV columns are always [`FieldKind::Character`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Character,
    Numeric,
    Float,
    Date,
    Logical,
    Memo,
    Other(u8),
}

impl FieldKind {
    pub fn from_code(code: u8) -> Self {
        match code {
            b'C' => FieldKind::Character,
            b'N' => FieldKind::Numeric,
            b'F' => FieldKind::Float,
            b'D' => FieldKind::Date,
            b'L' => FieldKind::Logical,
            b'M' => FieldKind::Memo,
            other => FieldKind::Other(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            FieldKind::Character => b'C',
            FieldKind::Numeric => b'N',
            FieldKind::Float => b'F',
            FieldKind::Date => b'D',
            FieldKind::Logical => b'L',
            FieldKind::Memo => b'M',
            FieldKind::Other(code) => code,
        }
    }

    /// Numbers are right-aligned inside their fixed-width slot.
    pub fn is_right_aligned(self) -> bool {
        matches!(self, FieldKind::Numeric | FieldKind::Float)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    /// Fixed width in encoded bytes, `None` for unbounded text.
    pub width: Option<usize>,
    pub decimals: u8,
}

impl FieldDef {
    pub fn text(name: impl Into<String>) -> Self {
        FieldDef {
            name: name.into(),
            kind: FieldKind::Character,
            width: None,
            decimals: 0,
        }
    }

    pub fn fixed(name: impl Into<String>, kind: FieldKind, width: usize, decimals: u8) -> Self {
        FieldDef {
            name: name.into(),
            kind,
            width: Some(width),
            decimals,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub values: Vec<String>,
    pub deleted: bool,
}

/// Operations the duplication engine needs from a loaded table.
pub trait Table {
    fn record_count(&self) -> usize;

    fn field_names(&self) -> Vec<&str>;

    /// `Ok(None)` when `field` is not part of the schema.
    fn field_value(&self, record: usize, field: &str) -> Result<Option<&str>, TableError>;

    fn set_field(&mut self, record: usize, field: &str, value: &str) -> Result<(), TableError>;

    /// Appends an empty record and returns its index.
    fn insert_record(&mut self) -> usize;

    /// Checks that `value` could be stored in `field` without loss.
    fn check_value(&self, field: &str, value: &str) -> Result<(), TableError>;

    fn is_deleted(&self, _record: usize) -> bool {
        false
    }
}

/// Loads files into a [`RecordTable`] and writes them back.
pub trait TableStore: Sync {
    fn load(&self, path: &Path) -> Result<RecordTable>;

    fn save(&self, table: &RecordTable, path: &Path) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct RecordTable {
    fields: Vec<FieldDef>,
    rows: Vec<Row>,
    encoding: &'static Encoding,
    dbf_preamble: Option<DbfPreamble>,
}

impl RecordTable {
    pub fn new(fields: Vec<FieldDef>, encoding: &'static Encoding) -> Self {
        RecordTable {
            fields,
            rows: Vec::new(),
            encoding,
            dbf_preamble: None,
        }
    }

    /// Builds a table from already decoded rows. Short rows are padded with
    /// empty values so that every row exposes the full schema.
    pub fn with_rows(
        fields: Vec<FieldDef>,
        rows: impl IntoIterator<Item = Row>,
        encoding: &'static Encoding,
    ) -> Self {
        let width = fields.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.values.resize(width, String::new());
                row
            })
            .collect();
        RecordTable {
            fields,
            rows,
            encoding,
            dbf_preamble: None,
        }
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn dbf_preamble(&self) -> Option<&DbfPreamble> {
        self.dbf_preamble.as_ref()
    }

    pub fn set_dbf_preamble(&mut self, preamble: DbfPreamble) {
        self.dbf_preamble = Some(preamble);
    }

    pub fn push_row(&mut self, values: Vec<String>) -> usize {
        self.rows.push(Row {
            values,
            deleted: false,
        });
        let index = self.rows.len() - 1;
        self.rows[index].values.resize(self.fields.len(), String::new());
        index
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    fn row(&self, record: usize) -> Result<&Row, TableError> {
        self.rows.get(record).ok_or(TableError::RecordOutOfRange {
            index: record,
            count: self.rows.len(),
        })
    }
}

impl Table for RecordTable {
    fn record_count(&self) -> usize {
        self.rows.len()
    }

    fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    fn field_value(&self, record: usize, field: &str) -> Result<Option<&str>, TableError> {
        let row = self.row(record)?;
        Ok(self
            .field_index(field)
            .map(|idx| row.values[idx].as_str()))
    }

    fn set_field(&mut self, record: usize, field: &str, value: &str) -> Result<(), TableError> {
        let idx = self
            .field_index(field)
            .ok_or_else(|| TableError::UnknownField {
                name: field.to_string(),
            })?;
        self.check_value(field, value)?;
        let count = self.rows.len();
        let row = self
            .rows
            .get_mut(record)
            .ok_or(TableError::RecordOutOfRange {
                index: record,
                count,
            })?;
        row.values[idx] = value.to_string();
        Ok(())
    }

    fn insert_record(&mut self) -> usize {
        self.push_row(Vec::new())
    }

    fn check_value(&self, field: &str, value: &str) -> Result<(), TableError> {
        let def = self
            .field_index(field)
            .map(|idx| &self.fields[idx])
            .ok_or_else(|| TableError::UnknownField {
                name: field.to_string(),
            })?;
        let Some(width) = def.width else {
            return Ok(());
        };
        let (encoded, _, had_errors) = self.encoding.encode(value);
        if had_errors {
            return Err(TableError::Unencodable {
                field: def.name.clone(),
                value: value.to_string(),
                encoding: self.encoding.name(),
            });
        }
        if encoded.len() > width {
            return Err(TableError::ValueTooWide {
                field: def.name.clone(),
                value: value.to_string(),
                needed: encoded.len(),
                width,
            });
        }
        Ok(())
    }

    fn is_deleted(&self, record: usize) -> bool {
        self.rows.get(record).is_some_and(|row| row.deleted)
    }
}

//! CSV/TSV tables. The header row is the field schema; every column is
//! unbounded text.

use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::Encoding;

use crate::{
    io_utils,
    table::{FieldDef, RecordTable, Row, TableStore},
};

#[derive(Debug, Clone, Copy)]
pub struct CsvStore {
    encoding: &'static Encoding,
    delimiter: Option<u8>,
}

impl CsvStore {
    pub fn new(encoding: &'static Encoding, delimiter: Option<u8>) -> Self {
        CsvStore {
            encoding,
            delimiter,
        }
    }
}

impl TableStore for CsvStore {
    fn load(&self, path: &Path) -> Result<RecordTable> {
        let raw = fs::read(path).with_context(|| format!("Opening input file {path:?}"))?;
        let text = self
            .encoding
            .decode_without_bom_handling_and_without_replacement(&raw)
            .ok_or_else(|| anyhow!("{path:?} is not valid {}", self.encoding.name()))?;
        let delimiter = io_utils::resolve_delimiter(path, self.delimiter);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .double_quote(true)
            .flexible(false)
            .from_reader(text.as_bytes());

        let fields = reader
            .headers()
            .with_context(|| format!("Reading headers from {path:?}"))?
            .iter()
            .map(FieldDef::text)
            .collect::<Vec<_>>();
        let mut rows = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("Reading row {} in {path:?}", idx + 2))?;
            rows.push(Row {
                values: record.iter().map(str::to_string).collect(),
                deleted: false,
            });
        }
        Ok(RecordTable::with_rows(fields, rows, self.encoding))
    }

    fn save(&self, table: &RecordTable, path: &Path) -> Result<()> {
        let delimiter = io_utils::resolve_delimiter(path, self.delimiter);
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .quote_style(QuoteStyle::Always)
            .double_quote(true)
            .from_writer(Vec::new());
        writer.write_record(table.fields().iter().map(|f| f.name.as_str()))?;
        for row in table.rows() {
            writer.write_record(&row.values)?;
        }
        let utf8 = writer
            .into_inner()
            .map_err(|err| anyhow!("Buffering CSV output: {}", err.error()))?;
        let utf8 = String::from_utf8(utf8).context("CSV output is not valid UTF-8")?;
        let (encoded, _, had_errors) = table.encoding().encode(&utf8);
        if had_errors {
            return Err(anyhow!(
                "Failed to encode {path:?} using {}",
                table.encoding().name()
            ));
        }
        fs::write(path, encoded).with_context(|| format!("Creating output file {path:?}"))
    }
}

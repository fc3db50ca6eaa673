use std::path::Path;

use anyhow::Result;
use encoding_rs::{Encoding, UTF_8};

use crate::{
    csv_store::CsvStore,
    dbf::DbfStore,
    io_utils,
    table::{RecordTable, TableStore},
};

/// Picks the codec from the file extension: `.csv`/`.tsv` go through
/// [`CsvStore`], everything else is read as dBase. Without an explicit
/// encoding CSV is UTF-8 and dBase follows the file header.
#[derive(Debug, Clone, Copy)]
pub struct FileStore {
    dbf: DbfStore,
    csv: CsvStore,
}

impl FileStore {
    pub fn new(encoding: Option<&'static Encoding>, delimiter: Option<u8>) -> Self {
        FileStore {
            dbf: DbfStore::new(encoding),
            csv: CsvStore::new(encoding.unwrap_or(UTF_8), delimiter),
        }
    }

    fn codec_for(&self, path: &Path) -> &dyn TableStore {
        if io_utils::has_extension(path, "csv") || io_utils::has_extension(path, "tsv") {
            &self.csv
        } else {
            &self.dbf
        }
    }
}

impl TableStore for FileStore {
    fn load(&self, path: &Path) -> Result<RecordTable> {
        self.codec_for(path).load(path)
    }

    fn save(&self, table: &RecordTable, path: &Path) -> Result<()> {
        self.codec_for(path).save(table, path)
    }
}

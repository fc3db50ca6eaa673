//! dBase III compatible table codec.
//!
//! # File layout
//!
//! | Offset        | Size | Description                                  |
//! |---------------|------|----------------------------------------------|
//! | 0             | 1    | Version byte                                 |
//! | 1-3           | 3    | Last update (YY since 1900, MM, DD)          |
//! | 4-7           | 4    | Record count (u32 LE)                        |
//! | 8-9           | 2    | Header length (u16 LE)                       |
//! | 10-11         | 2    | Record length incl. deletion flag (u16 LE)   |
//! | 29            | 1    | Language driver id                           |
//! | 32..          | 32*n | Field descriptors                            |
//! | ..            | 1    | `0x0D` terminator                            |
//! | ..header_len  | var  | Optional backlink area (Visual FoxPro)       |
//!
//! Each field descriptor holds an 11-byte NUL padded name, the type code at
//! byte 11, the length at byte 16 and the decimal count at byte 17. Records
//! start at the header length; each is a one-byte deletion flag followed by
//! the fixed-width fields. An optional `0x1A` byte marks end of file.
//!
//! Text is decoded with the code page named by the language driver byte
//! unless the caller fixes an encoding.

use std::{
    borrow::Cow,
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use chrono::{Datelike, Local};
use encoding_rs::{
    BIG5, EUC_KR, Encoding, GBK, IBM866, SHIFT_JIS, UTF_8, WINDOWS_874, WINDOWS_1250,
    WINDOWS_1251, WINDOWS_1252, WINDOWS_1253, WINDOWS_1254, WINDOWS_1255, WINDOWS_1256,
    WINDOWS_1257,
};
use log::debug;

use crate::{
    error::{DbfError, TableError},
    table::{FieldDef, FieldKind, RecordTable, Row, TableStore},
};

pub const HEADER_LEN: usize = 32;
pub const DESCRIPTOR_LEN: usize = 32;
pub const MAX_FIELDS: usize = 255;

const TERMINATOR: u8 = 0x0D;
const END_OF_FILE: u8 = 0x1A;
const LIVE: u8 = b' ';
const DELETED: u8 = b'*';
const DEFAULT_VERSION: u8 = 0x03;
const MAX_FIELD_NAME: usize = 10;
/// Width used for unbounded text columns when a table has no declared widths.
const MAX_CHAR_WIDTH: usize = 254;

/// Header bytes that are carried through a load/save cycle untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbfPreamble {
    pub version: u8,
    pub language_driver: u8,
    /// Bytes between the terminator and the first record.
    pub backlink: Vec<u8>,
}

impl Default for DbfPreamble {
    fn default() -> Self {
        DbfPreamble {
            version: DEFAULT_VERSION,
            language_driver: 0,
            backlink: Vec::new(),
        }
    }
}

/// Code page declared by a language driver id, when `encoding_rs` can decode it.
pub fn encoding_for_language_driver(id: u8) -> Option<&'static Encoding> {
    let encoding = match id {
        0x03 | 0x57 | 0x58 | 0x59 => WINDOWS_1252,
        0x13 | 0x7B => SHIFT_JIS,
        0x26 | 0x65 => IBM866,
        0x4D | 0x7A => GBK,
        0x4E | 0x79 => EUC_KR,
        0x4F | 0x78 => BIG5,
        0x50 | 0x7C => WINDOWS_874,
        0x7D => WINDOWS_1255,
        0x7E => WINDOWS_1256,
        0xC8 => WINDOWS_1250,
        0xC9 => WINDOWS_1251,
        0xCA => WINDOWS_1254,
        0xCB => WINDOWS_1253,
        0xCC => WINDOWS_1257,
        _ => return None,
    };
    Some(encoding)
}

/// Encoding named by the header of `bytes`, UTF-8 when it names none we know.
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    bytes
        .get(29)
        .copied()
        .and_then(encoding_for_language_driver)
        .unwrap_or(UTF_8)
}

/// [`TableStore`] for `.dbf` files.
#[derive(Debug, Clone, Copy)]
pub struct DbfStore {
    /// Fixed encoding; `None` follows each file's language driver.
    encoding: Option<&'static Encoding>,
}

impl DbfStore {
    pub fn new(encoding: Option<&'static Encoding>) -> Self {
        DbfStore { encoding }
    }
}

impl TableStore for DbfStore {
    fn load(&self, path: &Path) -> Result<RecordTable> {
        let bytes = fs::read(path).with_context(|| format!("Opening dBase file {path:?}"))?;
        let encoding = self.encoding.unwrap_or_else(|| detect_encoding(&bytes));
        debug!("{}: decoding as {}", path.display(), encoding.name());
        let table = read_table(&bytes, encoding)
            .with_context(|| format!("Decoding dBase file {path:?}"))?;
        Ok(table)
    }

    fn save(&self, table: &RecordTable, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating dBase file {path:?}"))?;
        let mut writer = BufWriter::new(file);
        write_table(table, &mut writer).with_context(|| format!("Writing dBase file {path:?}"))?;
        writer
            .flush()
            .with_context(|| format!("Flushing dBase file {path:?}"))
    }
}

pub fn read_table(bytes: &[u8], encoding: &'static Encoding) -> Result<RecordTable, DbfError> {
    if bytes.len() < HEADER_LEN {
        return Err(DbfError::TruncatedHeader { len: bytes.len() });
    }
    let version = bytes[0];
    let record_count = read_u32(bytes, 4) as usize;
    let header_len = read_u16(bytes, 8) as usize;
    let record_len = read_u16(bytes, 10) as usize;
    let language_driver = bytes[29];
    if bytes.len() < header_len {
        return Err(DbfError::TruncatedHeader { len: bytes.len() });
    }

    let (fields, terminator) = read_descriptors(bytes, header_len, encoding)?;
    let computed = 1 + fields.iter().filter_map(|f| f.width).sum::<usize>();
    if computed != record_len {
        return Err(DbfError::RecordLengthMismatch {
            declared: record_len,
            computed,
        });
    }

    let available = (bytes.len() - header_len) / record_len;
    if available < record_count {
        return Err(DbfError::TruncatedRecord { index: available });
    }

    let mut rows = Vec::with_capacity(record_count);
    for index in 0..record_count {
        let start = header_len + index * record_len;
        let record = bytes
            .get(start..start + record_len)
            .ok_or(DbfError::TruncatedRecord { index })?;
        rows.push(read_record(record, index, &fields, encoding)?);
    }

    let mut table = RecordTable::with_rows(fields, rows, encoding);
    table.set_dbf_preamble(DbfPreamble {
        version,
        language_driver,
        backlink: bytes[terminator + 1..header_len].to_vec(),
    });
    Ok(table)
}

fn read_descriptors(
    bytes: &[u8],
    header_len: usize,
    encoding: &'static Encoding,
) -> Result<(Vec<FieldDef>, usize), DbfError> {
    let mut fields = Vec::new();
    let mut offset = HEADER_LEN;
    loop {
        match bytes.get(offset) {
            Some(&TERMINATOR) if offset < header_len => return Ok((fields, offset)),
            Some(_) if offset + DESCRIPTOR_LEN <= header_len => {}
            _ => return Err(DbfError::MissingTerminator { header_len }),
        }
        let descriptor = &bytes[offset..offset + DESCRIPTOR_LEN];
        let raw_name = &descriptor[..11];
        let name_end = raw_name.iter().position(|&b| b == 0).unwrap_or(11);
        let name = decode(&raw_name[..name_end], encoding, "field name")?
            .trim()
            .to_string();
        let kind = FieldKind::from_code(descriptor[11]);
        let (width, decimals) = match kind {
            // Clipper stores wide character fields with the decimal byte as the high byte.
            FieldKind::Character => (
                descriptor[16] as usize | (descriptor[17] as usize) << 8,
                0,
            ),
            _ => (descriptor[16] as usize, descriptor[17]),
        };
        if width == 0 {
            return Err(DbfError::ZeroLengthField { name });
        }
        fields.push(FieldDef::fixed(name, kind, width, decimals));
        offset += DESCRIPTOR_LEN;
    }
}

fn read_record(
    record: &[u8],
    index: usize,
    fields: &[FieldDef],
    encoding: &'static Encoding,
) -> Result<Row, DbfError> {
    let deleted = match record[0] {
        LIVE => false,
        DELETED => true,
        flag => return Err(DbfError::BadDeletionFlag { index, flag }),
    };
    let mut values = Vec::with_capacity(fields.len());
    let mut offset = 1;
    for field in fields {
        let width = field.width.unwrap_or_default();
        let raw = &record[offset..offset + width];
        let text = decode(raw, encoding, &field.name)?;
        let trimmed = if field.kind.is_right_aligned() {
            text.trim_matches(|c: char| c == ' ' || c == '\0')
        } else {
            text.trim_end_matches(|c: char| c == ' ' || c == '\0')
        };
        values.push(trimmed.to_string());
        offset += width;
    }
    Ok(Row { values, deleted })
}

fn decode<'a>(
    raw: &'a [u8],
    encoding: &'static Encoding,
    field: &str,
) -> Result<Cow<'a, str>, DbfError> {
    encoding
        .decode_without_bom_handling_and_without_replacement(raw)
        .ok_or_else(|| DbfError::Undecodable {
            field: field.to_string(),
            encoding: encoding.name(),
        })
}

pub fn write_table<W: Write>(table: &RecordTable, out: &mut W) -> Result<(), DbfError> {
    let encoding = table.encoding();
    let fields = resolve_layout(table)?;
    if fields.len() > MAX_FIELDS {
        return Err(DbfError::TooManyFields {
            count: fields.len(),
            max: MAX_FIELDS,
        });
    }
    let default_preamble = DbfPreamble::default();
    let preamble = table.dbf_preamble().unwrap_or(&default_preamble);

    let record_len = 1 + fields.iter().map(|f| f.width.unwrap_or_default()).sum::<usize>();
    let record_len =
        u16::try_from(record_len).map_err(|_| DbfError::RecordTooLong { len: record_len })?;
    let header_len = HEADER_LEN + fields.len() * DESCRIPTOR_LEN + 1 + preamble.backlink.len();
    let header_len =
        u16::try_from(header_len).map_err(|_| DbfError::TooManyFields {
            count: fields.len(),
            max: MAX_FIELDS,
        })?;
    let record_count = table.rows().len();
    let record_count = u32::try_from(record_count)
        .map_err(|_| DbfError::TooManyRecords {
            count: record_count,
        })?;

    let today = Local::now().date_naive();
    let mut header = [0u8; HEADER_LEN];
    header[0] = preamble.version;
    header[1] = (today.year() - 1900).clamp(0, 255) as u8;
    header[2] = today.month() as u8;
    header[3] = today.day() as u8;
    header[4..8].copy_from_slice(&record_count.to_le_bytes());
    header[8..10].copy_from_slice(&header_len.to_le_bytes());
    header[10..12].copy_from_slice(&record_len.to_le_bytes());
    header[29] = preamble.language_driver;
    out.write_all(&header)?;

    for field in &fields {
        out.write_all(&encode_descriptor(field, encoding)?)?;
    }
    out.write_all(&[TERMINATOR])?;
    out.write_all(&preamble.backlink)?;

    let mut record = Vec::with_capacity(record_len as usize);
    for row in table.rows() {
        record.clear();
        record.push(if row.deleted { DELETED } else { LIVE });
        for (field, value) in fields.iter().zip(&row.values) {
            encode_value(field, value, encoding, &mut record)?;
        }
        out.write_all(&record)?;
    }
    out.write_all(&[END_OF_FILE])?;
    Ok(())
}

/// Fills in widths for columns that never had one (tables loaded from CSV).
fn resolve_layout(table: &RecordTable) -> Result<Vec<FieldDef>, DbfError> {
    let encoding = table.encoding();
    table
        .fields()
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            if field.width.is_some() {
                return Ok(field.clone());
            }
            let mut widest = 1;
            for row in table.rows() {
                let (encoded, _, _) = encoding.encode(&row.values[idx]);
                widest = widest.max(encoded.len());
            }
            Ok(FieldDef::fixed(
                field.name.clone(),
                FieldKind::Character,
                widest.min(MAX_CHAR_WIDTH),
                0,
            ))
        })
        .collect()
}

fn encode_descriptor(
    field: &FieldDef,
    encoding: &'static Encoding,
) -> Result<[u8; DESCRIPTOR_LEN], DbfError> {
    let (name, _, had_errors) = encoding.encode(&field.name);
    if had_errors || name.len() > MAX_FIELD_NAME {
        return Err(DbfError::FieldNameTooLong {
            name: field.name.clone(),
        });
    }
    let width = field.width.unwrap_or_default();
    let mut descriptor = [0u8; DESCRIPTOR_LEN];
    descriptor[..name.len()].copy_from_slice(&name);
    descriptor[11] = field.kind.code();
    match field.kind {
        FieldKind::Character => {
            descriptor[16] = (width & 0xFF) as u8;
            descriptor[17] = (width >> 8) as u8;
        }
        _ => {
            descriptor[16] = u8::try_from(width).map_err(|_| DbfError::RecordTooLong {
                len: width,
            })?;
            descriptor[17] = field.decimals;
        }
    }
    Ok(descriptor)
}

fn encode_value(
    field: &FieldDef,
    value: &str,
    encoding: &'static Encoding,
    out: &mut Vec<u8>,
) -> Result<(), DbfError> {
    let width = field.width.unwrap_or_default();
    let (encoded, _, had_errors) = encoding.encode(value);
    if had_errors {
        return Err(TableError::Unencodable {
            field: field.name.clone(),
            value: value.to_string(),
            encoding: encoding.name(),
        }
        .into());
    }
    if encoded.len() > width {
        return Err(TableError::ValueTooWide {
            field: field.name.clone(),
            value: value.to_string(),
            needed: encoded.len(),
            width,
        }
        .into());
    }
    let padding = width - encoded.len();
    if field.kind.is_right_aligned() {
        out.extend(std::iter::repeat_n(b' ', padding));
        out.extend_from_slice(&encoded);
    } else {
        out.extend_from_slice(&encoded);
        out.extend(std::iter::repeat_n(b' ', padding));
    }
    Ok(())
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::table::Table;

    fn sample_table() -> RecordTable {
        RecordTable::with_rows(
            vec![
                FieldDef::fixed("STATUS", FieldKind::Character, 4, 0),
                FieldDef::fixed("AMOUNT", FieldKind::Numeric, 8, 2),
                FieldDef::fixed("DUE", FieldKind::Date, 8, 0),
            ],
            [
                Row {
                    values: vec!["A".into(), "12.50".into(), "20240105".into()],
                    deleted: false,
                },
                Row {
                    values: vec!["B".into(), "-3.00".into(), String::new()],
                    deleted: true,
                },
            ],
            UTF_8,
        )
    }

    fn encode(table: &RecordTable) -> Vec<u8> {
        let mut bytes = Vec::new();
        write_table(table, &mut bytes).expect("write table");
        bytes
    }

    #[test]
    fn header_describes_fields_and_records() {
        let bytes = encode(&sample_table());
        assert_eq!(bytes[0], DEFAULT_VERSION);
        assert_eq!(read_u32(&bytes, 4), 2);
        let header_len = read_u16(&bytes, 8) as usize;
        assert_eq!(header_len, HEADER_LEN + 3 * DESCRIPTOR_LEN + 1);
        assert_eq!(read_u16(&bytes, 10), 1 + 4 + 8 + 8);
        assert_eq!(&bytes[32..38], b"STATUS");
        assert_eq!(bytes[32 + 11], b'C');
        assert_eq!(bytes[64 + 11], b'N');
        assert_eq!(bytes[64 + 16], 8);
        assert_eq!(bytes[64 + 17], 2);
        assert_eq!(bytes[header_len - 1], TERMINATOR);
        assert_eq!(*bytes.last().unwrap(), END_OF_FILE);
        assert_eq!(bytes.len(), header_len + 2 * 21 + 1);
    }

    #[test]
    fn records_are_padded_by_alignment() {
        let bytes = encode(&sample_table());
        let header_len = read_u16(&bytes, 8) as usize;
        let first = &bytes[header_len..header_len + 21];
        assert_eq!(first, b" A      12.5020240105");
        let second = &bytes[header_len + 21..header_len + 42];
        assert_eq!(second[0], DELETED);
    }

    #[test]
    fn read_restores_values_and_deletion_flags() {
        let bytes = encode(&sample_table());
        let table = read_table(&bytes, UTF_8).unwrap();
        assert_eq!(table.field_names(), vec!["STATUS", "AMOUNT", "DUE"]);
        assert_eq!(table.fields()[1].decimals, 2);
        assert_eq!(table.rows()[0].values, vec!["A", "12.50", "20240105"]);
        assert_eq!(table.rows()[1].values, vec!["B", "-3.00", ""]);
        assert!(table.rows()[1].deleted);
        assert!(table.is_deleted(1));
    }

    #[test]
    fn preamble_survives_a_load_save_cycle() {
        let mut table = sample_table();
        table.set_dbf_preamble(DbfPreamble {
            version: 0x30,
            language_driver: 0xC9,
            backlink: vec![0; 263],
        });
        let bytes = encode(&table);
        let reloaded = read_table(&bytes, UTF_8).unwrap();
        let preamble = reloaded.dbf_preamble().unwrap();
        assert_eq!(preamble.version, 0x30);
        assert_eq!(preamble.language_driver, 0xC9);
        assert_eq!(preamble.backlink.len(), 263);
        assert_eq!(reloaded.rows()[0].values[0], "A");
    }

    #[test]
    fn single_byte_code_pages_round_trip() {
        let table = RecordTable::with_rows(
            vec![FieldDef::fixed("NAME", FieldKind::Character, 5, 0)],
            [Row {
                values: vec!["Київ".into()],
                deleted: false,
            }],
            WINDOWS_1251,
        );
        let bytes = encode(&table);
        let header_len = read_u16(&bytes, 8) as usize;
        assert_eq!(read_u16(&bytes, 10), 6);
        assert_eq!(bytes.len(), header_len + 6 + 1);
        let reloaded = read_table(&bytes, WINDOWS_1251).unwrap();
        assert_eq!(reloaded.rows()[0].values[0], "Київ");
    }

    #[test]
    fn unbounded_columns_get_widths_from_their_values() {
        let table = RecordTable::with_rows(
            vec![FieldDef::text("id"), FieldDef::text("note")],
            [
                Row {
                    values: vec!["1".into(), "short".into()],
                    deleted: false,
                },
                Row {
                    values: vec!["22".into(), "a longer note".into()],
                    deleted: false,
                },
            ],
            UTF_8,
        );
        let reloaded = read_table(&encode(&table), UTF_8).unwrap();
        assert_eq!(reloaded.fields()[0].width, Some(2));
        assert_eq!(reloaded.fields()[1].width, Some(13));
        assert_eq!(reloaded.rows()[1].values, vec!["22", "a longer note"]);
    }

    #[test]
    fn too_wide_values_are_rejected_on_write() {
        let table = RecordTable::with_rows(
            vec![FieldDef::fixed("S", FieldKind::Character, 1, 0)],
            [Row {
                values: vec!["AB".into()],
                deleted: false,
            }],
            UTF_8,
        );
        let mut sink = Vec::new();
        let err = write_table(&table, &mut sink).unwrap_err();
        assert!(matches!(
            err,
            DbfError::Table(TableError::ValueTooWide { needed: 2, width: 1, .. })
        ));
    }

    #[test]
    fn long_field_names_are_rejected() {
        let table = RecordTable::new(vec![FieldDef::text("ELEVENCHARS")], UTF_8);
        let mut sink = Vec::new();
        assert!(matches!(
            write_table(&table, &mut sink),
            Err(DbfError::FieldNameTooLong { .. })
        ));
    }

    #[test]
    fn truncated_inputs_are_reported() {
        assert!(matches!(
            read_table(&[0x03; 10], UTF_8),
            Err(DbfError::TruncatedHeader { len: 10 })
        ));

        let mut bytes = encode(&sample_table());
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(
            read_table(&bytes, UTF_8),
            Err(DbfError::TruncatedRecord { index: 1 })
        ));
    }

    #[test]
    fn record_count_beyond_file_length_is_rejected_before_allocating() {
        let mut bytes = vec![0u8; HEADER_LEN + 1];
        bytes[0] = DEFAULT_VERSION;
        bytes[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
        bytes[8..10].copy_from_slice(&33u16.to_le_bytes());
        bytes[10..12].copy_from_slice(&1u16.to_le_bytes());
        bytes[HEADER_LEN] = TERMINATOR;
        assert!(matches!(
            read_table(&bytes, UTF_8),
            Err(DbfError::TruncatedRecord { index: 0 })
        ));
    }

    #[test]
    fn language_driver_picks_the_code_page_unless_one_is_fixed() {
        let dir = tempdir().unwrap();
        let mut table = RecordTable::with_rows(
            vec![FieldDef::fixed("CITY", FieldKind::Character, 8, 0)],
            [Row {
                values: vec!["Москва".into()],
                deleted: false,
            }],
            IBM866,
        );
        table.set_dbf_preamble(DbfPreamble {
            language_driver: 0x26,
            ..DbfPreamble::default()
        });
        let path = dir.path().join("cities.dbf");
        fs::write(&path, encode(&table)).unwrap();

        let loaded = DbfStore::new(None).load(&path).unwrap();
        assert_eq!(loaded.encoding(), IBM866);
        assert_eq!(loaded.rows()[0].values[0], "Москва");

        let saved = dir.path().join("saved.dbf");
        DbfStore::new(None).save(&loaded, &saved).unwrap();
        let reloaded = DbfStore::new(None).load(&saved).unwrap();
        assert_eq!(reloaded.rows()[0].values[0], "Москва");

        assert!(DbfStore::new(Some(UTF_8)).load(&path).is_err());
    }

    #[test]
    fn unknown_language_drivers_fall_back_to_utf8() {
        assert_eq!(encoding_for_language_driver(0xC9), Some(WINDOWS_1251));
        assert_eq!(encoding_for_language_driver(0x00), None);
        assert_eq!(encoding_for_language_driver(0x64), None);
        assert_eq!(detect_encoding(&encode(&sample_table())), UTF_8);
        assert_eq!(detect_encoding(&[0x03; 4]), UTF_8);
    }

    #[test]
    fn missing_terminator_is_reported() {
        let mut bytes = encode(&sample_table());
        let header_len = read_u16(&bytes, 8) as usize;
        bytes[header_len - 1] = b'X';
        assert!(matches!(
            read_table(&bytes, UTF_8),
            Err(DbfError::MissingTerminator { .. })
        ));
    }

    #[test]
    fn record_length_mismatch_is_reported() {
        let mut bytes = encode(&sample_table());
        bytes[10] = 99;
        assert!(matches!(
            read_table(&bytes, UTF_8),
            Err(DbfError::RecordLengthMismatch { declared: 99, computed: 21 })
        ));
    }
}

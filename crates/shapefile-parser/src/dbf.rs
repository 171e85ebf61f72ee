//! dBase III attribute table (`.dbf`) parsing.
//!
//! Only what is needed to pull one text column out of the table: the file
//! header, the field descriptor array and fixed-width record slots.

use std::path::Path;

use crate::error::{ShapefileError, ShapefileResult};

const HEADER_LEN: usize = 32;
const DESCRIPTOR_LEN: usize = 32;
const DESCRIPTOR_TERMINATOR: u8 = 0x0D;
const DELETED_FLAG: u8 = b'*';

/// One column of the table.
#[derive(Debug, Clone, PartialEq)]
pub struct DbfField {
    pub name: String,
    /// dBase type code (`C`, `N`, `D`, ...)
    pub field_type: char,
    pub length: usize,
    pub decimal_count: u8,
    /// Byte offset inside a record, after the deletion flag
    pub offset: usize,
}

/// Parsed `.dbf` header.
#[derive(Debug, Clone)]
pub struct DbfHeader {
    pub record_count: usize,
    pub header_len: usize,
    pub record_len: usize,
    pub fields: Vec<DbfField>,
}

impl DbfHeader {
    /// Parse the file header and field descriptors.
    pub fn parse(data: &[u8]) -> ShapefileResult<Self> {
        if data.len() < HEADER_LEN {
            return Err(ShapefileError::Format(
                "DBF header shorter than 32 bytes".to_string(),
            ));
        }

        let record_count = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
        let header_len = u16::from_le_bytes([data[8], data[9]]) as usize;
        let record_len = u16::from_le_bytes([data[10], data[11]]) as usize;

        if header_len > data.len() || header_len < HEADER_LEN + 1 {
            return Err(ShapefileError::Format(format!(
                "DBF header length {} out of range for {} byte file",
                header_len,
                data.len()
            )));
        }

        let mut fields = Vec::new();
        let mut pos = HEADER_LEN;
        // record slots start with the deletion flag
        let mut offset = 1;
        while pos < header_len && data[pos] != DESCRIPTOR_TERMINATOR {
            if pos + DESCRIPTOR_LEN > header_len {
                return Err(ShapefileError::Format(
                    "DBF field descriptor runs past header".to_string(),
                ));
            }
            let desc = &data[pos..pos + DESCRIPTOR_LEN];
            let name_end = desc[..11].iter().position(|&b| b == 0).unwrap_or(11);
            let name = String::from_utf8_lossy(&desc[..name_end]).trim().to_string();
            let length = desc[16] as usize;
            fields.push(DbfField {
                name,
                field_type: desc[11] as char,
                length,
                decimal_count: desc[17],
                offset,
            });
            offset += length;
            pos += DESCRIPTOR_LEN;
        }

        if offset > record_len {
            return Err(ShapefileError::Format(format!(
                "DBF fields span {} bytes but records are {} bytes",
                offset, record_len
            )));
        }

        Ok(Self {
            record_count,
            header_len,
            record_len,
            fields,
        })
    }

    /// Look up a column by name, ignoring ASCII case.
    pub fn field(&self, name: &str) -> Option<&DbfField> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }
}

/// Values of one column, indexed by zero-based record position.
///
/// Values are trimmed of the space padding dBase uses for fixed-width slots.
/// Deleted rows keep their slot so positions stay aligned with shape record
/// numbers.
pub fn parse_column(data: &[u8], column: &str) -> ShapefileResult<Vec<String>> {
    let header = DbfHeader::parse(data)?;
    let field = header.field(column).ok_or_else(|| {
        ShapefileError::Format(format!(
            "DBF has no column named {:?} (columns: {})",
            column,
            header
                .fields
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })?;

    let needed = header.header_len + header.record_count * header.record_len;
    if data.len() < needed {
        return Err(ShapefileError::Format(format!(
            "DBF truncated: {} records need {} bytes, file has {}",
            header.record_count,
            needed,
            data.len()
        )));
    }

    let mut values = Vec::with_capacity(header.record_count);
    let mut deleted = 0usize;
    for i in 0..header.record_count {
        let start = header.header_len + i * header.record_len;
        if data[start] == DELETED_FLAG {
            deleted += 1;
        }
        let slot = &data[start + field.offset..start + field.offset + field.length];
        let text = String::from_utf8_lossy(slot);
        values.push(text.trim_matches(|c: char| c == ' ' || c == '\0').to_string());
    }

    if deleted > 0 {
        tracing::debug!(deleted, column, "DBF contains deleted rows");
    }

    Ok(values)
}

/// Read the named column from a `.dbf` file.
pub fn read_column(path: &Path, column: &str) -> ShapefileResult<Vec<String>> {
    let data = std::fs::read(path)?;
    parse_column(&data, column)
}

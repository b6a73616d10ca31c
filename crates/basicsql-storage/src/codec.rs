//! On-disk binary layout for a table file (spec §4.1).
//!
//! ```text
//! [magic: 4 bytes]  [version: u16]  [flags: u16]
//! [column_count: u32]
//! repeat column_count times:
//!     [name_len: u16][name: UTF-8][declared_type: u8][col_flags: u8]
//! [auto_inc_next: i64]
//! [row_count_at_last_compaction: u64]
//! repeat:
//!     [row_tag: u8]  # 0 = tombstone, 1 = live
//!     [payload_len: u32]
//!     [payload: payload_len bytes]
//! ```
//!
//! Row payload: one value tag byte per column (`0=null,1=i32,2=i64,3=real,4=text`)
//! followed by a fixed-width or length-prefixed payload.

use crate::error::{Error, Result};
use basicsql_core::{Column, DataType, Value};

pub const MAGIC: &[u8; 4] = b"BSQL";
pub const VERSION: u16 = 1;

pub const ROW_TAG_TOMBSTONE: u8 = 0;
pub const ROW_TAG_LIVE: u8 = 1;

const TYPE_INTEGER: u8 = 0;
const TYPE_LONG: u8 = 1;
const TYPE_TEXT: u8 = 2;
const TYPE_REAL: u8 = 3;

const FLAG_NOT_NULL: u8 = 0b001;
const FLAG_PRIMARY_KEY: u8 = 0b010;
const FLAG_AUTO_INCREMENT: u8 = 0b100;

const VALUE_TAG_NULL: u8 = 0;
const VALUE_TAG_I32: u8 = 1;
const VALUE_TAG_I64: u8 = 2;
const VALUE_TAG_REAL: u8 = 3;
const VALUE_TAG_TEXT: u8 = 4;

fn type_to_byte(t: DataType) -> u8 {
    match t {
        DataType::Integer => TYPE_INTEGER,
        DataType::Long => TYPE_LONG,
        DataType::Text => TYPE_TEXT,
        DataType::Real => TYPE_REAL,
    }
}

fn byte_to_type(b: u8) -> Result<DataType> {
    match b {
        TYPE_INTEGER => Ok(DataType::Integer),
        TYPE_LONG => Ok(DataType::Long),
        TYPE_TEXT => Ok(DataType::Text),
        TYPE_REAL => Ok(DataType::Real),
        other => Err(Error::Corruption(format!("unknown declared_type byte {other}"))),
    }
}

fn flags_to_byte(c: &Column) -> u8 {
    let mut b = 0u8;
    if c.not_null {
        b |= FLAG_NOT_NULL;
    }
    if c.primary_key {
        b |= FLAG_PRIMARY_KEY;
    }
    if c.auto_increment {
        b |= FLAG_AUTO_INCREMENT;
    }
    b
}

/// The fixed part of a table file's header: schema plus the two persisted
/// counters. Row data follows immediately after this header in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub columns: Vec<Column>,
    pub auto_inc_next: i64,
    pub row_count_at_last_compaction: u64,
}

/// Serialize the header. Called whenever the schema or `auto_inc_next`
/// changes; the row area is untouched by this call (spec §4.1).
pub fn encode_header(header: &Header) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&VERSION.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes()); // flags, reserved

    buf.extend_from_slice(&(header.columns.len() as u32).to_le_bytes());
    for column in &header.columns {
        let name_bytes = column.name.as_bytes();
        buf.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
        buf.extend_from_slice(name_bytes);
        buf.push(type_to_byte(column.data_type));
        buf.push(flags_to_byte(column));
    }

    buf.extend_from_slice(&header.auto_inc_next.to_le_bytes());
    buf.extend_from_slice(&header.row_count_at_last_compaction.to_le_bytes());
    buf
}

/// Parse a header from the start of a byte slice, returning the header and
/// the byte offset where the row area begins.
pub fn decode_header(buf: &[u8]) -> Result<(Header, usize)> {
    let mut cursor = 0usize;
    let take = |cursor: &mut usize, n: usize, buf: &[u8]| -> Result<&[u8]> {
        if *cursor + n > buf.len() {
            return Err(Error::Corruption("header truncated".into()));
        }
        let slice = &buf[*cursor..*cursor + n];
        *cursor += n;
        Ok(slice)
    };

    let magic = take(&mut cursor, 4, buf)?;
    if magic != MAGIC {
        return Err(Error::Corruption("bad magic".into()));
    }
    let version = u16::from_le_bytes(take(&mut cursor, 2, buf)?.try_into().unwrap());
    if version != VERSION {
        return Err(Error::Corruption(format!("unsupported version {version}")));
    }
    let _flags = u16::from_le_bytes(take(&mut cursor, 2, buf)?.try_into().unwrap());

    let column_count = u32::from_le_bytes(take(&mut cursor, 4, buf)?.try_into().unwrap());
    let mut columns = Vec::with_capacity(column_count as usize);
    for _ in 0..column_count {
        let name_len = u16::from_le_bytes(take(&mut cursor, 2, buf)?.try_into().unwrap()) as usize;
        let name_bytes = take(&mut cursor, name_len, buf)?;
        let name = String::from_utf8(name_bytes.to_vec())
            .map_err(|_| Error::Corruption("column name is not valid UTF-8".into()))?;
        let declared_type = byte_to_type(take(&mut cursor, 1, buf)?[0])?;
        let flags = take(&mut cursor, 1, buf)?[0];
        columns.push(Column {
            name,
            data_type: declared_type,
            not_null: flags & FLAG_NOT_NULL != 0,
            primary_key: flags & FLAG_PRIMARY_KEY != 0,
            auto_increment: flags & FLAG_AUTO_INCREMENT != 0,
        });
    }

    let auto_inc_next = i64::from_le_bytes(take(&mut cursor, 8, buf)?.try_into().unwrap());
    let row_count_at_last_compaction =
        u64::from_le_bytes(take(&mut cursor, 8, buf)?.try_into().unwrap());

    Ok((
        Header {
            columns,
            auto_inc_next,
            row_count_at_last_compaction,
        },
        cursor,
    ))
}

/// Encode a row's payload (not including the `row_tag`/`payload_len` framing,
/// which the table file writes around it).
pub fn encode_row(row: &[Value]) -> Vec<u8> {
    let mut buf = Vec::new();
    for value in row {
        match value {
            Value::Null => buf.push(VALUE_TAG_NULL),
            Value::Integer32(v) => {
                buf.push(VALUE_TAG_I32);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::Integer64(v) => {
                buf.push(VALUE_TAG_I64);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::Real(v) => {
                buf.push(VALUE_TAG_REAL);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::Text(s) => {
                buf.push(VALUE_TAG_TEXT);
                let bytes = s.as_bytes();
                buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                buf.extend_from_slice(bytes);
            }
        }
    }
    buf
}

/// Decode a row payload for a schema of `column_count` columns.
pub fn decode_row(buf: &[u8], column_count: usize) -> Result<Vec<Value>> {
    let mut cursor = 0usize;
    let mut values = Vec::with_capacity(column_count);
    for _ in 0..column_count {
        if cursor >= buf.len() {
            return Err(Error::Corruption("row payload truncated".into()));
        }
        let tag = buf[cursor];
        cursor += 1;
        let value = match tag {
            VALUE_TAG_NULL => Value::Null,
            VALUE_TAG_I32 => {
                let end = cursor + 4;
                if end > buf.len() {
                    return Err(Error::Corruption("row payload truncated".into()));
                }
                let v = i32::from_le_bytes(buf[cursor..end].try_into().unwrap());
                cursor = end;
                Value::Integer32(v)
            }
            VALUE_TAG_I64 => {
                let end = cursor + 8;
                if end > buf.len() {
                    return Err(Error::Corruption("row payload truncated".into()));
                }
                let v = i64::from_le_bytes(buf[cursor..end].try_into().unwrap());
                cursor = end;
                Value::Integer64(v)
            }
            VALUE_TAG_REAL => {
                let end = cursor + 8;
                if end > buf.len() {
                    return Err(Error::Corruption("row payload truncated".into()));
                }
                let v = f64::from_le_bytes(buf[cursor..end].try_into().unwrap());
                cursor = end;
                Value::Real(v)
            }
            VALUE_TAG_TEXT => {
                let len_end = cursor + 4;
                if len_end > buf.len() {
                    return Err(Error::Corruption("row payload truncated".into()));
                }
                let len = u32::from_le_bytes(buf[cursor..len_end].try_into().unwrap()) as usize;
                cursor = len_end;
                let end = cursor + len;
                if end > buf.len() {
                    return Err(Error::Corruption("row payload truncated".into()));
                }
                let s = String::from_utf8(buf[cursor..end].to_vec())
                    .map_err(|_| Error::Corruption("text value is not valid UTF-8".into()))?;
                cursor = end;
                Value::Text(s)
            }
            other => return Err(Error::Corruption(format!("unknown value tag {other}"))),
        };
        values.push(value);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use basicsql_core::DataType;

    fn sample_columns() -> Vec<Column> {
        let mut id = Column::new("id", DataType::Integer);
        id.not_null = true;
        id.primary_key = true;
        id.auto_increment = true;
        let mut name = Column::new("name", DataType::Text);
        name.not_null = true;
        vec![id, name]
    }

    #[test]
    fn header_round_trips() {
        let header = Header {
            columns: sample_columns(),
            auto_inc_next: 3,
            row_count_at_last_compaction: 0,
        };
        let encoded = encode_header(&header);
        let (decoded, offset) = decode_header(&encoded).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(offset, encoded.len());
    }

    #[test]
    fn row_round_trips_all_value_kinds() {
        let row = vec![
            Value::Integer32(42),
            Value::Integer64(9_000_000_000),
            Value::Real(2.5),
            Value::Text("hi".into()),
            Value::Null,
        ];
        let encoded = encode_row(&row);
        let decoded = decode_row(&encoded, row.len()).unwrap();
        assert_eq!(decoded, row);
    }

    #[test]
    fn truncated_row_payload_is_corruption() {
        let row = vec![Value::Text("hello".into())];
        let mut encoded = encode_row(&row);
        encoded.truncate(encoded.len() - 2);
        assert!(decode_row(&encoded, 1).is_err());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut encoded = encode_header(&Header {
            columns: sample_columns(),
            auto_inc_next: 1,
            row_count_at_last_compaction: 0,
        });
        encoded[0] = b'X';
        assert!(decode_header(&encoded).is_err());
    }
}

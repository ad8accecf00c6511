//! Field values and their fixed-width binary encoding.
//!
//! Every field serializes to a fixed number of bytes so that tuple slots on a
//! heap page are uniform. Integers are 4 bytes big-endian; text fields are a
//! 4-byte length prefix followed by [`TEXT_LEN`] bytes of data, zero padded.

use crate::storage::error::{StorageError, StorageResult};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Read;

/// Maximum byte length of the string payload in a text field.
pub const TEXT_LEN: usize = 128;

/// Data types supported by the storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Int,
    Text,
}

impl DataType {
    /// Serialized width of a field of this type, in bytes.
    pub fn size(&self) -> usize {
        match self {
            DataType::Int => 4,
            DataType::Text => 4 + TEXT_LEN,
        }
    }
}

/// A single field value stored in a tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i32),
    Text(String),
}

impl Value {
    /// Get the data type of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int(_) => DataType::Int,
            Value::Text(_) => DataType::Text,
        }
    }

    /// Append this value's fixed-width encoding to `out`.
    pub fn serialize(&self, out: &mut Vec<u8>) -> StorageResult<()> {
        match self {
            Value::Int(i) => {
                out.write_i32::<BigEndian>(*i)?;
            }
            Value::Text(s) => {
                let bytes = s.as_bytes();
                if bytes.len() > TEXT_LEN {
                    return Err(StorageError::Format(format!(
                        "text field of {} bytes exceeds maximum {}",
                        bytes.len(),
                        TEXT_LEN
                    )));
                }
                out.write_u32::<BigEndian>(bytes.len() as u32)?;
                out.extend_from_slice(bytes);
                out.resize(out.len() + TEXT_LEN - bytes.len(), 0);
            }
        }
        Ok(())
    }

    /// Read one fixed-width field of type `data_type` from `reader`.
    pub fn deserialize<R: Read>(reader: &mut R, data_type: DataType) -> StorageResult<Self> {
        match data_type {
            DataType::Int => {
                let i = reader
                    .read_i32::<BigEndian>()
                    .map_err(|e| StorageError::Format(format!("short int field: {}", e)))?;
                Ok(Value::Int(i))
            }
            DataType::Text => {
                let len = reader
                    .read_u32::<BigEndian>()
                    .map_err(|e| StorageError::Format(format!("short text length: {}", e)))?
                    as usize;
                if len > TEXT_LEN {
                    return Err(StorageError::Format(format!(
                        "text length {} exceeds maximum {}",
                        len, TEXT_LEN
                    )));
                }
                let mut buf = [0u8; TEXT_LEN];
                reader
                    .read_exact(&mut buf)
                    .map_err(|e| StorageError::Format(format!("short text field: {}", e)))?;
                let s = std::str::from_utf8(&buf[..len])
                    .map_err(|e| StorageError::Format(format!("invalid utf-8 in text field: {}", e)))?;
                Ok(Value::Text(s.to_string()))
            }
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_int_round_trip() -> StorageResult<()> {
        let mut buf = Vec::new();
        Value::Int(-12345).serialize(&mut buf)?;
        assert_eq!(buf.len(), DataType::Int.size());

        let back = Value::deserialize(&mut Cursor::new(&buf), DataType::Int)?;
        assert_eq!(back, Value::Int(-12345));
        Ok(())
    }

    #[test]
    fn test_text_round_trip() -> StorageResult<()> {
        let mut buf = Vec::new();
        Value::Text("hello".to_string()).serialize(&mut buf)?;
        assert_eq!(buf.len(), DataType::Text.size());

        let back = Value::deserialize(&mut Cursor::new(&buf), DataType::Text)?;
        assert_eq!(back, Value::Text("hello".to_string()));
        Ok(())
    }

    #[test]
    fn test_text_is_zero_padded() -> StorageResult<()> {
        let mut buf = Vec::new();
        Value::Text("ab".to_string()).serialize(&mut buf)?;
        assert!(buf[6..].iter().all(|&b| b == 0));
        Ok(())
    }

    #[test]
    fn test_oversized_text_rejected() {
        let long = "x".repeat(TEXT_LEN + 1);
        let mut buf = Vec::new();
        assert!(matches!(
            Value::Text(long).serialize(&mut buf),
            Err(StorageError::Format(_))
        ));
    }

    #[test]
    fn test_short_read_is_format_error() {
        let buf = [0u8; 2];
        assert!(matches!(
            Value::deserialize(&mut Cursor::new(&buf[..]), DataType::Int),
            Err(StorageError::Format(_))
        ));
    }

    #[test]
    fn test_corrupt_text_length_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(TEXT_LEN as u32 + 1).to_be_bytes());
        buf.resize(4 + TEXT_LEN, 0);
        assert!(matches!(
            Value::deserialize(&mut Cursor::new(&buf), DataType::Text),
            Err(StorageError::Format(_))
        ));
    }
}

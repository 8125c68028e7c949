//! Typed column values and the descriptor encoding of each data type.
//!
//! Every data type maps a descriptor (a `u64` inside the type's entropy
//! domain) onto a concrete value and back. The mapping preserves order:
//! `d1 < d2` implies `inflate(d1) < inflate(d2)` under the type's natural
//! order. Storage engines break write-timestamp ties by comparing the
//! serialized bytes of the values instead, which for signed integers is a
//! different order; [`DataType::compare_lexicographically`] exposes it.

use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::SchemaError;

/// Longest `ascii` value a column can hold (6 bits of entropy per char).
pub const MAX_ASCII_LENGTH: u8 = 10;

const DEFAULT_ASCII_LENGTH: u8 = 8;

/// Sorted alphabet used for `ascii` values. 64 symbols, one per 6 bits.
const ASCII_ALPHABET: &[u8; 64] =
    b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

// ============================================================================
// Values
// ============================================================================

/// A typed column value as bound into statements and returned in rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    /// 8-bit signed integer.
    TinyInt(i8),
    /// 16-bit signed integer.
    SmallInt(i16),
    /// 32-bit signed integer.
    Integer(i32),
    /// 64-bit signed integer. Also used for `writetime(...)` results.
    BigInt(i64),
    Boolean(bool),
    /// ASCII text.
    Text(String),
}

impl Value {
    /// Serialized form used for byte-lexicographic comparison.
    ///
    /// Integers are big-endian two's complement, so negative numbers sort
    /// after positive ones under this order.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Value::TinyInt(v) => v.to_be_bytes().to_vec(),
            Value::SmallInt(v) => v.to_be_bytes().to_vec(),
            Value::Integer(v) => v.to_be_bytes().to_vec(),
            Value::BigInt(v) => v.to_be_bytes().to_vec(),
            Value::Boolean(v) => vec![u8::from(*v)],
            Value::Text(v) => v.as_bytes().to_vec(),
        }
    }

    /// Compares two values by their serialized bytes.
    pub fn compare_bytes(&self, other: &Value) -> Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }

    /// Returns the integer payload of a `BigInt`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::BigInt(v) => Some(*v),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::TinyInt(v) => write!(f, "{v}"),
            Value::SmallInt(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "'{}'", v.replace('\'', "''")),
        }
    }
}

// ============================================================================
// Data Types
// ============================================================================

/// Column data type.
///
/// Serializes as its CQL name (`"bigint"`, `"ascii(8)"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Boolean,
    /// Fixed-length ASCII text drawn from a 64-symbol sorted alphabet.
    Ascii { length: u8 },
}

impl DataType {
    /// Number of descriptor bits this type can represent.
    pub fn entropy_bits(&self) -> u32 {
        match self {
            DataType::TinyInt => 8,
            DataType::SmallInt => 16,
            DataType::Integer => 32,
            DataType::BigInt => 64,
            DataType::Boolean => 1,
            DataType::Ascii { length } => 6 * u32::from(*length),
        }
    }

    /// Maps a full-width random number into this type's descriptor domain.
    ///
    /// Keeps the high bits, which are the best-mixed bits of the PCG output.
    pub fn adjust_entropy_domain(&self, raw: u64) -> u64 {
        let bits = self.entropy_bits();
        if bits >= 64 {
            raw
        } else if bits == 0 {
            0
        } else {
            raw >> (64 - bits)
        }
    }

    /// Decodes a descriptor into a value.
    pub fn inflate(&self, descriptor: u64) -> Value {
        debug_assert!(
            self.entropy_bits() >= 64 || descriptor >> self.entropy_bits() == 0,
            "descriptor {descriptor} outside the {self} domain"
        );
        match self {
            DataType::TinyInt => Value::TinyInt(((descriptor as u8) ^ 0x80) as i8),
            DataType::SmallInt => Value::SmallInt(((descriptor as u16) ^ 0x8000) as i16),
            DataType::Integer => Value::Integer(((descriptor as u32) ^ 0x8000_0000) as i32),
            DataType::BigInt => Value::BigInt((descriptor ^ (1 << 63)) as i64),
            DataType::Boolean => Value::Boolean(descriptor & 1 == 1),
            DataType::Ascii { length } => {
                let length = u32::from(*length);
                let text = (0..length)
                    .map(|i| {
                        let symbol = (descriptor >> (6 * (length - 1 - i))) & 0x3f;
                        char::from(ASCII_ALPHABET[symbol as usize])
                    })
                    .collect();
                Value::Text(text)
            }
        }
    }

    /// Encodes a value back into its descriptor.
    ///
    /// Returns `None` if the value has the wrong type or lies outside the
    /// domain this type generates.
    pub fn deflate(&self, value: &Value) -> Option<u64> {
        match (self, value) {
            (DataType::TinyInt, Value::TinyInt(v)) => Some(u64::from((*v as u8) ^ 0x80)),
            (DataType::SmallInt, Value::SmallInt(v)) => Some(u64::from((*v as u16) ^ 0x8000)),
            (DataType::Integer, Value::Integer(v)) => Some(u64::from((*v as u32) ^ 0x8000_0000)),
            (DataType::BigInt, Value::BigInt(v)) => Some((*v as u64) ^ (1 << 63)),
            (DataType::Boolean, Value::Boolean(v)) => Some(u64::from(*v)),
            (DataType::Ascii { length }, Value::Text(text)) => {
                if text.len() != usize::from(*length) {
                    return None;
                }
                text.bytes().try_fold(0u64, |acc, byte| {
                    let symbol = ASCII_ALPHABET.binary_search(&byte).ok()?;
                    Some((acc << 6) | symbol as u64)
                })
            }
            _ => None,
        }
    }

    /// Compares two descriptors the way the storage layer breaks ties:
    /// by the serialized bytes of the values they decode to.
    pub fn compare_lexicographically(&self, d1: u64, d2: u64) -> Ordering {
        self.inflate(d1).compare_bytes(&self.inflate(d2))
    }

    /// CQL type name.
    pub fn cql_name(&self) -> &'static str {
        match self {
            DataType::TinyInt => "tinyint",
            DataType::SmallInt => "smallint",
            DataType::Integer => "int",
            DataType::BigInt => "bigint",
            DataType::Boolean => "boolean",
            DataType::Ascii { .. } => "ascii",
        }
    }

    pub(crate) fn validate(&self) -> Result<(), SchemaError> {
        match self {
            DataType::Ascii { length } if *length == 0 || *length > MAX_ASCII_LENGTH => Err(
                SchemaError::InvalidType(format!("ascii length must be 1..={MAX_ASCII_LENGTH}")),
            ),
            _ => Ok(()),
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Ascii { length } => write!(f, "ascii({length})"),
            other => f.write_str(other.cql_name()),
        }
    }
}

impl FromStr for DataType {
    type Err = SchemaError;

    /// Parses `tinyint`, `smallint`, `int`, `bigint`, `boolean`, `ascii`
    /// or `ascii(N)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let data_type = match normalized.as_str() {
            "tinyint" => DataType::TinyInt,
            "smallint" => DataType::SmallInt,
            "int" | "integer" => DataType::Integer,
            "bigint" => DataType::BigInt,
            "boolean" => DataType::Boolean,
            "ascii" => DataType::Ascii {
                length: DEFAULT_ASCII_LENGTH,
            },
            other => {
                let length = other
                    .strip_prefix("ascii(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .and_then(|n| n.trim().parse::<u8>().ok())
                    .ok_or_else(|| SchemaError::InvalidType(s.to_string()))?;
                DataType::Ascii { length }
            }
        };
        data_type.validate()?;
        Ok(data_type)
    }
}

impl TryFrom<String> for DataType {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DataType> for String {
    fn from(data_type: DataType) -> Self {
        data_type.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

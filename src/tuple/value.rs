use std::fmt;

use super::DataType;

/// A typed value stored in one column of a tuple.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i32),
    BigInt(i64),
    Double(f64),
    /// Stored as `Char(n)`; trailing pad spaces are not part of the value
    String(String),
}

impl Value {
    /// Returns true if this value can be stored in a column of `data_type`.
    pub fn fits(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Value::Boolean(_), DataType::Boolean)
            | (Value::Integer(_), DataType::Integer)
            | (Value::Integer(_), DataType::BigInt)
            | (Value::BigInt(_), DataType::BigInt)
            | (Value::Double(_), DataType::Double) => true,
            (Value::String(s), DataType::Char(n)) => s.len() <= *n as usize,
            _ => false,
        }
    }

    /// Appends the fixed-width encoding of this value to `out`.
    /// Returns false (writing nothing) if the value does not fit the type.
    pub fn write_to(&self, data_type: &DataType, out: &mut Vec<u8>) -> bool {
        if !self.fits(data_type) {
            return false;
        }
        match (self, data_type) {
            (Value::Boolean(b), _) => out.push(u8::from(*b)),
            (Value::Integer(v), DataType::BigInt) => {
                out.extend_from_slice(&(*v as i64).to_le_bytes())
            }
            (Value::Integer(v), _) => out.extend_from_slice(&v.to_le_bytes()),
            (Value::BigInt(v), _) => out.extend_from_slice(&v.to_le_bytes()),
            (Value::Double(v), _) => out.extend_from_slice(&v.to_le_bytes()),
            (Value::String(s), DataType::Char(n)) => {
                let start = out.len();
                out.extend_from_slice(s.as_bytes());
                out.resize(start + *n as usize, b' ');
            }
            _ => return false,
        }
        true
    }

    /// Decodes a value of `data_type` from the front of `data`.
    pub fn read_from(data: &[u8], data_type: &DataType) -> Option<Self> {
        let size = data_type.size();
        if data.len() < size {
            return None;
        }
        let bytes = &data[..size];
        let value = match data_type {
            DataType::Boolean => Value::Boolean(bytes[0] != 0),
            DataType::Integer => Value::Integer(i32::from_le_bytes(bytes.try_into().ok()?)),
            DataType::BigInt => Value::BigInt(i64::from_le_bytes(bytes.try_into().ok()?)),
            DataType::Double => Value::Double(f64::from_le_bytes(bytes.try_into().ok()?)),
            DataType::Char(_) => {
                let s = String::from_utf8_lossy(bytes);
                Value::String(s.trim_end_matches(' ').to_string())
            }
        };
        Some(value)
    }

    /// Returns the integer payload, widening `Integer` to i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v as i64),
            Value::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

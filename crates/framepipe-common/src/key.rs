//! Hashable composite keys built from DataFrame cells.
//!
//! Group-by lookups, broadcast joins and duplicate detection all need to
//! compare tuples of cell values across tables whose columns may use
//! different (but compatible) integer widths. [`KeyPart`] normalizes a cell so
//! that `Int32(1)`, `Int64(1)` and `Float64(1.0)` compare equal.

use std::fmt;

use polars::prelude::{AnyValue, Column, PolarsResult};

/// A single normalized cell value of a composite key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Bool(bool),
    Int(i128),
    /// Non-integral float, stored by bit pattern.
    Float(u64),
    Text(String),
}

impl KeyPart {
    /// Normalizes a cell. Returns `None` for nulls and NaN.
    pub fn from_any(value: AnyValue<'_>) -> Option<Self> {
        let part = match value {
            AnyValue::Null => return None,
            AnyValue::Boolean(b) => Self::Bool(b),
            AnyValue::Int8(v) => Self::Int(i128::from(v)),
            AnyValue::Int16(v) => Self::Int(i128::from(v)),
            AnyValue::Int32(v) => Self::Int(i128::from(v)),
            AnyValue::Int64(v) => Self::Int(i128::from(v)),
            AnyValue::UInt8(v) => Self::Int(i128::from(v)),
            AnyValue::UInt16(v) => Self::Int(i128::from(v)),
            AnyValue::UInt32(v) => Self::Int(i128::from(v)),
            AnyValue::UInt64(v) => Self::Int(i128::from(v)),
            AnyValue::Float32(v) => return Self::from_float(f64::from(v)),
            AnyValue::Float64(v) => return Self::from_float(v),
            AnyValue::String(s) => Self::Text(s.to_string()),
            AnyValue::StringOwned(s) => Self::Text(s.to_string()),
            other => Self::Text(other.to_string()),
        };
        Some(part)
    }

    fn from_float(v: f64) -> Option<Self> {
        if v.is_nan() {
            return None;
        }
        if v.fract() == 0.0 && v.abs() < 1e18 {
            return Some(Self::Int(v as i128));
        }
        // -0.0 and 0.0 are integral and handled above.
        Some(Self::Float(v.to_bits()))
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(bits) => write!(f, "{}", crate::format_numeric(f64::from_bits(*bits))),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// A composite key: one [`KeyPart`] per key column, in key-column order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(pub Vec<KeyPart>);

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (pos, part) in self.0.iter().enumerate() {
            if pos > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{part}")?;
        }
        write!(f, ")")
    }
}

/// Builds the composite key of every row from the given key columns.
///
/// Rows where any key cell is null yield `None`.
pub fn row_keys(columns: &[&Column], height: usize) -> PolarsResult<Vec<Option<GroupKey>>> {
    let mut keys = Vec::with_capacity(height);
    for idx in 0..height {
        let mut parts = Vec::with_capacity(columns.len());
        let mut complete = true;
        for column in columns {
            match KeyPart::from_any(column.get(idx)?) {
                Some(part) => parts.push(part),
                None => {
                    complete = false;
                    break;
                }
            }
        }
        keys.push(complete.then_some(GroupKey(parts)));
    }
    Ok(keys)
}

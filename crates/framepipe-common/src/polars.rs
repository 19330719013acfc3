//! Polars value and dtype helpers.
//!
//! Number formatting for log records, dtype classification and the
//! user-facing dtype names accepted by stage arguments.

use polars::prelude::DataType;

/// Formats a floating-point number as a string without trailing zeros.
///
/// # Examples
///
/// ```
/// use framepipe_common::format_numeric;
///
/// assert_eq!(format_numeric(1.0), "1");
/// assert_eq!(format_numeric(1.5), "1.5");
/// assert_eq!(format_numeric(0.0), "0");
/// ```
pub fn format_numeric(v: f64) -> String {
    if !v.is_finite() {
        return v.to_string();
    }
    let s = format!("{v}");
    if !s.contains('.') {
        return s;
    }
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Returns true for the primitive integer dtypes.
pub fn is_integer_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// Returns true for the primitive integer and float dtypes.
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    is_integer_dtype(dtype) || matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// Parses a user-facing dtype name into a Polars `DataType`.
///
/// Accepts the lowercase names `int8`..`int64`, `uint8`..`uint64`,
/// `float32`, `float64`, `bool`/`boolean` and `str`/`string`.
pub fn parse_dtype(name: &str) -> Option<DataType> {
    let dtype = match name.trim().to_ascii_lowercase().as_str() {
        "int8" => DataType::Int8,
        "int16" => DataType::Int16,
        "int32" => DataType::Int32,
        "int64" | "int" => DataType::Int64,
        "uint8" => DataType::UInt8,
        "uint16" => DataType::UInt16,
        "uint32" => DataType::UInt32,
        "uint64" => DataType::UInt64,
        "float32" => DataType::Float32,
        "float64" | "float" => DataType::Float64,
        "bool" | "boolean" => DataType::Boolean,
        "str" | "string" => DataType::String,
        _ => return None,
    };
    Some(dtype)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_numeric_keeps_integral_zeros() {
        assert_eq!(format_numeric(100.0), "100");
        assert_eq!(format_numeric(-0.5), "-0.5");
        assert_eq!(format_numeric(f64::NAN), "NaN");
    }

    #[test]
    fn test_dtype_classification() {
        assert!(is_integer_dtype(&DataType::Int32));
        assert!(!is_integer_dtype(&DataType::Float64));
        assert!(is_numeric_dtype(&DataType::Float32));
        assert!(!is_numeric_dtype(&DataType::String));
    }

    #[test]
    fn test_parse_dtype() {
        assert_eq!(parse_dtype("Int32"), Some(DataType::Int32));
        assert_eq!(parse_dtype("float64"), Some(DataType::Float64));
        assert_eq!(parse_dtype("string"), Some(DataType::String));
        assert_eq!(parse_dtype("category"), None);
    }
}

//! Host ↔ native scalar conversion.
//!
//! Every failure is a [`FieldError::Conversion`] naming the native kind that
//! was expected and the host type that was supplied.

use crate::error::FieldError;
use crate::host_value::{HostNumber, HostValue};
use smol_str::SmolStr;

fn mismatch(expected: &'static str, value: &HostValue) -> FieldError {
    FieldError::Conversion {
        expected,
        actual: value.type_name(),
    }
}

/// Integral host number into any native integer type, range-checked.
pub fn cast_integer<T: TryFrom<i128>>(value: &HostValue, expected: &'static str) -> Result<T, FieldError> {
    match value {
        HostValue::Number(n) => n
            .as_integer()
            .and_then(|i| T::try_from(i).ok())
            .ok_or_else(|| mismatch(expected, value)),
        _ => Err(mismatch(expected, value)),
    }
}

pub fn cast_f64(value: &HostValue) -> Result<f64, FieldError> {
    match value {
        HostValue::Number(n) => Ok(n.as_f64()),
        _ => Err(mismatch("double", value)),
    }
}

pub fn cast_f32(value: &HostValue) -> Result<f32, FieldError> {
    match value {
        HostValue::Number(n) => Ok(n.as_f64() as f32),
        _ => Err(mismatch("float", value)),
    }
}

pub fn cast_bool(value: &HostValue) -> Result<bool, FieldError> {
    match value {
        HostValue::Bool(b) => Ok(*b),
        _ => Err(mismatch("bool", value)),
    }
}

/// Text or bytes into string-kind storage. Text fields only take valid UTF-8.
pub fn cast_string(value: &HostValue, is_bytes: bool) -> Result<Vec<u8>, FieldError> {
    match value {
        HostValue::Str(s) => Ok(s.as_bytes().to_vec()),
        HostValue::Bytes(b) if is_bytes || std::str::from_utf8(b).is_ok() => Ok(b.clone()),
        _ => Err(mismatch(if is_bytes { "bytes" } else { "string" }, value)),
    }
}

pub fn integer_to_host(i: i128) -> HostValue {
    match i64::try_from(i) {
        Ok(i) => HostValue::Number(HostNumber::I64(i)),
        // Only u64 values above i64::MAX reach here.
        Err(_) => HostValue::Number(HostNumber::U64(i as u64)),
    }
}

pub fn string_to_host(bytes: &[u8], is_bytes: bool) -> HostValue {
    if is_bytes {
        return HostValue::Bytes(bytes.to_vec());
    }
    HostValue::Str(SmolStr::from(String::from_utf8_lossy(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_range_checks() {
        assert_eq!(cast_integer::<i32>(&HostValue::from(5i64), "int32"), Ok(5));
        assert!(cast_integer::<i32>(&HostValue::from(1i64 << 40), "int32").is_err());
        assert!(cast_integer::<u32>(&HostValue::from(-1i64), "uint32").is_err());
        assert_eq!(
            cast_integer::<u64>(&HostValue::Number(HostNumber::U64(u64::MAX)), "uint64"),
            Ok(u64::MAX)
        );
        assert!(cast_integer::<i64>(&HostValue::Number(HostNumber::U64(u64::MAX)), "int64").is_err());
    }

    #[test]
    fn test_integer_rejects_other_types() {
        for value in [HostValue::from(1.0f64), HostValue::Bool(true), HostValue::from("1")] {
            let err = cast_integer::<i32>(&value, "int32").unwrap_err();
            assert_eq!(
                err,
                FieldError::Conversion {
                    expected: "int32",
                    actual: value.type_name()
                }
            );
        }
    }

    #[test]
    fn test_float_accepts_any_number() {
        assert_eq!(cast_f64(&HostValue::from(3i64)), Ok(3.0));
        assert_eq!(cast_f32(&HostValue::from(0.5f64)), Ok(0.5f32));
        assert!(cast_f64(&HostValue::from("3")).is_err());
    }

    #[test]
    fn test_bool_is_strict() {
        assert_eq!(cast_bool(&HostValue::Bool(true)), Ok(true));
        assert!(cast_bool(&HostValue::from(1i64)).is_err());
    }

    #[test]
    fn test_string_and_bytes() {
        assert_eq!(cast_string(&HostValue::from("abc"), false), Ok(b"abc".to_vec()));
        assert_eq!(cast_string(&HostValue::Bytes(vec![0xff]), true), Ok(vec![0xff]));
        assert!(cast_string(&HostValue::Bytes(vec![0xff]), false).is_err());
        assert!(cast_string(&HostValue::from(1i64), true).is_err());
        assert_eq!(string_to_host(&[0xff, 0x00], true), HostValue::Bytes(vec![0xff, 0x00]));
        assert_eq!(string_to_host(b"hi", false), HostValue::from("hi"));
    }

    #[test]
    fn test_integer_to_host_widths() {
        assert_eq!(integer_to_host(-3), HostValue::from(-3i64));
        assert_eq!(
            integer_to_host(u64::MAX as i128),
            HostValue::Number(HostNumber::U64(u64::MAX))
        );
    }
}

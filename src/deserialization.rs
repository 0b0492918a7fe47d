use super::descriptor::{FieldDescriptor, MessageDescriptor};
use super::error::FieldError;
use super::message::{MessageRef, NativeValue};
use super::types::ElementKind;
use cbor4ii::core::Value;
use std::sync::Arc;

fn malformed(field: &FieldDescriptor, expected: &str) -> FieldError {
    FieldError::CopyFailed(format!("{}.{}: expected {expected}", field.containing_type(), field.name()))
}

fn integer<T: TryFrom<i128>>(field: &FieldDescriptor, value: &Value, expected: &str) -> Result<T, FieldError> {
    match value {
        Value::Integer(i) => T::try_from(*i).map_err(|_| malformed(field, expected)),
        _ => Err(malformed(field, expected)),
    }
}

// ─── Decode Field ───────────────────────────────────────────────────────────

/// Decode one non-message element of `field`.
fn cbor_to_native(field: &FieldDescriptor, value: &Value) -> Result<NativeValue, FieldError> {
    Ok(match field.kind()? {
        ElementKind::Int32 => NativeValue::Int32(integer(field, value, "int32")?),
        ElementKind::Int64 => NativeValue::Int64(integer(field, value, "int64")?),
        ElementKind::UInt32 => NativeValue::UInt32(integer(field, value, "uint32")?),
        ElementKind::UInt64 => NativeValue::UInt64(integer(field, value, "uint64")?),
        ElementKind::Enum => NativeValue::Enum(integer(field, value, "enum")?),
        ElementKind::Float => match value {
            Value::Float(f) => NativeValue::Float(*f as f32),
            _ => return Err(malformed(field, "float")),
        },
        ElementKind::Double => match value {
            Value::Float(f) => NativeValue::Double(*f),
            _ => return Err(malformed(field, "double")),
        },
        ElementKind::Bool => match value {
            Value::Bool(b) => NativeValue::Bool(*b),
            _ => return Err(malformed(field, "bool")),
        },
        ElementKind::String => match value {
            Value::Bytes(b) if field.is_bytes() => NativeValue::String(b.clone()),
            Value::Text(s) if !field.is_bytes() => NativeValue::String(s.as_bytes().to_vec()),
            _ => return Err(malformed(field, if field.is_bytes() { "bytes" } else { "text" })),
        },
        ElementKind::Message => return Err(malformed(field, "scalar field")),
    })
}

// ─── Merge ──────────────────────────────────────────────────────────────────

/// Merge a decoded CBOR map into `message`. Singular fields are overwritten,
/// repeated fields appended to, nested messages merged recursively.
pub fn merge_from_cbor(message: &MessageRef, value: &Value) -> Result<(), FieldError> {
    let descriptor = message.descriptor();
    let Value::Map(entries) = value else {
        return Err(FieldError::CopyFailed(format!("{}: expected a map", descriptor.full_name())));
    };
    let reflection = message.reflection();

    for (key, value) in entries {
        let number = match key {
            Value::Integer(n) => u32::try_from(*n).ok(),
            _ => None,
        };
        let field = number
            .and_then(|n| descriptor.find_field_by_number(n))
            .ok_or_else(|| FieldError::CopyFailed(format!("{}: unknown field {key:?}", descriptor.full_name())))?;
        let is_message = field.kind()? == ElementKind::Message;

        if field.is_repeated() {
            let Value::Array(items) = value else {
                return Err(malformed(field, "an array"));
            };
            for item in items {
                if is_message {
                    let nested = reflection.add_message(field)?;
                    merge_from_cbor(&nested, item)?;
                } else {
                    reflection.add(field, cbor_to_native(field, item)?)?;
                }
            }
        } else if is_message {
            let nested = reflection.mutable_message(field)?;
            merge_from_cbor(&nested, value)?;
        } else {
            reflection.set(field, cbor_to_native(field, value)?)?;
        }
    }
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════
// Parsing patterns
// ════════════════════════════════════════════════════════════════════════

pub fn merge_from_bytes(message: &MessageRef, bytes: &[u8]) -> Result<(), FieldError> {
    let value: Value = cbor4ii::serde::from_slice(bytes).map_err(|e| FieldError::Cbor(e.to_string()))?;
    merge_from_cbor(message, &value)
}

/// Replace the contents of `message` with the parsed bytes.
pub fn parse_into(message: &MessageRef, bytes: &[u8]) -> Result<(), FieldError> {
    message.clear();
    merge_from_bytes(message, bytes)
}

pub fn parse_message(descriptor: &Arc<MessageDescriptor>, bytes: &[u8]) -> Result<MessageRef, FieldError> {
    let message = MessageRef::new(descriptor);
    merge_from_bytes(&message, bytes)?;
    Ok(message)
}

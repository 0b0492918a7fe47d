use super::descriptor::FieldDescriptor;
use super::error::FieldError;
use super::message::{FieldSlot, MessageRef, NativeValue};
use cbor4ii::core::Value;

// ─── Message → CBOR ─────────────────────────────────────────────────────────

/// Build the CBOR value for a message: a map from field number to value in
/// descriptor order. Unset singular fields and empty repeated fields are
/// omitted, so equal contents always produce equal bytes.
pub fn message_to_cbor(message: &MessageRef) -> Result<Value, FieldError> {
    let message = message.borrow();
    let mut entries = Vec::with_capacity(message.slots.len());

    for (field, slot) in message.descriptor().fields().iter().zip(&message.slots) {
        let value = match slot {
            FieldSlot::Singular(None) => continue,
            FieldSlot::Singular(Some(v)) => native_to_cbor(field, v)?,
            FieldSlot::Repeated(vs) if vs.is_empty() => continue,
            FieldSlot::Repeated(vs) => Value::Array(
                vs.iter()
                    .map(|v| native_to_cbor(field, v))
                    .collect::<Result<_, _>>()?,
            ),
        };
        entries.push((Value::Integer(field.number() as i128), value));
    }
    Ok(Value::Map(entries))
}

#[inline]
fn native_to_cbor(field: &FieldDescriptor, value: &NativeValue) -> Result<Value, FieldError> {
    Ok(match value {
        NativeValue::Int32(v) => Value::Integer(*v as i128),
        NativeValue::Int64(v) => Value::Integer(*v as i128),
        NativeValue::UInt32(v) => Value::Integer(*v as i128),
        NativeValue::UInt64(v) => Value::Integer(*v as i128),
        NativeValue::Enum(v) => Value::Integer(*v as i128),
        // f32 → f64 is exact; parsing narrows it back.
        NativeValue::Float(v) => Value::Float(*v as f64),
        NativeValue::Double(v) => Value::Float(*v),
        NativeValue::Bool(b) => Value::Bool(*b),
        NativeValue::String(bytes) if field.is_bytes() => Value::Bytes(bytes.clone()),
        NativeValue::String(bytes) => Value::Text(
            String::from_utf8(bytes.clone()).map_err(|e| FieldError::Cbor(format!("{}: {e}", field.name())))?,
        ),
        NativeValue::Message(m) => message_to_cbor(m)?,
    })
}

// ════════════════════════════════════════════════════════════════════════
// Serialization patterns
// ════════════════════════════════════════════════════════════════════════

pub fn serialize_message(message: &MessageRef) -> Result<Vec<u8>, FieldError> {
    let mut buf = Vec::new();
    serialize_message_into(message, &mut buf)?;
    Ok(buf)
}

/// Identical to `serialize_message`, but reuses the caller's Vec. The buffer
/// is cleared but keeps its capacity.
pub fn serialize_message_into(message: &MessageRef, buf: &mut Vec<u8>) -> Result<(), FieldError> {
    let value = message_to_cbor(message)?;
    buf.clear();
    cbor4ii::serde::to_writer(&mut *buf, &value).map_err(|e| FieldError::Cbor(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_value::HostValue;
    use crate::test_schema::{int_message, test_message};

    fn decode(bytes: &[u8]) -> Value {
        cbor4ii::serde::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_empty_message_is_empty_map() {
        let bytes = serialize_message(&test_message()).unwrap();
        assert!(matches!(decode(&bytes), Value::Map(entries) if entries.is_empty()));
    }

    #[test]
    fn test_fields_keyed_by_number() {
        let message = int_message();
        message.set_attr("value", &HostValue::from(5i64)).unwrap();
        match decode(&serialize_message(&message).unwrap()) {
            Value::Map(entries) => {
                assert_eq!(entries.len(), 1);
                assert!(matches!(entries[0], (Value::Integer(1), Value::Integer(5))));
            }
            other => panic!("expected map, got {other:?}"),
        }
    }

    #[test]
    fn test_text_bytes_and_nested() {
        let message = test_message();
        message.set_attr("string_value", &HostValue::from("hi")).unwrap();
        message.set_attr("bytes_value", &HostValue::Bytes(vec![0xff, 0x00])).unwrap();
        let nested = message.get_attr("int_message").unwrap();
        nested.as_message().unwrap().set_attr("value", &HostValue::from(6i64)).unwrap();

        let Value::Map(entries) = decode(&serialize_message(&message).unwrap()) else {
            panic!("expected map");
        };
        let find = |n: i128| {
            entries
                .iter()
                .find(|(k, _)| matches!(k, Value::Integer(i) if *i == n))
                .map(|(_, v)| v.clone())
        };
        assert!(matches!(find(1), Some(Value::Text(s)) if s == "hi"));
        assert!(matches!(find(10), Some(Value::Bytes(b)) if b == vec![0xff, 0x00]));
        assert!(matches!(find(3), Some(Value::Map(inner)) if inner.len() == 1));
        assert!(find(2).is_none(), "unset fields are omitted");
    }

    #[test]
    fn test_serialize_into_reuses_buffer() {
        let message = int_message();
        message.set_attr("value", &HostValue::from(7i64)).unwrap();
        let mut buf = vec![0xde, 0xad, 0xbe, 0xef, 0x00, 0x00, 0x00, 0x00];
        serialize_message_into(&message, &mut buf).unwrap();
        assert_eq!(buf, serialize_message(&message).unwrap());
    }
}

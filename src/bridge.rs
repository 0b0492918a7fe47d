//! Crossing between native-owned and runtime-owned messages.
//!
//! Two messages are "the same type" when their full type names match. Every
//! copy between representations goes through exactly one serialization of
//! the source.

use crate::deserialization::merge_from_bytes;
use crate::descriptor::{DescriptorPool, MessageDescriptor};
use crate::error::FieldError;
use crate::host_value::HostValue;
use crate::message::MessageRef;
use crate::serialization::serialize_message;
use crate::types::BridgeConfig;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

// ─── Runtime-owned messages ─────────────────────────────────────────────────

/// A message owned by the embedding runtime.
pub trait RuntimeMessage: fmt::Debug {
    fn full_name(&self) -> &str;

    /// Contents in the native message encoding.
    fn serialize_to_bytes(&self) -> Result<Vec<u8>, FieldError>;
}

/// A runtime-owned message held as its type name plus serialized contents.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignMessage {
    full_name: SmolStr,
    payload: Vec<u8>,
}

impl ForeignMessage {
    pub fn new(full_name: &str, payload: Vec<u8>) -> Self {
        Self {
            full_name: SmolStr::new(full_name),
            payload,
        }
    }

    /// Snapshot of a native message.
    pub fn from_native(message: &MessageRef) -> Result<Self, FieldError> {
        Ok(Self {
            full_name: message.full_name(),
            payload: serialize_message(message)?,
        })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl RuntimeMessage for ForeignMessage {
    fn full_name(&self) -> &str {
        &self.full_name
    }

    fn serialize_to_bytes(&self) -> Result<Vec<u8>, FieldError> {
        Ok(self.payload.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Bridge operations
// ════════════════════════════════════════════════════════════════════════════

/// Full type name of a message handle of either representation.
pub fn schema_type_name(handle: &HostValue) -> Option<SmolStr> {
    match handle {
        HostValue::Message(m) => Some(m.message().full_name()),
        HostValue::Foreign(f) => Some(SmolStr::new(f.0.full_name())),
        _ => None,
    }
}

pub fn matches_type(handle: &HostValue, expected: &str) -> bool {
    schema_type_name(handle).is_some_and(|name| name == expected)
}

/// True only for native-owned message handles.
pub fn is_native_message(handle: &HostValue) -> bool {
    matches!(handle, HostValue::Message(_))
}

pub fn serialize_to_bytes(handle: &HostValue) -> Result<Vec<u8>, FieldError> {
    match handle {
        HostValue::Message(m) => serialize_message(m.message()),
        HostValue::Foreign(f) => f.0.serialize_to_bytes(),
        other => Err(FieldError::NotAMessage(other.type_name())),
    }
}

fn lookup<'p>(pool: &'p DescriptorPool, name: &str) -> Result<&'p Arc<MessageDescriptor>, FieldError> {
    pool.find_message(name)
        .ok_or_else(|| FieldError::UnknownType(name.to_string()))
}

/// A new, empty native message. `source` is a type name or a message handle
/// of either representation whose type is used.
pub fn allocate_message(pool: &DescriptorPool, source: &HostValue) -> Result<MessageRef, FieldError> {
    let name = match source {
        HostValue::Str(name) => name.clone(),
        other => schema_type_name(other).ok_or(FieldError::NotAMessage(other.type_name()))?,
    };
    Ok(MessageRef::new(lookup(pool, &name)?))
}

/// A new native message of type `descriptor` holding a copy of `handle`.
pub fn allocate_and_copy(descriptor: &Arc<MessageDescriptor>, handle: &HostValue) -> Result<MessageRef, FieldError> {
    let actual = schema_type_name(handle).ok_or(FieldError::NotAMessage(handle.type_name()))?;
    if actual != descriptor.full_name() {
        return Err(FieldError::MessageTypeMismatch {
            expected: SmolStr::new(descriptor.full_name()),
            actual,
        });
    }
    let bytes = serialize_to_bytes(handle)?;
    let message = MessageRef::new(descriptor);
    merge_from_bytes(&message, &bytes).map_err(|e| match e {
        FieldError::CopyFailed(_) => e,
        other => FieldError::CopyFailed(format!("{}: {other}", descriptor.full_name())),
    })?;
    debug!(
        type_name = descriptor.full_name(),
        native = is_native_message(handle),
        bytes = bytes.len(),
        "copied message"
    );
    Ok(message)
}

/// A native message of the source's type; message sources are copied,
/// type names give an empty message.
pub fn make_native_message(pool: &DescriptorPool, source: &HostValue) -> Result<MessageRef, FieldError> {
    match source {
        HostValue::Str(_) => allocate_message(pool, source),
        other => {
            let name = schema_type_name(other).ok_or(FieldError::NotAMessage(other.type_name()))?;
            allocate_and_copy(lookup(pool, &name)?, other)
        }
    }
}

/// A native message of type `descriptor` to read from. Native handles of the
/// right type are returned as-is; runtime-owned messages are copied.
pub fn cast_message(handle: &HostValue, descriptor: &Arc<MessageDescriptor>) -> Result<MessageRef, FieldError> {
    match handle {
        HostValue::Message(m) if m.message().full_name() == descriptor.full_name() => Ok(m.message().clone()),
        other => allocate_and_copy(descriptor, other),
    }
}

/// A native message of type `descriptor` to mutate in place. A copy would
/// silently drop the mutation, so runtime-owned messages are rejected.
pub fn cast_message_mut(handle: &HostValue, descriptor: &MessageDescriptor) -> Result<MessageRef, FieldError> {
    match handle {
        HostValue::Message(m) => {
            let actual = m.message().full_name();
            if actual != descriptor.full_name() {
                return Err(FieldError::MessageTypeMismatch {
                    expected: SmolStr::new(descriptor.full_name()),
                    actual,
                });
            }
            Ok(m.message().clone())
        }
        HostValue::Foreign(_) => Err(FieldError::Conversion {
            expected: "native message",
            actual: handle.type_name(),
        }),
        other => Err(FieldError::NotAMessage(other.type_name())),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// AnyMessage
// ════════════════════════════════════════════════════════════════════════════

/// A type-erased message: type URL plus serialized contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnyMessage {
    pub type_url: String,
    pub value: Vec<u8>,
}

impl AnyMessage {
    /// The full type name: everything after the last '/' of the type URL.
    pub fn type_name(&self) -> &str {
        self.type_url.rsplit('/').next().unwrap_or(&self.type_url)
    }

    /// Parse the contents into a native message of the named type.
    pub fn unpack(&self, pool: &DescriptorPool) -> Result<MessageRef, FieldError> {
        let message = MessageRef::new(lookup(pool, self.type_name())?);
        merge_from_bytes(&message, &self.value).map_err(|e| match e {
            FieldError::CopyFailed(_) => e,
            other => FieldError::CopyFailed(format!("{}: {other}", self.type_url)),
        })?;
        Ok(message)
    }
}

/// Store a message of either representation in `any`.
pub fn pack_into_any(handle: &HostValue, any: &mut AnyMessage, config: &BridgeConfig) -> Result<(), FieldError> {
    let name = schema_type_name(handle).ok_or(FieldError::NotAMessage(handle.type_name()))?;
    any.value = serialize_to_bytes(handle)?;
    any.type_url = format!("{}/{}", config.type_url_prefix, name);
    debug!(type_url = %any.type_url, bytes = any.value.len(), "packed message into Any");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_schema::{int_message, int_message_type, pool, test_message};

    fn int_message_with(value: i64) -> MessageRef {
        let message = int_message();
        message.set_attr("value", &HostValue::from(value)).unwrap();
        message
    }

    fn foreign_int_message(value: i64) -> HostValue {
        HostValue::foreign(ForeignMessage::from_native(&int_message_with(value)).unwrap())
    }

    #[test]
    fn test_schema_type_name() {
        let native = HostValue::from(int_message());
        assert_eq!(schema_type_name(&native).as_deref(), Some("bridge.test.IntMessage"));
        assert_eq!(
            schema_type_name(&foreign_int_message(1)).as_deref(),
            Some("bridge.test.IntMessage")
        );
        assert_eq!(schema_type_name(&HostValue::from("not a proto")), None);
        assert_eq!(schema_type_name(&HostValue::from(5i64)), None);
        assert!(matches_type(&native, "bridge.test.IntMessage"));
        assert!(!matches_type(&native, "bridge.test.TestMessage"));
    }

    #[test]
    fn test_is_native_message() {
        assert!(is_native_message(&HostValue::from(int_message())));
        assert!(!is_native_message(&HostValue::from("not a proto")));
        assert!(!is_native_message(&HostValue::from(5i64)));
        assert!(!is_native_message(&foreign_int_message(5)));
    }

    #[test]
    fn test_allocate_message_from_name_and_handles() {
        let pool = pool();
        for source in [
            HostValue::from("bridge.test.IntMessage"),
            HostValue::from(int_message_with(3)),
            foreign_int_message(3),
        ] {
            let message = allocate_message(&pool, &source).unwrap();
            assert_eq!(message.full_name(), "bridge.test.IntMessage");
            assert_eq!(message.get_attr("value").unwrap(), HostValue::from(0i64));
        }
        assert_eq!(
            allocate_message(&pool, &HostValue::from("bridge.test.Missing")).unwrap_err(),
            FieldError::UnknownType("bridge.test.Missing".to_string())
        );
        assert_eq!(
            allocate_message(&pool, &HostValue::from(5i64)).unwrap_err(),
            FieldError::NotAMessage("int")
        );
    }

    #[test]
    fn test_round_trip_through_allocated_message() {
        let pool = pool();
        let source = test_message();
        source.set_attr("string_value", &HostValue::from("test")).unwrap();
        source.set_attr("enum_value", &HostValue::from(2i64)).unwrap();
        let handle = HostValue::from(source.clone());

        let name = schema_type_name(&handle).unwrap();
        let target = allocate_message(&pool, &HostValue::Str(name)).unwrap();
        let bytes = serialize_to_bytes(&handle).unwrap();
        merge_from_bytes(&target, &bytes).unwrap();
        assert_eq!(serialize_to_bytes(&HostValue::from(target)).unwrap(), bytes);
    }

    #[test]
    fn test_allocate_and_copy_does_not_alias() {
        let source = int_message_with(5);
        let copy = allocate_and_copy(&int_message_type(), &HostValue::from(source.clone())).unwrap();
        assert!(!copy.ptr_eq(&source));
        source.set_attr("value", &HostValue::from(6i64)).unwrap();
        assert_eq!(copy.get_attr("value").unwrap(), HostValue::from(5i64));
    }

    #[test]
    fn test_allocate_and_copy_type_mismatch() {
        let err = allocate_and_copy(&int_message_type(), &HostValue::from(test_message())).unwrap_err();
        assert_eq!(
            err,
            FieldError::MessageTypeMismatch {
                expected: "bridge.test.IntMessage".into(),
                actual: "bridge.test.TestMessage".into(),
            }
        );
    }

    #[test]
    fn test_allocate_and_copy_parse_failure() {
        let corrupt = HostValue::foreign(ForeignMessage::new("bridge.test.IntMessage", vec![0xff, 0xff]));
        assert!(matches!(
            allocate_and_copy(&int_message_type(), &corrupt),
            Err(FieldError::CopyFailed(_))
        ));
    }

    #[test]
    fn test_make_native_message() {
        let pool = pool();
        for source in [HostValue::from(int_message_with(5)), foreign_int_message(5)] {
            let message = make_native_message(&pool, &source).unwrap();
            assert!(is_native_message(&HostValue::from(message.clone())));
            assert_eq!(message.get_attr("value").unwrap(), HostValue::from(5i64));
        }
        let empty = make_native_message(&pool, &HostValue::from("bridge.test.TestMessage")).unwrap();
        assert_eq!(empty.short_debug_string(), "");
    }

    #[test]
    fn test_cast_message() {
        let native = int_message_with(5);
        let cast = cast_message(&HostValue::from(native.clone()), &int_message_type()).unwrap();
        assert!(cast.ptr_eq(&native));

        let copied = cast_message(&foreign_int_message(5), &int_message_type()).unwrap();
        assert_eq!(copied.get_attr("value").unwrap(), HostValue::from(5i64));

        assert!(matches!(
            cast_message(&HostValue::from(test_message()), &int_message_type()),
            Err(FieldError::MessageTypeMismatch { .. })
        ));
        assert_eq!(
            cast_message(&HostValue::from("not_a_proto"), &int_message_type()).unwrap_err(),
            FieldError::NotAMessage("str")
        );
    }

    #[test]
    fn test_cast_message_mut_requires_native() {
        let native = int_message_with(5);
        let target = cast_message_mut(&HostValue::from(native.clone()), &int_message_type()).unwrap();
        target.set_attr("value", &HostValue::from(6i64)).unwrap();
        assert_eq!(native.get_attr("value").unwrap(), HostValue::from(6i64));

        assert!(matches!(
            cast_message_mut(&foreign_int_message(5), &int_message_type()),
            Err(FieldError::Conversion { .. })
        ));
    }

    #[test]
    fn test_pack_into_any_from_either_representation() {
        let pool = pool();
        let config = BridgeConfig::default();
        for source in [HostValue::from(int_message_with(5)), foreign_int_message(5)] {
            let mut any = AnyMessage::default();
            pack_into_any(&source, &mut any, &config).unwrap();
            assert_eq!(any.type_url, "type.googleapis.com/bridge.test.IntMessage");
            assert_eq!(any.type_name(), "bridge.test.IntMessage");
            assert_eq!(any.value, serialize_message(&int_message_with(5)).unwrap());

            let unpacked = any.unpack(&pool).unwrap();
            assert_eq!(unpacked.get_attr("value").unwrap(), HostValue::from(5i64));
        }
    }

    #[test]
    fn test_pack_into_any_custom_prefix() {
        let config = BridgeConfig {
            type_url_prefix: "example.com/types".into(),
        };
        let mut any = AnyMessage::default();
        pack_into_any(&HostValue::from(int_message()), &mut any, &config).unwrap();
        assert_eq!(any.type_url, "example.com/types/bridge.test.IntMessage");
        assert_eq!(any.type_name(), "bridge.test.IntMessage");
    }

    #[test]
    fn test_any_serializes_with_serde() {
        let mut any = AnyMessage::default();
        pack_into_any(&HostValue::from(int_message_with(1)), &mut any, &BridgeConfig::default()).unwrap();
        let json = serde_json::to_string(&any).unwrap();
        let back: AnyMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, any);
    }

    #[test]
    fn test_pack_non_message_fails() {
        let mut any = AnyMessage::default();
        assert_eq!(
            pack_into_any(&HostValue::from(5i64), &mut any, &BridgeConfig::default()).unwrap_err(),
            FieldError::NotAMessage("int")
        );
        assert_eq!(any, AnyMessage::default());
    }
}

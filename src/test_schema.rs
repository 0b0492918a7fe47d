//! Shared schema fixture for unit tests.

use crate::descriptor::{DescriptorPool, EnumDescriptor, FieldDescriptor, FieldSpec, MessageDescriptor};
use crate::message::MessageRef;
use crate::types::*;
use std::sync::Arc;

pub fn test_enum_type() -> Arc<EnumDescriptor> {
    EnumDescriptor::new("bridge.test.TestEnum", [("ZERO", 0), ("ONE", 1), ("TWO", 2)])
}

pub fn int_message_type() -> Arc<MessageDescriptor> {
    MessageDescriptor::builder("bridge.test.IntMessage")
        .field(FieldSpec::scalar("value", 1, TYPE_INT32))
        .build()
        .expect("IntMessage schema")
}

pub fn test_message_type() -> Arc<MessageDescriptor> {
    let int_message = int_message_type();
    let test_enum = test_enum_type();
    MessageDescriptor::builder("bridge.test.TestMessage")
        .field(FieldSpec::scalar("string_value", 1, TYPE_STRING))
        .field(FieldSpec::scalar("int_value", 2, TYPE_INT32))
        .field(FieldSpec::message("int_message", 3, &int_message))
        .field(FieldSpec::scalar("repeated_int_value", 4, TYPE_INT32).repeated())
        .field(FieldSpec::message("repeated_int_message", 5, &int_message).repeated())
        .field(FieldSpec::map("string_int_map", 6, TYPE_STRING, FieldSpec::scalar("", 0, TYPE_INT32)))
        .field(FieldSpec::map("int_message_map", 7, TYPE_INT32, FieldSpec::message("", 0, &int_message)))
        .field(FieldSpec::enumeration("enum_value", 8, &test_enum))
        .field(FieldSpec::enumeration("repeated_enum_value", 9, &test_enum).repeated())
        .field(FieldSpec::scalar("bytes_value", 10, TYPE_BYTES))
        .field(FieldSpec::scalar("double_value", 11, TYPE_DOUBLE))
        .field(FieldSpec::scalar("float_value", 12, TYPE_FLOAT))
        .field(FieldSpec::scalar("int64_value", 13, TYPE_INT64))
        .field(FieldSpec::scalar("uint32_value", 14, TYPE_UINT32))
        .field(FieldSpec::scalar("uint64_value", 15, TYPE_UINT64))
        .field(FieldSpec::scalar("bool_value", 16, TYPE_BOOL))
        .field(FieldSpec::scalar("sint32_value", 17, TYPE_SINT32))
        .field(FieldSpec::scalar("repeated_string_value", 18, TYPE_STRING).repeated())
        .field(FieldSpec::scalar("repeated_bytes_value", 19, TYPE_BYTES).repeated())
        .field(FieldSpec::scalar("repeated_double_value", 20, TYPE_DOUBLE).repeated())
        .field(FieldSpec::map("bool_string_map", 21, TYPE_BOOL, FieldSpec::scalar("", 0, TYPE_STRING)))
        .field(FieldSpec::map("int64_enum_map", 22, TYPE_INT64, FieldSpec::enumeration("", 0, &test_enum)))
        .build()
        .expect("TestMessage schema")
}

/// A message with a field whose declared type has no element kind.
pub fn group_message_type() -> Arc<MessageDescriptor> {
    MessageDescriptor::builder("bridge.test.GroupMessage")
        .field(FieldSpec::scalar("value", 1, TYPE_INT32))
        .field(FieldSpec::scalar("legacy_group", 2, TYPE_GROUP))
        .build()
        .expect("GroupMessage schema")
}

pub fn pool() -> DescriptorPool {
    let mut pool = DescriptorPool::new();
    pool.register(&test_message_type());
    pool
}

pub fn test_message() -> MessageRef {
    MessageRef::new(&test_message_type())
}

pub fn int_message() -> MessageRef {
    MessageRef::new(&int_message_type())
}

pub fn field(message: &MessageRef, name: &str) -> Arc<FieldDescriptor> {
    let descriptor = message.descriptor();
    Arc::clone(
        descriptor
            .find_field_by_name(name)
            .unwrap_or_else(|| panic!("{} has no field {name}", descriptor.full_name())),
    )
}

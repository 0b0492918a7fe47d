//! Immutable schema metadata: enums, fields, message types and the pool that
//! resolves type names.
//!
//! Descriptors are built bottom-up: a message type referenced by a field must
//! be built before the message that contains it. Self-referencing schemas are
//! therefore not expressible.

use crate::error::FieldError;
use crate::types::*;
use smol_str::SmolStr;
use std::sync::Arc;
use tracing::debug;
use xxhash_rust::xxh64::xxh64;

fn short_name(full_name: &str) -> &str {
    full_name.rsplit('.').next().unwrap_or(full_name)
}

// ─── Enums ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValueDescriptor {
    pub name: SmolStr,
    pub number: i32,
}

#[derive(Debug)]
pub struct EnumDescriptor {
    full_name: SmolStr,
    values: Vec<EnumValueDescriptor>,
}

impl EnumDescriptor {
    pub fn new<'a>(full_name: &str, values: impl IntoIterator<Item = (&'a str, i32)>) -> Arc<Self> {
        Arc::new(Self {
            full_name: SmolStr::new(full_name),
            values: values
                .into_iter()
                .map(|(name, number)| EnumValueDescriptor {
                    name: SmolStr::new(name),
                    number,
                })
                .collect(),
        })
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn name(&self) -> &str {
        short_name(&self.full_name)
    }

    pub fn values(&self) -> &[EnumValueDescriptor] {
        &self.values
    }

    pub fn find_value_by_number(&self, number: i32) -> Option<&EnumValueDescriptor> {
        self.values.iter().find(|v| v.number == number)
    }

    pub fn find_value_by_name(&self, name: &str) -> Option<&EnumValueDescriptor> {
        self.values.iter().find(|v| v.name == name)
    }

    /// The first declared value, or 0 for an empty enum.
    pub fn default_number(&self) -> i32 {
        self.values.first().map_or(0, |v| v.number)
    }
}

// ─── FieldDescriptor ────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct FieldDescriptor {
    name: SmolStr,
    number: u32,
    type_tag: u8,
    repeated: bool,
    message_type: Option<Arc<MessageDescriptor>>,
    enum_type: Option<Arc<EnumDescriptor>>,
    containing_type: SmolStr,
    /// Position within the containing message; also the storage slot.
    index: usize,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Raw declared type tag (`TYPE_*`).
    pub fn type_tag(&self) -> u8 {
        self.type_tag
    }

    pub fn kind(&self) -> Result<ElementKind, FieldError> {
        ElementKind::from_type_tag(self.type_tag)
    }

    pub fn is_repeated(&self) -> bool {
        self.repeated
    }

    /// String-kind field holding raw bytes rather than text.
    pub fn is_bytes(&self) -> bool {
        self.type_tag == TYPE_BYTES
    }

    pub fn is_map(&self) -> bool {
        self.repeated && self.message_type.as_ref().is_some_and(|m| m.is_map_entry())
    }

    pub fn message_type(&self) -> Option<&Arc<MessageDescriptor>> {
        self.message_type.as_ref()
    }

    pub fn enum_type(&self) -> Option<&Arc<EnumDescriptor>> {
        self.enum_type.as_ref()
    }

    pub fn containing_type(&self) -> &str {
        &self.containing_type
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The `key` field of a map field's entry type.
    pub fn map_key(&self) -> Option<&Arc<FieldDescriptor>> {
        if !self.is_map() {
            return None;
        }
        self.message_type.as_ref()?.fields().first()
    }

    /// The `value` field of a map field's entry type.
    pub fn map_value(&self) -> Option<&Arc<FieldDescriptor>> {
        if !self.is_map() {
            return None;
        }
        self.message_type.as_ref()?.fields().get(1)
    }
}

// ─── FieldSpec (builder input) ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: SmolStr,
    number: u32,
    type_tag: u8,
    repeated: bool,
    message_type: Option<Arc<MessageDescriptor>>,
    enum_type: Option<Arc<EnumDescriptor>>,
    /// `Some(key type)` marks a map field; the remaining fields describe the value.
    map_key: Option<u8>,
}

impl FieldSpec {
    pub fn scalar(name: &str, number: u32, type_tag: u8) -> Self {
        Self {
            name: SmolStr::new(name),
            number,
            type_tag,
            repeated: false,
            message_type: None,
            enum_type: None,
            map_key: None,
        }
    }

    pub fn message(name: &str, number: u32, message_type: &Arc<MessageDescriptor>) -> Self {
        Self {
            message_type: Some(Arc::clone(message_type)),
            ..Self::scalar(name, number, TYPE_MESSAGE)
        }
    }

    pub fn enumeration(name: &str, number: u32, enum_type: &Arc<EnumDescriptor>) -> Self {
        Self {
            enum_type: Some(Arc::clone(enum_type)),
            ..Self::scalar(name, number, TYPE_ENUM)
        }
    }

    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    /// A map field. Only the type information of `value` is used; its name
    /// and number are replaced by `value`/2 in the synthesized entry type.
    pub fn map(name: &str, number: u32, key_type: u8, value: FieldSpec) -> Self {
        Self {
            name: SmolStr::new(name),
            number,
            repeated: true,
            map_key: Some(key_type),
            ..value
        }
    }
}

// ─── MessageDescriptor ──────────────────────────────────────────────────────

#[derive(Debug)]
pub struct MessageDescriptor {
    full_name: SmolStr,
    fields: Vec<Arc<FieldDescriptor>>,
    /// xxh64(field name) → position in `fields`.
    by_name: FastMap<u64, usize>,
    map_entry: bool,
}

impl MessageDescriptor {
    pub fn builder(full_name: &str) -> MessageBuilder {
        MessageBuilder {
            full_name: SmolStr::new(full_name),
            specs: Vec::new(),
            map_entry: false,
        }
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn name(&self) -> &str {
        short_name(&self.full_name)
    }

    pub fn fields(&self) -> &[Arc<FieldDescriptor>] {
        &self.fields
    }

    pub fn is_map_entry(&self) -> bool {
        self.map_entry
    }

    pub fn find_field_by_name(&self, name: &str) -> Option<&Arc<FieldDescriptor>> {
        let hash = xxh64(name.as_bytes(), 0);
        let field = self.fields.get(*self.by_name.get(&hash)?)?;
        (field.name == name).then_some(field)
    }

    pub fn find_field_by_number(&self, number: u32) -> Option<&Arc<FieldDescriptor>> {
        self.fields.iter().find(|f| f.number == number)
    }
}

pub struct MessageBuilder {
    full_name: SmolStr,
    specs: Vec<FieldSpec>,
    map_entry: bool,
}

impl MessageBuilder {
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn build(self) -> Result<Arc<MessageDescriptor>, FieldError> {
        let mut fields = Vec::with_capacity(self.specs.len());
        let mut by_name = FastMap::default();

        for (index, spec) in self.specs.into_iter().enumerate() {
            let invalid = |reason: &str| {
                FieldError::InvalidSchema(format!("{}.{}: {reason}", self.full_name, spec.name))
            };

            if fields.iter().any(|f: &Arc<FieldDescriptor>| f.number == spec.number) {
                return Err(invalid("duplicate field number"));
            }
            if let Some(&existing) = by_name.get(&xxh64(spec.name.as_bytes(), 0)) {
                let other: &Arc<FieldDescriptor> = &fields[existing];
                return Err(if other.name == spec.name {
                    invalid("duplicate field name")
                } else {
                    invalid("field name hash collides with another field")
                });
            }
            if spec.type_tag == TYPE_MESSAGE && spec.message_type.is_none() {
                return Err(invalid("message field without a message type"));
            }
            if spec.type_tag == TYPE_ENUM && spec.enum_type.is_none() {
                return Err(invalid("enum field without an enum type"));
            }

            let (type_tag, message_type, enum_type) = match spec.map_key {
                None => (spec.type_tag, spec.message_type, spec.enum_type),
                Some(key_type) => {
                    let key_kind =
                        ElementKind::from_type_tag(key_type).map_err(|_| invalid("unknown map key type"))?;
                    if !key_kind.is_valid_map_key() || key_type == TYPE_BYTES {
                        return Err(invalid("map key must be an integral, bool or string type"));
                    }
                    let value = FieldSpec {
                        name: SmolStr::new_static("value"),
                        number: 2,
                        repeated: false,
                        map_key: None,
                        type_tag: spec.type_tag,
                        message_type: spec.message_type,
                        enum_type: spec.enum_type,
                    };
                    let entry = MessageBuilder {
                        full_name: SmolStr::from(format!(
                            "{}.{}Entry",
                            self.full_name,
                            camel_case(&spec.name)
                        )),
                        specs: vec![FieldSpec::scalar("key", 1, key_type), value],
                        map_entry: true,
                    }
                    .build()?;
                    (TYPE_MESSAGE, Some(entry), None)
                }
            };

            by_name.insert(xxh64(spec.name.as_bytes(), 0), index);
            fields.push(Arc::new(FieldDescriptor {
                name: spec.name,
                number: spec.number,
                type_tag,
                repeated: spec.repeated,
                message_type,
                enum_type,
                containing_type: self.full_name.clone(),
                index,
            }));
        }

        Ok(Arc::new(MessageDescriptor {
            full_name: self.full_name,
            fields,
            by_name,
            map_entry: self.map_entry,
        }))
    }
}

fn camel_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

// ─── DescriptorPool ─────────────────────────────────────────────────────────

/// Resolves full type names to message descriptors.
#[derive(Debug, Default)]
pub struct DescriptorPool {
    messages: FastMap<SmolStr, Arc<MessageDescriptor>>,
}

impl DescriptorPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a message type and every message type reachable from its fields.
    pub fn register(&mut self, descriptor: &Arc<MessageDescriptor>) {
        if self.messages.contains_key(descriptor.full_name()) {
            return;
        }
        debug!(type_name = descriptor.full_name(), "registering message type");
        self.messages
            .insert(descriptor.full_name.clone(), Arc::clone(descriptor));
        for field in descriptor.fields() {
            if let Some(nested) = field.message_type() {
                self.register(nested);
            }
        }
    }

    pub fn find_message(&self, full_name: &str) -> Option<&Arc<MessageDescriptor>> {
        self.messages.get(full_name)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_schema::{int_message_type, test_message_type};

    #[test]
    fn test_find_field_by_name_and_number() {
        let desc = test_message_type();
        let field = desc.find_field_by_name("int_value").expect("field exists");
        assert_eq!(field.number(), 2);
        assert_eq!(field.kind(), Ok(ElementKind::Int32));
        assert_eq!(field.containing_type(), "bridge.test.TestMessage");
        assert!(desc.find_field_by_name("invalid_field").is_none());
        assert_eq!(desc.find_field_by_number(2).map(|f| f.name()), Some("int_value"));
    }

    #[test]
    fn test_map_field_synthesizes_entry_type() {
        let desc = test_message_type();
        let field = desc.find_field_by_name("string_int_map").unwrap();
        assert!(field.is_map());
        assert!(field.is_repeated());
        let entry = field.message_type().unwrap();
        assert_eq!(entry.full_name(), "bridge.test.TestMessage.StringIntMapEntry");
        assert!(entry.is_map_entry());
        assert_eq!(field.map_key().unwrap().name(), "key");
        assert_eq!(field.map_key().unwrap().type_tag(), TYPE_STRING);
        assert_eq!(field.map_value().unwrap().name(), "value");
        assert_eq!(field.map_value().unwrap().kind(), Ok(ElementKind::Int32));
    }

    #[test]
    fn test_plain_repeated_message_is_not_a_map() {
        let desc = test_message_type();
        let field = desc.find_field_by_name("repeated_int_message").unwrap();
        assert!(!field.is_map());
        assert!(field.map_key().is_none());
    }

    #[test]
    fn test_duplicate_number_rejected() {
        let err = MessageDescriptor::builder("t.Dup")
            .field(FieldSpec::scalar("a", 1, TYPE_INT32))
            .field(FieldSpec::scalar("b", 1, TYPE_INT32))
            .build()
            .unwrap_err();
        assert!(matches!(err, FieldError::InvalidSchema(_)));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = MessageDescriptor::builder("t.Dup")
            .field(FieldSpec::scalar("a", 1, TYPE_INT32))
            .field(FieldSpec::scalar("a", 2, TYPE_INT64))
            .build()
            .unwrap_err();
        assert!(matches!(err, FieldError::InvalidSchema(_)));
    }

    #[test]
    fn test_invalid_map_keys_rejected() {
        for key in [TYPE_DOUBLE, TYPE_FLOAT, TYPE_BYTES, TYPE_MESSAGE, TYPE_GROUP] {
            let err = MessageDescriptor::builder("t.BadMap")
                .field(FieldSpec::map("m", 1, key, FieldSpec::scalar("", 0, TYPE_INT32)))
                .build()
                .unwrap_err();
            assert!(matches!(err, FieldError::InvalidSchema(_)), "key type {key}");
        }
    }

    #[test]
    fn test_message_field_requires_type() {
        let err = MessageDescriptor::builder("t.NoType")
            .field(FieldSpec::scalar("m", 1, TYPE_MESSAGE))
            .build()
            .unwrap_err();
        assert!(matches!(err, FieldError::InvalidSchema(_)));
    }

    #[test]
    fn test_unknown_type_tag_builds_but_has_no_kind() {
        let desc = MessageDescriptor::builder("t.Group")
            .field(FieldSpec::scalar("g", 1, TYPE_GROUP))
            .build()
            .unwrap();
        assert_eq!(desc.fields()[0].kind(), Err(FieldError::UnknownKind(TYPE_GROUP)));
    }

    #[test]
    fn test_enum_default_is_first_value() {
        let e = EnumDescriptor::new("t.E", [("A", 3), ("B", 1)]);
        assert_eq!(e.default_number(), 3);
        assert_eq!(e.name(), "E");
        assert_eq!(e.find_value_by_number(1).map(|v| v.name.as_str()), Some("B"));
        assert_eq!(e.find_value_by_name("A").map(|v| v.number), Some(3));
        let empty = EnumDescriptor::new("t.Empty", []);
        assert_eq!(empty.default_number(), 0);
    }

    #[test]
    fn test_pool_registers_nested_types() {
        let mut pool = DescriptorPool::new();
        pool.register(&test_message_type());
        assert!(pool.find_message("bridge.test.TestMessage").is_some());
        assert!(pool.find_message("bridge.test.IntMessage").is_some());
        assert!(pool.find_message("bridge.test.TestMessage.IntMessageMapEntry").is_some());
        assert!(pool.find_message("bridge.test.Missing").is_none());

        let before = pool.len();
        pool.register(&int_message_type());
        assert_eq!(pool.len(), before);
    }
}

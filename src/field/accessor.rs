//! Per-kind field access strategies.
//!
//! [`ElementType`] is implemented by one zero-sized marker per element kind.
//! [`FieldAccessor`] binds a marker to a (message, field) pair and provides
//! the operations shared by singular, repeated and map access.

use crate::bridge;
use crate::convert::{cast_bool, cast_f32, cast_f64, cast_integer, cast_string, integer_to_host, string_to_host};
use crate::descriptor::FieldDescriptor;
use crate::error::FieldError;
use crate::host_value::{HostMessage, HostValue};
use crate::message::{MessageRef, NativeValue, enum_value_name};
use crate::types::ElementKind;
use smol_str::SmolStr;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Index passed for singular fields, where the index is ignored.
pub(crate) const SINGULAR: i64 = -1;

fn wrong_native(expected: ElementKind, actual: &NativeValue) -> FieldError {
    FieldError::Conversion {
        expected: expected.name(),
        actual: actual.kind().name(),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ElementType
// ════════════════════════════════════════════════════════════════════════════

pub trait ElementType: Sized + 'static {
    const KIND: ElementKind;
    type Value: Clone + fmt::Debug + PartialEq;

    fn unwrap_native(value: NativeValue) -> Result<Self::Value, FieldError>;
    fn wrap_native(value: Self::Value) -> NativeValue;

    /// Host value to native value.
    fn cast(field: &FieldDescriptor, value: &HostValue) -> Result<Self::Value, FieldError>;

    /// Native value to host value. `owner` is the message the value was read from.
    fn to_host(field: &FieldDescriptor, value: Self::Value, owner: &MessageRef) -> HostValue;

    fn repr(field: &FieldDescriptor, value: &Self::Value) -> String;

    /// Checks a converted value against the field before anything is written.
    fn validate(_field: &FieldDescriptor, _value: &Self::Value) -> Result<(), FieldError> {
        Ok(())
    }

    /// `index` is `None` for singular fields and already range-checked otherwise.
    fn read(message: &MessageRef, field: &FieldDescriptor, index: Option<usize>) -> Result<Self::Value, FieldError> {
        let reflection = message.reflection();
        let native = match index {
            Some(i) => reflection.get_repeated(field, i)?,
            None => reflection.get(field)?,
        };
        Self::unwrap_native(native)
    }

    fn write(
        message: &MessageRef,
        field: &FieldDescriptor,
        index: Option<usize>,
        value: Self::Value,
    ) -> Result<(), FieldError> {
        let reflection = message.reflection();
        let native = Self::wrap_native(value);
        match index {
            Some(i) => reflection.set_repeated(field, i, native),
            None => reflection.set(field, native),
        }
    }

    fn append(message: &MessageRef, field: &FieldDescriptor, value: &HostValue) -> Result<(), FieldError> {
        let native = Self::wrap_native(Self::cast(field, value)?);
        message.reflection().add(field, native)
    }
}

// ─── Numeric kinds ──────────────────────────────────────────────────────────

macro_rules! numeric_element_type {
    ($marker:ident, $variant:ident, $native:ty, $cast:expr, $to_host:expr) => {
        #[derive(Debug, Clone, Copy)]
        pub struct $marker;

        impl ElementType for $marker {
            const KIND: ElementKind = ElementKind::$variant;
            type Value = $native;

            fn unwrap_native(value: NativeValue) -> Result<$native, FieldError> {
                match value {
                    NativeValue::$variant(v) => Ok(v),
                    other => Err(wrong_native(Self::KIND, &other)),
                }
            }

            fn wrap_native(value: $native) -> NativeValue {
                NativeValue::$variant(value)
            }

            fn cast(_field: &FieldDescriptor, value: &HostValue) -> Result<$native, FieldError> {
                $cast(value)
            }

            fn to_host(_field: &FieldDescriptor, value: $native, _owner: &MessageRef) -> HostValue {
                $to_host(value)
            }

            fn repr(_field: &FieldDescriptor, value: &$native) -> String {
                value.to_string()
            }
        }
    };
}

numeric_element_type!(
    Int32Kind,
    Int32,
    i32,
    |v: &HostValue| cast_integer(v, "int32"),
    |v: i32| integer_to_host(v.into())
);
numeric_element_type!(
    Int64Kind,
    Int64,
    i64,
    |v: &HostValue| cast_integer(v, "int64"),
    |v: i64| integer_to_host(v.into())
);
numeric_element_type!(
    UInt32Kind,
    UInt32,
    u32,
    |v: &HostValue| cast_integer(v, "uint32"),
    |v: u32| integer_to_host(v.into())
);
numeric_element_type!(
    UInt64Kind,
    UInt64,
    u64,
    |v: &HostValue| cast_integer(v, "uint64"),
    |v: u64| integer_to_host(v.into())
);
numeric_element_type!(FloatKind, Float, f32, cast_f32, HostValue::from);
numeric_element_type!(DoubleKind, Double, f64, cast_f64, HostValue::from);
numeric_element_type!(BoolKind, Bool, bool, cast_bool, HostValue::Bool);

// ─── String ─────────────────────────────────────────────────────────────────

/// Text and bytes fields. Values are raw bytes; text fields only hold UTF-8.
#[derive(Debug, Clone, Copy)]
pub struct StringKind;

impl ElementType for StringKind {
    const KIND: ElementKind = ElementKind::String;
    type Value = Vec<u8>;

    fn unwrap_native(value: NativeValue) -> Result<Vec<u8>, FieldError> {
        match value {
            NativeValue::String(v) => Ok(v),
            other => Err(wrong_native(Self::KIND, &other)),
        }
    }

    fn wrap_native(value: Vec<u8>) -> NativeValue {
        NativeValue::String(value)
    }

    fn cast(field: &FieldDescriptor, value: &HostValue) -> Result<Vec<u8>, FieldError> {
        cast_string(value, field.is_bytes())
    }

    fn to_host(field: &FieldDescriptor, value: Vec<u8>, _owner: &MessageRef) -> HostValue {
        string_to_host(&value, field.is_bytes())
    }

    fn repr(field: &FieldDescriptor, value: &Vec<u8>) -> String {
        if field.is_bytes() {
            return "<Binary String>".to_string();
        }
        format!("'{}'", String::from_utf8_lossy(value))
    }
}

// ─── Message ────────────────────────────────────────────────────────────────

/// Nested message fields. Reads hand out live handles into the parent;
/// writes copy contents and never alias the source.
#[derive(Debug, Clone, Copy)]
pub struct MessageKind;

fn expected_type(field: &FieldDescriptor) -> Result<SmolStr, FieldError> {
    field
        .message_type()
        .map(|m| SmolStr::new(m.full_name()))
        .ok_or_else(|| FieldError::InvalidSchema(format!("{} has no message type", field.name())))
}

impl ElementType for MessageKind {
    const KIND: ElementKind = ElementKind::Message;
    type Value = MessageRef;

    fn unwrap_native(value: NativeValue) -> Result<MessageRef, FieldError> {
        match value {
            NativeValue::Message(m) => Ok(m),
            other => Err(wrong_native(Self::KIND, &other)),
        }
    }

    fn wrap_native(value: MessageRef) -> NativeValue {
        NativeValue::Message(value)
    }

    fn cast(_field: &FieldDescriptor, value: &HostValue) -> Result<MessageRef, FieldError> {
        match value {
            HostValue::Message(m) => Ok(m.message().clone()),
            other => Err(FieldError::Conversion {
                expected: "message",
                actual: other.type_name(),
            }),
        }
    }

    fn to_host(_field: &FieldDescriptor, value: MessageRef, owner: &MessageRef) -> HostValue {
        HostValue::Message(HostMessage::with_owner(value, owner.clone()))
    }

    fn repr(_field: &FieldDescriptor, value: &MessageRef) -> String {
        value.short_debug_string()
    }

    /// Singular reads create the sub-message in place when unset.
    fn read(message: &MessageRef, field: &FieldDescriptor, index: Option<usize>) -> Result<MessageRef, FieldError> {
        let reflection = message.reflection();
        match index {
            Some(i) => reflection.mutable_repeated_message(field, i),
            None => reflection.mutable_message(field),
        }
    }

    fn validate(field: &FieldDescriptor, value: &MessageRef) -> Result<(), FieldError> {
        let expected = expected_type(field)?;
        let actual = value.full_name();
        if actual != expected {
            return Err(FieldError::MessageTypeMismatch { expected, actual });
        }
        Ok(())
    }

    fn write(
        message: &MessageRef,
        field: &FieldDescriptor,
        index: Option<usize>,
        value: MessageRef,
    ) -> Result<(), FieldError> {
        Self::validate(field, &value)?;
        let target = Self::read(message, field, index)?;
        target.copy_from(&value)
    }

    /// Accepts native and runtime-owned messages alike.
    fn append(message: &MessageRef, field: &FieldDescriptor, value: &HostValue) -> Result<(), FieldError> {
        let nested = field
            .message_type()
            .ok_or_else(|| FieldError::InvalidSchema(format!("{} has no message type", field.name())))?;
        if !bridge::matches_type(value, nested.full_name()) {
            return Err(match bridge::schema_type_name(value) {
                Some(actual) => FieldError::MessageTypeMismatch {
                    expected: SmolStr::new(nested.full_name()),
                    actual,
                },
                None => FieldError::Conversion {
                    expected: "message",
                    actual: value.type_name(),
                },
            });
        }
        let copy = bridge::allocate_and_copy(nested, value)?;
        message.reflection().add_allocated_message(field, copy)
    }
}

// ─── Enum ───────────────────────────────────────────────────────────────────

/// Enum fields, read and written as their numbers.
#[derive(Debug, Clone, Copy)]
pub struct EnumKind;

impl ElementType for EnumKind {
    const KIND: ElementKind = ElementKind::Enum;
    type Value = i32;

    fn unwrap_native(value: NativeValue) -> Result<i32, FieldError> {
        match value {
            NativeValue::Enum(n) => Ok(n),
            other => Err(wrong_native(Self::KIND, &other)),
        }
    }

    fn wrap_native(value: i32) -> NativeValue {
        NativeValue::Enum(value)
    }

    fn cast(_field: &FieldDescriptor, value: &HostValue) -> Result<i32, FieldError> {
        cast_integer(value, "enum")
    }

    fn to_host(_field: &FieldDescriptor, value: i32, _owner: &MessageRef) -> HostValue {
        integer_to_host(value.into())
    }

    fn repr(field: &FieldDescriptor, value: &i32) -> String {
        enum_value_name(field, *value)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// FieldAccessor
// ════════════════════════════════════════════════════════════════════════════

/// A (message, field) pair bound to the strategy for the field's element kind.
///
/// Accessors hold no state of their own and observe the live message on
/// every call. The `idx` argument is ignored for singular fields.
pub struct FieldAccessor<K: ElementType> {
    message: MessageRef,
    field: Arc<FieldDescriptor>,
    _kind: PhantomData<K>,
}

impl<K: ElementType> Clone for FieldAccessor<K> {
    fn clone(&self) -> Self {
        Self {
            message: self.message.clone(),
            field: Arc::clone(&self.field),
            _kind: PhantomData,
        }
    }
}

impl<K: ElementType> fmt::Debug for FieldAccessor<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("field", &self.field.name())
            .field("kind", &K::KIND)
            .finish()
    }
}

impl<K: ElementType> FieldAccessor<K> {
    /// Fails unless the field's declared kind is `K`.
    pub fn new(message: &MessageRef, field: &Arc<FieldDescriptor>) -> Result<Self, FieldError> {
        let declared = field.kind()?;
        if declared != K::KIND {
            return Err(FieldError::Conversion {
                expected: K::KIND.name(),
                actual: declared.name(),
            });
        }
        Ok(Self {
            message: message.clone(),
            field: Arc::clone(field),
            _kind: PhantomData,
        })
    }

    pub fn message(&self) -> &MessageRef {
        &self.message
    }

    pub fn field(&self) -> &Arc<FieldDescriptor> {
        &self.field
    }

    /// Number of elements of a repeated field.
    pub fn size(&self) -> Result<usize, FieldError> {
        self.message.reflection().field_size(&self.field)
    }

    /// Reset to the schema default, or to empty for repeated fields.
    pub fn clear(&self) -> Result<(), FieldError> {
        self.message.reflection().clear_field(&self.field)
    }

    /// `idx` must lie in `[0, allowed)`; `allowed` defaults to the current size.
    pub fn check_index(&self, idx: i64, allowed: Option<usize>) -> Result<usize, FieldError> {
        let size = self.size()?;
        let allowed = allowed.unwrap_or(size);
        match usize::try_from(idx) {
            Ok(i) if i < allowed => Ok(i),
            _ => Err(FieldError::IndexOutOfRange { index: idx, size }),
        }
    }

    fn position(&self, idx: i64) -> Result<Option<usize>, FieldError> {
        if self.field.is_repeated() {
            return self.check_index(idx, None).map(Some);
        }
        Ok(None)
    }

    pub fn get(&self, idx: i64) -> Result<K::Value, FieldError> {
        K::read(&self.message, &self.field, self.position(idx)?)
    }

    /// Message results keep this accessor's message alive as their owner.
    pub fn get_host(&self, idx: i64) -> Result<HostValue, FieldError> {
        let value = self.get(idx)?;
        Ok(K::to_host(&self.field, value, &self.message))
    }

    pub fn set(&self, idx: i64, value: K::Value) -> Result<(), FieldError> {
        K::write(&self.message, &self.field, self.position(idx)?, value)
    }

    pub fn set_host(&self, idx: i64, value: &HostValue) -> Result<(), FieldError> {
        let value = K::cast(&self.field, value)?;
        self.set(idx, value)
    }

    /// Convert and append to a repeated field.
    pub fn add(&self, value: &HostValue) -> Result<(), FieldError> {
        K::append(&self.message, &self.field, value)
    }

    pub fn element_repr(&self, idx: i64) -> Result<String, FieldError> {
        let value = self.get(idx)?;
        Ok(K::repr(&self.field, &value))
    }
}

impl FieldAccessor<MessageKind> {
    /// Append a default-initialized sub-message and return it for mutation.
    pub fn add_default(&self) -> Result<MessageRef, FieldError> {
        self.message.reflection().add_message(&self.field)
    }
}

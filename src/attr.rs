//! Attribute-style access to a message's fields.
//!
//! Repeated and map fields come back as handles that hold the parent
//! message, so the parent stays alive as long as any handle to one of its
//! fields is reachable.

use crate::descriptor::FieldDescriptor;
use crate::error::FieldError;
use crate::field::{ElementType, GetSingularField, KindHandler, MapField, RepeatedField, SetSingularField, dispatch};
use crate::host_value::HostValue;
use crate::message::MessageRef;
use crate::types::ElementKind;
use smol_str::SmolStr;
use std::fmt;
use std::sync::Arc;

impl MessageRef {
    fn field_named(&self, name: &str) -> Result<Arc<FieldDescriptor>, FieldError> {
        let descriptor = self.descriptor();
        descriptor
            .find_field_by_name(name)
            .cloned()
            .ok_or_else(|| FieldError::FieldNotFound {
                message: SmolStr::new(descriptor.full_name()),
                field: name.to_string(),
            })
    }

    /// Read a field: map and repeated fields as container handles, singular
    /// fields as values. Singular message fields are created if unset.
    pub fn get_attr(&self, name: &str) -> Result<HostValue, FieldError> {
        let field = self.field_named(name)?;
        if field.is_map() {
            return Ok(HostValue::Map(MapHandle::new(self, &field)?));
        }
        if field.is_repeated() {
            return Ok(HostValue::Repeated(RepeatedHandle::new(self, &field)?));
        }
        dispatch(&field, GetSingularField { message: self })
    }

    /// Assign a singular scalar, string or enum field. Message, repeated and
    /// map fields are modified through the values `get_attr` returns.
    pub fn set_attr(&self, name: &str, value: &HostValue) -> Result<(), FieldError> {
        let field = self.field_named(name)?;
        if field.is_repeated() || field.kind()? == ElementKind::Message {
            return Err(FieldError::ReadOnlyField(name.to_string()));
        }
        dispatch(&field, SetSingularField { message: self, value })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// RepeatedHandle
// ════════════════════════════════════════════════════════════════════════════

/// A repeated field of a live message.
#[derive(Clone)]
pub struct RepeatedHandle {
    owner: MessageRef,
    field: Arc<FieldDescriptor>,
}

enum RepeatedWrite<'a> {
    SetItem(&'a HostValue, &'a HostValue),
    DelItem(&'a HostValue),
    Insert(i64, &'a HostValue),
    Append(&'a HostValue),
    Extend(&'a HostValue),
}

struct RepeatedCall<'a> {
    owner: &'a MessageRef,
    op: RepeatedWrite<'a>,
}

impl KindHandler for RepeatedCall<'_> {
    type Output = ();

    fn handle<K: ElementType>(self, field: &Arc<FieldDescriptor>) -> Result<(), FieldError> {
        let repeated = RepeatedField::<K>::new(self.owner, field)?;
        match self.op {
            RepeatedWrite::SetItem(index, value) => repeated.set_item(index, value),
            RepeatedWrite::DelItem(index) => repeated.del_item(index),
            RepeatedWrite::Insert(idx, value) => repeated.insert(idx, value),
            RepeatedWrite::Append(value) => repeated.add(value),
            RepeatedWrite::Extend(values) => repeated.extend(values),
        }
    }
}

struct RepeatedItem<'a> {
    owner: &'a MessageRef,
    index: &'a HostValue,
}

impl KindHandler for RepeatedItem<'_> {
    type Output = HostValue;

    fn handle<K: ElementType>(self, field: &Arc<FieldDescriptor>) -> Result<HostValue, FieldError> {
        RepeatedField::<K>::new(self.owner, field)?.get_item(self.index)
    }
}

struct RepeatedItems<'a> {
    owner: &'a MessageRef,
}

impl KindHandler for RepeatedItems<'_> {
    type Output = Vec<HostValue>;

    fn handle<K: ElementType>(self, field: &Arc<FieldDescriptor>) -> Result<Vec<HostValue>, FieldError> {
        RepeatedField::<K>::new(self.owner, field)?.to_vec()
    }
}

struct RepeatedRepr<'a> {
    owner: &'a MessageRef,
}

impl KindHandler for RepeatedRepr<'_> {
    type Output = String;

    fn handle<K: ElementType>(self, field: &Arc<FieldDescriptor>) -> Result<String, FieldError> {
        RepeatedField::<K>::new(self.owner, field)?.repr()
    }
}

impl RepeatedHandle {
    pub fn new(owner: &MessageRef, field: &Arc<FieldDescriptor>) -> Result<Self, FieldError> {
        if !field.is_repeated() {
            return Err(FieldError::InvalidArgument(format!("{} is not a repeated field", field.name())));
        }
        Ok(Self {
            owner: owner.clone(),
            field: Arc::clone(field),
        })
    }

    pub fn owner(&self) -> &MessageRef {
        &self.owner
    }

    pub fn field(&self) -> &Arc<FieldDescriptor> {
        &self.field
    }

    fn write(&self, op: RepeatedWrite<'_>) -> Result<(), FieldError> {
        dispatch(&self.field, RepeatedCall { owner: &self.owner, op })
    }

    pub fn len(&self) -> Result<usize, FieldError> {
        self.owner.reflection().field_size(&self.field)
    }

    pub fn is_empty(&self) -> Result<bool, FieldError> {
        Ok(self.len()? == 0)
    }

    pub fn clear(&self) -> Result<(), FieldError> {
        self.owner.reflection().clear_field(&self.field)
    }

    pub fn get_item(&self, index: &HostValue) -> Result<HostValue, FieldError> {
        dispatch(&self.field, RepeatedItem { owner: &self.owner, index })
    }

    pub fn set_item(&self, index: &HostValue, value: &HostValue) -> Result<(), FieldError> {
        self.write(RepeatedWrite::SetItem(index, value))
    }

    /// Fails with `Unsupported` for message elements.
    pub fn del_item(&self, index: &HostValue) -> Result<(), FieldError> {
        self.write(RepeatedWrite::DelItem(index))
    }

    pub fn insert(&self, idx: i64, value: &HostValue) -> Result<(), FieldError> {
        self.write(RepeatedWrite::Insert(idx, value))
    }

    pub fn append(&self, value: &HostValue) -> Result<(), FieldError> {
        self.write(RepeatedWrite::Append(value))
    }

    pub fn extend(&self, values: &HostValue) -> Result<(), FieldError> {
        self.write(RepeatedWrite::Extend(values))
    }

    pub fn repr(&self) -> Result<String, FieldError> {
        dispatch(&self.field, RepeatedRepr { owner: &self.owner })
    }

    /// Elements in order.
    pub fn to_vec(&self) -> Result<Vec<HostValue>, FieldError> {
        dispatch(&self.field, RepeatedItems { owner: &self.owner })
    }
}

/// Two handles are equal when they name the same field of the same message.
impl PartialEq for RepeatedHandle {
    fn eq(&self, other: &Self) -> bool {
        self.owner.ptr_eq(&other.owner) && Arc::ptr_eq(&self.field, &other.field)
    }
}

impl fmt::Debug for RepeatedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr() {
            Ok(repr) => write!(f, "{}: {}", self.field.name(), repr),
            Err(e) => write!(f, "{}: <{}>", self.field.name(), e),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// MapHandle
// ════════════════════════════════════════════════════════════════════════════

/// A map field of a live message.
#[derive(Clone)]
pub struct MapHandle {
    owner: MessageRef,
    field: Arc<FieldDescriptor>,
    value_field: Arc<FieldDescriptor>,
}

// Dispatched over the value kind; `MapField` dispatches keys itself.

struct MapItem<'a> {
    owner: &'a MessageRef,
    field: &'a Arc<FieldDescriptor>,
    key: &'a HostValue,
}

impl KindHandler for MapItem<'_> {
    type Output = HostValue;

    fn handle<V: ElementType>(self, _value_field: &Arc<FieldDescriptor>) -> Result<HostValue, FieldError> {
        MapField::<V>::new(self.owner, self.field)?.get_host(self.key)
    }
}

struct MapStore<'a> {
    owner: &'a MessageRef,
    field: &'a Arc<FieldDescriptor>,
    key: &'a HostValue,
    value: &'a HostValue,
}

impl KindHandler for MapStore<'_> {
    type Output = ();

    fn handle<V: ElementType>(self, _value_field: &Arc<FieldDescriptor>) -> Result<(), FieldError> {
        MapField::<V>::new(self.owner, self.field)?.set_host(self.key, self.value)
    }
}

struct MapContains<'a> {
    owner: &'a MessageRef,
    field: &'a Arc<FieldDescriptor>,
    key: &'a HostValue,
}

impl KindHandler for MapContains<'_> {
    type Output = bool;

    fn handle<V: ElementType>(self, _value_field: &Arc<FieldDescriptor>) -> Result<bool, FieldError> {
        MapField::<V>::new(self.owner, self.field)?.contains(self.key)
    }
}

struct MapRender<'a> {
    owner: &'a MessageRef,
    field: &'a Arc<FieldDescriptor>,
}

impl KindHandler for MapRender<'_> {
    type Output = String;

    fn handle<V: ElementType>(self, _value_field: &Arc<FieldDescriptor>) -> Result<String, FieldError> {
        MapField::<V>::new(self.owner, self.field)?.repr()
    }
}

struct MapItems<'a> {
    owner: &'a MessageRef,
    field: &'a Arc<FieldDescriptor>,
}

impl KindHandler for MapItems<'_> {
    type Output = Vec<(HostValue, HostValue)>;

    fn handle<V: ElementType>(
        self,
        _value_field: &Arc<FieldDescriptor>,
    ) -> Result<Vec<(HostValue, HostValue)>, FieldError> {
        MapField::<V>::new(self.owner, self.field)?.items()
    }
}

impl MapHandle {
    pub fn new(owner: &MessageRef, field: &Arc<FieldDescriptor>) -> Result<Self, FieldError> {
        let value_field = field
            .map_value()
            .ok_or_else(|| FieldError::InvalidArgument(format!("{} is not a map field", field.name())))?;
        Ok(Self {
            owner: owner.clone(),
            field: Arc::clone(field),
            value_field: Arc::clone(value_field),
        })
    }

    pub fn owner(&self) -> &MessageRef {
        &self.owner
    }

    pub fn field(&self) -> &Arc<FieldDescriptor> {
        &self.field
    }

    pub fn len(&self) -> Result<usize, FieldError> {
        self.owner.reflection().field_size(&self.field)
    }

    pub fn is_empty(&self) -> Result<bool, FieldError> {
        Ok(self.len()? == 0)
    }

    pub fn clear(&self) -> Result<(), FieldError> {
        self.owner.reflection().clear_field(&self.field)
    }

    /// Inserts `key` with the value's default if it is missing.
    pub fn get_item(&self, key: &HostValue) -> Result<HostValue, FieldError> {
        dispatch(
            &self.value_field,
            MapItem {
                owner: &self.owner,
                field: &self.field,
                key,
            },
        )
    }

    pub fn set_item(&self, key: &HostValue, value: &HostValue) -> Result<(), FieldError> {
        dispatch(
            &self.value_field,
            MapStore {
                owner: &self.owner,
                field: &self.field,
                key,
                value,
            },
        )
    }

    pub fn contains(&self, key: &HostValue) -> Result<bool, FieldError> {
        dispatch(
            &self.value_field,
            MapContains {
                owner: &self.owner,
                field: &self.field,
                key,
            },
        )
    }

    pub fn repr(&self) -> Result<String, FieldError> {
        dispatch(
            &self.value_field,
            MapRender {
                owner: &self.owner,
                field: &self.field,
            },
        )
    }

    /// (key, value) pairs in storage order.
    pub fn items(&self) -> Result<Vec<(HostValue, HostValue)>, FieldError> {
        dispatch(
            &self.value_field,
            MapItems {
                owner: &self.owner,
                field: &self.field,
            },
        )
    }
}

impl PartialEq for MapHandle {
    fn eq(&self, other: &Self) -> bool {
        self.owner.ptr_eq(&other.owner) && Arc::ptr_eq(&self.field, &other.field)
    }
}

impl fmt::Debug for MapHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr() {
            Ok(repr) => write!(f, "{}: {}", self.field.name(), repr),
            Err(e) => write!(f, "{}: <{}>", self.field.name(), e),
        }
    }
}

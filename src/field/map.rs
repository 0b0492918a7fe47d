use super::accessor::{ElementType, FieldAccessor, MessageKind, SINGULAR};
use super::dispatch::{KindHandler, dispatch};
use super::repeated::RepeatedField;
use crate::descriptor::FieldDescriptor;
use crate::error::FieldError;
use crate::host_value::HostValue;
use crate::message::MessageRef;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::trace;

/// Associative access to a map field, stored as repeated key/value entries.
///
/// Lookups scan the entries in storage order. Reading a missing key inserts
/// it with the value's schema default, like the generated map accessors.
pub struct MapField<V: ElementType> {
    entries: RepeatedField<MessageKind>,
    key_field: Arc<FieldDescriptor>,
    value_field: Arc<FieldDescriptor>,
    _value: PhantomData<V>,
}

impl<V: ElementType> MapField<V> {
    pub fn new(message: &MessageRef, field: &Arc<FieldDescriptor>) -> Result<Self, FieldError> {
        let (Some(key_field), Some(value_field)) = (field.map_key(), field.map_value()) else {
            return Err(FieldError::InvalidArgument(format!("{} is not a map field", field.name())));
        };
        let declared = value_field.kind()?;
        if declared != V::KIND {
            return Err(FieldError::Conversion {
                expected: V::KIND.name(),
                actual: declared.name(),
            });
        }
        Ok(Self {
            entries: RepeatedField::new(message, field)?,
            key_field: Arc::clone(key_field),
            value_field: Arc::clone(value_field),
            _value: PhantomData,
        })
    }

    pub fn field(&self) -> &Arc<FieldDescriptor> {
        self.entries.field()
    }

    pub fn size(&self) -> Result<usize, FieldError> {
        self.entries.size()
    }

    pub fn clear(&self) -> Result<(), FieldError> {
        self.entries.clear()
    }

    /// The entry holding `key`. On a miss, appends a new entry for `key`
    /// when `add_if_missing` is set and returns `None` otherwise.
    pub fn find_pair(&self, key: &HostValue, add_if_missing: bool) -> Result<Option<MessageRef>, FieldError> {
        dispatch(
            &self.key_field,
            FindMapPair {
                entries: &self.entries,
                key,
                add_if_missing,
            },
        )
    }

    fn value_accessor(&self, key: &HostValue) -> Result<FieldAccessor<V>, FieldError> {
        let pair = self
            .find_pair(key, true)?
            .ok_or_else(|| FieldError::InvalidArgument(format!("{}: map entry was not created", self.field().name())))?;
        FieldAccessor::new(&pair, &self.value_field)
    }

    /// Inserts `key` with a default value if it is missing.
    pub fn get(&self, key: &HostValue) -> Result<V::Value, FieldError> {
        self.value_accessor(key)?.get(SINGULAR)
    }

    /// Inserts `key` with a default value if it is missing.
    pub fn get_host(&self, key: &HostValue) -> Result<HostValue, FieldError> {
        self.value_accessor(key)?.get_host(SINGULAR)
    }

    /// The value is checked before the lookup, so a rejected value never inserts `key`.
    pub fn set(&self, key: &HostValue, value: V::Value) -> Result<(), FieldError> {
        V::validate(&self.value_field, &value)?;
        self.value_accessor(key)?.set(SINGULAR, value)
    }

    /// The value is converted before the lookup, so a bad value never inserts `key`.
    pub fn set_host(&self, key: &HostValue, value: &HostValue) -> Result<(), FieldError> {
        let value = V::cast(&self.value_field, value)?;
        self.set(key, value)
    }

    pub fn contains(&self, key: &HostValue) -> Result<bool, FieldError> {
        Ok(self.find_pair(key, false)?.is_some())
    }

    /// `{k: v, ...}` in storage order, or `{}` when empty.
    pub fn repr(&self) -> Result<String, FieldError> {
        dispatch(
            &self.key_field,
            MapRepr::<V> {
                entries: &self.entries,
                value_field: &self.value_field,
                _value: PhantomData,
            },
        )
    }

    /// Every (key, value) pair as host values, in storage order.
    pub fn items(&self) -> Result<Vec<(HostValue, HostValue)>, FieldError> {
        let mut items = Vec::with_capacity(self.size()?);
        for i in 0..self.size()? {
            let pair = self.entries.get(i as i64)?;
            let key = dispatch(&self.key_field, super::GetSingularField { message: &pair })?;
            let value = FieldAccessor::<V>::new(&pair, &self.value_field)?.get_host(SINGULAR)?;
            items.push((key, value));
        }
        Ok(items)
    }
}

// ─── Key-kind handlers ──────────────────────────────────────────────────────

struct FindMapPair<'a> {
    entries: &'a RepeatedField<MessageKind>,
    key: &'a HostValue,
    add_if_missing: bool,
}

impl KindHandler for FindMapPair<'_> {
    type Output = Option<MessageRef>;

    fn handle<K: ElementType>(self, key_field: &Arc<FieldDescriptor>) -> Result<Option<MessageRef>, FieldError> {
        let target = K::cast(key_field, self.key)?;
        for i in 0..self.entries.size()? {
            let pair = self.entries.get(i as i64)?;
            if FieldAccessor::<K>::new(&pair, key_field)?.get(SINGULAR)? == target {
                return Ok(Some(pair));
            }
        }
        if !self.add_if_missing {
            return Ok(None);
        }
        let pair = self.entries.add_default()?;
        FieldAccessor::<K>::new(&pair, key_field)?.set(SINGULAR, target)?;
        trace!(field = self.entries.field().name(), "map key missing; inserted default entry");
        Ok(Some(pair))
    }
}

struct MapRepr<'a, V: ElementType> {
    entries: &'a RepeatedField<MessageKind>,
    value_field: &'a Arc<FieldDescriptor>,
    _value: PhantomData<V>,
}

impl<V: ElementType> KindHandler for MapRepr<'_, V> {
    type Output = String;

    fn handle<K: ElementType>(self, key_field: &Arc<FieldDescriptor>) -> Result<String, FieldError> {
        let size = self.entries.size()?;
        let mut parts = Vec::with_capacity(size);
        for i in 0..size {
            let pair = self.entries.get(i as i64)?;
            let key = FieldAccessor::<K>::new(&pair, key_field)?.element_repr(SINGULAR)?;
            let value = FieldAccessor::<V>::new(&pair, self.value_field)?.element_repr(SINGULAR)?;
            parts.push(format!("{key}: {value}"));
        }
        Ok(format!("{{{}}}", parts.join(", ")))
    }
}

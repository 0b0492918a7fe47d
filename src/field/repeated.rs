use super::accessor::{ElementType, FieldAccessor};
use crate::descriptor::FieldDescriptor;
use crate::error::FieldError;
use crate::host_value::HostValue;
use crate::message::MessageRef;
use crate::types::ElementKind;
use std::ops::Deref;
use std::sync::Arc;

/// List semantics over a repeated field.
///
/// Dereferences to the underlying [`FieldAccessor`] for `size`, `get`,
/// `set`, `add` and friends.
#[derive(Debug, Clone)]
pub struct RepeatedField<K: ElementType> {
    accessor: FieldAccessor<K>,
}

impl<K: ElementType> Deref for RepeatedField<K> {
    type Target = FieldAccessor<K>;

    fn deref(&self) -> &FieldAccessor<K> {
        &self.accessor
    }
}

/// Integer subscript of a host index value.
pub(crate) fn subscript(index: &HostValue) -> Result<i64, FieldError> {
    match index {
        HostValue::Number(n) => match n.as_integer() {
            Some(i) => i64::try_from(i).map_err(|_| FieldError::Conversion {
                expected: "int64",
                actual: index.type_name(),
            }),
            None => Err(FieldError::Conversion {
                expected: "int",
                actual: index.type_name(),
            }),
        },
        HostValue::Slice(_) => Err(FieldError::Unsupported("slice indices on repeated fields")),
        other => Err(FieldError::Conversion {
            expected: "int",
            actual: other.type_name(),
        }),
    }
}

impl<K: ElementType> RepeatedField<K> {
    pub fn new(message: &MessageRef, field: &Arc<FieldDescriptor>) -> Result<Self, FieldError> {
        if !field.is_repeated() {
            return Err(FieldError::InvalidArgument(format!("{} is not a repeated field", field.name())));
        }
        Ok(Self {
            accessor: FieldAccessor::new(message, field)?,
        })
    }

    /// Insert before `idx`; `idx == size` appends.
    pub fn insert(&self, idx: i64, value: &HostValue) -> Result<(), FieldError> {
        let position = self.check_index(idx, Some(self.size()? + 1))?;
        self.add(value)?;
        self.message().reflection().move_last_to(self.field(), position)
    }

    /// Remove the element at `idx`. Not available for message elements.
    pub fn delete(&self, idx: i64) -> Result<(), FieldError> {
        if K::KIND == ElementKind::Message {
            return Err(FieldError::Unsupported("deleting elements of a repeated message field"));
        }
        let position = self.check_index(idx, None)?;
        let reflection = self.message().reflection();
        reflection.move_to_last(self.field(), position)?;
        reflection.remove_last(self.field())
    }

    /// Append every element of a list or of another repeated field.
    pub fn extend(&self, values: &HostValue) -> Result<(), FieldError> {
        let items = match values {
            HostValue::List(items) => items.clone(),
            HostValue::Repeated(handle) => handle.to_vec()?,
            other => {
                return Err(FieldError::InvalidArgument(format!(
                    "extend: expected a sequence, got {}",
                    other.type_name()
                )));
            }
        };
        for item in &items {
            self.add(item)?;
        }
        Ok(())
    }

    pub fn get_item(&self, index: &HostValue) -> Result<HostValue, FieldError> {
        self.get_host(subscript(index)?)
    }

    pub fn set_item(&self, index: &HostValue, value: &HostValue) -> Result<(), FieldError> {
        self.set_host(subscript(index)?, value)
    }

    pub fn del_item(&self, index: &HostValue) -> Result<(), FieldError> {
        self.delete(subscript(index)?)
    }

    /// `[a, b, c]`, or `[]` when empty.
    pub fn repr(&self) -> Result<String, FieldError> {
        let size = self.size()?;
        let mut parts = Vec::with_capacity(size);
        for i in 0..size {
            parts.push(self.element_repr(i as i64)?);
        }
        Ok(format!("[{}]", parts.join(", ")))
    }

    /// Every element as a host value, in order.
    pub fn to_vec(&self) -> Result<Vec<HostValue>, FieldError> {
        (0..self.size()?).map(|i| self.get_host(i as i64)).collect()
    }
}

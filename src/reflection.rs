//! Native reflection over a [`MessageRef`].
//!
//! This is the only code that reads or writes field storage directly. Every
//! call borrows the message for the duration of the call and never across a
//! call back into user code, so handles can be re-entered freely between calls.

use crate::descriptor::FieldDescriptor;
use crate::error::FieldError;
use crate::message::{DynamicMessage, FieldSlot, MessageRef, NativeValue};
use smol_str::SmolStr;

pub struct Reflection<'m> {
    message: &'m MessageRef,
}

impl MessageRef {
    pub fn reflection(&self) -> Reflection<'_> {
        Reflection { message: self }
    }
}

fn slot<'d>(message: &'d DynamicMessage, field: &FieldDescriptor) -> Result<&'d FieldSlot, FieldError> {
    check_owner(message, field)?;
    message.slots.get(field.index()).ok_or_else(|| not_found(message, field))
}

fn slot_mut<'d>(message: &'d mut DynamicMessage, field: &FieldDescriptor) -> Result<&'d mut FieldSlot, FieldError> {
    check_owner(message, field)?;
    if field.index() >= message.slots.len() {
        return Err(not_found(message, field));
    }
    Ok(&mut message.slots[field.index()])
}

fn check_owner(message: &DynamicMessage, field: &FieldDescriptor) -> Result<(), FieldError> {
    if message.descriptor().full_name() != field.containing_type() {
        return Err(not_found(message, field));
    }
    Ok(())
}

fn not_found(message: &DynamicMessage, field: &FieldDescriptor) -> FieldError {
    FieldError::FieldNotFound {
        message: SmolStr::new(message.descriptor().full_name()),
        field: field.name().to_string(),
    }
}

fn check_kind(field: &FieldDescriptor, value: &NativeValue) -> Result<(), FieldError> {
    let expected = field.kind()?;
    if value.kind() != expected {
        return Err(FieldError::Conversion {
            expected: expected.name(),
            actual: value.kind().name(),
        });
    }
    if let (NativeValue::Message(m), Some(nested)) = (value, field.message_type()) {
        let actual = m.full_name();
        if actual != nested.full_name() {
            return Err(FieldError::MessageTypeMismatch {
                expected: SmolStr::new(nested.full_name()),
                actual,
            });
        }
    }
    Ok(())
}

fn singular_only(field: &FieldDescriptor) -> FieldError {
    FieldError::InvalidArgument(format!("{} is repeated; use the repeated accessors", field.name()))
}

fn repeated_only(field: &FieldDescriptor) -> FieldError {
    FieldError::InvalidArgument(format!("{} is not repeated", field.name()))
}

fn out_of_range(index: usize, size: usize) -> FieldError {
    FieldError::IndexOutOfRange {
        index: i64::try_from(index).unwrap_or(i64::MAX),
        size,
    }
}

impl<'m> Reflection<'m> {
    /// Number of elements of a repeated field; 0 or 1 (presence) for singular.
    pub fn field_size(&self, field: &FieldDescriptor) -> Result<usize, FieldError> {
        let message = self.message.borrow();
        Ok(match slot(&message, field)? {
            FieldSlot::Singular(v) => usize::from(v.is_some()),
            FieldSlot::Repeated(vs) => vs.len(),
        })
    }

    pub fn has_field(&self, field: &FieldDescriptor) -> Result<bool, FieldError> {
        Ok(self.field_size(field)? > 0)
    }

    pub fn clear_field(&self, field: &FieldDescriptor) -> Result<(), FieldError> {
        let mut message = self.message.borrow_mut();
        match slot_mut(&mut message, field)? {
            FieldSlot::Singular(v) => *v = None,
            FieldSlot::Repeated(vs) => vs.clear(),
        }
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════
    // Singular
    // ════════════════════════════════════════════════════════════════════════

    /// Value of a singular field, or its default when unset. Unset message
    /// fields yield a detached default message; use `mutable_message` to
    /// create one in place.
    pub fn get(&self, field: &FieldDescriptor) -> Result<NativeValue, FieldError> {
        let stored = {
            let message = self.message.borrow();
            match slot(&message, field)? {
                FieldSlot::Singular(v) => v.clone(),
                FieldSlot::Repeated(_) => return Err(singular_only(field)),
            }
        };
        match stored {
            Some(v) => Ok(v),
            None => NativeValue::default_for(field),
        }
    }

    pub fn set(&self, field: &FieldDescriptor, value: NativeValue) -> Result<(), FieldError> {
        check_kind(field, &value)?;
        let mut message = self.message.borrow_mut();
        match slot_mut(&mut message, field)? {
            FieldSlot::Singular(v) => *v = Some(value),
            FieldSlot::Repeated(_) => return Err(singular_only(field)),
        }
        Ok(())
    }

    /// The singular sub-message, created (and marked present) if unset.
    pub fn mutable_message(&self, field: &FieldDescriptor) -> Result<MessageRef, FieldError> {
        if let NativeValue::Message(existing) = self.get(field)? {
            if self.has_field(field)? {
                return Ok(existing);
            }
            self.set(field, NativeValue::Message(existing.clone()))?;
            return Ok(existing);
        }
        Err(FieldError::Conversion {
            expected: "message",
            actual: field.kind()?.name(),
        })
    }

    // ════════════════════════════════════════════════════════════════════════
    // Repeated
    // ════════════════════════════════════════════════════════════════════════

    pub fn get_repeated(&self, field: &FieldDescriptor, index: usize) -> Result<NativeValue, FieldError> {
        let message = self.message.borrow();
        match slot(&message, field)? {
            FieldSlot::Repeated(vs) => vs.get(index).cloned().ok_or_else(|| out_of_range(index, vs.len())),
            FieldSlot::Singular(_) => Err(repeated_only(field)),
        }
    }

    pub fn set_repeated(&self, field: &FieldDescriptor, index: usize, value: NativeValue) -> Result<(), FieldError> {
        check_kind(field, &value)?;
        let mut message = self.message.borrow_mut();
        match slot_mut(&mut message, field)? {
            FieldSlot::Repeated(vs) => {
                let size = vs.len();
                let element = vs.get_mut(index).ok_or_else(|| out_of_range(index, size))?;
                *element = value;
                Ok(())
            }
            FieldSlot::Singular(_) => Err(repeated_only(field)),
        }
    }

    pub fn mutable_repeated_message(&self, field: &FieldDescriptor, index: usize) -> Result<MessageRef, FieldError> {
        match self.get_repeated(field, index)? {
            NativeValue::Message(m) => Ok(m),
            other => Err(FieldError::Conversion {
                expected: "message",
                actual: other.kind().name(),
            }),
        }
    }

    /// Append one element.
    pub fn add(&self, field: &FieldDescriptor, value: NativeValue) -> Result<(), FieldError> {
        check_kind(field, &value)?;
        let mut message = self.message.borrow_mut();
        match slot_mut(&mut message, field)? {
            FieldSlot::Repeated(vs) => {
                vs.push(value);
                Ok(())
            }
            FieldSlot::Singular(_) => Err(repeated_only(field)),
        }
    }

    /// Append a default-initialized sub-message and return it.
    pub fn add_message(&self, field: &FieldDescriptor) -> Result<MessageRef, FieldError> {
        let NativeValue::Message(fresh) = NativeValue::default_for(field)? else {
            return Err(FieldError::Conversion {
                expected: "message",
                actual: field.kind()?.name(),
            });
        };
        self.add(field, NativeValue::Message(fresh.clone()))?;
        Ok(fresh)
    }

    /// Take ownership of an already-populated sub-message and append it.
    pub fn add_allocated_message(&self, field: &FieldDescriptor, message: MessageRef) -> Result<(), FieldError> {
        self.add(field, NativeValue::Message(message))
    }

    /// Move the last element to `index`, shifting the elements after it.
    pub fn move_last_to(&self, field: &FieldDescriptor, index: usize) -> Result<(), FieldError> {
        self.with_repeated(field, |vs| {
            let size = vs.len();
            if index >= size {
                return Err(out_of_range(index, size));
            }
            vs[index..].rotate_right(1);
            Ok(())
        })
    }

    /// Move the element at `index` to the end, shifting the elements after it.
    pub fn move_to_last(&self, field: &FieldDescriptor, index: usize) -> Result<(), FieldError> {
        self.with_repeated(field, |vs| {
            let size = vs.len();
            if index >= size {
                return Err(out_of_range(index, size));
            }
            vs[index..].rotate_left(1);
            Ok(())
        })
    }

    pub fn remove_last(&self, field: &FieldDescriptor) -> Result<(), FieldError> {
        self.with_repeated(field, |vs| match vs.pop() {
            Some(_) => Ok(()),
            None => Err(out_of_range(0, 0)),
        })
    }

    fn with_repeated<T>(
        &self,
        field: &FieldDescriptor,
        f: impl FnOnce(&mut Vec<NativeValue>) -> Result<T, FieldError>,
    ) -> Result<T, FieldError> {
        let mut message = self.message.borrow_mut();
        match slot_mut(&mut message, field)? {
            FieldSlot::Repeated(vs) => f(vs),
            FieldSlot::Singular(_) => Err(repeated_only(field)),
        }
    }
}

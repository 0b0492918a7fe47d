//! The field-access engine: one dispatch point over element kinds and the
//! singular, repeated and map access strategies built on it.

pub mod accessor;
pub mod dispatch;
pub mod map;
pub mod repeated;

pub use accessor::{
    BoolKind, DoubleKind, ElementType, EnumKind, FieldAccessor, FloatKind, Int32Kind, Int64Kind, MessageKind,
    StringKind, UInt32Kind, UInt64Kind,
};
pub use dispatch::{KindHandler, dispatch};
pub use map::MapField;
pub use repeated::RepeatedField;

use crate::descriptor::FieldDescriptor;
use crate::error::FieldError;
use crate::host_value::HostValue;
use crate::message::MessageRef;
use accessor::SINGULAR;
use std::sync::Arc;

/// Read a singular field as a host value.
pub struct GetSingularField<'a> {
    pub message: &'a MessageRef,
}

impl KindHandler for GetSingularField<'_> {
    type Output = HostValue;

    fn handle<K: ElementType>(self, field: &Arc<FieldDescriptor>) -> Result<HostValue, FieldError> {
        FieldAccessor::<K>::new(self.message, field)?.get_host(SINGULAR)
    }
}

/// Convert a host value and write it to a singular field.
pub struct SetSingularField<'a> {
    pub message: &'a MessageRef,
    pub value: &'a HostValue,
}

impl KindHandler for SetSingularField<'_> {
    type Output = ();

    fn handle<K: ElementType>(self, field: &Arc<FieldDescriptor>) -> Result<(), FieldError> {
        FieldAccessor::<K>::new(self.message, field)?.set_host(SINGULAR, self.value)
    }
}

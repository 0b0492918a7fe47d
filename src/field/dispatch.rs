use super::accessor::*;
use crate::descriptor::FieldDescriptor;
use crate::error::FieldError;
use crate::types::ElementKind;
use std::sync::Arc;

/// An operation generic over the element kind of one field.
///
/// Every instantiation returns the same `Output`, so callers of [`dispatch`]
/// see one result type whatever kind the field turns out to be.
pub trait KindHandler {
    type Output;

    fn handle<K: ElementType>(self, field: &Arc<FieldDescriptor>) -> Result<Self::Output, FieldError>;
}

/// Run `handler` instantiated for `field`'s element kind.
///
/// Fails with [`FieldError::UnknownKind`] when the declared type has no
/// element kind.
pub fn dispatch<H: KindHandler>(field: &Arc<FieldDescriptor>, handler: H) -> Result<H::Output, FieldError> {
    match field.kind()? {
        ElementKind::Int32 => handler.handle::<Int32Kind>(field),
        ElementKind::Int64 => handler.handle::<Int64Kind>(field),
        ElementKind::UInt32 => handler.handle::<UInt32Kind>(field),
        ElementKind::UInt64 => handler.handle::<UInt64Kind>(field),
        ElementKind::Float => handler.handle::<FloatKind>(field),
        ElementKind::Double => handler.handle::<DoubleKind>(field),
        ElementKind::Bool => handler.handle::<BoolKind>(field),
        ElementKind::String => handler.handle::<StringKind>(field),
        ElementKind::Message => handler.handle::<MessageKind>(field),
        ElementKind::Enum => handler.handle::<EnumKind>(field),
    }
}

pub mod attr;
pub mod bridge;
pub mod convert;
pub mod descriptor;
pub mod deserialization;
pub mod error;
pub mod field;
pub mod host_value;
pub mod message;
pub mod reflection;
pub mod serialization;
pub mod types;

#[cfg(test)]
mod test_schema;

pub use attr::{MapHandle, RepeatedHandle};
pub use bridge::{AnyMessage, ForeignMessage, RuntimeMessage};
pub use descriptor::{DescriptorPool, EnumDescriptor, FieldDescriptor, FieldSpec, MessageDescriptor};
pub use error::FieldError;
pub use field::{FieldAccessor, KindHandler, MapField, RepeatedField, dispatch};
pub use host_value::{HostNumber, HostSlice, HostValue};
pub use message::MessageRef;
pub use types::{BridgeConfig, ElementKind};

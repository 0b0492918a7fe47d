use crate::error::FieldError;
use rustc_hash::FxHasher;
use smol_str::SmolStr;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;

pub type FastMap<K, V> = HashMap<K, V, BuildHasherDefault<FxHasher>>;

// ─── Declared Type Tags ─────────────────────────────────────────────────────
//
// Same numbering as the schema language. Several declared types share one
// element kind (sint32/sfixed32/int32 all read and write as i32).
pub const TYPE_DOUBLE: u8 = 1;
pub const TYPE_FLOAT: u8 = 2;
pub const TYPE_INT64: u8 = 3;
pub const TYPE_UINT64: u8 = 4;
pub const TYPE_INT32: u8 = 5;
pub const TYPE_FIXED64: u8 = 6;
pub const TYPE_FIXED32: u8 = 7;
pub const TYPE_BOOL: u8 = 8;
pub const TYPE_STRING: u8 = 9;
pub const TYPE_GROUP: u8 = 10; // Not supported
pub const TYPE_MESSAGE: u8 = 11;
pub const TYPE_BYTES: u8 = 12;
pub const TYPE_UINT32: u8 = 13;
pub const TYPE_ENUM: u8 = 14;
pub const TYPE_SFIXED32: u8 = 15;
pub const TYPE_SFIXED64: u8 = 16;
pub const TYPE_SINT32: u8 = 17;
pub const TYPE_SINT64: u8 = 18;

// ─── ElementKind ────────────────────────────────────────────────────────────

/// The in-memory category of a field's elements. Closed set: every accessor,
/// adapter and handler is selected by one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Int32,
    Int64,
    UInt32,
    UInt64,
    Float,
    Double,
    Bool,
    String,
    Message,
    Enum,
}

impl ElementKind {
    /// Map a declared type tag to its element kind.
    pub fn from_type_tag(tag: u8) -> Result<Self, FieldError> {
        Ok(match tag {
            TYPE_INT32 | TYPE_SINT32 | TYPE_SFIXED32 => ElementKind::Int32,
            TYPE_INT64 | TYPE_SINT64 | TYPE_SFIXED64 => ElementKind::Int64,
            TYPE_UINT32 | TYPE_FIXED32 => ElementKind::UInt32,
            TYPE_UINT64 | TYPE_FIXED64 => ElementKind::UInt64,
            TYPE_FLOAT => ElementKind::Float,
            TYPE_DOUBLE => ElementKind::Double,
            TYPE_BOOL => ElementKind::Bool,
            TYPE_STRING | TYPE_BYTES => ElementKind::String,
            TYPE_MESSAGE => ElementKind::Message,
            TYPE_ENUM => ElementKind::Enum,
            other => return Err(FieldError::UnknownKind(other)),
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementKind::Int32 => "int32",
            ElementKind::Int64 => "int64",
            ElementKind::UInt32 => "uint32",
            ElementKind::UInt64 => "uint64",
            ElementKind::Float => "float",
            ElementKind::Double => "double",
            ElementKind::Bool => "bool",
            ElementKind::String => "string",
            ElementKind::Message => "message",
            ElementKind::Enum => "enum",
        }
    }

    /// Kinds allowed as map keys. Bytes is excluded separately by declared type.
    pub fn is_valid_map_key(self) -> bool {
        !matches!(
            self,
            ElementKind::Float | ElementKind::Double | ElementKind::Message | ElementKind::Enum
        )
    }
}

// ─── Configuration ──────────────────────────────────────────────────────────

/// Configuration for the cross-representation bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Prefix of `AnyMessage::type_url`, without the trailing '/'.
    ///
    /// Default: `type.googleapis.com`.
    pub type_url_prefix: SmolStr,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            type_url_prefix: SmolStr::new_static("type.googleapis.com"),
        }
    }
}

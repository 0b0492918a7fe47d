use crate::attr::{MapHandle, RepeatedHandle};
use crate::bridge::RuntimeMessage;
use crate::error::FieldError;
use crate::message::MessageRef;
use serde::ser::{Error as _, Serialize, SerializeMap, SerializeSeq, Serializer};
use smol_str::SmolStr;
use std::fmt;
use std::rc::Rc;

// ─── HostNumber ─────────────────────────────────────────────────────────────

/// Numbers as the embedding runtime sees them: one integer type (signed or
/// beyond i64 range) and one float type.
#[derive(Clone, Copy, PartialEq)]
pub enum HostNumber {
    I64(i64),
    U64(u64),
    F64(f64),
}

impl fmt::Debug for HostNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostNumber::I64(i) => write!(f, "I64({})", i),
            HostNumber::U64(u) => write!(f, "U64({})", u),
            HostNumber::F64(v) => write!(f, "F64({})", v),
        }
    }
}

impl HostNumber {
    pub fn as_f64(self) -> f64 {
        match self {
            HostNumber::I64(i) => i as f64,
            HostNumber::U64(u) => u as f64,
            HostNumber::F64(f) => f,
        }
    }

    /// Integral value as i128; `None` for floats.
    pub fn as_integer(self) -> Option<i128> {
        match self {
            HostNumber::I64(i) => Some(i as i128),
            HostNumber::U64(u) => Some(u as i128),
            HostNumber::F64(_) => None,
        }
    }
}

// ─── HostSlice ──────────────────────────────────────────────────────────────

/// A slice-shaped subscript (`start:stop:step`).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HostSlice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

// ─── HostMessage ────────────────────────────────────────────────────────────

/// A native-owned message handed to the host.
///
/// `owner` is the message the handle was read from, held only so that the
/// owner lives at least as long as this handle.
#[derive(Clone)]
pub struct HostMessage {
    message: MessageRef,
    owner: Option<MessageRef>,
}

impl HostMessage {
    /// A top-level message; nothing else to keep alive.
    pub fn new(message: MessageRef) -> Self {
        Self { message, owner: None }
    }

    pub fn with_owner(message: MessageRef, owner: MessageRef) -> Self {
        Self {
            message,
            owner: Some(owner),
        }
    }

    pub fn message(&self) -> &MessageRef {
        &self.message
    }

    pub fn owner(&self) -> Option<&MessageRef> {
        self.owner.as_ref()
    }
}

impl PartialEq for HostMessage {
    fn eq(&self, other: &Self) -> bool {
        self.message.ptr_eq(&other.message)
    }
}

impl fmt::Debug for HostMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.message.fmt(f)
    }
}

// ─── ForeignHandle ──────────────────────────────────────────────────────────

/// A runtime-owned message.
#[derive(Clone)]
pub struct ForeignHandle(pub Rc<dyn RuntimeMessage>);

impl PartialEq for ForeignHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ForeignHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Foreign({})", self.0.full_name())
    }
}

// ─── HostValue ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    None,
    Bool(bool),
    Number(HostNumber),
    Str(SmolStr),
    Bytes(Vec<u8>),
    List(Vec<HostValue>),
    Slice(HostSlice),
    Message(HostMessage),
    Foreign(ForeignHandle),
    Repeated(RepeatedHandle),
    Map(MapHandle),
}

impl Default for HostValue {
    fn default() -> Self {
        HostValue::None
    }
}

impl HostValue {
    /// Runtime type name, used in conversion errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::None => "None",
            HostValue::Bool(_) => "bool",
            HostValue::Number(HostNumber::F64(_)) => "float",
            HostValue::Number(_) => "int",
            HostValue::Str(_) => "str",
            HostValue::Bytes(_) => "bytes",
            HostValue::List(_) => "list",
            HostValue::Slice(_) => "slice",
            HostValue::Message(_) => "message",
            HostValue::Foreign(_) => "foreign message",
            HostValue::Repeated(_) => "repeated field",
            HostValue::Map(_) => "map field",
        }
    }

    pub fn foreign(message: impl RuntimeMessage + 'static) -> Self {
        HostValue::Foreign(ForeignHandle(Rc::new(message)))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            HostValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Number(n) => Some(n.as_f64()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HostValue::Number(n) => n.as_integer().and_then(|i| i64::try_from(i).ok()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Elements of a sequence value. Strings and bytes are not sequences here.
    pub fn as_sequence(&self) -> Option<&[HostValue]> {
        match self {
            HostValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&MessageRef> {
        match self {
            HostValue::Message(m) => Some(m.message()),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, HostValue::None)
    }
}

// ─── Serialize (host values rendered as JSON and the like) ─────────────────

impl Serialize for HostValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            HostValue::None | HostValue::Slice(_) => serializer.serialize_none(),
            HostValue::Bool(b) => serializer.serialize_bool(*b),
            HostValue::Number(n) => match n {
                HostNumber::I64(i) => serializer.serialize_i64(*i),
                HostNumber::U64(u) => serializer.serialize_u64(*u),
                HostNumber::F64(f) => serializer.serialize_f64(*f),
            },
            HostValue::Str(s) => serializer.serialize_str(s.as_str()),
            HostValue::Bytes(b) => serializer.serialize_bytes(b),
            HostValue::List(arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for v in arr {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            HostValue::Message(m) => serializer.serialize_str(&m.message().short_debug_string()),
            HostValue::Foreign(f) => serializer.serialize_str(f.0.full_name()),
            HostValue::Repeated(r) => {
                let items = r.to_vec().map_err(S::Error::custom)?;
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for v in &items {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            HostValue::Map(m) => {
                let items = m.items().map_err(S::Error::custom)?;
                let mut map = serializer.serialize_map(Some(items.len()))?;
                for (k, v) in &items {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

// ─── From impls ─────────────────────────────────────────────────────────────

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        HostValue::Number(HostNumber::F64(n))
    }
}

impl From<f32> for HostValue {
    fn from(n: f32) -> Self {
        HostValue::Number(HostNumber::F64(n as f64))
    }
}

impl From<i64> for HostValue {
    fn from(n: i64) -> Self {
        HostValue::Number(HostNumber::I64(n))
    }
}

impl From<i32> for HostValue {
    fn from(n: i32) -> Self {
        HostValue::Number(HostNumber::I64(n as i64))
    }
}

impl From<u32> for HostValue {
    fn from(n: u32) -> Self {
        HostValue::Number(HostNumber::I64(n as i64))
    }
}

impl From<u64> for HostValue {
    fn from(n: u64) -> Self {
        match i64::try_from(n) {
            Ok(i) => HostValue::Number(HostNumber::I64(i)),
            Err(_) => HostValue::Number(HostNumber::U64(n)),
        }
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::Str(SmolStr::from(s))
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::Str(SmolStr::from(s))
    }
}

impl From<&[u8]> for HostValue {
    fn from(b: &[u8]) -> Self {
        HostValue::Bytes(b.to_vec())
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(items: Vec<HostValue>) -> Self {
        HostValue::List(items)
    }
}

impl From<MessageRef> for HostValue {
    fn from(message: MessageRef) -> Self {
        HostValue::Message(HostMessage::new(message))
    }
}

impl From<HostSlice> for HostValue {
    fn from(slice: HostSlice) -> Self {
        HostValue::Slice(slice)
    }
}

// ─── From serde_json::Value ─────────────────────────────────────────────────

/// JSON objects have no host value shape and are rejected.
impl TryFrom<serde_json::Value> for HostValue {
    type Error = FieldError;

    fn try_from(v: serde_json::Value) -> Result<Self, FieldError> {
        Ok(match v {
            serde_json::Value::Null => HostValue::None,
            serde_json::Value::Bool(b) => HostValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    HostValue::Number(HostNumber::I64(i))
                } else if let Some(u) = n.as_u64() {
                    HostValue::Number(HostNumber::U64(u))
                } else {
                    HostValue::Number(HostNumber::F64(n.as_f64().unwrap_or(0.0)))
                }
            }
            serde_json::Value::String(s) => HostValue::Str(SmolStr::from(s)),
            serde_json::Value::Array(arr) => HostValue::List(
                arr.into_iter()
                    .map(HostValue::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(_) => {
                return Err(FieldError::Conversion {
                    expected: "host value",
                    actual: "object",
                });
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        let v = HostValue::try_from(json!([1, "a", true, null, 1.5, 18446744073709551615u64])).unwrap();
        assert_eq!(
            v,
            HostValue::List(vec![
                HostValue::from(1i64),
                HostValue::from("a"),
                HostValue::Bool(true),
                HostValue::None,
                HostValue::from(1.5f64),
                HostValue::Number(HostNumber::U64(u64::MAX)),
            ])
        );
    }

    #[test]
    fn test_from_json_rejects_objects() {
        let expected = FieldError::Conversion {
            expected: "host value",
            actual: "object",
        };
        assert_eq!(HostValue::try_from(json!({"a": 1})), Err(expected.clone()));
        assert_eq!(HostValue::try_from(json!([1, {"nested": true}])), Err(expected));
    }

    #[test]
    fn test_to_json() {
        let v = HostValue::List(vec![HostValue::from(1i64), HostValue::from("x"), HostValue::None]);
        assert_eq!(serde_json::to_value(&v).unwrap(), json!([1, "x", null]));
    }

    #[test]
    fn test_integer_views() {
        assert_eq!(HostValue::from(7i64).as_i64(), Some(7));
        assert_eq!(HostValue::from(7.0f64).as_i64(), None);
        assert_eq!(HostValue::Number(HostNumber::U64(u64::MAX)).as_i64(), None);
        assert_eq!(HostNumber::U64(u64::MAX).as_integer(), Some(u64::MAX as i128));
        assert_eq!(HostValue::from(u64::MAX), HostValue::Number(HostNumber::U64(u64::MAX)));
        assert_eq!(HostValue::from(5u64), HostValue::Number(HostNumber::I64(5)));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(HostValue::from(1i64).type_name(), "int");
        assert_eq!(HostValue::from(1.0f64).type_name(), "float");
        assert_eq!(HostValue::from("s").type_name(), "str");
        assert_eq!(HostValue::Slice(HostSlice::default()).type_name(), "slice");
    }
}

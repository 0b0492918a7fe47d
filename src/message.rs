use crate::descriptor::{FieldDescriptor, MessageDescriptor};
use crate::error::FieldError;
use crate::types::ElementKind;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

// ─── NativeValue ────────────────────────────────────────────────────────────

/// One stored element. Nested messages are shared handles so that a handle
/// given out to the host aliases the stored sub-message.
#[derive(Debug, Clone)]
pub enum NativeValue {
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Bool(bool),
    /// Text or bytes; text fields only ever hold valid UTF-8.
    String(Vec<u8>),
    Message(MessageRef),
    Enum(i32),
}

impl NativeValue {
    pub fn kind(&self) -> ElementKind {
        match self {
            NativeValue::Int32(_) => ElementKind::Int32,
            NativeValue::Int64(_) => ElementKind::Int64,
            NativeValue::UInt32(_) => ElementKind::UInt32,
            NativeValue::UInt64(_) => ElementKind::UInt64,
            NativeValue::Float(_) => ElementKind::Float,
            NativeValue::Double(_) => ElementKind::Double,
            NativeValue::Bool(_) => ElementKind::Bool,
            NativeValue::String(_) => ElementKind::String,
            NativeValue::Message(_) => ElementKind::Message,
            NativeValue::Enum(_) => ElementKind::Enum,
        }
    }

    /// Schema default for one element of `field`.
    pub fn default_for(field: &FieldDescriptor) -> Result<Self, FieldError> {
        Ok(match field.kind()? {
            ElementKind::Int32 => NativeValue::Int32(0),
            ElementKind::Int64 => NativeValue::Int64(0),
            ElementKind::UInt32 => NativeValue::UInt32(0),
            ElementKind::UInt64 => NativeValue::UInt64(0),
            ElementKind::Float => NativeValue::Float(0.0),
            ElementKind::Double => NativeValue::Double(0.0),
            ElementKind::Bool => NativeValue::Bool(false),
            ElementKind::String => NativeValue::String(Vec::new()),
            ElementKind::Message => {
                let nested = field
                    .message_type()
                    .ok_or_else(|| FieldError::InvalidSchema(format!("{} has no message type", field.name())))?;
                NativeValue::Message(MessageRef::new(nested))
            }
            ElementKind::Enum => NativeValue::Enum(field.enum_type().map_or(0, |e| e.default_number())),
        })
    }

    /// Copy with fresh storage for every nested message.
    fn deep_copy(&self) -> Self {
        match self {
            NativeValue::Message(m) => NativeValue::Message(m.deep_copy()),
            other => other.clone(),
        }
    }
}

// ─── FieldSlot ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub(crate) enum FieldSlot {
    /// `None` reads as the schema default.
    Singular(Option<NativeValue>),
    Repeated(Vec<NativeValue>),
}

// ─── DynamicMessage ─────────────────────────────────────────────────────────

/// A native-owned message: descriptor plus one storage slot per field.
#[derive(Debug)]
pub struct DynamicMessage {
    descriptor: Arc<MessageDescriptor>,
    pub(crate) slots: Vec<FieldSlot>,
}

impl DynamicMessage {
    fn new(descriptor: &Arc<MessageDescriptor>) -> Self {
        let slots = descriptor
            .fields()
            .iter()
            .map(|f| {
                if f.is_repeated() {
                    FieldSlot::Repeated(Vec::new())
                } else {
                    FieldSlot::Singular(None)
                }
            })
            .collect();
        Self {
            descriptor: Arc::clone(descriptor),
            slots,
        }
    }

    pub fn descriptor(&self) -> &Arc<MessageDescriptor> {
        &self.descriptor
    }

    fn deep_copy(&self) -> Self {
        let slots = self
            .slots
            .iter()
            .map(|slot| match slot {
                FieldSlot::Singular(v) => FieldSlot::Singular(v.as_ref().map(NativeValue::deep_copy)),
                FieldSlot::Repeated(vs) => FieldSlot::Repeated(vs.iter().map(NativeValue::deep_copy).collect()),
            })
            .collect();
        Self {
            descriptor: Arc::clone(&self.descriptor),
            slots,
        }
    }

    fn clear(&mut self) {
        for slot in &mut self.slots {
            match slot {
                FieldSlot::Singular(v) => *v = None,
                FieldSlot::Repeated(vs) => vs.clear(),
            }
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // Text rendering
    // ════════════════════════════════════════════════════════════════════════

    fn write_short_debug(&self, out: &mut String) {
        let mut first = true;
        for (field, slot) in self.descriptor.fields().iter().zip(&self.slots) {
            let values: &[NativeValue] = match slot {
                FieldSlot::Singular(Some(v)) => std::slice::from_ref(v),
                FieldSlot::Singular(None) => &[],
                FieldSlot::Repeated(vs) => vs,
            };
            for value in values {
                if !first {
                    out.push(' ');
                }
                first = false;
                out.push_str(field.name());
                match value {
                    NativeValue::Message(m) => {
                        out.push_str(" { ");
                        let nested = m.borrow();
                        let before = out.len();
                        nested.write_short_debug(out);
                        if out.len() > before {
                            out.push(' ');
                        }
                        out.push('}');
                    }
                    scalar => {
                        out.push_str(": ");
                        write_scalar_text(field, scalar, out);
                    }
                }
            }
        }
    }
}

fn write_scalar_text(field: &FieldDescriptor, value: &NativeValue, out: &mut String) {
    match value {
        NativeValue::Int32(v) => out.push_str(&v.to_string()),
        NativeValue::Int64(v) => out.push_str(&v.to_string()),
        NativeValue::UInt32(v) => out.push_str(&v.to_string()),
        NativeValue::UInt64(v) => out.push_str(&v.to_string()),
        NativeValue::Float(v) => out.push_str(&v.to_string()),
        NativeValue::Double(v) => out.push_str(&v.to_string()),
        NativeValue::Bool(v) => out.push_str(if *v { "true" } else { "false" }),
        NativeValue::String(bytes) => {
            out.push('"');
            escape_into(bytes, field.is_bytes(), out);
            out.push('"');
        }
        NativeValue::Enum(n) => out.push_str(&enum_value_name(field, *n)),
        NativeValue::Message(_) => {}
    }
}

/// C-style escaping. Text keeps non-ASCII characters as-is; bytes use octal.
fn escape_into(bytes: &[u8], raw: bool, out: &mut String) {
    let text = if raw { None } else { std::str::from_utf8(bytes).ok() };
    if let Some(text) = text {
        for c in text.chars() {
            match c {
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                '"' => out.push_str("\\\""),
                '\'' => out.push_str("\\'"),
                '\\' => out.push_str("\\\\"),
                c if (c as u32) < 0x20 || c as u32 == 0x7f => out.push_str(&format!("\\{:03o}", c as u32)),
                c => out.push(c),
            }
        }
        return;
    }
    for &b in bytes {
        match b {
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b'"' => out.push_str("\\\""),
            b'\'' => out.push_str("\\'"),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\{b:03o}")),
        }
    }
}

/// Declared name of an enum number, or a synthesized name for unknown numbers.
pub(crate) fn enum_value_name(field: &FieldDescriptor, number: i32) -> String {
    match field.enum_type() {
        Some(e) => match e.find_value_by_number(number) {
            Some(v) => v.name.to_string(),
            None => format!("UNKNOWN_ENUM_VALUE_{}_{}", e.name(), number),
        },
        None => number.to_string(),
    }
}

// ─── MessageRef ─────────────────────────────────────────────────────────────

/// Shared handle to a native-owned message.
///
/// Cloning the handle aliases the same message. Handles are `!Send`: a
/// message and everything reachable from it belong to one thread.
#[derive(Clone)]
pub struct MessageRef(Rc<RefCell<DynamicMessage>>);

impl MessageRef {
    /// Allocate an empty message of the given type.
    pub fn new(descriptor: &Arc<MessageDescriptor>) -> Self {
        MessageRef(Rc::new(RefCell::new(DynamicMessage::new(descriptor))))
    }

    pub fn descriptor(&self) -> Arc<MessageDescriptor> {
        Arc::clone(self.0.borrow().descriptor())
    }

    pub fn full_name(&self) -> smol_str::SmolStr {
        smol_str::SmolStr::new(self.0.borrow().descriptor().full_name())
    }

    /// Whether both handles refer to the same message.
    pub fn ptr_eq(&self, other: &MessageRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn borrow(&self) -> Ref<'_, DynamicMessage> {
        self.0.borrow()
    }

    pub(crate) fn borrow_mut(&self) -> RefMut<'_, DynamicMessage> {
        self.0.borrow_mut()
    }

    /// A new message with the same contents and no shared sub-messages.
    pub fn deep_copy(&self) -> MessageRef {
        let copy = self.0.borrow().deep_copy();
        MessageRef(Rc::new(RefCell::new(copy)))
    }

    /// Replace this message's contents with a copy of `source`.
    ///
    /// Handles to sub-messages previously taken from `self` keep pointing at
    /// the old storage.
    pub fn copy_from(&self, source: &MessageRef) -> Result<(), FieldError> {
        let (expected, actual) = (self.full_name(), source.full_name());
        if expected != actual {
            return Err(FieldError::MessageTypeMismatch { expected, actual });
        }
        if self.ptr_eq(source) {
            return Ok(());
        }
        let copy = source.0.borrow().deep_copy();
        *self.0.borrow_mut() = copy;
        Ok(())
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    /// Single-line text rendering, e.g. `value: 6 int_message { value: 1 }`.
    pub fn short_debug_string(&self) -> String {
        let mut out = String::new();
        self.0.borrow().write_short_debug(&mut out);
        out
    }

    /// Number of live handles to this message.
    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

/// Identity comparison, not content comparison.
impl PartialEq for MessageRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(m) => write!(f, "{} {{ {} }}", m.descriptor().full_name(), {
                let mut out = String::new();
                m.write_short_debug(&mut out);
                out
            }),
            Err(_) => write!(f, "<borrowed message>"),
        }
    }
}

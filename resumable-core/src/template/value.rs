//! Values interpolated into templates.

use std::fmt;

use serde_json::Value as JsonValue;

use crate::dom::EventHandler;

/// Identity of a template call site: the address and length of its static
/// string table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateKey {
    addr: usize,
    len: usize,
}

/// The output of a view: a static string table plus one value per hole.
///
/// Usually built with the [`html!`](crate::html) macro, which gives every
/// call site its own string table.
#[derive(Clone)]
pub struct TemplateResult {
    strings: &'static [&'static str],
    values: Vec<Value>,
}

impl TemplateResult {
    pub fn new(strings: &'static [&'static str], values: Vec<Value>) -> Self {
        Self { strings, values }
    }

    pub fn strings(&self) -> &'static [&'static str] {
        self.strings
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn key(&self) -> TemplateKey {
        TemplateKey {
            addr: self.strings.as_ptr() as usize,
            len: self.strings.len(),
        }
    }
}

impl PartialEq for TemplateResult {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key() && self.values == other.values
    }
}

impl fmt::Debug for TemplateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateResult")
            .field("strings", &self.strings)
            .field("values", &self.values)
            .finish()
    }
}

/// Identity of an item in a keyed list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(n) => write!(f, "{n}"),
            Key::Str(s) => f.write_str(s),
        }
    }
}

macro_rules! key_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Key {
            fn from(n: $t) -> Self {
                Key::Int(i64::from(n))
            }
        })*
    };
}

key_from_int!(i32, i64, u32);

// Out of `i64` range, the decimal form keeps distinct numbers distinct.
macro_rules! key_from_wide_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Key {
            fn from(n: $t) -> Self {
                match i64::try_from(n) {
                    Ok(n) => Key::Int(n),
                    Err(_) => Key::Str(n.to_string()),
                }
            }
        })*
    };
}

key_from_wide_int!(u64, usize);

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

/// A value bound to one hole of a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A nested template in a child position.
    Template(TemplateResult),
    /// Templates rendered in order, matched to existing nodes by position.
    List(Vec<TemplateResult>),
    /// Templates matched to existing nodes by key. See [`repeat`].
    Keyed(Vec<(Key, TemplateResult)>),
    /// A listener for an event binding.
    Handler(EventHandler),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, booleans, numbers and strings.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_)
        )
    }

    /// Whether the value counts as "on" for a boolean property.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// The string a text or attribute position shows for this value.
    /// Null shows as the empty string.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
            Value::Template(_) | Value::List(_) | Value::Keyed(_) => String::new(),
            Value::Handler(_) => String::new(),
        }
    }

    /// Short name of the variant, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Template(_) => "template",
            Value::List(_) => "list",
            Value::Keyed(_) => "keyed list",
            Value::Handler(_) => "handler",
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Int(i64::from(n))
            }
        })*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! value_from_wide_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                match i64::try_from(n) {
                    Ok(n) => Value::Int(n),
                    Err(_) => Value::Float(n as f64),
                }
            }
        })*
    };
}

value_from_wide_int!(u64, usize);

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f64::from(f))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Str(c.to_string())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Str(s.clone())
    }
}

impl From<TemplateResult> for Value {
    fn from(t: TemplateResult) -> Self {
        Value::Template(t)
    }
}

impl From<Vec<TemplateResult>> for Value {
    fn from(items: Vec<TemplateResult>) -> Self {
        Value::List(items)
    }
}

impl From<EventHandler> for Value {
    fn from(h: EventHandler) -> Self {
        Value::Handler(h)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<&JsonValue> for Value {
    fn from(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Value::Str(s.clone()),
            other => Value::Str(other.to_string()),
        }
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::String(s) => Value::Str(s),
            other => Value::from(&other),
        }
    }
}

/// Render a collection as a keyed list.
///
/// `key` gives each item its identity and `render` its template. Keys must
/// be unique; if one repeats, the later item takes over the key's nodes.
pub fn repeat<T, K, FK, FR>(items: impl IntoIterator<Item = T>, mut key: FK, mut render: FR) -> Value
where
    K: Into<Key>,
    FK: FnMut(&T) -> K,
    FR: FnMut(T) -> TemplateResult,
{
    Value::Keyed(
        items
            .into_iter()
            .map(|item| {
                let k = key(&item).into();
                (k, render(item))
            })
            .collect(),
    )
}

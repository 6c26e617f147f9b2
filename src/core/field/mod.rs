// ironbee_rust/src/core/field/mod.rs
use crate::core::exception::{CoreError, CoreResult};
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Shared handle to a field. List fields alias their children; the same
/// handle may appear in a store slot, a capture slot, and a filter result
/// at once.
pub type FieldRef = Arc<Mutex<Field>>;

/// A list value computed on demand from a sub-key.
///
/// Dynamic fields participate only in the list type; the stored and
/// computed branches are disjoint.
pub trait DynamicList: Send + Sync {
    fn get(&self, subkey: &[u8]) -> CoreResult<Vec<FieldRef>>;
}

pub enum FieldValue {
    Num(i64),
    Float(f64),
    Time(DateTime<Utc>),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<FieldRef>),
    Dynamic(Arc<dyn DynamicList>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Num,
    Float,
    Time,
    Str,
    Bytes,
    List,
}

/// A dynamically typed value cell.
///
/// The name is a raw byte slice, not NUL-terminated. A field's name is
/// rewritten only when a source or target installs it under a canonical
/// name; consumers may rely on the name after a set.
pub struct Field {
    name: Vec<u8>,
    pub value: FieldValue,
}

impl Field {
    pub fn new(name: impl Into<Vec<u8>>, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn num(name: impl Into<Vec<u8>>, v: i64) -> Self {
        Self::new(name, FieldValue::Num(v))
    }

    pub fn float(name: impl Into<Vec<u8>>, v: f64) -> Self {
        Self::new(name, FieldValue::Float(v))
    }

    pub fn time(name: impl Into<Vec<u8>>, v: DateTime<Utc>) -> Self {
        Self::new(name, FieldValue::Time(v))
    }

    pub fn nulstr(name: impl Into<Vec<u8>>, v: impl Into<String>) -> Self {
        Self::new(name, FieldValue::Str(v.into()))
    }

    pub fn bytes(name: impl Into<Vec<u8>>, v: impl Into<Vec<u8>>) -> Self {
        Self::new(name, FieldValue::Bytes(v.into()))
    }

    pub fn list(name: impl Into<Vec<u8>>, children: Vec<FieldRef>) -> Self {
        Self::new(name, FieldValue::List(children))
    }

    pub fn dynamic(name: impl Into<Vec<u8>>, getter: Arc<dyn DynamicList>) -> Self {
        Self::new(name, FieldValue::Dynamic(getter))
    }

    /// Typed default used when a slot is materialized for a first append.
    pub fn default_of(name: impl Into<Vec<u8>>, ftype: FieldType) -> Self {
        let value = match ftype {
            FieldType::Num => FieldValue::Num(0),
            FieldType::Float => FieldValue::Float(0.0),
            FieldType::Time => FieldValue::Time(Utc.timestamp_opt(0, 0).single().unwrap_or_default()),
            FieldType::Str => FieldValue::Str(String::new()),
            FieldType::Bytes => FieldValue::Bytes(Vec::new()),
            FieldType::List => FieldValue::List(Vec::new()),
        };
        Self::new(name, value)
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn rename(&mut self, name: impl Into<Vec<u8>>) {
        self.name = name.into();
    }

    pub fn ftype(&self) -> FieldType {
        match &self.value {
            FieldValue::Num(_) => FieldType::Num,
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::Time(_) => FieldType::Time,
            FieldValue::Str(_) => FieldType::Str,
            FieldValue::Bytes(_) => FieldType::Bytes,
            FieldValue::List(_) | FieldValue::Dynamic(_) => FieldType::List,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.value, FieldValue::Dynamic(_))
    }

    pub fn as_list(&self) -> Option<&Vec<FieldRef>> {
        match &self.value {
            FieldValue::List(children) => Some(children),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<FieldRef>> {
        match &mut self.value {
            FieldValue::List(children) => Some(children),
            _ => None,
        }
    }

    /// Raw value bytes of a string-like field.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.value {
            FieldValue::Bytes(b) => Some(b),
            FieldValue::Str(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<i64> {
        match &self.value {
            FieldValue::Num(v) => Some(*v),
            _ => None,
        }
    }

    pub fn into_ref(self) -> FieldRef {
        Arc::new(Mutex::new(self))
    }

    /// List children, failing on non-list and on dynamic fields.
    pub fn list_children(&self) -> CoreResult<&Vec<FieldRef>> {
        match &self.value {
            FieldValue::List(children) => Ok(children),
            FieldValue::Dynamic(_) => Err(CoreError::InvalidArgument(
                "dynamic field has no enumerable children".to_string(),
            )),
            _ => Err(CoreError::Incompatible(format!(
                "field '{}' is not a list",
                String::from_utf8_lossy(&self.name)
            ))),
        }
    }
}

// Manual Debug: the dynamic getter is opaque.
impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Num(v) => write!(f, "Num({v:?})"),
            FieldValue::Float(v) => write!(f, "Float({v:?})"),
            FieldValue::Time(v) => write!(f, "Time({v:?})"),
            FieldValue::Str(v) => write!(f, "Str({v:?})"),
            FieldValue::Bytes(v) => write!(f, "Bytes({:?})", String::from_utf8_lossy(v)),
            FieldValue::List(v) => write!(f, "List(len={})", v.len()),
            FieldValue::Dynamic(_) => write!(f, "Dynamic(<opaque>)"),
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &String::from_utf8_lossy(&self.name))
            .field("value", &self.value)
            .finish()
    }
}

// Manual PartialEq: dynamic getters are never equal; lists compare their
// children by value.
impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Num(a), FieldValue::Num(b)) => a == b,
            (FieldValue::Float(a), FieldValue::Float(b)) => a == b,
            (FieldValue::Time(a), FieldValue::Time(b)) => a == b,
            (FieldValue::Str(a), FieldValue::Str(b)) => a == b,
            (FieldValue::Bytes(a), FieldValue::Bytes(b)) => a == b,
            (FieldValue::List(a), FieldValue::List(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| {
                        *x.lock().expect("Mutex poisoned") == *y.lock().expect("Mutex poisoned")
                    })
            }
            (FieldValue::Dynamic(_), FieldValue::Dynamic(_)) => false,
            _ => false,
        }
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value
    }
}

// Clone is shallow for lists and dynamic getters: children and getters are
// shared handles, matching store aliasing semantics.
impl Clone for FieldValue {
    fn clone(&self) -> Self {
        match self {
            FieldValue::Num(v) => FieldValue::Num(*v),
            FieldValue::Float(v) => FieldValue::Float(*v),
            FieldValue::Time(v) => FieldValue::Time(*v),
            FieldValue::Str(v) => FieldValue::Str(v.clone()),
            FieldValue::Bytes(v) => FieldValue::Bytes(v.clone()),
            FieldValue::List(v) => FieldValue::List(v.clone()),
            FieldValue::Dynamic(v) => FieldValue::Dynamic(Arc::clone(v)),
        }
    }
}

impl Clone for Field {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            value: self.value.clone(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldType::Num => "NUM",
            FieldType::Float => "FLOAT",
            FieldType::Time => "TIME",
            FieldType::Str => "NULSTR",
            FieldType::Bytes => "BYTESTR",
            FieldType::List => "LIST",
        };
        f.write_str(s)
    }
}

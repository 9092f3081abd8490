//! Generic parameter values.
//!
//! [`Value`] is the uniform currency of the parameter layer: every registered
//! getter produces one and every setter consumes one. Cloning a value deep
//! copies its variable-length payloads (strings, frames, lists); entity
//! references stay references.

use std::{cmp::Ordering, fmt, rc::Rc};

use crate::{Frame, Guid, Numeric, Timespec, instance::EntityRef, instance::entity_guid};

pub mod errors;

pub use errors::ValueError;

/// The kind of a [`Value`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Int32,
    Int64,
    Double,
    Numeric,
    Date,
    Guid,
    Boolean,
    Char,
    Frame,
    List,
    Entity,
    Collection,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Int32 => "gint32",
            ValueKind::Int64 => "gint64",
            ValueKind::Double => "double",
            ValueKind::Numeric => "numeric",
            ValueKind::Date => "date",
            ValueKind::Guid => "guid",
            ValueKind::Boolean => "boolean",
            ValueKind::Char => "character",
            ValueKind::Frame => "kvp",
            ValueKind::List => "list",
            ValueKind::Entity => "entity",
            ValueKind::Collection => "collection",
        };
        f.write_str(name)
    }
}

/// A tagged parameter value.
#[derive(Clone)]
pub enum Value {
    String(String),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Numeric(Numeric),
    Date(Timespec),
    Guid(Guid),
    Boolean(bool),
    Char(char),
    Frame(Frame),
    /// Homogeneous list of values
    List(Vec<Value>),
    /// Reference to a single entity, or none
    Entity(Option<EntityRef>),
    /// References to the members of an entity collection
    Collection(Vec<EntityRef>),
}

macro_rules! accessor {
    ($as_fn:ident, $variant:ident, $ty:ty) => {
        pub fn $as_fn(&self) -> Result<$ty, ValueError> {
            match self {
                Value::$variant(v) => Ok(v.clone()),
                other => Err(other.mismatch(ValueKind::$variant)),
            }
        }
    };
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::Int32(_) => ValueKind::Int32,
            Value::Int64(_) => ValueKind::Int64,
            Value::Double(_) => ValueKind::Double,
            Value::Numeric(_) => ValueKind::Numeric,
            Value::Date(_) => ValueKind::Date,
            Value::Guid(_) => ValueKind::Guid,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Char(_) => ValueKind::Char,
            Value::Frame(_) => ValueKind::Frame,
            Value::List(_) => ValueKind::List,
            Value::Entity(_) => ValueKind::Entity,
            Value::Collection(_) => ValueKind::Collection,
        }
    }

    fn mismatch(&self, expected: ValueKind) -> ValueError {
        ValueError::KindMismatch {
            expected,
            actual: self.kind(),
        }
    }

    accessor!(as_i32, Int32, i32);
    accessor!(as_i64, Int64, i64);
    accessor!(as_f64, Double, f64);
    accessor!(as_numeric, Numeric, Numeric);
    accessor!(as_date, Date, Timespec);
    accessor!(as_guid, Guid, Guid);
    accessor!(as_bool, Boolean, bool);
    accessor!(as_char, Char, char);

    pub fn as_str(&self) -> Result<&str, ValueError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(other.mismatch(ValueKind::String)),
        }
    }

    pub fn as_frame(&self) -> Result<&Frame, ValueError> {
        match self {
            Value::Frame(f) => Ok(f),
            other => Err(other.mismatch(ValueKind::Frame)),
        }
    }

    pub fn as_list(&self) -> Result<&[Value], ValueError> {
        match self {
            Value::List(l) => Ok(l),
            other => Err(other.mismatch(ValueKind::List)),
        }
    }

    pub fn as_entity(&self) -> Result<Option<&EntityRef>, ValueError> {
        match self {
            Value::Entity(e) => Ok(e.as_ref()),
            other => Err(other.mismatch(ValueKind::Entity)),
        }
    }

    pub fn as_collection(&self) -> Result<&[EntityRef], ValueError> {
        match self {
            Value::Collection(c) => Ok(c),
            other => Err(other.mismatch(ValueKind::Collection)),
        }
    }

    pub fn into_string(self) -> Result<String, ValueError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(other.mismatch(ValueKind::String)),
        }
    }

    pub fn into_frame(self) -> Result<Frame, ValueError> {
        match self {
            Value::Frame(f) => Ok(f),
            other => Err(other.mismatch(ValueKind::Frame)),
        }
    }

    pub fn into_list(self) -> Result<Vec<Value>, ValueError> {
        match self {
            Value::List(l) => Ok(l),
            other => Err(other.mismatch(ValueKind::List)),
        }
    }

    pub fn into_entity(self) -> Result<Option<EntityRef>, ValueError> {
        match self {
            Value::Entity(e) => Ok(e),
            other => Err(other.mismatch(ValueKind::Entity)),
        }
    }

    pub fn into_collection(self) -> Result<Vec<EntityRef>, ValueError> {
        match self {
            Value::Collection(c) => Ok(c),
            other => Err(other.mismatch(ValueKind::Collection)),
        }
    }

    /// Compares two values of the same kind.
    ///
    /// Numeric values compare exactly by value. Entity references compare by
    /// the identifier of the referenced entity, with "no entity" first.
    /// Mixed kinds are an error, not an ordering.
    pub fn compare(&self, other: &Value) -> Result<Ordering, ValueError> {
        let ordering = match (self, other) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Int32(a), Value::Int32(b)) => a.cmp(b),
            (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b),
            (Value::Numeric(a), Value::Numeric(b)) => a.compare(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Guid(a), Value::Guid(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Char(a), Value::Char(b)) => a.cmp(b),
            (Value::Frame(a), Value::Frame(b)) => a.compare(b),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        other => return Ok(other),
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Entity(a), Value::Entity(b)) => {
                a.as_ref().map(entity_guid).cmp(&b.as_ref().map(entity_guid))
            }
            (Value::Collection(a), Value::Collection(b)) => {
                let left: Vec<_> = a.iter().map(entity_guid).collect();
                let right: Vec<_> = b.iter().map(entity_guid).collect();
                left.cmp(&right)
            }
            _ => {
                return Err(ValueError::Incomparable {
                    left: self.kind(),
                    right: other.kind(),
                });
            }
        };
        Ok(ordering)
    }
}

impl PartialEq for Value {
    /// Structural equality. Entity references are equal only when they point
    /// at the same entity object.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Entity(a), Value::Entity(b)) => match (a, b) {
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            },
            (Value::Collection(a), Value::Collection(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| Rc::ptr_eq(x, y))
            }
            (Value::Numeric(a), Value::Numeric(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Frame(a), Value::Frame(b)) => a == b,
            _ => self.kind() == other.kind() && self.compare(other) == Ok(Ordering::Equal),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::Int32(n) => f.debug_tuple("Int32").field(n).finish(),
            Value::Int64(n) => f.debug_tuple("Int64").field(n).finish(),
            Value::Double(n) => f.debug_tuple("Double").field(n).finish(),
            Value::Numeric(n) => f.debug_tuple("Numeric").field(n).finish(),
            Value::Date(t) => f.debug_tuple("Date").field(t).finish(),
            Value::Guid(g) => f.debug_tuple("Guid").field(g).finish(),
            Value::Boolean(b) => f.debug_tuple("Boolean").field(b).finish(),
            Value::Char(c) => f.debug_tuple("Char").field(c).finish(),
            Value::Frame(fr) => f.debug_tuple("Frame").field(fr).finish(),
            Value::List(l) => f.debug_tuple("List").field(l).finish(),
            Value::Entity(e) => f
                .debug_tuple("Entity")
                .field(&e.as_ref().map(entity_guid))
                .finish(),
            Value::Collection(c) => f
                .debug_tuple("Collection")
                .field(&c.iter().map(entity_guid).collect::<Vec<_>>())
                .finish(),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Char(v)
    }
}

impl From<Numeric> for Value {
    fn from(v: Numeric) -> Self {
        Value::Numeric(v)
    }
}

impl From<Timespec> for Value {
    fn from(v: Timespec) -> Self {
        Value::Date(v)
    }
}

impl From<Guid> for Value {
    fn from(v: Guid) -> Self {
        Value::Guid(v)
    }
}

impl From<Frame> for Value {
    fn from(v: Frame) -> Self {
        Value::Frame(v)
    }
}

impl From<Option<EntityRef>> for Value {
    fn from(v: Option<EntityRef>) -> Self {
        Value::Entity(v)
    }
}

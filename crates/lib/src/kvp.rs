//! Hierarchical key/value frames.
//!
//! A [`Frame`] is an ordered map from slot names to [`KvpValue`]s, where a slot
//! may itself hold a nested frame. Slots are addressed with `/`-separated paths
//! (`"counters/gncInvoice"`). Every instance carries one frame for extension
//! data and frames can also travel as parameter values.

use std::{cmp::Ordering, collections::BTreeMap};

use serde::{Deserialize, Serialize};

use crate::{Guid, Numeric, Timespec};

/// Path separator for nested slots.
pub const PATH_SEPARATOR: char = '/';

/// A value stored in a frame slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KvpValue {
    Int64(i64),
    Double(f64),
    Numeric(Numeric),
    String(String),
    Guid(Guid),
    Timespec(Timespec),
    Frame(Frame),
    List(Vec<KvpValue>),
}

impl KvpValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            KvpValue::Int64(_) => "int64",
            KvpValue::Double(_) => "double",
            KvpValue::Numeric(_) => "numeric",
            KvpValue::String(_) => "string",
            KvpValue::Guid(_) => "guid",
            KvpValue::Timespec(_) => "timespec",
            KvpValue::Frame(_) => "frame",
            KvpValue::List(_) => "list",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            KvpValue::Int64(_) => 0,
            KvpValue::Double(_) => 1,
            KvpValue::Numeric(_) => 2,
            KvpValue::String(_) => 3,
            KvpValue::Guid(_) => 4,
            KvpValue::Timespec(_) => 5,
            KvpValue::Frame(_) => 6,
            KvpValue::List(_) => 7,
        }
    }

    /// Total order over slot values. Values of different kinds order by kind.
    pub fn compare(&self, other: &KvpValue) -> Ordering {
        match (self, other) {
            (KvpValue::Int64(a), KvpValue::Int64(b)) => a.cmp(b),
            (KvpValue::Double(a), KvpValue::Double(b)) => a.total_cmp(b),
            (KvpValue::Numeric(a), KvpValue::Numeric(b)) => a.compare(b),
            (KvpValue::String(a), KvpValue::String(b)) => a.cmp(b),
            (KvpValue::Guid(a), KvpValue::Guid(b)) => a.cmp(b),
            (KvpValue::Timespec(a), KvpValue::Timespec(b)) => a.cmp(b),
            (KvpValue::Frame(a), KvpValue::Frame(b)) => a.compare(b),
            (KvpValue::List(a), KvpValue::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }

    pub fn as_frame(&self) -> Option<&Frame> {
        match self {
            KvpValue::Frame(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            KvpValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int64(&self) -> Option<i64> {
        match self {
            KvpValue::Int64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_guid(&self) -> Option<Guid> {
        match self {
            KvpValue::Guid(g) => Some(*g),
            _ => None,
        }
    }
}

impl From<i64> for KvpValue {
    fn from(v: i64) -> Self {
        KvpValue::Int64(v)
    }
}

impl From<f64> for KvpValue {
    fn from(v: f64) -> Self {
        KvpValue::Double(v)
    }
}

impl From<&str> for KvpValue {
    fn from(v: &str) -> Self {
        KvpValue::String(v.to_string())
    }
}

impl From<String> for KvpValue {
    fn from(v: String) -> Self {
        KvpValue::String(v)
    }
}

impl From<Numeric> for KvpValue {
    fn from(v: Numeric) -> Self {
        KvpValue::Numeric(v)
    }
}

impl From<Guid> for KvpValue {
    fn from(v: Guid) -> Self {
        KvpValue::Guid(v)
    }
}

impl From<Timespec> for KvpValue {
    fn from(v: Timespec) -> Self {
        KvpValue::Timespec(v)
    }
}

impl From<Frame> for KvpValue {
    fn from(v: Frame) -> Self {
        KvpValue::Frame(v)
    }
}

/// An ordered tree of named slots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    slots: BTreeMap<String, KvpValue>,
}

fn split_path(path: &str) -> Vec<&str> {
    path.split(PATH_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .collect()
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of top-level slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Stores `value` at `path`, creating intermediate frames as needed.
    ///
    /// An intermediate slot holding a non-frame value is replaced by a frame.
    /// Returns the previous value at `path`, if any.
    pub fn set(&mut self, path: &str, value: impl Into<KvpValue>) -> Option<KvpValue> {
        let segments = split_path(path);
        let (last, parents) = segments.split_last()?;
        let mut frame = self;
        for segment in parents {
            frame = frame.child_frame_mut(segment);
        }
        frame.slots.insert((*last).to_string(), value.into())
    }

    pub fn get(&self, path: &str) -> Option<&KvpValue> {
        let segments = split_path(path);
        let (last, parents) = segments.split_last()?;
        let mut frame = self;
        for segment in parents {
            frame = frame.slots.get(*segment)?.as_frame()?;
        }
        frame.slots.get(*last)
    }

    pub fn get_frame(&self, path: &str) -> Option<&Frame> {
        if split_path(path).is_empty() {
            return Some(self);
        }
        self.get(path)?.as_frame()
    }

    /// Returns the frame at `path`, creating it (and its parents) if missing.
    pub fn get_frame_mut(&mut self, path: &str) -> &mut Frame {
        let mut frame = self;
        for segment in split_path(path) {
            frame = frame.child_frame_mut(segment);
        }
        frame
    }

    pub fn remove(&mut self, path: &str) -> Option<KvpValue> {
        let segments = split_path(path);
        let (last, parents) = segments.split_last()?;
        let mut frame = self;
        for segment in parents {
            frame = match frame.slots.get_mut(*segment) {
                Some(KvpValue::Frame(child)) => child,
                _ => return None,
            };
        }
        frame.slots.remove(*last)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KvpValue)> {
        self.slots.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Compares two frames slot by slot in key order.
    pub fn compare(&self, other: &Frame) -> Ordering {
        for ((ka, va), (kb, vb)) in self.slots.iter().zip(other.slots.iter()) {
            match ka.cmp(kb).then_with(|| va.compare(vb)) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        self.slots.len().cmp(&other.slots.len())
    }

    fn child_frame_mut(&mut self, segment: &str) -> &mut Frame {
        let slot = self
            .slots
            .entry(segment.to_string())
            .or_insert_with(|| KvpValue::Frame(Frame::new()));
        if !matches!(slot, KvpValue::Frame(_)) {
            *slot = KvpValue::Frame(Frame::new());
        }
        match slot {
            KvpValue::Frame(frame) => frame,
            _ => unreachable!("slot was just replaced with a frame"),
        }
    }
}

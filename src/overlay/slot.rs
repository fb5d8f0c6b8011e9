use std::sync::Arc;

use anybytes::Bytes;

use super::dict::OverlayDict;
use super::mark::Mark;
use crate::encode::Encoder;
use crate::raw::{RawDict, RawValue, SharedKeys, Tag};

/// A native (decoded) scalar value held by a resolved slot.
#[derive(Debug, Clone)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Data(Bytes),
}

impl Scalar {
    pub(crate) fn encode_to(&self, enc: &mut Encoder) {
        match self {
            Scalar::Null => enc.write_null(),
            Scalar::Bool(b) => enc.write_bool(*b),
            Scalar::Int(n) => enc.write_int(*n),
            Scalar::Float(f) => enc.write_float(*f),
            Scalar::String(s) => enc.write_str(s),
            Scalar::Data(d) => enc.write_data(d.as_ref()),
        }
    }
}

/// One dictionary entry of the overlay.
///
/// A slot is either still backed by the immutable source bytes
/// ([`Slot::Source`]), a tombstone marking the key as deleted, or resolved
/// into a native form. Deletion state and materialization state are
/// independent: a `Source` slot is just a cached reference, not a logical
/// change, and promoting it to [`Slot::Dict`] is one-way.
#[derive(Debug)]
pub enum Slot {
    /// Reference into the immutable source; re-encodes as a byte copy.
    Source(RawValue),
    /// The key is logically deleted relative to the base.
    Tombstone,
    /// A native scalar override.
    Scalar(Scalar),
    /// A materialized mutable child collection.
    Dict(OverlayDict),
}

impl Slot {
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Slot::Tombstone)
    }

    /// Reads this slot as an integer, whichever representation it is in.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Slot::Source(value) => value.as_int(),
            Slot::Scalar(Scalar::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Slot::Source(value) => value.as_bool(),
            Slot::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Slot::Source(value) => value.as_float(),
            Slot::Scalar(Scalar::Float(f)) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Slot::Source(value) => value.as_str(),
            Slot::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            Slot::Source(value) => value.as_data(),
            Slot::Scalar(Scalar::Data(d)) => Some(d.as_ref()),
            _ => None,
        }
    }

    /// Promotes a `Source` slot holding an encoded dictionary into a live
    /// [`OverlayDict`] child bound to `parent`. Already-materialized slots
    /// are left alone; non-dictionary slots yield `None`.
    pub(crate) fn promote_dict(
        &mut self,
        parent: &Arc<Mark>,
        shared: Option<Arc<SharedKeys>>,
    ) -> Option<()> {
        match self {
            Slot::Dict(_) => Some(()),
            Slot::Source(value) if value.tag() == Tag::Dict => {
                let base = RawDict::from_value(value, shared).ok()?;
                *self = Slot::Dict(OverlayDict::materialize(base, parent));
                Some(())
            }
            _ => None,
        }
    }

    /// Re-encodes this slot's current logical value.
    ///
    /// Must not be called on a tombstone; callers filter deleted entries
    /// before encoding.
    pub fn encode_to(&self, enc: &mut Encoder) {
        match self {
            Slot::Source(value) => enc.write_raw(value.bytes()),
            Slot::Scalar(scalar) => scalar.encode_to(enc),
            Slot::Dict(dict) => dict.encode_to(enc),
            Slot::Tombstone => debug_assert!(false, "encoding a tombstone slot"),
        }
    }
}

impl From<Scalar> for Slot {
    fn from(scalar: Scalar) -> Slot {
        Slot::Scalar(scalar)
    }
}

impl From<i64> for Slot {
    fn from(n: i64) -> Slot {
        Slot::Scalar(Scalar::Int(n))
    }
}

impl From<bool> for Slot {
    fn from(b: bool) -> Slot {
        Slot::Scalar(Scalar::Bool(b))
    }
}

impl From<f64> for Slot {
    fn from(f: f64) -> Slot {
        Slot::Scalar(Scalar::Float(f))
    }
}

impl From<&str> for Slot {
    fn from(s: &str) -> Slot {
        Slot::Scalar(Scalar::String(s.to_owned()))
    }
}

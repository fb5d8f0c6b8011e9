//! Zero-parse view over encoded document bytes.
//!
//! A document is interpreted in place: nothing is decoded until a caller
//! asks for it, and a value handle is just a cheap clone of the document
//! [`Bytes`] plus the value's extent within it. The mutable overlay in
//! [`overlay`](crate::overlay) wraps these views without touching the
//! underlying buffer.
//!
//! The encoding is a tag byte followed by a payload:
//!
//! | tag    | value                                           |
//! |--------|-------------------------------------------------|
//! | `0x00` | null                                            |
//! | `0x01` | false                                           |
//! | `0x02` | true                                            |
//! | `0x03` | int, zigzag varint                              |
//! | `0x04` | float, 8-byte little-endian f64                 |
//! | `0x05` | string, varint length + UTF-8 bytes             |
//! | `0x06` | data, varint length + raw bytes                 |
//! | `0x07` | dict, varint count + (key, value) entries       |
//!
//! Dictionary keys are a varint `n`: even `n` is an inline key of `n >> 1`
//! bytes, odd `n` is the interned key id `n >> 1` resolved through the
//! document's [`SharedKeys`] table.

use std::collections::HashMap;
use std::sync::Arc;

use anybytes::Bytes;

use crate::varint;

/// Value tags of the document encoding.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[repr(u8)]
pub enum Tag {
    Null = 0x00,
    False = 0x01,
    True = 0x02,
    Int = 0x03,
    Float = 0x04,
    String = 0x05,
    Data = 0x06,
    Dict = 0x07,
}

impl Tag {
    pub fn of(byte: u8) -> Option<Tag> {
        match byte {
            0x00 => Some(Tag::Null),
            0x01 => Some(Tag::False),
            0x02 => Some(Tag::True),
            0x03 => Some(Tag::Int),
            0x04 => Some(Tag::Float),
            0x05 => Some(Tag::String),
            0x06 => Some(Tag::Data),
            0x07 => Some(Tag::Dict),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum DecodeError {
    Truncated,
    BadTag(u8),
    Trailing,
}

/// Computes the encoded extent of the value at the front of `buf`,
/// validating every nested tag and length on the way.
pub fn measure(buf: &[u8]) -> Result<usize, DecodeError> {
    let tag = *buf.first().ok_or(DecodeError::Truncated)?;
    let tag = Tag::of(tag).ok_or(DecodeError::BadTag(tag))?;
    match tag {
        Tag::Null | Tag::False | Tag::True => Ok(1),
        Tag::Int => {
            let len = varint::skip(&buf[1..]).ok_or(DecodeError::Truncated)?;
            Ok(1 + len)
        }
        Tag::Float => {
            if buf.len() < 9 {
                return Err(DecodeError::Truncated);
            }
            Ok(9)
        }
        Tag::String | Tag::Data => {
            let (len, header) = varint::get(&buf[1..]).ok_or(DecodeError::Truncated)?;
            // a hostile length can exceed usize; treat any overflow as a
            // truncation since the payload can't possibly be present
            let len = usize::try_from(len).map_err(|_| DecodeError::Truncated)?;
            let extent = (1 + header).checked_add(len).ok_or(DecodeError::Truncated)?;
            if buf.len() < extent {
                return Err(DecodeError::Truncated);
            }
            Ok(extent)
        }
        Tag::Dict => {
            let (count, header) = varint::get(&buf[1..]).ok_or(DecodeError::Truncated)?;
            let mut off = 1 + header;
            for _ in 0..count {
                let (n, klen) = varint::get(&buf[off..]).ok_or(DecodeError::Truncated)?;
                off += klen;
                if n & 1 == 0 {
                    let key_len =
                        usize::try_from(n >> 1).map_err(|_| DecodeError::Truncated)?;
                    off = off.checked_add(key_len).ok_or(DecodeError::Truncated)?;
                    if buf.len() < off {
                        return Err(DecodeError::Truncated);
                    }
                }
                off += measure(&buf[off..])?;
            }
            Ok(off)
        }
    }
}

/// A handle to one encoded value inside a document.
///
/// Holds the whole document buffer (a ref-counted clone, so this is cheap)
/// plus the value's span; nothing is decoded until an accessor is called.
#[derive(Debug, Clone)]
pub struct RawValue {
    doc: Bytes,
    start: usize,
    len: usize,
    tag: Tag,
}

impl RawValue {
    /// Interprets `doc` as a single encoded value covering the whole buffer.
    pub fn new(doc: Bytes) -> Result<RawValue, DecodeError> {
        let extent = measure(doc.as_ref())?;
        if extent != doc.len() {
            return Err(DecodeError::Trailing);
        }
        let tag = Tag::of(doc.as_ref()[0]).ok_or(DecodeError::BadTag(doc.as_ref()[0]))?;
        Ok(RawValue {
            doc,
            start: 0,
            len: extent,
            tag,
        })
    }

    fn slice(doc: &Bytes, start: usize) -> Result<RawValue, DecodeError> {
        let buf = &doc.as_ref()[start..];
        let extent = measure(buf)?;
        let tag = Tag::of(buf[0]).ok_or(DecodeError::BadTag(buf[0]))?;
        Ok(RawValue {
            doc: doc.clone(),
            start,
            len: extent,
            tag,
        })
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// The encoded extent of this value, suitable for pass-through writing.
    pub fn bytes(&self) -> &[u8] {
        &self.doc.as_ref()[self.start..self.start + self.len]
    }

    fn payload(&self) -> &[u8] {
        &self.bytes()[1..]
    }

    pub fn is_null(&self) -> bool {
        self.tag == Tag::Null
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.tag {
            Tag::False => Some(false),
            Tag::True => Some(true),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        if self.tag != Tag::Int {
            return None;
        }
        let (n, _) = varint::get(self.payload())?;
        Some(varint::unzigzag(n))
    }

    pub fn as_float(&self) -> Option<f64> {
        if self.tag != Tag::Float {
            return None;
        }
        let bytes: [u8; 8] = self.payload().try_into().ok()?;
        Some(f64::from_le_bytes(bytes))
    }

    pub fn as_str(&self) -> Option<&str> {
        if self.tag != Tag::String {
            return None;
        }
        let (len, header) = varint::get(self.payload())?;
        std::str::from_utf8(&self.payload()[header..header + len as usize]).ok()
    }

    pub fn as_data(&self) -> Option<&[u8]> {
        if self.tag != Tag::Data {
            return None;
        }
        let (len, header) = varint::get(self.payload())?;
        Some(&self.payload()[header..header + len as usize])
    }

    /// Narrows this value to a dictionary view resolving interned keys
    /// through `shared`.
    pub fn as_dict(&self, shared: Option<Arc<SharedKeys>>) -> Option<RawDict> {
        RawDict::from_value(self, shared).ok()
    }
}

/// The key-interning table shared by a document and all of its nested
/// dictionaries. Read-only from this layer's perspective.
#[derive(Debug, Default)]
pub struct SharedKeys {
    by_key: HashMap<Box<[u8]>, u32>,
    by_id: Vec<Box<[u8]>>,
}

impl SharedKeys {
    /// Builds a table from an ordered key list; ids are assigned in order.
    pub fn from_keys<I>(keys: I) -> SharedKeys
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut table = SharedKeys::default();
        for key in keys {
            let key: Box<[u8]> = key.as_ref().into();
            if table.by_key.contains_key(&key) {
                continue;
            }
            let id = table.by_id.len() as u32;
            table.by_key.insert(key.clone(), id);
            table.by_id.push(key);
        }
        table
    }

    pub fn encode(&self, key: &[u8]) -> Option<u32> {
        self.by_key.get(key).copied()
    }

    pub fn decode(&self, id: u32) -> Option<&[u8]> {
        self.by_id.get(id as usize).map(|k| k.as_ref())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// A lazily-interpreted dictionary view over encoded bytes.
///
/// `count` comes from the header; entry lookup scans the encoded entries.
/// The overlay caches looked-up entries in its delta map, so repeated
/// lookups of the same key don't rescan.
#[derive(Debug, Clone)]
pub struct RawDict {
    doc: Bytes,
    start: usize,
    len: usize,
    body: usize,
    count: u32,
    shared: Option<Arc<SharedKeys>>,
}

impl RawDict {
    /// Interprets `doc` as a whole-buffer dictionary value.
    pub fn new(doc: Bytes, shared: Option<Arc<SharedKeys>>) -> Result<RawDict, DecodeError> {
        let value = RawValue::new(doc)?;
        RawDict::from_value(&value, shared)
    }

    /// Narrows a value handle to a dictionary view.
    pub fn from_value(
        value: &RawValue,
        shared: Option<Arc<SharedKeys>>,
    ) -> Result<RawDict, DecodeError> {
        if value.tag != Tag::Dict {
            return Err(DecodeError::BadTag(value.bytes()[0]));
        }
        let (count, header) = varint::get(value.payload()).ok_or(DecodeError::Truncated)?;
        Ok(RawDict {
            doc: value.doc.clone(),
            start: value.start,
            len: value.len,
            body: value.start + 1 + header,
            count: count as u32,
            shared,
        })
    }

    /// Entry count, O(1) from the header.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// The encoded extent of the whole dictionary, for pass-through writing.
    pub fn raw(&self) -> &[u8] {
        &self.doc.as_ref()[self.start..self.start + self.len]
    }

    pub fn shared(&self) -> Option<&Arc<SharedKeys>> {
        self.shared.as_ref()
    }

    /// Looks up `key`, scanning entries in encoded order.
    pub fn get(&self, key: &[u8]) -> Option<RawValue> {
        self.iter()
            .find_map(|(k, v)| if k == key { Some(v) } else { None })
    }

    /// Iterates `(key, value)` pairs in encoded entry order.
    pub fn iter(&self) -> Entries<'_> {
        Entries {
            dict: self,
            off: self.body,
            remaining: self.count,
        }
    }
}

/// Iterator over the entries of a [`RawDict`].
pub struct Entries<'a> {
    dict: &'a RawDict,
    off: usize,
    remaining: u32,
}

impl<'a> Iterator for Entries<'a> {
    type Item = (&'a [u8], RawValue);

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            self.remaining -= 1;
            let buf = self.dict.doc.as_ref();
            // extents were validated by measure() at construction
            let (n, klen) = varint::get(&buf[self.off..])?;
            self.off += klen;
            let key = if n & 1 == 0 {
                let len = (n >> 1) as usize;
                let key = &buf[self.off..self.off + len];
                self.off += len;
                Some(key)
            } else {
                let resolved = self
                    .dict
                    .shared
                    .as_ref()
                    .and_then(|shared| shared.decode((n >> 1) as u32));
                debug_assert!(resolved.is_some(), "unresolvable interned key id");
                resolved
            };
            let value = RawValue::slice(&self.dict.doc, self.off).ok()?;
            self.off += value.len;
            if let Some(key) = key {
                return Some((key, value));
            }
            // an unresolvable interned key can't match anything; skip it
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining as usize))
    }
}

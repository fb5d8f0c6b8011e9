//! Serializer for the document encoding.
//!
//! The encoder is a flat byte sink: scalars are written directly,
//! dictionaries are bracketed by [`Encoder::begin_dict`] and
//! [`Encoder::end_dict`] with alternating key/value writes in between, and
//! values that already exist in encoded form pass through untouched via
//! [`Encoder::write_raw`]. Bracketing and key/value alternation are
//! programming contracts checked with debug assertions, not runtime errors.

use std::sync::Arc;

use anybytes::Bytes;

use crate::raw::{SharedKeys, Tag};
use crate::varint;

struct DictFrame {
    remaining: u32,
    pending_value: bool,
}

/// Writes values into an owned buffer.
pub struct Encoder {
    out: Vec<u8>,
    shared: Option<Arc<SharedKeys>>,
    frames: Vec<DictFrame>,
}

impl Encoder {
    pub fn new() -> Encoder {
        Encoder {
            out: Vec::new(),
            shared: None,
            frames: Vec::new(),
        }
    }

    /// An encoder bound to a key-interning table; keys known to the table
    /// are written as interned ids instead of inline bytes.
    pub fn with_shared(shared: Arc<SharedKeys>) -> Encoder {
        Encoder {
            out: Vec::new(),
            shared: Some(shared),
            frames: Vec::new(),
        }
    }

    /// Marks one value written in the enclosing dictionary, if any.
    fn note_value(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            debug_assert!(
                frame.pending_value,
                "dictionary value written without a preceding key"
            );
            frame.pending_value = false;
            frame.remaining -= 1;
        }
    }

    pub fn write_null(&mut self) {
        self.note_value();
        self.out.push(Tag::Null as u8);
    }

    pub fn write_bool(&mut self, b: bool) {
        self.note_value();
        self.out.push(if b { Tag::True } else { Tag::False } as u8);
    }

    pub fn write_int(&mut self, n: i64) {
        self.note_value();
        self.out.push(Tag::Int as u8);
        varint::put(&mut self.out, varint::zigzag(n));
    }

    pub fn write_float(&mut self, f: f64) {
        self.note_value();
        self.out.push(Tag::Float as u8);
        self.out.extend_from_slice(&f.to_le_bytes());
    }

    pub fn write_str(&mut self, s: &str) {
        self.note_value();
        self.out.push(Tag::String as u8);
        varint::put(&mut self.out, s.len() as u64);
        self.out.extend_from_slice(s.as_bytes());
    }

    pub fn write_data(&mut self, data: &[u8]) {
        self.note_value();
        self.out.push(Tag::Data as u8);
        varint::put(&mut self.out, data.len() as u64);
        self.out.extend_from_slice(data);
    }

    /// Copies an already-encoded value through untouched.
    pub fn write_raw(&mut self, encoded: &[u8]) {
        debug_assert_eq!(
            crate::raw::measure(encoded),
            Ok(encoded.len()),
            "write_raw expects exactly one encoded value"
        );
        self.note_value();
        self.out.extend_from_slice(encoded);
    }

    /// Opens a dictionary of exactly `count` entries.
    pub fn begin_dict(&mut self, count: u32) {
        self.note_value();
        self.out.push(Tag::Dict as u8);
        varint::put(&mut self.out, count as u64);
        self.frames.push(DictFrame {
            remaining: count,
            pending_value: false,
        });
    }

    pub fn write_key(&mut self, key: &[u8]) {
        let frame = self.frames.last_mut();
        debug_assert!(frame.is_some(), "key written outside a dictionary");
        if let Some(frame) = frame {
            debug_assert!(!frame.pending_value, "two keys written in a row");
            debug_assert!(frame.remaining > 0, "more entries than declared");
            frame.pending_value = true;
        }
        match self.shared.as_ref().and_then(|shared| shared.encode(key)) {
            Some(id) => {
                varint::put(&mut self.out, ((id as u64) << 1) | 1);
            }
            None => {
                varint::put(&mut self.out, (key.len() as u64) << 1);
                self.out.extend_from_slice(key);
            }
        }
    }

    pub fn end_dict(&mut self) {
        let frame = self.frames.pop();
        debug_assert!(frame.is_some(), "end_dict without begin_dict");
        if let Some(frame) = frame {
            debug_assert!(!frame.pending_value, "key written without a value");
            debug_assert_eq!(frame.remaining, 0, "fewer entries than declared");
        }
    }

    /// Finishes encoding and hands the buffer over.
    pub fn finish(self) -> Bytes {
        debug_assert!(self.frames.is_empty(), "unclosed dictionary");
        Bytes::from_source(self.out)
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Encoder::new()
    }
}

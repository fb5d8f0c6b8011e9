//! Mutation layer for a compact, zero-parse binary document encoding.
//!
//! Documents are interpreted lazily, in place, from an immutable
//! [`Bytes`] buffer; most access never decodes more than it touches. This
//! crate makes such documents *mutable* without rewriting the buffer:
//!
//! * [`raw`] interprets encoded bytes in place and carries the shared
//!   key-interning table.
//! * [`overlay`] layers inserts, deletes and updates over an immutable base
//!   dictionary, tracking divergence per collection so re-encoding can pass
//!   unmodified subtrees through byte-for-byte.
//! * [`trie`] is a persistent hash-array-mapped trie for large keyed
//!   collections, with O(1) clones and per-mutation path copying.
//! * [`encode`] serializes a collection's current logical content back to
//!   bytes; [`varint`] is the integer codec underneath.
//!
//! # Example
//!
//! ```
//! use fleck::encode::Encoder;
//! use fleck::overlay::{OverlayDict, Slot};
//! use fleck::raw::RawDict;
//!
//! // Encode a document...
//! let mut enc = Encoder::new();
//! enc.begin_dict(2);
//! enc.write_key(b"kind");
//! enc.write_str("user");
//! enc.write_key(b"age");
//! enc.write_int(41);
//! enc.end_dict();
//! let doc = enc.finish();
//!
//! // ...open it read-only, then edit one key through an overlay.
//! let base = RawDict::new(doc, None).unwrap();
//! let mut dict = OverlayDict::new(base);
//! dict.set(b"age", Slot::from(42));
//! assert_eq!(dict.len(), 2);
//! assert!(dict.is_mutated());
//!
//! // Re-encoding merges the delta with the untouched base bytes.
//! let mut enc = Encoder::new();
//! dict.encode_to(&mut enc);
//! let reread = RawDict::new(enc.finish(), None).unwrap();
//! assert_eq!(reread.get(b"age").unwrap().as_int(), Some(42));
//! assert_eq!(reread.get(b"kind").unwrap().as_str(), Some("user"));
//! ```

pub mod encode;
pub mod overlay;
pub mod raw;
pub mod trie;
pub mod varint;

pub use anybytes::Bytes;

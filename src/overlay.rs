//! The mutation-overlay framework.
//!
//! Documents are decoded lazily and mostly read in place; this module makes
//! them mutable without rewriting the underlying buffer. Three pieces work
//! together:
//!
//! * a mutation mark tracks whether a collection has diverged from its
//!   encoded source and notifies its parent chain on the first divergence.
//! * [`Slot`] is one dictionary entry: still backed by source bytes, a
//!   deletion tombstone, or a resolved native value / child collection.
//! * [`OverlayDict`] layers a delta map of slots over an immutable
//!   [`RawDict`](crate::raw::RawDict) base, merging the two on lookup,
//!   enumeration, and re-encoding.
//!
//! All of this is single-mutator: one thread mutates a collection subtree at
//! a time, while any number of readers may share the immutable source.

mod dict;
mod mark;
mod slot;

pub use dict::OverlayDict;
pub use slot::{Scalar, Slot};

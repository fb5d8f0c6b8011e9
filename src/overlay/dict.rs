use std::collections::HashMap;
use std::sync::Arc;

use super::mark::Mark;
use super::slot::Slot;
use crate::encode::Encoder;
use crate::raw::RawDict;

/// A mutable dictionary layered over an immutable base view.
///
/// Edits live in a delta map keyed by owned byte strings; the base bytes are
/// never touched. A key present in the delta is fully decided by its slot
/// (a tombstone means deleted), a key absent from the delta is fully decided
/// by the base. Collections that were never mutated re-encode as a straight
/// copy of their original bytes.
#[derive(Debug)]
pub struct OverlayDict {
    base: RawDict,
    count: u32,
    delta: HashMap<Box<[u8]>, Slot>,
    mark: Arc<Mark>,
}

impl OverlayDict {
    /// Wraps a base view as a root mutable dictionary.
    pub fn new(base: RawDict) -> OverlayDict {
        OverlayDict {
            count: base.count(),
            base,
            delta: HashMap::new(),
            mark: Mark::root(),
        }
    }

    /// Wraps a base view as a child of an enclosing collection; mutations
    /// propagate dirtiness to `parent`.
    pub(crate) fn materialize(base: RawDict, parent: &Arc<Mark>) -> OverlayDict {
        OverlayDict {
            count: base.count(),
            base,
            delta: HashMap::new(),
            mark: Mark::child(parent),
        }
    }

    /// Number of visible keys after merging base and delta. O(1).
    pub fn len(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// True iff this collection's logical content can differ from a straight
    /// re-serialization of its source bytes.
    pub fn is_mutated(&self) -> bool {
        self.mark.is_mutated()
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        match self.delta.get(key) {
            Some(slot) => !slot.is_tombstone(),
            None => self.base.get(key).is_some(),
        }
    }

    /// Looks up a key's slot.
    ///
    /// A base hit caches an unresolved slot in the delta so later lookups
    /// and in-place mutations are O(1); this changes representation only and
    /// does not dirty the collection. A tombstoned key returns its tombstone
    /// slot; callers distinguish deletion via [`Slot::is_tombstone`].
    pub fn get(&mut self, key: &[u8]) -> Option<&Slot> {
        if !self.delta.contains_key(key) {
            let value = self.base.get(key)?;
            self.delta.insert(key.into(), Slot::Source(value));
        }
        self.delta.get(key)
    }

    /// Looks up a key and materializes it as a mutable child dictionary.
    ///
    /// Returns `None` if the key is absent, deleted, or does not hold a
    /// dictionary. Materialization itself does not dirty the collection;
    /// mutating the returned child does.
    pub fn get_dict(&mut self, key: &[u8]) -> Option<&mut OverlayDict> {
        if !self.delta.contains_key(key) {
            let value = self.base.get(key)?;
            self.delta.insert(key.into(), Slot::Source(value));
        }
        let mark = self.mark.clone();
        let shared = self.base.shared().cloned();
        let slot = self.delta.get_mut(key)?;
        slot.promote_dict(&mark, shared)?;
        match slot {
            Slot::Dict(dict) => Some(dict),
            _ => None,
        }
    }

    /// Replaces a key's slot, maintaining the logical count and the dirty
    /// flag. Deleting a key that is already deleted, or was never present,
    /// is a no-op that records nothing.
    pub fn set(&mut self, key: &[u8], slot: Slot) {
        if let Some(existing) = self.delta.get_mut(key) {
            match (existing.is_tombstone(), slot.is_tombstone()) {
                (true, true) => return,
                (true, false) => self.count += 1,
                (false, true) => self.count -= 1,
                (false, false) => {}
            }
            self.mark.mutate();
            *existing = slot;
        } else {
            if self.base.get(key).is_some() {
                if slot.is_tombstone() {
                    self.count -= 1;
                }
            } else {
                if slot.is_tombstone() {
                    return;
                }
                self.count += 1;
            }
            self.mark.mutate();
            self.delta.insert(key.into(), slot);
        }
    }

    /// Deletes a key; equivalent to setting a tombstone.
    pub fn remove(&mut self, key: &[u8]) {
        self.set(key, Slot::Tombstone);
    }

    /// Deletes every visible key.
    pub fn clear(&mut self) {
        if self.count == 0 {
            return;
        }
        self.mark.mutate();
        self.delta.clear();
        for (key, _) in self.base.iter() {
            self.delta.insert(key.into(), Slot::Tombstone);
        }
        self.count = 0;
    }

    /// Visits every visible key exactly once: overridden and inserted keys
    /// first (delta map order), then base keys not shadowed by the delta in
    /// their encoded order. The overall order is unspecified; callers must
    /// not rely on it beyond the exactly-once guarantee.
    pub fn enumerate<F>(&self, mut visit: F)
    where
        F: FnMut(&[u8], &Slot),
    {
        for (key, slot) in &self.delta {
            if !slot.is_tombstone() {
                visit(key, slot);
            }
        }
        for (key, value) in self.base.iter() {
            if !self.delta.contains_key(key) {
                visit(key, &Slot::Source(value));
            }
        }
    }

    /// Re-serializes this dictionary's current logical content.
    ///
    /// A never-mutated collection passes its original bytes through
    /// untouched, so unmodified subtrees cost nothing to re-encode.
    pub fn encode_to(&self, enc: &mut Encoder) {
        if !self.is_mutated() {
            enc.write_raw(self.base.raw());
            return;
        }
        enc.begin_dict(self.count);
        self.enumerate(|key, slot| {
            enc.write_key(key);
            slot.encode_to(enc);
        });
        enc.end_dict();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::Scalar;
    use crate::raw::SharedKeys;
    use crate::Bytes;
    use std::collections::BTreeMap;

    fn base_dict(entries: &[(&str, i64)]) -> RawDict {
        let mut enc = Encoder::new();
        enc.begin_dict(entries.len() as u32);
        for (key, value) in entries {
            enc.write_key(key.as_bytes());
            enc.write_int(*value);
        }
        enc.end_dict();
        RawDict::new(enc.finish(), None).unwrap()
    }

    #[test]
    fn fresh_overlay_mirrors_base() {
        let mut dict = OverlayDict::new(base_dict(&[("a", 1), ("b", 2)]));
        assert_eq!(dict.len(), 2);
        assert!(!dict.is_mutated());
        assert!(dict.contains(b"a"));
        assert!(!dict.contains(b"c"));
        assert_eq!(dict.get(b"b").unwrap().as_int(), Some(2));
        // the read-through cache must not dirty the collection
        assert!(!dict.is_mutated());
    }

    #[test]
    fn set_overrides_and_inserts() {
        let mut dict = OverlayDict::new(base_dict(&[("a", 1)]));
        dict.set(b"a", Slot::from(10));
        assert_eq!(dict.len(), 1);
        dict.set(b"b", Slot::from(20));
        assert_eq!(dict.len(), 2);
        assert!(dict.is_mutated());
        assert_eq!(dict.get(b"a").unwrap().as_int(), Some(10));
        assert_eq!(dict.get(b"b").unwrap().as_int(), Some(20));
    }

    #[test]
    fn remove_base_key_then_reinsert() {
        let mut dict = OverlayDict::new(base_dict(&[("a", 1)]));
        dict.remove(b"a");
        assert_eq!(dict.len(), 0);
        assert!(!dict.contains(b"a"));
        assert!(dict.get(b"a").unwrap().is_tombstone());

        dict.set(b"a", Slot::from(2));
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get(b"a").unwrap().as_int(), Some(2));
    }

    #[test]
    fn removing_a_never_present_key_is_a_noop() {
        let mut dict = OverlayDict::new(base_dict(&[("a", 1)]));
        dict.remove(b"ghost");
        assert!(!dict.is_mutated());
        assert_eq!(dict.len(), 1);

        // double-delete of a real key dirties once, then no-ops
        dict.remove(b"a");
        assert!(dict.is_mutated());
        assert_eq!(dict.len(), 0);
        dict.remove(b"a");
        assert_eq!(dict.len(), 0);
    }

    #[test]
    fn delete_all_vs_clear() {
        let keys = [("a", 1), ("b", 2), ("c", 3)];
        let mut one_by_one = OverlayDict::new(base_dict(&keys));
        for (key, _) in &keys {
            one_by_one.remove(key.as_bytes());
        }
        assert_eq!(one_by_one.len(), 0);
        for (key, _) in &keys {
            assert!(!one_by_one.contains(key.as_bytes()));
        }

        let mut cleared = OverlayDict::new(base_dict(&keys));
        cleared.clear();
        assert_eq!(cleared.len(), 0);
        for (key, _) in &keys {
            assert!(!cleared.contains(key.as_bytes()));
        }
        // clearing an already-empty dictionary stays a no-op
        cleared.clear();
        assert_eq!(cleared.len(), 0);
    }

    #[test]
    fn clear_then_reinsert_counts_from_zero() {
        let mut dict = OverlayDict::new(base_dict(&[("a", 1), ("b", 2)]));
        dict.clear();
        dict.set(b"b", Slot::from(9));
        assert_eq!(dict.len(), 1);
        assert!(!dict.contains(b"a"));
        assert_eq!(dict.get(b"b").unwrap().as_int(), Some(9));
    }

    #[test]
    fn enumerate_visits_each_visible_key_once() {
        let mut dict = OverlayDict::new(base_dict(&[("a", 1), ("b", 2), ("c", 3)]));
        dict.remove(b"b");
        dict.set(b"c", Slot::from(30));
        dict.set(b"d", Slot::from(40));

        let mut seen = BTreeMap::new();
        dict.enumerate(|key, slot| {
            let prior = seen.insert(key.to_vec(), slot.as_int().unwrap());
            assert!(prior.is_none(), "key visited twice");
        });
        let expected: BTreeMap<Vec<u8>, i64> = [
            (b"a".to_vec(), 1),
            (b"c".to_vec(), 30),
            (b"d".to_vec(), 40),
        ]
        .into();
        assert_eq!(seen, expected);
    }

    #[test]
    fn scalar_overrides_roundtrip_through_the_encoder() {
        let mut dict = OverlayDict::new(base_dict(&[("n", 1)]));
        dict.set(b"s", Slot::from("text"));
        dict.set(b"f", Slot::from(0.5));
        dict.set(b"t", Slot::from(true));
        dict.set(b"nil", Slot::Scalar(Scalar::Null));
        dict.set(
            b"bin",
            Slot::Scalar(Scalar::Data(Bytes::from_source(vec![1u8, 2, 3]))),
        );
        assert_eq!(dict.get(b"bin").unwrap().as_data(), Some(&[1u8, 2, 3][..]));

        let mut enc = Encoder::new();
        dict.encode_to(&mut enc);
        let reread = RawDict::new(enc.finish(), None).unwrap();
        assert_eq!(reread.count(), 6);
        assert_eq!(reread.get(b"n").unwrap().as_int(), Some(1));
        assert_eq!(reread.get(b"s").unwrap().as_str(), Some("text"));
        assert_eq!(reread.get(b"f").unwrap().as_float(), Some(0.5));
        assert_eq!(reread.get(b"t").unwrap().as_bool(), Some(true));
        assert!(reread.get(b"nil").unwrap().is_null());
        assert_eq!(reread.get(b"bin").unwrap().as_data(), Some(&[1u8, 2, 3][..]));

        // a source-backed slot reads data the same way as a resolved one
        let mut reopened = OverlayDict::new(reread);
        assert_eq!(
            reopened.get(b"bin").unwrap().as_data(),
            Some(&[1u8, 2, 3][..])
        );
    }

    #[test]
    fn shared_keys_survive_reencoding() {
        let shared = Arc::new(SharedKeys::from_keys(["a", "b"]));
        let mut enc = Encoder::with_shared(shared.clone());
        enc.begin_dict(2);
        enc.write_key(b"a");
        enc.write_int(1);
        enc.write_key(b"b");
        enc.write_int(2);
        enc.end_dict();
        let base = RawDict::new(enc.finish(), Some(shared.clone())).unwrap();

        let mut dict = OverlayDict::new(base);
        dict.set(b"b", Slot::from(20));

        let mut enc = Encoder::with_shared(shared.clone());
        dict.encode_to(&mut enc);
        let reread = RawDict::new(enc.finish(), Some(shared)).unwrap();
        assert_eq!(reread.get(b"a").unwrap().as_int(), Some(1));
        assert_eq!(reread.get(b"b").unwrap().as_int(), Some(20));
    }
}

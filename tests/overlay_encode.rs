use std::collections::BTreeSet;
use std::sync::Arc;

use fleck::encode::Encoder;
use fleck::overlay::{OverlayDict, Slot};
use fleck::raw::{RawDict, SharedKeys};

fn encode_base(entries: &[(&str, i64)], shared: Option<Arc<SharedKeys>>) -> RawDict {
    let mut enc = match &shared {
        Some(shared) => Encoder::with_shared(shared.clone()),
        None => Encoder::new(),
    };
    enc.begin_dict(entries.len() as u32);
    for (key, value) in entries {
        enc.write_key(key.as_bytes());
        enc.write_int(*value);
    }
    enc.end_dict();
    RawDict::new(enc.finish(), shared).unwrap()
}

#[test]
fn unmutated_overlay_encodes_byte_identically() {
    let base = encode_base(&[("a", 1), ("b", 2), ("c", 3)], None);
    let original = base.raw().to_vec();

    let mut dict = OverlayDict::new(base);
    // reads populate the delta cache but must not count as mutation
    assert_eq!(dict.get(b"b").unwrap().as_int(), Some(2));
    assert!(dict.contains(b"c"));
    assert!(!dict.is_mutated());

    let mut enc = Encoder::new();
    dict.encode_to(&mut enc);
    assert_eq!(enc.finish().as_ref(), original.as_slice());
}

#[test]
fn mutated_overlay_rebuilds_merged_content() {
    let base = encode_base(&[("a", 1), ("b", 2), ("c", 3)], None);
    let mut dict = OverlayDict::new(base);
    dict.set(b"b", Slot::from(20));
    dict.remove(b"c");
    dict.set(b"d", Slot::from("new"));
    assert_eq!(dict.len(), 3);

    let mut enc = Encoder::new();
    dict.encode_to(&mut enc);
    let reread = RawDict::new(enc.finish(), None).unwrap();
    assert_eq!(reread.count(), 3);
    assert_eq!(reread.get(b"a").unwrap().as_int(), Some(1));
    assert_eq!(reread.get(b"b").unwrap().as_int(), Some(20));
    assert!(reread.get(b"c").is_none());
    assert_eq!(reread.get(b"d").unwrap().as_str(), Some("new"));
}

#[test]
fn enumerate_agrees_with_contains_after_churn() {
    let base = encode_base(&[("a", 1), ("b", 2), ("c", 3), ("d", 4)], None);
    let mut dict = OverlayDict::new(base);
    dict.remove(b"a");
    dict.set(b"b", Slot::from(20));
    dict.set(b"e", Slot::from(50));
    dict.remove(b"e");
    dict.set(b"f", Slot::from(60));
    dict.remove(b"zzz");

    let mut visited = BTreeSet::new();
    dict.enumerate(|key, _| {
        assert!(visited.insert(key.to_vec()), "key visited twice");
    });

    for key in ["a", "b", "c", "d", "e", "f", "zzz"] {
        assert_eq!(
            dict.contains(key.as_bytes()),
            visited.contains(key.as_bytes()),
            "visibility mismatch for {key:?}"
        );
    }
    assert_eq!(visited.len() as u32, dict.len());
}

#[test]
fn nested_edit_dirties_the_whole_chain() {
    // outer = { inner: { x: 1 }, n: 7 }
    let mut enc = Encoder::new();
    enc.begin_dict(2);
    enc.write_key(b"inner");
    enc.begin_dict(1);
    enc.write_key(b"x");
    enc.write_int(1);
    enc.end_dict();
    enc.write_key(b"n");
    enc.write_int(7);
    enc.end_dict();
    let base = RawDict::new(enc.finish(), None).unwrap();

    let mut outer = OverlayDict::new(base);

    // materializing the child is a representation change only
    {
        let inner = outer.get_dict(b"inner").unwrap();
        assert_eq!(inner.len(), 1);
        assert!(!inner.is_mutated());
    }
    assert!(!outer.is_mutated());

    // mutating the child dirties both levels
    outer.get_dict(b"inner").unwrap().set(b"x", Slot::from(99));
    assert!(outer.is_mutated());

    let mut enc = Encoder::new();
    outer.encode_to(&mut enc);
    let reread = RawDict::new(enc.finish(), None).unwrap();
    assert_eq!(reread.get(b"n").unwrap().as_int(), Some(7));
    let inner = RawDict::from_value(&reread.get(b"inner").unwrap(), None).unwrap();
    assert_eq!(inner.count(), 1);
    assert_eq!(inner.get(b"x").unwrap().as_int(), Some(99));
}

#[test]
fn non_dict_values_do_not_materialize() {
    let base = encode_base(&[("n", 1)], None);
    let mut dict = OverlayDict::new(base);
    assert!(dict.get_dict(b"n").is_none());
    assert!(dict.get_dict(b"missing").is_none());
    assert!(!dict.is_mutated());
}

#[test]
fn shared_keys_flow_into_nested_dictionaries() {
    let shared = Arc::new(SharedKeys::from_keys(["inner", "x"]));
    let mut enc = Encoder::with_shared(shared.clone());
    enc.begin_dict(1);
    enc.write_key(b"inner");
    enc.begin_dict(1);
    enc.write_key(b"x");
    enc.write_int(5);
    enc.end_dict();
    enc.end_dict();
    let base = RawDict::new(enc.finish(), Some(shared)).unwrap();

    let mut outer = OverlayDict::new(base);
    let inner = outer.get_dict(b"inner").unwrap();
    assert_eq!(inner.get(b"x").unwrap().as_int(), Some(5));
    inner.set(b"x", Slot::from(6));
    assert_eq!(inner.get(b"x").unwrap().as_int(), Some(6));
}

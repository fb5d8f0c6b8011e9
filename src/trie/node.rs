use std::fmt::Debug;
use std::io;
use std::mem;
use std::sync::Arc;

/// Hash bits consumed per trie level.
pub(super) const BITS_PER_LEVEL: u32 = 5;
/// Branching factor; a branch addresses up to this many children.
pub(super) const BRANCHING: usize = 1usize << BITS_PER_LEVEL;
const LEVEL_MASK: u64 = (BRANCHING - 1) as u64;

/// The 5-bit chunk of `hash` selected at `shift`, as a bitmap bit.
fn bit_at(hash: u64, shift: u32) -> u32 {
    1u32 << ((hash >> shift) & LEVEL_MASK)
}

/// Position of `bit`'s child in the dense child vector: the number of
/// populated slots below it.
fn dense_index(bitmap: u32, bit: u32) -> usize {
    (bitmap & (bit - 1)).count_ones() as usize
}

/// A trie node. Branches keep a bitmap plus a dense, bit-ordered child
/// vector; a leaf is a single entry; a collision list holds entries whose
/// full hashes are equal. Every node is owned by exactly one parent [`Arc`],
/// so the structure is a tree and sharing happens only through whole-trie
/// clones.
#[derive(Debug, Clone)]
pub(super) enum Node<K, V> {
    Branch {
        bitmap: u32,
        children: Vec<Arc<Node<K, V>>>,
    },
    Leaf {
        hash: u64,
        key: K,
        value: V,
    },
    Collision {
        hash: u64,
        entries: Vec<(K, V)>,
    },
}

/// What happened to a subtree during a removal that was known to match.
pub(super) enum Shrunk {
    /// The entry was removed, the subtree still has content.
    Removed,
    /// The subtree is now empty and must be unlinked by the parent.
    Empty,
}

impl<K: Eq + Clone, V: Clone> Node<K, V> {
    pub fn get<'a>(&'a self, hash: u64, shift: u32, key: &K) -> Option<&'a V> {
        match self {
            Node::Leaf {
                hash: h,
                key: k,
                value,
            } => {
                if *h == hash && k == key {
                    Some(value)
                } else {
                    None
                }
            }
            Node::Collision { hash: h, entries } => {
                if *h != hash {
                    return None;
                }
                entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            Node::Branch { bitmap, children } => {
                let bit = bit_at(hash, shift);
                if bitmap & bit == 0 {
                    return None;
                }
                children[dense_index(*bitmap, bit)].get(hash, shift + BITS_PER_LEVEL, key)
            }
        }
    }

    /// Inserts along the single root-to-leaf path for `hash`, copying shared
    /// nodes on the way down and leaving sibling subtrees untouched.
    /// Returns true iff `key` was not present before.
    pub fn insert(slot: &mut Arc<Node<K, V>>, hash: u64, shift: u32, key: K, value: V) -> bool {
        // A terminal node whose hash diverges from ours splits here: both
        // get redistributed one level (or more) deeper.
        let terminal_hash = match &**slot {
            Node::Leaf { hash: h, .. } | Node::Collision { hash: h, .. } => Some(*h),
            Node::Branch { .. } => None,
        };
        if let Some(h) = terminal_hash {
            if h != hash {
                let old = slot.clone();
                let new = Arc::new(Node::Leaf { hash, key, value });
                *slot = Node::join(old, h, new, hash, shift);
                return true;
            }
        }

        match Arc::make_mut(slot) {
            Node::Leaf { key: k, value: v, .. } if *k == key => {
                *v = value;
                false
            }
            node @ Node::Leaf { .. } => {
                // same full hash, different key: leaf becomes a collision list
                let placeholder = Node::Branch {
                    bitmap: 0,
                    children: Vec::new(),
                };
                let Node::Leaf {
                    hash: h,
                    key: k,
                    value: v,
                } = mem::replace(node, placeholder)
                else {
                    unreachable!()
                };
                *node = Node::Collision {
                    hash: h,
                    entries: vec![(k, v), (key, value)],
                };
                true
            }
            Node::Collision { entries, .. } => {
                if let Some(entry) = entries.iter_mut().find(|(k, _)| *k == key) {
                    entry.1 = value;
                    false
                } else {
                    entries.push((key, value));
                    true
                }
            }
            Node::Branch { bitmap, children } => {
                let bit = bit_at(hash, shift);
                let index = dense_index(*bitmap, bit);
                if *bitmap & bit == 0 {
                    *bitmap |= bit;
                    children.insert(index, Arc::new(Node::Leaf { hash, key, value }));
                    true
                } else {
                    Node::insert(
                        &mut children[index],
                        hash,
                        shift + BITS_PER_LEVEL,
                        key,
                        value,
                    )
                }
            }
        }
    }

    /// Builds the smallest branch structure separating two subtrees with
    /// distinct hashes, descending while their chunks still agree.
    fn join(
        a: Arc<Node<K, V>>,
        a_hash: u64,
        b: Arc<Node<K, V>>,
        b_hash: u64,
        shift: u32,
    ) -> Arc<Node<K, V>> {
        debug_assert_ne!(a_hash, b_hash);
        let a_bit = bit_at(a_hash, shift);
        let b_bit = bit_at(b_hash, shift);
        if a_bit == b_bit {
            Arc::new(Node::Branch {
                bitmap: a_bit,
                children: vec![Node::join(a, a_hash, b, b_hash, shift + BITS_PER_LEVEL)],
            })
        } else {
            let children = if a_bit < b_bit { vec![a, b] } else { vec![b, a] };
            Arc::new(Node::Branch {
                bitmap: a_bit | b_bit,
                children,
            })
        }
    }

    /// Removes `key`, which the caller has already verified to be present.
    pub fn remove_present(slot: &mut Arc<Node<K, V>>, hash: u64, shift: u32, key: &K) -> Shrunk {
        let result = match Arc::make_mut(slot) {
            Node::Leaf { .. } => Shrunk::Empty,
            node @ Node::Collision { .. } => {
                let Node::Collision { hash: h, entries } = &mut *node else {
                    unreachable!()
                };
                let h = *h;
                let index = entries
                    .iter()
                    .position(|(k, _)| k == key)
                    .expect("key verified present");
                entries.remove(index);
                if entries.len() == 1 {
                    let (k, v) = entries.pop().expect("one entry left");
                    *node = Node::Leaf {
                        hash: h,
                        key: k,
                        value: v,
                    };
                }
                Shrunk::Removed
            }
            Node::Branch { bitmap, children } => {
                let bit = bit_at(hash, shift);
                debug_assert_ne!(*bitmap & bit, 0, "key verified present");
                let index = dense_index(*bitmap, bit);
                match Node::remove_present(&mut children[index], hash, shift + BITS_PER_LEVEL, key)
                {
                    Shrunk::Removed => {}
                    Shrunk::Empty => {
                        children.remove(index);
                        *bitmap &= !bit;
                        if children.is_empty() {
                            return Shrunk::Empty;
                        }
                    }
                }
                Shrunk::Removed
            }
        };
        // A branch down to one terminal child is unnecessary indirection;
        // hoist the child up. Branch children stay put: their position
        // depends on deeper hash chunks.
        let hoisted = match &**slot {
            Node::Branch { children, .. } if children.len() == 1 => {
                match &*children[0] {
                    Node::Leaf { .. } | Node::Collision { .. } => Some(children[0].clone()),
                    Node::Branch { .. } => None,
                }
            }
            _ => None,
        };
        if let Some(only) = hoisted {
            *slot = only;
        }
        result
    }
}

impl<K: Debug, V: Debug> Node<K, V> {
    pub fn dump(&self, out: &mut impl io::Write, depth: usize) -> io::Result<()> {
        let pad = depth * 2;
        match self {
            Node::Leaf { hash, key, value } => {
                writeln!(out, "{:pad$}leaf {hash:016x} {key:?} = {value:?}", "")
            }
            Node::Collision { hash, entries } => {
                writeln!(out, "{:pad$}collision {hash:016x}", "")?;
                for (key, value) in entries {
                    writeln!(out, "{:pad$}  {key:?} = {value:?}", "")?;
                }
                Ok(())
            }
            Node::Branch { bitmap, children } => {
                writeln!(
                    out,
                    "{:pad$}branch {:08x} ({}/{BRANCHING})",
                    "",
                    bitmap,
                    children.len()
                )?;
                for child in children {
                    child.dump(out, depth + 1)?;
                }
                Ok(())
            }
        }
    }
}

//! A persistent hash-array-mapped trie.
//!
//! [`HashTrie`] is the large-collection counterpart to the overlay
//! dictionary: a generic keyed container with near-O(1) get, insert and
//! remove, no base/overlay split, and structural sharing between versions.
//! Keys are routed by successive 5-bit chunks of a keyed SipHash, giving a
//! 32-way branch per level; entries whose full hashes collide end up in a
//! bounded collision list at the terminal node.
//!
//! Cloning a trie is O(1): versions share subtrees, and a mutation copies
//! only the nodes on the path from the root to the affected leaf, so
//! previously-taken clones are never affected by later edits.

mod node;

use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::io;
use std::sync::{Arc, OnceLock};

use arrayvec::ArrayVec;
use rand::RngCore;
use siphasher::sip::SipHasher24;

use node::{Node, Shrunk, BITS_PER_LEVEL};

/// Worst-case descent depth: 64 hash bits in 5-bit chunks, plus the root.
const MAX_DEPTH: usize = 64usize.div_ceil(BITS_PER_LEVEL as usize) + 1;

static SIP_KEY: OnceLock<[u8; 16]> = OnceLock::new();

/// The per-process SipHash key, drawn once from the thread rng.
fn sip_key() -> &'static [u8; 16] {
    SIP_KEY.get_or_init(|| {
        let mut key = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut key);
        key
    })
}

fn hash_key<K: Hash>(key: &K) -> u64 {
    let mut hasher = SipHasher24::new_with_key(sip_key());
    key.hash(&mut hasher);
    hasher.finish()
}

/// A persistent keyed container with O(1) clones and per-mutation
/// path copying.
#[derive(Debug, Clone)]
pub struct HashTrie<K, V> {
    root: Option<Arc<Node<K, V>>>,
    len: u64,
}

impl<K, V> HashTrie<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates a new empty trie.
    pub fn new() -> HashTrie<K, V> {
        HashTrie { root: None, len: 0 }
    }

    /// Number of live entries. O(1).
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Looks up a key. A miss is an expected outcome, not an error.
    pub fn get(&self, key: &K) -> Option<&V> {
        let root = self.root.as_ref()?;
        root.get(hash_key(key), 0, key)
    }

    /// Inserts or overwrites. Returns true iff the key was new; overwriting
    /// an existing key replaces its value and leaves the count unchanged.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let hash = hash_key(&key);
        let added = match &mut self.root {
            Some(root) => Node::insert(root, hash, 0, key, value),
            None => {
                self.root = Some(Arc::new(Node::Leaf { hash, key, value }));
                true
            }
        };
        if added {
            self.len += 1;
        }
        added
    }

    /// Removes a key. Returns false (and changes nothing) if it was absent.
    pub fn remove(&mut self, key: &K) -> bool {
        if self.get(key).is_none() {
            return false;
        }
        let root = self.root.as_mut().expect("key verified present");
        if let Shrunk::Empty = Node::remove_present(root, hash_key(key), 0, key) {
            self.root = None;
        }
        self.len -= 1;
        true
    }

    /// Iterates all entries in unspecified order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            stack: match &self.root {
                Some(root) => {
                    let mut stack = ArrayVec::new();
                    stack.push(std::slice::from_ref(root).iter());
                    stack
                }
                None => ArrayVec::new(),
            },
            collision: None,
            remaining: self.len.min(usize::MAX as u64) as usize,
        }
    }
}

impl<K, V> HashTrie<K, V>
where
    K: Debug,
    V: Debug,
{
    /// Writes a human-readable rendering of the tree structure, for
    /// diagnostics only.
    pub fn dump(&self, out: &mut impl io::Write) -> io::Result<()> {
        match &self.root {
            Some(root) => root.dump(out, 0),
            None => writeln!(out, "(empty)"),
        }
    }
}

impl<K, V> Default for HashTrie<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        HashTrie::new()
    }
}

impl<'a, K, V> IntoIterator for &'a HashTrie<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over all entries of a [`HashTrie`], in unspecified order.
pub struct Iter<'a, K, V> {
    stack: ArrayVec<std::slice::Iter<'a, Arc<Node<K, V>>>, MAX_DEPTH>,
    collision: Option<std::slice::Iter<'a, (K, V)>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entries) = &mut self.collision {
                if let Some((key, value)) = entries.next() {
                    self.remaining = self.remaining.saturating_sub(1);
                    return Some((key, value));
                }
                self.collision = None;
            }
            let iter = self.stack.last_mut()?;
            match iter.next() {
                Some(child) => match &**child {
                    Node::Leaf { key, value, .. } => {
                        self.remaining = self.remaining.saturating_sub(1);
                        return Some((key, value));
                    }
                    Node::Collision { entries, .. } => {
                        self.collision = Some(entries.iter());
                    }
                    Node::Branch { children, .. } => {
                        self.stack.push(children.iter());
                    }
                },
                None => {
                    self.stack.pop();
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> ExactSizeIterator for Iter<'a, K, V> {}

impl<'a, K, V> std::iter::FusedIterator for Iter<'a, K, V> {}

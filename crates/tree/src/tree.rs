use crate::node::{self, Link};

/// An ordered map from byte keys to byte values, backed by a persistent AVL tree.
///
/// Keys are ordered byte-lexicographically. Cloning is O(1): the clone shares every node with
/// the original and both evolve independently afterwards.
#[derive(Debug, Clone, Default)]
pub struct OrderedMap {
    root: Link,
    len: usize,
}

impl OrderedMap {
    /// Creates a new empty [OrderedMap].
    pub fn new() -> Self {
        OrderedMap { root: None, len: 0 }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fetches the value stored for `key`.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let mut link = &self.root;

        while let Some(node) = link {
            link = match key.cmp(node.key.as_slice()) {
                std::cmp::Ordering::Less => &node.left,
                std::cmp::Ordering::Greater => &node.right,
                std::cmp::Ordering::Equal => return Some(node.value.as_slice()),
            };
        }

        None
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Sets the (`key`; `value`) pair and returns the value it replaced, if any.
    pub fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) -> Option<Vec<u8>> {
        let replaced = node::insert(&mut self.root, key, value);
        if replaced.is_none() {
            self.len += 1;
        }

        replaced
    }

    /// Removes `key` and returns its value, if it was present.
    pub fn remove(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        // Avoid copying the search path of a shared tree for a missing key.
        if !self.contains_key(key) {
            return None;
        }

        let removed = node::remove(&mut self.root, key);
        if removed.is_some() {
            self.len -= 1;
        }

        removed
    }

    /// Visits every entry in ascending key order until `visit` returns `false`.
    pub fn ascend<F>(&self, mut visit: F)
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        node::ascend(&self.root, None, None, &mut visit);
    }

    /// Visits the entries with a key `>= pivot` in ascending order until `visit` returns `false`.
    pub fn ascend_greater_or_equal<F>(&self, pivot: &[u8], mut visit: F)
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        node::ascend(&self.root, Some(pivot), None, &mut visit);
    }

    /// Visits the entries with a key in `[ge, lt)` in ascending order until `visit` returns
    /// `false`.
    pub fn ascend_range<F>(&self, ge: &[u8], lt: &[u8], mut visit: F)
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        node::ascend(&self.root, Some(ge), Some(lt), &mut visit);
    }

    /// Visits every entry in descending key order until `visit` returns `false`.
    pub fn descend<F>(&self, mut visit: F)
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        node::descend(&self.root, None, &mut visit);
    }

    /// Visits the entries with a key `<= pivot` in descending order until `visit` returns
    /// `false`. Note that an entry equal to `pivot` is visited first.
    pub fn descend_less_or_equal<F>(&self, pivot: &[u8], mut visit: F)
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        node::descend(&self.root, Some(pivot), &mut visit);
    }
}

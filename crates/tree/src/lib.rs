//! A persistent ordered map over byte keys.
//!
//! [OrderedMap] is an AVL tree whose nodes are shared through [std::sync::Arc]. Cloning a map
//! is O(1) and the clone is an immutable snapshot: later mutations of either map copy the
//! touched path instead of modifying shared nodes.

mod node;
mod tree;

pub use tree::OrderedMap;

use std::{cmp, sync::Arc};

pub(crate) type Link = Option<Arc<Node>>;

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub height: u32,
    pub left: Link,
    pub right: Link,
}

impl Node {
    /// Creates a node without children.
    pub fn leaf(key: Vec<u8>, value: Vec<u8>) -> Self {
        Node {
            key,
            value,
            height: 1,
            left: None,
            right: None,
        }
    }

    /// Creates a node over the given children and computes its height.
    pub fn branch(key: Vec<u8>, value: Vec<u8>, left: Link, right: Link) -> Self {
        let mut node = Node {
            key,
            value,
            height: 0,
            left,
            right,
        };
        node.update_height();
        node
    }

    pub fn update_height(&mut self) {
        self.height = cmp::max(height(&self.left), height(&self.right)) + 1;
    }

    pub fn balance_factor(&self) -> i64 {
        height(&self.left) as i64 - height(&self.right) as i64
    }
}

fn height(link: &Link) -> u32 {
    link.as_ref().map_or(0, |n| n.height)
}

fn balance_factor(link: &Link) -> i64 {
    link.as_ref().map_or(0, |n| n.balance_factor())
}

/// Inserts (`key`; `value`) below `link` and returns the replaced value, if any.
pub(crate) fn insert(link: &mut Link, key: Vec<u8>, value: Vec<u8>) -> Option<Vec<u8>> {
    let replaced = match link {
        None => {
            *link = Some(Arc::new(Node::leaf(key, value)));
            return None;
        }
        Some(node) => {
            let node = Arc::make_mut(node);
            match key.as_slice().cmp(node.key.as_slice()) {
                cmp::Ordering::Less => insert(&mut node.left, key, value),
                cmp::Ordering::Greater => insert(&mut node.right, key, value),
                // Same key: the shape is unchanged, no need to rebalance.
                cmp::Ordering::Equal => return Some(std::mem::replace(&mut node.value, value)),
            }
        }
    };

    if replaced.is_none() {
        rebalance(link);
    }

    replaced
}

/// Removes `key` from below `link` and returns its value, if it was present.
pub(crate) fn remove(link: &mut Link, key: &[u8]) -> Option<Vec<u8>> {
    let ordering = key.cmp(link.as_ref()?.key.as_slice());

    let removed = match ordering {
        cmp::Ordering::Less => remove(&mut Arc::make_mut(link.as_mut()?).left, key),
        cmp::Ordering::Greater => remove(&mut Arc::make_mut(link.as_mut()?).right, key),
        cmp::Ordering::Equal => {
            let Node {
                value, left, right, ..
            } = Arc::unwrap_or_clone(link.take()?);

            *link = match (left, right) {
                (None, right) => right,
                (left, None) => left,
                (left, mut right) => match pop_min(&mut right) {
                    Some((key, value)) => Some(Arc::new(Node::branch(key, value, left, right))),
                    None => left,
                },
            };

            Some(value)
        }
    };

    if removed.is_some() {
        rebalance(link);
    }

    removed
}

/// Detaches the smallest entry below `link`.
fn pop_min(link: &mut Link) -> Option<(Vec<u8>, Vec<u8>)> {
    let node = Arc::make_mut(link.as_mut()?);

    if node.left.is_some() {
        let min = pop_min(&mut node.left);
        rebalance(link);
        return min;
    }

    let Node {
        key, value, right, ..
    } = Arc::unwrap_or_clone(link.take()?);
    *link = right;

    Some((key, value))
}

/// Refreshes the height of the node at `link` and restores the AVL invariant with at most two
/// rotations.
fn rebalance(link: &mut Link) {
    let Some(node) = link.as_mut() else {
        return;
    };
    let node = Arc::make_mut(node);
    node.update_height();

    let factor = node.balance_factor();
    if factor > 1 {
        if balance_factor(&node.left) < 0 {
            rotate_left(&mut node.left);
        }
        rotate_right(link);
    } else if factor < -1 {
        if balance_factor(&node.right) > 0 {
            rotate_right(&mut node.right);
        }
        rotate_left(link);
    }
}

fn rotate_right(link: &mut Link) {
    let Some(mut a) = link.take() else {
        return;
    };

    let a_mut = Arc::make_mut(&mut a);
    let Some(mut b) = a_mut.left.take() else {
        *link = Some(a);
        return;
    };

    let b_mut = Arc::make_mut(&mut b);
    a_mut.left = b_mut.right.take();
    a_mut.update_height();

    b_mut.right = Some(a);
    b_mut.update_height();

    *link = Some(b);
}

fn rotate_left(link: &mut Link) {
    let Some(mut a) = link.take() else {
        return;
    };

    let a_mut = Arc::make_mut(&mut a);
    let Some(mut b) = a_mut.right.take() else {
        *link = Some(a);
        return;
    };

    let b_mut = Arc::make_mut(&mut b);
    a_mut.right = b_mut.left.take();
    a_mut.update_height();

    b_mut.left = Some(a);
    b_mut.update_height();

    *link = Some(b);
}

/// In-order walk of the keys in `[ge, lt)`. Returns `false` as soon as the visitor asks to stop
/// or a key `>= lt` is reached.
pub(crate) fn ascend<F>(link: &Link, ge: Option<&[u8]>, lt: Option<&[u8]>, visit: &mut F) -> bool
where
    F: FnMut(&[u8], &[u8]) -> bool,
{
    let Some(node) = link else {
        return true;
    };

    let key = node.key.as_slice();
    let above_lower = ge.map_or(true, |ge| key >= ge);

    if above_lower && !ascend(&node.left, ge, lt, visit) {
        return false;
    }
    if lt.is_some_and(|lt| key >= lt) {
        return false;
    }
    if above_lower && !visit(key, node.value.as_slice()) {
        return false;
    }

    ascend(&node.right, ge, lt, visit)
}

/// Reverse in-order walk of the keys `<= le`. Returns `false` as soon as the visitor asks to
/// stop.
pub(crate) fn descend<F>(link: &Link, le: Option<&[u8]>, visit: &mut F) -> bool
where
    F: FnMut(&[u8], &[u8]) -> bool,
{
    let Some(node) = link else {
        return true;
    };

    let key = node.key.as_slice();
    let below_upper = le.map_or(true, |le| key <= le);

    if below_upper {
        if !descend(&node.right, le, visit) {
            return false;
        }
        if !visit(key, node.value.as_slice()) {
            return false;
        }
    }

    descend(&node.left, le, visit)
}

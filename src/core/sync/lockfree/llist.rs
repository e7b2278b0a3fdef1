/*!
 * Lock-Free Singly-Linked List
 * Push-only stack with non-mutating traversal, modelled on the kernel llist
 */

use arc_swap::ArcSwapOption;
use std::sync::Arc;

struct Node<T> {
    value: T,
    next: Option<Arc<Node<T>>>,
}

/// Lock-free singly-linked list
///
/// - **Push**: CAS loop on the head (`rcu`), safe from any number of producers
/// - **Traversal**: walks an immutable snapshot starting at the head that
///   was current when the walk began. Items pushed afterwards are missed;
///   items never disappear from under a walker because nodes are refcounted.
/// - **Drain**: [`Llist::take_all`] detaches the whole chain atomically
///
/// Iteration order is newest first, like `llist_for_each_entry`.
pub struct Llist<T> {
    head: ArcSwapOption<Node<T>>,
}

impl<T> Llist<T> {
    /// Create an empty list
    pub fn new() -> Self {
        Self {
            head: ArcSwapOption::empty(),
        }
    }

    /// Push a value at the head
    ///
    /// Returns true if the list was empty before the push.
    pub fn push(&self, value: T) -> bool
    where
        T: Clone,
    {
        let prev = self.head.rcu(|head| {
            Some(Arc::new(Node {
                value: value.clone(),
                next: head.clone(),
            }))
        });
        prev.is_none()
    }

    /// Check if the list is empty (racy snapshot)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load().is_none()
    }

    /// Count entries in the current snapshot
    pub fn len(&self) -> usize {
        self.iter_nodes().count()
    }

    /// Visit every value in the current snapshot, newest first
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&T),
    {
        for node in self.iter_nodes() {
            f(&node.value);
        }
    }

    fn iter_nodes(&self) -> NodeIter<T> {
        NodeIter {
            next: self.head.load_full(),
        }
    }
}

impl<T: Clone> Llist<T> {
    /// Iterate over clones of the values in the current snapshot
    pub fn iter(&self) -> impl Iterator<Item = T> {
        self.iter_nodes().map(|node| node.value.clone())
    }

    /// Detach the whole chain and return its values, oldest first
    pub fn take_all(&self) -> Vec<T> {
        let mut next = self.head.swap(None);
        let mut values = Vec::new();
        while let Some(node) = next {
            values.push(node.value.clone());
            next = node.next.clone();
        }
        values.reverse();
        values
    }
}

impl<T> Default for Llist<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Llist<T> {
    fn drop(&mut self) {
        // Unlink iteratively so long chains don't recurse through Arc drops
        let mut next = self.head.swap(None);
        while let Some(node) = next {
            next = match Arc::try_unwrap(node) {
                Ok(mut n) => n.next.take(),
                Err(_) => None,
            };
        }
    }
}

impl<T> std::fmt::Debug for Llist<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Llist").field("len", &self.len()).finish()
    }
}

struct NodeIter<T> {
    next: Option<Arc<Node<T>>>,
}

impl<T> Iterator for NodeIter<T> {
    type Item = Arc<Node<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next.take()?;
        self.next = node.next.clone();
        Some(node)
    }
}

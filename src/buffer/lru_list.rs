//! LruList - a bucket's membership list, ordered by recency of release.
//!
//! A circular doubly linked list threaded through slot ids instead of
//! pointers. Every link edit in the cache goes through this type.
//!
//! ```text
//!   head (MRU)                              tail (LRU)
//!      │                                        │
//!      ▼                                        ▼
//!  ┌───────┐ next ┌───────┐ next      next ┌───────┐
//!  │Slot(4)│─────▶│Slot(0)│──▶ ... ──────▶│Slot(7)│──┐
//!  └───────┘◀─────└───────┘◀── ... ◀──────└───────┘  │
//!      ▲     prev                                    │
//!      └──────────────────── next ───────────────────┘
//! ```

use std::collections::HashMap;

use crate::common::SlotId;

struct Node<T> {
    prev: SlotId,
    next: SlotId,
    value: T,
}

/// An ordered set of slots with per-slot values.
///
/// `push_front`, `remove` and `move_to_front` are O(1). Iteration runs
/// either head→tail ([`iter`](LruList::iter), most recent first) or
/// tail→head ([`iter_lru`](LruList::iter_lru), least recent first).
pub struct LruList<T> {
    nodes: HashMap<SlotId, Node<T>>,
    head: Option<SlotId>,
}

impl<T> LruList<T> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            head: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    #[inline]
    pub fn contains(&self, id: SlotId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Most recently inserted or moved slot.
    #[inline]
    pub fn front(&self) -> Option<SlotId> {
        self.head
    }

    /// Least recently inserted or moved slot.
    pub fn back(&self) -> Option<SlotId> {
        self.head.map(|head| self.node(head).prev)
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.nodes.get(&id).map(|n| &n.value)
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        self.nodes.get_mut(&id).map(|n| &mut n.value)
    }

    /// Link `id` at the head.
    ///
    /// # Panics
    /// Panics if `id` is already linked.
    pub fn push_front(&mut self, id: SlotId, value: T) {
        assert!(!self.contains(id), "{} is already linked", id);

        match self.head {
            None => {
                self.nodes.insert(
                    id,
                    Node {
                        prev: id,
                        next: id,
                        value,
                    },
                );
            }
            Some(head) => {
                let tail = self.node(head).prev;
                self.nodes.insert(
                    id,
                    Node {
                        prev: tail,
                        next: head,
                        value,
                    },
                );
                self.node_mut(head).prev = id;
                self.node_mut(tail).next = id;
            }
        }

        self.head = Some(id);
    }

    /// Unlink `id`, returning its value.
    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        let node = self.nodes.remove(&id)?;

        if node.next == id {
            // Last member
            self.head = None;
        } else {
            self.node_mut(node.prev).next = node.next;
            self.node_mut(node.next).prev = node.prev;
            if self.head == Some(id) {
                self.head = Some(node.next);
            }
        }

        Some(node.value)
    }

    /// Relink `id` at the head. Returns false if `id` is not linked.
    pub fn move_to_front(&mut self, id: SlotId) -> bool {
        if self.head == Some(id) {
            return true;
        }
        match self.remove(id) {
            Some(value) => {
                self.push_front(id, value);
                true
            }
            None => false,
        }
    }

    /// Iterate head→tail (most to least recent).
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.head,
            remaining: self.len(),
            forward: true,
        }
    }

    /// Iterate tail→head (least to most recent).
    pub fn iter_lru(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.back(),
            remaining: self.len(),
            forward: false,
        }
    }

    fn node(&self, id: SlotId) -> &Node<T> {
        match self.nodes.get(&id) {
            Some(node) => node,
            None => unreachable!("{} is not linked", id),
        }
    }

    fn node_mut(&mut self, id: SlotId) -> &mut Node<T> {
        match self.nodes.get_mut(&id) {
            Some(node) => node,
            None => unreachable!("{} is not linked", id),
        }
    }
}

impl<T> Default for LruList<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over `(SlotId, &T)` in list order.
pub struct Iter<'a, T> {
    list: &'a LruList<T>,
    cursor: Option<SlotId>,
    remaining: usize,
    forward: bool,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (SlotId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.cursor?;
        let node = self.list.node(id);

        self.remaining -= 1;
        self.cursor = Some(if self.forward { node.next } else { node.prev });

        Some((id, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

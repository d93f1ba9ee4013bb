//! Statement ordering.
//!
//! `Layout` keeps every statement list of a shader as a doubly-linked list
//! threaded through entity maps. Insertion before/after a statement, removal
//! and splicing a whole list onto another are O(1). Layout only tracks WHERE
//! statements are, not WHAT they are.

use alloc::vec::Vec;

use crate::{
    entity::{Inst, List},
    entity_map::PrimaryMap,
};

#[derive(Debug, Clone, Copy, Default)]
struct InstNode {
    prev: Option<Inst>,
    next: Option<Inst>,
}

#[derive(Debug, Clone, Copy, Default)]
struct ListHead {
    first: Option<Inst>,
    last: Option<Inst>,
}

/// Ordering of statements inside statement lists.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    lists: PrimaryMap<List, ListHead>,
    insts: PrimaryMap<Inst, InstNode>,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty list
    pub fn make_list(&mut self) -> List {
        self.lists.push(ListHead::default())
    }

    /// Make sure `inst` has a link node. Must be called for every statement
    /// allocated in the shader, in allocation order.
    pub(crate) fn ensure_inst(&mut self, inst: Inst) {
        while self.insts.len() <= crate::entity::EntityRef::index(inst) {
            self.insts.push(InstNode::default());
        }
    }

    pub fn first(&self, list: List) -> Option<Inst> {
        self.lists[list].first
    }

    pub fn last(&self, list: List) -> Option<Inst> {
        self.lists[list].last
    }

    pub fn next(&self, inst: Inst) -> Option<Inst> {
        self.insts[inst].next
    }

    pub fn prev(&self, inst: Inst) -> Option<Inst> {
        self.insts[inst].prev
    }

    pub fn is_empty(&self, list: List) -> bool {
        self.lists[list].first.is_none()
    }

    /// Append `inst` to the end of `list`
    pub fn push_back(&mut self, list: List, inst: Inst) {
        let last = self.lists[list].last;
        self.insts[inst] = InstNode {
            prev: last,
            next: None,
        };
        match last {
            Some(last) => self.insts[last].next = Some(inst),
            None => self.lists[list].first = Some(inst),
        }
        self.lists[list].last = Some(inst);
    }

    /// Prepend `inst` to the start of `list`
    pub fn push_front(&mut self, list: List, inst: Inst) {
        let first = self.lists[list].first;
        self.insts[inst] = InstNode {
            prev: None,
            next: first,
        };
        match first {
            Some(first) => self.insts[first].prev = Some(inst),
            None => self.lists[list].last = Some(inst),
        }
        self.lists[list].first = Some(inst);
    }

    /// Insert `inst` immediately before `before`, which must be in `list`
    pub fn insert_before(&mut self, list: List, inst: Inst, before: Inst) {
        debug_assert!(self.contains(list, before));
        let prev = self.insts[before].prev;
        self.insts[inst] = InstNode {
            prev,
            next: Some(before),
        };
        self.insts[before].prev = Some(inst);
        match prev {
            Some(prev) => self.insts[prev].next = Some(inst),
            None => self.lists[list].first = Some(inst),
        }
    }

    /// Insert `inst` immediately after `after`, which must be in `list`
    pub fn insert_after(&mut self, list: List, inst: Inst, after: Inst) {
        debug_assert!(self.contains(list, after));
        let next = self.insts[after].next;
        self.insts[inst] = InstNode {
            prev: Some(after),
            next,
        };
        self.insts[after].next = Some(inst);
        match next {
            Some(next) => self.insts[next].prev = Some(inst),
            None => self.lists[list].last = Some(inst),
        }
    }

    /// Unlink `inst` from `list`
    pub fn remove(&mut self, list: List, inst: Inst) {
        debug_assert!(self.contains(list, inst));
        let InstNode { prev, next } = self.insts[inst];
        match prev {
            Some(prev) => self.insts[prev].next = next,
            None => self.lists[list].first = next,
        }
        match next {
            Some(next) => self.insts[next].prev = prev,
            None => self.lists[list].last = prev,
        }
        self.insts[inst] = InstNode::default();
    }

    /// Move every statement of `src` to the end of `dst`, leaving `src` empty
    pub fn splice_back(&mut self, dst: List, src: List) {
        let ListHead { first, last } = self.lists[src];
        let (Some(first), Some(last)) = (first, last) else {
            return;
        };
        match self.lists[dst].last {
            Some(tail) => {
                self.insts[tail].next = Some(first);
                self.insts[first].prev = Some(tail);
            }
            None => self.lists[dst].first = Some(first),
        }
        self.lists[dst].last = Some(last);
        self.lists[src] = ListHead::default();
    }

    /// Move every statement of `src` to the start of `dst`, leaving `src` empty
    pub fn splice_front(&mut self, dst: List, src: List) {
        let ListHead { first, last } = self.lists[src];
        let (Some(first), Some(last)) = (first, last) else {
            return;
        };
        match self.lists[dst].first {
            Some(head) => {
                self.insts[last].next = Some(head);
                self.insts[head].prev = Some(last);
            }
            None => self.lists[dst].last = Some(last),
        }
        self.lists[dst].first = Some(first);
        self.lists[src] = ListHead::default();
    }

    /// Iterate over the statements of `list` in order
    pub fn iter(&self, list: List) -> Insts<'_> {
        Insts {
            layout: self,
            next: self.lists[list].first,
        }
    }

    /// Snapshot of `list`, for passes that mutate while walking
    pub fn collect(&self, list: List) -> Vec<Inst> {
        self.iter(list).collect()
    }

    pub fn len(&self, list: List) -> usize {
        self.iter(list).count()
    }

    fn contains(&self, list: List, inst: Inst) -> bool {
        self.iter(list).any(|i| i == inst)
    }
}

/// Iterator over the statements of a list.
pub struct Insts<'a> {
    layout: &'a Layout,
    next: Option<Inst>,
}

impl Iterator for Insts<'_> {
    type Item = Inst;

    fn next(&mut self) -> Option<Inst> {
        let current = self.next?;
        self.next = self.layout.insts[current].next;
        Some(current)
    }
}

/*
 * Created on Wed Mar 13 2024
 *
 * This file is a part of Skytable
 * Skytable (formerly known as TerrabaseDB or Skybase) is a free and open-source
 * NoSQL database written by Sayan Nandan ("the Author") with the
 * vision to provide flexibility in data modelling without compromising
 * on performance, queryability or scalability.
 *
 * Copyright (c) 2024, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

use {
    super::{
        cow::{FreeStatus, OwnerId, TreeContext},
        TreeItem,
    },
    core::mem,
    std::sync::Arc,
};

pub(super) type NodeRef<T> = Arc<Node<T>>;

/// One tree node. `children` is either empty (leaf) or holds exactly `items.len() + 1`
/// links; `items` is sorted strictly ascending under the item order. `owner` names the
/// sole identity allowed to write to this node in place
pub(super) struct Node<T> {
    pub(super) items: Vec<T>,
    pub(super) children: Vec<NodeRef<T>>,
    pub(super) owner: OwnerId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RemoveMode {
    /// remove the item equal to the probe
    Exact,
    /// remove the leftmost item of the subtree
    Min,
    /// remove the rightmost item of the subtree
    Max,
}

impl<T> Node<T> {
    pub(super) const fn empty() -> Self {
        Self {
            items: Vec::new(),
            children: Vec::new(),
            owner: OwnerId::NONE,
        }
    }
    #[inline(always)]
    pub(super) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

impl<T: TreeItem> Node<T> {
    /// Binary search under the strict order: returns the first index whose item does not
    /// sort before `key`, and whether the item there is equal to `key`
    pub(super) fn find(&self, key: &T) -> (usize, bool) {
        let i = self.items.partition_point(|item| item.sorts_before(key));
        let found = i < self.items.len() && !key.sorts_before(&self.items[i]);
        (i, found)
    }
    /// Clone-on-write promotion of a node slot. A foreign-tagged node is copied into a
    /// pool node owned by `cow` (the children keep pointing at the shared subtrees) and
    /// the slot is repointed at the copy; a matching tag means this handle already holds
    /// the only path to the node
    pub(super) fn make_mut<'a>(slot: &'a mut NodeRef<T>, cow: &TreeContext<T>) -> &'a mut Node<T> {
        if slot.owner != cow.owner() {
            let mut copy = cow.acquire();
            match Arc::get_mut(&mut copy) {
                Some(node) => {
                    node.items.extend(slot.items.iter().cloned());
                    node.children.extend(slot.children.iter().cloned());
                }
                None => impossible!(),
            }
            cow.hpromote();
            *slot = copy;
        }
        match Arc::get_mut(slot) {
            Some(node) => node,
            None => impossible!(),
        }
    }
    /// Promote child `i` in place and return it writable. `self` must already be writable
    #[inline(always)]
    pub(super) fn mutable_child(&mut self, i: usize, cow: &TreeContext<T>) -> &mut Node<T> {
        Self::make_mut(&mut self.children[i], cow)
    }
    /// Precondition: the node is full and `i` is the median offset. Yields the median item
    /// and a new right sibling holding everything above it, tagged with the caller's
    /// identity. `self` keeps items `[0, i)` and, if interior, children `[0, i]`
    pub(super) fn split(&mut self, i: usize, cow: &TreeContext<T>) -> (T, NodeRef<T>) {
        let mut sibling = cow.acquire();
        match Arc::get_mut(&mut sibling) {
            Some(next) => {
                next.items.extend(self.items.drain(i + 1..));
                if !self.is_leaf() {
                    next.children.extend(self.children.drain(i + 1..));
                }
            }
            None => impossible!(),
        }
        let median = match self.items.pop() {
            Some(item) => item,
            None => impossible!(),
        };
        (median, sibling)
    }
    /// Split child `i` if it is full, pulling the median up into `self` at position `i`.
    /// Returns whether a split happened. `self` must be writable and not full
    pub(super) fn maybe_split_child(
        &mut self,
        i: usize,
        max_items: usize,
        cow: &TreeContext<T>,
    ) -> bool {
        if self.children[i].items.len() < max_items {
            return false;
        }
        let (median, sibling) = self.mutable_child(i, cow).split(max_items / 2, cow);
        self.items.insert(i, median);
        self.children.insert(i + 1, sibling);
        true
    }
    /// Insert below `self` (writable, not full). An exact hit replaces in place and
    /// returns the previous item; full children are split before descending so the
    /// recursion never enters a node it could not insert into
    pub(super) fn insert(&mut self, item: T, max_items: usize, cow: &TreeContext<T>) -> Option<T> {
        let (mut i, found) = self.find(&item);
        if found {
            return Some(mem::replace(&mut self.items[i], item));
        }
        if self.is_leaf() {
            self.items.insert(i, item);
            return None;
        }
        if self.maybe_split_child(i, max_items, cow) {
            if self.items[i].sorts_before(&item) {
                i += 1;
            } else if !item.sorts_before(&self.items[i]) {
                // the split pushed an equal separator up
                return Some(mem::replace(&mut self.items[i], item));
            }
        }
        self.mutable_child(i, cow).insert(item, max_items, cow)
    }
    pub(super) fn lookup(&self, key: &T) -> Option<&T> {
        let (i, found) = self.find(key);
        if found {
            Some(&self.items[i])
        } else if self.is_leaf() {
            None
        } else {
            self.children[i].lookup(key)
        }
    }
    pub(super) fn first(&self) -> Option<&T> {
        let mut n = self;
        while let Some(child) = n.children.first() {
            n = child;
        }
        n.items.first()
    }
    pub(super) fn last(&self) -> Option<&T> {
        let mut n = self;
        while let Some(child) = n.children.last() {
            n = child;
        }
        n.items.last()
    }
    /// Remove below `self` (writable). The descent only ever enters a child holding more
    /// than `min_items` items; a child at the minimum is grown first, so no recursive
    /// step can leave a node underfull
    pub(super) fn remove(
        &mut self,
        key: Option<&T>,
        min_items: usize,
        mode: RemoveMode,
        cow: &TreeContext<T>,
    ) -> Option<T> {
        let i;
        let mut found = false;
        match mode {
            RemoveMode::Max => {
                if self.is_leaf() {
                    return self.items.pop();
                }
                i = self.items.len();
            }
            RemoveMode::Min => {
                if self.is_leaf() {
                    if self.items.is_empty() {
                        return None;
                    }
                    return Some(self.items.remove(0));
                }
                i = 0;
            }
            RemoveMode::Exact => {
                let probe = match key {
                    Some(probe) => probe,
                    None => impossible!(),
                };
                let (idx, hit) = self.find(probe);
                if self.is_leaf() {
                    return hit.then(|| self.items.remove(idx));
                }
                i = idx;
                found = hit;
            }
        }
        if self.children[i].items.len() <= min_items {
            return self.grow_child_and_remove(i, key, min_items, mode, cow);
        }
        if found {
            // the hit sits in this interior node: swap in the greatest item of the left
            // subtree and hand the original back
            let predecessor = self
                .mutable_child(i, cow)
                .remove(None, min_items, RemoveMode::Max, cow);
            return match predecessor {
                Some(p) => Some(mem::replace(&mut self.items[i], p)),
                None => impossible!(),
            };
        }
        self.mutable_child(i, cow).remove(key, min_items, mode, cow)
    }
    /// Child `i` sits at the minimum: feed it an item (rotation from a richer sibling,
    /// else a merge with one) and restart the removal at `self`, whose layout may have
    /// shifted under the merge
    fn grow_child_and_remove(
        &mut self,
        mut i: usize,
        key: Option<&T>,
        min_items: usize,
        mode: RemoveMode,
        cow: &TreeContext<T>,
    ) -> Option<T> {
        if i > 0 && self.children[i - 1].items.len() > min_items {
            // rotate through the left separator: it drops to the child's front while the
            // left sibling's last item moves up to replace it
            let (stolen, carry) = {
                let left = self.mutable_child(i - 1, cow);
                let stolen = match left.items.pop() {
                    Some(item) => item,
                    None => impossible!(),
                };
                (stolen, left.children.pop())
            };
            let separator = mem::replace(&mut self.items[i - 1], stolen);
            let child = self.mutable_child(i, cow);
            child.items.insert(0, separator);
            if let Some(carry) = carry {
                child.children.insert(0, carry);
            }
        } else if i < self.items.len() && self.children[i + 1].items.len() > min_items {
            // mirror image with the right sibling
            let (stolen, carry) = {
                let right = self.mutable_child(i + 1, cow);
                let stolen = right.items.remove(0);
                let carry = if right.is_leaf() {
                    None
                } else {
                    Some(right.children.remove(0))
                };
                (stolen, carry)
            };
            let separator = mem::replace(&mut self.items[i], stolen);
            let child = self.mutable_child(i, cow);
            child.items.push(separator);
            if let Some(carry) = carry {
                child.children.push(carry);
            }
        } else {
            if i >= self.items.len() {
                // the position trails the last separator, so the merge partner is on the
                // left; shift down so `i` still names the surviving child
                i -= 1;
            }
            let separator = self.items.remove(i);
            let mut dead = self.children.remove(i + 1);
            let child = self.mutable_child(i, cow);
            child.items.push(separator);
            if dead.owner == cow.owner() {
                match Arc::get_mut(&mut dead) {
                    Some(dead) => {
                        child.items.append(&mut dead.items);
                        child.children.append(&mut dead.children);
                    }
                    None => impossible!(),
                }
            } else {
                child.items.extend(dead.items.iter().cloned());
                child.children.extend(dead.children.iter().cloned());
            }
            cow.free_node(dead);
        }
        self.remove(key, min_items, mode, cow)
    }
    /// Post-order teardown for wholesale clears: children first, then `n` itself goes to
    /// the pool. Returns false once the pool reports full, stopping the whole walk. A
    /// foreign-owned node is pruned outright: ownership is only ever granted top-down,
    /// so nothing below it can be ours
    pub(super) fn reset(mut n: NodeRef<T>, cow: &TreeContext<T>) -> bool {
        if n.owner != cow.owner() {
            return true;
        }
        let node = match Arc::get_mut(&mut n) {
            Some(node) => node,
            None => impossible!(),
        };
        for child in node.children.drain(..) {
            if !Self::reset(child, cow) {
                return false;
            }
        }
        cow.free_node(n) != FreeStatus::PoolFull
    }
}

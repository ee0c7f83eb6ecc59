/*
 * Created on Fri Mar 15 2024
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

mod cow;
mod freelist;
mod iter;
mod node;
#[cfg(test)]
mod tests;

use {
    self::{
        cow::TreeContext,
        iter::Direction,
        node::{Node, NodeRef, RemoveMode},
    },
    crate::error::{TreeError, TreeResult},
    core::{fmt, mem},
    log::trace,
    std::sync::Arc,
};

pub use self::{
    freelist::{FreeList, DEFAULT_FREELIST_SIZE},
    iter::Iter,
};

/// Any type implementing this trait can be used as an item in the ordered tree index.
/// [`TreeItem::sorts_before`] must be a strict total order; the tree derives key equality
/// from it (two items carry the same key iff neither sorts before the other) and never
/// calls [`PartialEq`]. Items also serve as probes, so lookups take a value of the same
/// type. Every `T: Ord + Clone` qualifies through the blanket impl; a type that needs a
/// different order (say, a record keyed by one field) wraps itself behind an [`Ord`]
/// tailored to that key
pub trait TreeItem: Clone {
    fn sorts_before(&self, other: &Self) -> bool;
}

impl<T: Ord + Clone> TreeItem for T {
    #[inline(always)]
    fn sorts_before(&self, other: &Self) -> bool {
        self < other
    }
}

/// An ordered in-memory index with copy-on-write snapshots.
///
/// A handle is single-writer: every mutation takes `&mut self`. [`BTree::snapshot`] yields
/// a second logical tree in O(1) that shares the entire node graph with this one; each
/// handle then copies the nodes on its own write paths lazily, so the two handles may be
/// driven from different threads without ever observing each other's mutations.
///
/// Node storage cycles through a [`FreeList`] which can be shared between any number of
/// trees; see [`BTree::with_freelist`]
pub struct BTree<T> {
    degree: usize,
    length: usize,
    root: Option<NodeRef<T>>,
    cow: TreeContext<T>,
}

impl<T: TreeItem> BTree<T> {
    /// New empty tree with a private freelist of [`DEFAULT_FREELIST_SIZE`] nodes. A node
    /// holds between `degree - 1` and `2 * degree - 1` items; `degree` must be at least 2
    pub fn new(degree: usize) -> TreeResult<Self> {
        Self::with_freelist(degree, Arc::new(FreeList::new(DEFAULT_FREELIST_SIZE)))
    }
    /// New empty tree recycling node storage through `pool`, which may be shared by any
    /// number of trees and snapshots, across threads
    pub fn with_freelist(degree: usize, pool: Arc<FreeList<T>>) -> TreeResult<Self> {
        if degree < 2 {
            return Err(TreeError::InvalidDegree);
        }
        Ok(Self {
            degree,
            length: 0,
            root: None,
            cow: TreeContext::mint(pool),
        })
    }
    #[inline(always)]
    const fn max_items(&self) -> usize {
        self.degree * 2 - 1
    }
    #[inline(always)]
    const fn min_items(&self) -> usize {
        self.degree - 1
    }
    /// Insert `item`, or replace the stored item carrying the same key and return it.
    /// The length grows only on a true insert
    pub fn insert_or_replace(&mut self, item: T) -> Option<T> {
        let max = self.max_items();
        let mut root = match self.root.take() {
            Some(root) => root,
            None => {
                let mut root = self.cow.acquire();
                match Arc::get_mut(&mut root) {
                    Some(node) => node.items.push(item),
                    None => impossible!(),
                }
                self.root = Some(root);
                self.length += 1;
                return None;
            }
        };
        Node::make_mut(&mut root, &self.cow);
        if root.items.len() >= max {
            // grow a level: the old root's median becomes the single item of a new root
            let (median, sibling) = Node::make_mut(&mut root, &self.cow).split(max / 2, &self.cow);
            let mut grown = self.cow.acquire();
            match Arc::get_mut(&mut grown) {
                Some(node) => {
                    node.items.push(median);
                    node.children.push(root);
                    node.children.push(sibling);
                }
                None => impossible!(),
            }
            root = grown;
        }
        let previous = Node::make_mut(&mut root, &self.cow).insert(item, max, &self.cow);
        self.root = Some(root);
        if previous.is_none() {
            self.length += 1;
        }
        previous
    }
    /// Remove and return the stored item carrying the same key as `key`
    pub fn remove(&mut self, key: &T) -> Option<T> {
        self.remove_internal(Some(key), RemoveMode::Exact)
    }
    /// Remove and return the smallest item
    pub fn remove_min(&mut self) -> Option<T> {
        self.remove_internal(None, RemoveMode::Min)
    }
    /// Remove and return the greatest item
    pub fn remove_max(&mut self) -> Option<T> {
        self.remove_internal(None, RemoveMode::Max)
    }
    fn remove_internal(&mut self, key: Option<&T>, mode: RemoveMode) -> Option<T> {
        let mut root = match self.root.take() {
            Some(root) => root,
            None => return None,
        };
        if root.items.is_empty() {
            self.root = Some(root);
            return None;
        }
        let min = self.min_items();
        let out = Node::make_mut(&mut root, &self.cow).remove(key, min, mode, &self.cow);
        if root.items.is_empty() && !root.children.is_empty() {
            // the root ran dry: pull its only surviving child up one level
            let surviving = root.children[0].clone();
            let dead = mem::replace(&mut root, surviving);
            self.cow.free_node(dead);
        }
        self.root = Some(root);
        if out.is_some() {
            self.length -= 1;
        }
        out
    }
    /// Look up the stored item carrying the same key as `key`
    pub fn get(&self, key: &T) -> Option<&T> {
        self.root.as_ref()?.lookup(key)
    }
    pub fn contains(&self, key: &T) -> bool {
        self.get(key).is_some()
    }
    /// The smallest stored item
    pub fn min(&self) -> Option<&T> {
        self.root.as_ref()?.first()
    }
    /// The greatest stored item
    pub fn max(&self) -> Option<&T> {
        self.root.as_ref()?.last()
    }
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.length
    }
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Drop every item. With `return_to_freelist` the nodes this handle exclusively owns
    /// are walked post-order and handed back to the pool, stopping as soon as the pool
    /// reports full; nodes shared with snapshots always stay with them
    pub fn clear(&mut self, return_to_freelist: bool) {
        if let Some(root) = self.root.take() {
            if return_to_freelist {
                trace!("clear: walking owned nodes back into the freelist");
                Node::reset(root, &self.cow);
            }
        }
        self.length = 0;
    }
    /// O(1) logical clone. Both handles walk away with freshly minted write identities,
    /// so the entire current node graph becomes shared: whichever handle mutates first
    /// copies its way down, and the other never observes the change. The freelist is
    /// shared between the two
    pub fn snapshot(&mut self) -> BTree<T> {
        let pool = self.cow.pool().clone();
        self.cow = TreeContext::mint(pool.clone());
        trace!("tree snapshotted, all nodes now shared");
        BTree {
            degree: self.degree,
            length: self.length,
            root: self.root.clone(),
            cow: TreeContext::mint(pool),
        }
    }
    /// Ascending iterator over the items
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self.root.as_ref())
    }
    /// Visit every item in ascending order. The visitor returns false to stop early
    pub fn ascend<F>(&self, mut f: F)
    where
        F: FnMut(&T) -> bool,
    {
        if let Some(root) = self.root.as_ref() {
            root.iterate(Direction::Ascending, None, None, false, false, &mut f);
        }
    }
    /// Ascending visit of the items in `[geq, lt)`
    pub fn ascend_range<F>(&self, geq: &T, lt: &T, mut f: F)
    where
        F: FnMut(&T) -> bool,
    {
        if let Some(root) = self.root.as_ref() {
            root.iterate(Direction::Ascending, Some(geq), Some(lt), true, false, &mut f);
        }
    }
    /// Ascending visit of the items strictly below `lt`
    pub fn ascend_less_than<F>(&self, lt: &T, mut f: F)
    where
        F: FnMut(&T) -> bool,
    {
        if let Some(root) = self.root.as_ref() {
            root.iterate(Direction::Ascending, None, Some(lt), false, false, &mut f);
        }
    }
    /// Ascending visit of the items at or above `geq`
    pub fn ascend_greater_or_equal<F>(&self, geq: &T, mut f: F)
    where
        F: FnMut(&T) -> bool,
    {
        if let Some(root) = self.root.as_ref() {
            root.iterate(Direction::Ascending, Some(geq), None, true, false, &mut f);
        }
    }
    /// Visit every item in descending order. The visitor returns false to stop early
    pub fn descend<F>(&self, mut f: F)
    where
        F: FnMut(&T) -> bool,
    {
        if let Some(root) = self.root.as_ref() {
            root.iterate(Direction::Descending, None, None, false, false, &mut f);
        }
    }
    /// Descending visit of the items in `(gt, leq]`, greatest first
    pub fn descend_range<F>(&self, leq: &T, gt: &T, mut f: F)
    where
        F: FnMut(&T) -> bool,
    {
        if let Some(root) = self.root.as_ref() {
            root.iterate(
                Direction::Descending,
                Some(leq),
                Some(gt),
                true,
                false,
                &mut f,
            );
        }
    }
    /// Descending visit of the items at or below `leq`
    pub fn descend_less_or_equal<F>(&self, leq: &T, mut f: F)
    where
        F: FnMut(&T) -> bool,
    {
        if let Some(root) = self.root.as_ref() {
            root.iterate(Direction::Descending, Some(leq), None, true, false, &mut f);
        }
    }
    /// Descending visit of the items strictly above `gt`
    pub fn descend_greater_than<F>(&self, gt: &T, mut f: F)
    where
        F: FnMut(&T) -> bool,
    {
        if let Some(root) = self.root.as_ref() {
            root.iterate(Direction::Descending, None, Some(gt), false, false, &mut f);
        }
    }
}

impl<'a, T: TreeItem> IntoIterator for &'a BTree<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: TreeItem + fmt::Debug> fmt::Debug for BTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

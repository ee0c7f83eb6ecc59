/*
 * Created on Thu Mar 14 2024
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

use super::{
    node::{Node, NodeRef},
    TreeItem,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Direction {
    Ascending,
    Descending,
}

impl<T: TreeItem> Node<T> {
    /// In-order traversal with optional bounds, in either direction. `hit` tracks whether
    /// the first qualifying item has already been emitted, so the include-start decision
    /// is taken exactly once per traversal. The second flag of the return value is false
    /// iff the walk stopped early (visitor halt or stop bound), which short-circuits
    /// every enclosing level; subtrees wholly outside the start bound are skipped via
    /// binary search
    pub(super) fn iterate<F>(
        &self,
        dir: Direction,
        start: Option<&T>,
        stop: Option<&T>,
        include_start: bool,
        mut hit: bool,
        f: &mut F,
    ) -> (bool, bool)
    where
        F: FnMut(&T) -> bool,
    {
        match dir {
            Direction::Ascending => {
                let index = match start {
                    Some(start) => self.find(start).0,
                    None => 0,
                };
                for i in index..self.items.len() {
                    if !self.is_leaf() {
                        let (h, more) =
                            self.children[i].iterate(dir, start, stop, include_start, hit, f);
                        hit = h;
                        if !more {
                            return (hit, false);
                        }
                    }
                    let item = &self.items[i];
                    if !include_start && !hit && start.map_or(false, |s| !s.sorts_before(item)) {
                        hit = true;
                        continue;
                    }
                    hit = true;
                    if let Some(stop) = stop {
                        if !item.sorts_before(stop) {
                            return (hit, false);
                        }
                    }
                    if !f(item) {
                        return (hit, false);
                    }
                }
                if let Some(last) = self.children.last() {
                    let (h, more) = last.iterate(dir, start, stop, include_start, hit, f);
                    hit = h;
                    if !more {
                        return (hit, false);
                    }
                }
            }
            Direction::Descending => {
                let mut i = match start {
                    Some(start) => {
                        let (index, found) = self.find(start);
                        if found {
                            index as isize
                        } else {
                            index as isize - 1
                        }
                    }
                    None => self.items.len() as isize - 1,
                };
                while i >= 0 {
                    let item = &self.items[i as usize];
                    if let Some(start) = start {
                        // items above the start (or the start itself, once emitted or
                        // excluded) fall away together with their right subtrees
                        if !item.sorts_before(start)
                            && (!include_start || hit || start.sorts_before(item))
                        {
                            i -= 1;
                            continue;
                        }
                    }
                    if !self.is_leaf() {
                        let (h, more) = self.children[(i + 1) as usize]
                            .iterate(dir, start, stop, include_start, hit, f);
                        hit = h;
                        if !more {
                            return (hit, false);
                        }
                    }
                    if let Some(stop) = stop {
                        if !stop.sorts_before(item) {
                            return (hit, false);
                        }
                    }
                    hit = true;
                    if !f(item) {
                        return (hit, false);
                    }
                    i -= 1;
                }
                if let Some(first) = self.children.first() {
                    let (h, more) = first.iterate(dir, start, stop, include_start, hit, f);
                    hit = h;
                    if !more {
                        return (hit, false);
                    }
                }
            }
        }
        (hit, true)
    }
}

/// Ascending in-order iterator over a tree's items. Holds a shared borrow of the tree,
/// so the tree cannot be mutated while the iterator is live
pub struct Iter<'a, T> {
    stack: Vec<(&'a Node<T>, usize)>,
}

impl<'a, T> Iter<'a, T> {
    pub(super) fn new(root: Option<&'a NodeRef<T>>) -> Self {
        let mut slf = Self { stack: Vec::new() };
        if let Some(root) = root {
            slf.push_leftmost(root.as_ref());
        }
        slf
    }
    fn push_leftmost(&mut self, mut n: &'a Node<T>) {
        loop {
            self.stack.push((n, 0));
            match n.children.first() {
                Some(child) => n = child,
                None => break,
            }
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;
    fn next(&mut self) -> Option<Self::Item> {
        while let Some((n, i)) = self.stack.pop() {
            if i < n.items.len() {
                self.stack.push((n, i + 1));
                if let Some(child) = n.children.get(i + 1) {
                    self.push_leftmost(child);
                }
                return Some(&n.items[i]);
            }
        }
        None
    }
}

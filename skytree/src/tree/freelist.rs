/*
 * Created on Tue Mar 12 2024
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
    super::node::{Node, NodeRef},
    core::fmt,
    parking_lot::Mutex,
    std::sync::Arc,
};

/// Pool capacity used when a tree is constructed without an explicit freelist
pub const DEFAULT_FREELIST_SIZE: usize = 32;

/// A bounded pool of retired node buffers. Wrap it in an [`Arc`](std::sync::Arc) to share
/// one pool between any number of trees and snapshots; the two operations are short
/// critical sections behind a mutex, so callers on different threads only ever contend
/// for the time of a pointer push/pop
pub struct FreeList<T> {
    capacity: usize,
    pool: Mutex<PoolInner<T>>,
}

struct PoolInner<T> {
    nodes: Vec<NodeRef<T>>,
    #[cfg(debug_assertions)]
    metrics: PoolMetrics,
}

#[cfg(debug_assertions)]
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PoolMetrics {
    /// node buffers allocated fresh from the heap
    pub(crate) fresh: usize,
    /// acquisitions served from the pool
    pub(crate) reused: usize,
    /// releases that were buffered
    pub(crate) returned: usize,
    /// releases dropped because the pool was at capacity
    pub(crate) discarded: usize,
}

impl<T> FreeList<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pool: Mutex::new(PoolInner {
                nodes: Vec::with_capacity(capacity),
                #[cfg(debug_assertions)]
                metrics: PoolMetrics::default(),
            }),
        }
    }
    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
    /// Number of node buffers currently parked in the pool
    pub fn buffered(&self) -> usize {
        self.pool.lock().nodes.len()
    }
    /// Pop a buffered node, or allocate a fresh one. The returned node has empty item and
    /// child arrays and carries no owner
    pub(crate) fn acquire(&self) -> NodeRef<T> {
        let buffered = {
            let mut pool = self.pool.lock();
            let node = pool.nodes.pop();
            #[cfg(debug_assertions)]
            {
                if node.is_some() {
                    pool.metrics.reused += 1;
                } else {
                    pool.metrics.fresh += 1;
                }
            }
            node
        };
        match buffered {
            Some(node) => node,
            None => Arc::new(Node::empty()),
        }
    }
    /// Buffer `n` for reuse. Returns false (and drops the node) if the pool is at
    /// capacity. The caller must have cleared the node's arrays and owner tag
    pub(crate) fn release(&self, n: NodeRef<T>) -> bool {
        let mut pool = self.pool.lock();
        if pool.nodes.len() < self.capacity {
            pool.nodes.push(n);
            #[cfg(debug_assertions)]
            {
                pool.metrics.returned += 1;
            }
            true
        } else {
            #[cfg(debug_assertions)]
            {
                pool.metrics.discarded += 1;
            }
            false
        }
    }
}

#[cfg(debug_assertions)]
impl<T> FreeList<T> {
    #[cfg(test)]
    pub(crate) fn metrics(&self) -> PoolMetrics {
        self.pool.lock().metrics
    }
}

impl<T> fmt::Debug for FreeList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreeList")
            .field("capacity", &self.capacity)
            .field("buffered", &self.buffered())
            .finish()
    }
}

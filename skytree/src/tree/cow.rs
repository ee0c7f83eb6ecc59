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

#[cfg(debug_assertions)]
use std::sync::atomic::AtomicUsize;
use {
    super::{freelist::FreeList, node::NodeRef},
    std::sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The write identity a node is tagged with. A node may be mutated in place only by the
/// tree whose context currently carries the same identity; every other handle sees the
/// node as shared and must copy it first. Identities are never reused
pub(super) struct OwnerId(u64);

impl OwnerId {
    /// the tag of a pooled buffer; no live context ever carries it, so a recycled node
    /// can never satisfy an identity check by accident
    pub(super) const NONE: Self = Self(0);
    fn mint() -> Self {
        static OWNER_SEQ: AtomicU64 = AtomicU64::new(1);
        Self(OWNER_SEQ.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
/// What became of a node handed back to its context
pub(super) enum FreeStatus {
    /// cleared and buffered in the freelist
    Pooled,
    /// cleared, but the freelist was at capacity; storage dropped
    PoolFull,
    /// tagged by another identity, so some snapshot still reaches it; left untouched
    Shared,
}

/// The clone-on-write context of one tree handle: its write identity plus the freelist
/// that serves its allocations. Snapshotting mints a fresh context for both resulting
/// handles (sharing the freelist), which is what demotes the entire node graph to shared
pub(super) struct TreeContext<T> {
    owner: OwnerId,
    pool: Arc<FreeList<T>>,
    #[cfg(debug_assertions)]
    stat_promoted: AtomicUsize,
}

impl<T> TreeContext<T> {
    pub(super) fn mint(pool: Arc<FreeList<T>>) -> Self {
        Self {
            owner: OwnerId::mint(),
            pool,
            #[cfg(debug_assertions)]
            stat_promoted: AtomicUsize::new(0),
        }
    }
    #[inline(always)]
    pub(super) fn owner(&self) -> OwnerId {
        self.owner
    }
    #[inline(always)]
    pub(super) fn pool(&self) -> &Arc<FreeList<T>> {
        &self.pool
    }
    /// Take a node from the pool (or the heap) and tag it as exclusively ours
    pub(super) fn acquire(&self) -> NodeRef<T> {
        let mut n = self.pool.acquire();
        match Arc::get_mut(&mut n) {
            Some(node) => node.owner = self.owner,
            None => impossible!(),
        }
        n
    }
    /// Hand a node back once it leaves the live graph. Only a node we own exclusively is
    /// cleared and pooled; a node tagged by another identity is still reachable from some
    /// snapshot and is merely unlinked from this handle
    pub(super) fn free_node(&self, mut n: NodeRef<T>) -> FreeStatus {
        if n.owner != self.owner {
            return FreeStatus::Shared;
        }
        match Arc::get_mut(&mut n) {
            Some(node) => {
                node.items.clear();
                node.children.clear();
                node.owner = OwnerId::NONE;
            }
            None => impossible!(),
        }
        if self.pool.release(n) {
            FreeStatus::Pooled
        } else {
            FreeStatus::PoolFull
        }
    }
}

#[cfg(debug_assertions)]
impl<T> TreeContext<T> {
    pub(super) fn hpromote(&self) {
        self.stat_promoted.fetch_add(1, Ordering::Relaxed);
    }
    #[cfg(test)]
    pub(super) fn raw_promoted(&self) -> usize {
        self.stat_promoted.load(Ordering::Relaxed)
    }
}

#[cfg(not(debug_assertions))]
impl<T> TreeContext<T> {
    pub(super) fn hpromote(&self) {}
}

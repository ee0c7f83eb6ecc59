/*
 * Created on Mon Mar 11 2024
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

//! # An ordered in-memory index with copy-on-write snapshots
//!
//! This crate implements a single-writer B-tree ordered index with two properties that the
//! usual map types don't give us:
//! - [`BTree::snapshot`] produces an O(1) logical clone of the tree. The two handles share
//!   every node until one of them writes; a writing handle copies the nodes on its root-to-leaf
//!   path and leaves the other handle's view untouched, so two snapshots can be driven from
//!   two threads concurrently
//! - node storage is recycled through a bounded, shareable [`FreeList`], so a steady-state
//!   workload stops allocating once the pool is warm
//!
//! The ordering capability is a single strict predicate ([`TreeItem::sorts_before`]); item
//! equality is always derived from it and never from [`PartialEq`].

#![deny(unreachable_patterns)]

#[macro_use]
mod macros;
mod error;
mod tree;

pub use {
    error::{TreeError, TreeResult},
    tree::{BTree, FreeList, Iter, TreeItem, DEFAULT_FREELIST_SIZE},
};

/*
 * Created on Sun Mar 17 2024
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
    super::{node::Node, BTree, FreeList, TreeItem, DEFAULT_FREELIST_SIZE},
    std::sync::Arc,
};

#[cfg(not(miri))]
const SPAM_CNT: usize = 4096;
#[cfg(miri)]
const SPAM_CNT: usize = 96;

const DEGREE: usize = 3;

fn mktree(degree: usize) -> BTree<u64> {
    BTree::new(degree).unwrap()
}

fn fill(t: &mut BTree<u64>, keys: impl IntoIterator<Item = u64>) {
    for int in keys {
        assert!(t.insert_or_replace(int).is_none());
    }
}

fn contents(t: &BTree<u64>) -> Vec<u64> {
    t.iter().copied().collect()
}

/// Walk the full structure and assert every shape rule along with the item order and the
/// tracked length
fn validate<T: TreeItem>(t: &BTree<T>) {
    let mut count = 0;
    let mut prev: Option<&T> = None;
    for item in t.iter() {
        if let Some(prev) = prev {
            assert!(prev.sorts_before(item), "items out of order");
        }
        prev = Some(item);
        count += 1;
    }
    assert_eq!(count, t.len(), "length out of sync with the contents");
    if let Some(root) = t.root.as_ref() {
        subtree_depth(root, t.min_items(), t.max_items(), true);
    }
}

fn subtree_depth<T: TreeItem>(n: &Node<T>, min: usize, max: usize, is_root: bool) -> usize {
    if !is_root {
        assert!(n.items.len() >= min, "underfull node");
    }
    assert!(n.items.len() <= max, "overfull node");
    if n.is_leaf() {
        return 1;
    }
    assert_eq!(n.children.len(), n.items.len() + 1, "bad child count");
    let mut depth = None;
    for child in &n.children {
        let d = subtree_depth(child, min, max, false);
        match depth {
            Some(depth) => assert_eq!(depth, d, "leaves at different depths"),
            None => depth = Some(d),
        }
    }
    depth.unwrap() + 1
}

mod construction {
    use {super::*, crate::error::TreeError};

    #[test]
    fn rejects_degenerate_degrees() {
        multi_assert_eq!(
            BTree::<u64>::new(0).unwrap_err(),
            BTree::<u64>::new(1).unwrap_err(),
            BTree::<u64>::with_freelist(1, Arc::new(FreeList::new(8))).unwrap_err()
            => TreeError::InvalidDegree
        );
    }
    #[test]
    fn default_pool_capacity() {
        let t = mktree(DEGREE);
        assert_eq!(t.cow.pool().capacity(), DEFAULT_FREELIST_SIZE);
    }
    #[test]
    fn minimum_degree_works() {
        let mut t = mktree(2);
        fill(&mut t, 0..128);
        validate(&t);
        assert_eq!(contents(&t), (0..128).collect::<Vec<_>>());
    }
}

mod basic {
    use super::*;

    #[test]
    fn empty_tree_reads() {
        let mut t = mktree(DEGREE);
        assert_eq!(t.len(), 0);
        assert!(t.is_empty());
        multi_assert_eq!(t.min(), t.max(), t.get(&1) => None);
        assert!(!t.contains(&1));
        multi_assert_eq!(t.remove(&1), t.remove_min(), t.remove_max() => None);
        t.ascend(|_| panic!("nothing to visit"));
        t.descend(|_| panic!("nothing to visit"));
    }
    #[test]
    fn insert_and_get() {
        let mut t = mktree(DEGREE);
        fill(&mut t, [5, 3, 8, 1, 4, 7, 9, 2, 6]);
        assert_eq!(t.len(), 9);
        assert_eq!(t.min(), Some(&1));
        assert_eq!(t.max(), Some(&9));
        assert_eq!(t.get(&4), Some(&4));
        assert_eq!(t.get(&10), None);
        assert_eq!(contents(&t), (1..=9).collect::<Vec<_>>());
        validate(&t);
    }
    #[test]
    fn replace_returns_previous() {
        let mut t = mktree(DEGREE);
        assert_eq!(t.insert_or_replace(7), None);
        assert_eq!(t.insert_or_replace(7), Some(7));
        assert_eq!(t.len(), 1);
    }
    #[test]
    fn replace_is_keyed_by_order_only() {
        use core::cmp::Ordering;

        #[derive(Debug, Clone)]
        struct Pair {
            k: u64,
            v: &'static str,
        }
        impl PartialEq for Pair {
            fn eq(&self, other: &Self) -> bool {
                self.k == other.k
            }
        }
        impl Eq for Pair {}
        impl PartialOrd for Pair {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }
        impl Ord for Pair {
            fn cmp(&self, other: &Self) -> Ordering {
                self.k.cmp(&other.k)
            }
        }

        let mut t: BTree<Pair> = BTree::new(DEGREE).unwrap();
        assert!(t.insert_or_replace(Pair { k: 1, v: "a" }).is_none());
        assert_eq!(t.insert_or_replace(Pair { k: 1, v: "b" }).unwrap().v, "a");
        assert_eq!(t.get(&Pair { k: 1, v: "" }).unwrap().v, "b");
        assert_eq!(t.len(), 1);
    }
    #[test]
    fn spam_insert_spot_read() {
        let mut t = mktree(DEGREE);
        fill(&mut t, (0..SPAM_CNT as u64).rev());
        assert_eq!(t.len(), SPAM_CNT);
        for int in 0..SPAM_CNT as u64 {
            assert_eq!(t.get(&int), Some(&int));
        }
        validate(&t);
    }
    #[test]
    fn clear_without_pool_return() {
        let mut t = mktree(DEGREE);
        fill(&mut t, 0..64);
        t.clear(false);
        assert!(t.is_empty());
        assert_eq!(t.min(), None);
        fill(&mut t, 0..8);
        assert_eq!(contents(&t), (0..8).collect::<Vec<_>>());
    }
    #[test]
    fn debug_renders_contents() {
        let mut t = mktree(DEGREE);
        fill(&mut t, 1..=3);
        assert_eq!(format!("{:?}", t), "{1, 2, 3}");
    }
}

mod removal {
    use super::*;

    #[test]
    fn remove_with_merges() {
        let mut t = mktree(DEGREE);
        fill(&mut t, 1..=10);
        for int in 1..=5u64 {
            assert_eq!(t.remove(&int), Some(int));
            validate(&t);
        }
        assert_eq!(contents(&t), (6..=10).collect::<Vec<_>>());
    }
    #[test]
    fn remove_missing_is_a_noop() {
        let mut t = mktree(DEGREE);
        fill(&mut t, [2, 4, 6]);
        assert_eq!(t.remove(&3), None);
        assert_eq!(t.len(), 3);
        validate(&t);
    }
    #[test]
    fn drain_through_extremes() {
        let mut t = mktree(DEGREE);
        let n = SPAM_CNT as u64 / 8;
        fill(&mut t, 0..n);
        for int in 0..n / 2 {
            assert_eq!(t.remove_min(), Some(int));
            validate(&t);
        }
        for int in (n / 2..n).rev() {
            assert_eq!(t.remove_max(), Some(int));
            validate(&t);
        }
        assert!(t.is_empty());
        multi_assert_eq!(t.remove_min(), t.remove_max() => None);
    }
    #[test]
    fn spam_remove_ascending() {
        let mut t = mktree(DEGREE);
        fill(&mut t, 0..SPAM_CNT as u64);
        for int in 0..SPAM_CNT as u64 {
            assert_eq!(t.remove(&int), Some(int));
            if int % 64 == 0 {
                validate(&t);
            }
        }
        assert_eq!(t.len(), 0);
        validate(&t);
    }
    #[test]
    fn reuse_after_full_drain() {
        let mut t = mktree(DEGREE);
        fill(&mut t, 0..32);
        for int in 0..32 {
            assert_eq!(t.remove(&int), Some(int));
        }
        fill(&mut t, 100..110);
        assert_eq!(contents(&t), (100..110).collect::<Vec<_>>());
        validate(&t);
    }
}

mod ranges {
    use super::*;

    #[test]
    fn range_walks() {
        let mut t = mktree(DEGREE);
        fill(&mut t, 1..=20);
        let mut asc = Vec::new();
        t.ascend_range(&5, &10, |i| {
            asc.push(*i);
            true
        });
        assert_eq!(asc, vec![5, 6, 7, 8, 9]);
        let mut desc = Vec::new();
        t.descend_range(&10, &5, |i| {
            desc.push(*i);
            true
        });
        assert_eq!(desc, vec![10, 9, 8, 7, 6]);
        let mut tail = Vec::new();
        t.ascend_greater_or_equal(&18, |i| {
            tail.push(*i);
            true
        });
        assert_eq!(tail, vec![18, 19, 20]);
    }
    #[test]
    fn range_bounds_cross_checked() {
        let mut t = mktree(DEGREE);
        let n = 48u64;
        fill(&mut t, 0..n);
        for a in 0..n {
            for b in a..n {
                let mut asc = Vec::new();
                t.ascend_range(&a, &b, |i| {
                    asc.push(*i);
                    true
                });
                assert_eq!(asc, (a..b).collect::<Vec<_>>());
                let mut desc = Vec::new();
                t.descend_range(&b, &a, |i| {
                    desc.push(*i);
                    true
                });
                assert_eq!(desc, (a + 1..=b).rev().collect::<Vec<_>>());
            }
        }
    }
    #[test]
    fn open_bounds_cross_checked() {
        let mut t = mktree(DEGREE);
        let n = 48u64;
        fill(&mut t, 0..n);
        for pivot in 0..n {
            let mut below = Vec::new();
            t.ascend_less_than(&pivot, |i| {
                below.push(*i);
                true
            });
            assert_eq!(below, (0..pivot).collect::<Vec<_>>());
            let mut from = Vec::new();
            t.ascend_greater_or_equal(&pivot, |i| {
                from.push(*i);
                true
            });
            assert_eq!(from, (pivot..n).collect::<Vec<_>>());
            let mut upto = Vec::new();
            t.descend_less_or_equal(&pivot, |i| {
                upto.push(*i);
                true
            });
            assert_eq!(upto, (0..=pivot).rev().collect::<Vec<_>>());
            let mut above = Vec::new();
            t.descend_greater_than(&pivot, |i| {
                above.push(*i);
                true
            });
            assert_eq!(above, (pivot + 1..n).rev().collect::<Vec<_>>());
        }
    }
    #[test]
    fn visitor_halt_stops_everything() {
        let mut t = mktree(DEGREE);
        fill(&mut t, 1..=100);
        let mut seen = Vec::new();
        t.ascend(|item| {
            seen.push(*item);
            *item != 7
        });
        assert_eq!(seen, (1..=7).collect::<Vec<_>>());
        let mut seen = Vec::new();
        t.descend(|item| {
            seen.push(*item);
            *item != 98
        });
        assert_eq!(seen, vec![100, 99, 98]);
    }
}

mod snapshot {
    use {super::*, std::thread};

    #[cfg(not(miri))]
    const FORK_CNT: u64 = 1024;
    #[cfg(miri)]
    const FORK_CNT: u64 = 64;

    #[test]
    fn snapshot_isolation() {
        let mut a = mktree(DEGREE);
        fill(&mut a, 1..=5);
        let mut b = a.snapshot();
        assert!(a.insert_or_replace(100).is_none());
        assert_eq!(b.remove(&3), Some(3));
        assert_eq!(contents(&a), vec![1, 2, 3, 4, 5, 100]);
        assert_eq!(contents(&b), vec![1, 2, 4, 5]);
        validate(&a);
        validate(&b);
    }
    #[test]
    fn successive_snapshots_stay_independent() {
        let mut a = mktree(DEGREE);
        fill(&mut a, 1..=8);
        let mut b = a.snapshot();
        let mut c = a.snapshot();
        assert!(a.insert_or_replace(100).is_none());
        assert_eq!(b.remove(&1), Some(1));
        assert_eq!(c.remove(&8), Some(8));
        assert_eq!(contents(&a), vec![1, 2, 3, 4, 5, 6, 7, 8, 100]);
        assert_eq!(contents(&b), (2..=8).collect::<Vec<_>>());
        assert_eq!(contents(&c), (1..=7).collect::<Vec<_>>());
        for t in [&a, &b, &c] {
            validate(t);
        }
    }
    #[test]
    fn snapshot_partitioned_across_threads() {
        let mut primary = mktree(DEGREE);
        fill(&mut primary, 0..FORK_CNT);
        let mut fork = primary.snapshot();
        let writer = thread::spawn(move || {
            for int in 0..FORK_CNT {
                if int % 2 == 0 {
                    assert_eq!(fork.remove(&int), Some(int));
                }
            }
            fork
        });
        for int in FORK_CNT..FORK_CNT + FORK_CNT / 2 {
            assert!(primary.insert_or_replace(int).is_none());
        }
        let fork = writer.join().unwrap();
        assert_eq!(
            contents(&primary),
            (0..FORK_CNT + FORK_CNT / 2).collect::<Vec<_>>()
        );
        assert_eq!(
            contents(&fork),
            (0..FORK_CNT).filter(|int| int % 2 == 1).collect::<Vec<_>>()
        );
        validate(&primary);
        validate(&fork);
    }
    #[cfg(debug_assertions)]
    #[test]
    fn promotion_is_lazy() {
        let mut t = mktree(DEGREE);
        fill(&mut t, 0..64);
        let fork = t.snapshot();
        multi_assert_eq!(t.cow.raw_promoted(), fork.cow.raw_promoted() => 0);
        assert!(t.insert_or_replace(1000).is_none());
        assert!(t.cow.raw_promoted() > 0);
        assert_eq!(fork.cow.raw_promoted(), 0);
    }
}

mod pool {
    use super::*;

    #[test]
    fn clear_returns_nodes() {
        let pool = Arc::new(FreeList::new(256));
        let mut t = BTree::with_freelist(DEGREE, pool.clone()).unwrap();
        fill(&mut t, 0..256);
        assert_eq!(pool.buffered(), 0);
        t.clear(true);
        assert!(t.is_empty());
        assert!(pool.buffered() > 0);
    }
    #[test]
    fn clear_stops_at_capacity() {
        let pool = Arc::new(FreeList::new(2));
        let mut t = BTree::with_freelist(DEGREE, pool.clone()).unwrap();
        fill(&mut t, 0..512);
        t.clear(true);
        assert_eq!(pool.buffered(), 2);
    }
    #[cfg(debug_assertions)]
    #[test]
    fn rebuild_runs_entirely_off_the_pool() {
        let pool = Arc::new(FreeList::new(256));
        let mut t = BTree::with_freelist(DEGREE, pool.clone()).unwrap();
        fill(&mut t, 0..256);
        t.clear(true);
        let fresh_after_build = pool.metrics().fresh;
        fill(&mut t, 0..256);
        let m = pool.metrics();
        assert_eq!(m.fresh, fresh_after_build);
        assert!(m.reused > 0);
        validate(&t);
    }
    #[cfg(debug_assertions)]
    #[test]
    fn steady_state_churn_stops_allocating() {
        let pool = Arc::new(FreeList::new(64));
        let mut t = BTree::with_freelist(DEGREE, pool.clone()).unwrap();
        fill(&mut t, 0..512);
        let fresh_after_build = pool.metrics().fresh;
        for round in 0..4 {
            for int in 0..512u64 {
                assert_eq!(t.remove(&int), Some(int));
                assert!(t.insert_or_replace(int).is_none());
            }
            if round == 0 {
                validate(&t);
            }
        }
        validate(&t);
        // a pool-less rendition of this churn would allocate a node per split; the pool
        // keeps the overshoot to structural drift
        assert!(pool.metrics().fresh - fresh_after_build <= 128);
    }
    #[test]
    fn shared_nodes_stay_with_the_snapshot() {
        let pool = Arc::new(FreeList::new(256));
        let mut a = BTree::with_freelist(DEGREE, pool.clone()).unwrap();
        fill(&mut a, 0..128);
        let mut b = a.snapshot();
        a.clear(true);
        // every node was demoted to shared by the snapshot, so nothing was poolable
        assert_eq!(pool.buffered(), 0);
        assert_eq!(contents(&b), (0..128).collect::<Vec<_>>());
        validate(&b);
        // once the survivor rewrites itself it owns its nodes again, and clearing pools them
        for int in 0..128 {
            assert!(b.insert_or_replace(int).is_some());
        }
        b.clear(true);
        assert!(pool.buffered() > 0);
    }
    #[test]
    fn pool_shared_between_trees() {
        let pool = Arc::new(FreeList::new(256));
        let mut donor = BTree::with_freelist(DEGREE, pool.clone()).unwrap();
        fill(&mut donor, 0..256);
        donor.clear(true);
        let buffered = pool.buffered();
        assert!(buffered > 0);
        let mut taker = BTree::with_freelist(DEGREE, pool.clone()).unwrap();
        fill(&mut taker, 0..256);
        assert!(pool.buffered() < buffered);
        validate(&taker);
    }
}

mod fuzz {
    use {
        super::*,
        rand::{seq::SliceRandom, Rng},
        std::collections::BTreeSet,
    };

    #[test]
    fn shuffled_roundtrip_preserves_shape() {
        let mut rng = rand::thread_rng();
        let mut keys: Vec<u64> = (0..SPAM_CNT as u64 / 8).collect();
        for &degree in &[2usize, 3, 5] {
            keys.shuffle(&mut rng);
            let mut t = BTree::new(degree).unwrap();
            for (step, &key) in keys.iter().enumerate() {
                assert!(t.insert_or_replace(key).is_none());
                if step % 32 == 0 {
                    validate(&t);
                }
            }
            validate(&t);
            keys.shuffle(&mut rng);
            for (step, &key) in keys.iter().enumerate() {
                assert_eq!(t.remove(&key), Some(key));
                if step % 32 == 0 {
                    validate(&t);
                }
            }
            assert_eq!(t.len(), 0);
            validate(&t);
        }
    }
    #[test]
    fn randomized_against_model() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut rng = rand::thread_rng();
        for &degree in &[2usize, 3, 4, 7] {
            let mut t = BTree::new(degree).unwrap();
            let mut model = BTreeSet::new();
            for step in 0..SPAM_CNT {
                let key = rng.gen_range(0..512u64);
                match step % 3 {
                    0 => assert_eq!(t.insert_or_replace(key).is_some(), !model.insert(key)),
                    1 => assert_eq!(t.remove(&key), model.take(&key)),
                    _ => assert_eq!(t.get(&key), model.get(&key)),
                }
                assert_eq!(t.len(), model.len());
                if step % 64 == 0 {
                    validate(&t);
                    assert!(t.iter().eq(model.iter()));
                }
            }
            validate(&t);
            assert!(t.iter().eq(model.iter()));
        }
    }
}

// Copyright 2026 turnstile Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::hash::Hash;

use equivalent::Equivalent;
use hashbrown::HashTable;

use crate::code::{HashBuilder, Key, Value};

/// An entry held by the arena and threaded into the recency list.
///
/// Links are arena slot indices, so vacating a slot invalidates every path to
/// the entry at once. The key hash is kept alongside so removal can locate
/// the table row without rehashing.
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
    /// Neighbor one step closer to the youngest end.
    younger: Option<usize>,
    /// Neighbor one step closer to the oldest end.
    older: Option<usize>,
}

/// Recency index: a doubly-linked list threaded youngest to oldest over an
/// arena of entries, paired with a hash table from key to arena slot.
///
/// The controller thread is the only consumer. All operations are O(1), and
/// `insert_front` restores `len <= capacity` before returning, so the bound
/// holds whenever the index is at rest.
pub(crate) struct EntryIndex<K, V, S>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    slots: Vec<Option<Entry<K, V>>>,
    free: Vec<usize>,
    /// Rows are `(hash, slot)`; the hash copy lets the table rehash itself
    /// without reaching back into the arena.
    table: HashTable<(u64, usize)>,
    youngest: Option<usize>,
    oldest: Option<usize>,
    capacity: usize,
    hash_builder: S,
}

impl<K, V, S> EntryIndex<K, V, S>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    pub fn new(capacity: usize, hash_builder: S) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            table: HashTable::with_capacity(capacity),
            youngest: None,
            oldest: None,
            capacity,
            hash_builder,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Finds the slot holding `key` without altering recency.
    pub fn lookup<Q>(&self, key: &Q) -> Option<usize>
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        let hash = self.hash_builder.hash_one(key);
        self.table
            .find(hash, |&(_, slot)| key.equivalent(&self.entry(slot).key))
            .map(|&(_, slot)| slot)
    }

    /// Inserts a fresh entry at the youngest end and rebalances.
    ///
    /// The caller must have checked that `key` is absent. Entries evicted to
    /// hold the `len <= capacity` bound are pushed onto `evicted`, oldest
    /// first. One-at-a-time insertion can overflow by at most one entry, but
    /// eviction loops regardless.
    pub fn insert_front(&mut self, key: K, value: V, evicted: &mut Vec<(K, V)>) -> usize {
        debug_assert!(self.lookup(&key).is_none());

        let hash = self.hash_builder.hash_one(&key);
        let slot = self.allocate(Entry {
            key,
            value,
            hash,
            younger: None,
            older: None,
        });
        self.attach_front(slot);
        self.table.insert_unique(hash, (hash, slot), |&(h, _)| h);

        while self.len() > self.capacity {
            let Some(oldest) = self.oldest else { break };
            evicted.push(self.unlink(oldest));
        }

        slot
    }

    /// Moves `slot` to the youngest position.
    pub fn touch(&mut self, slot: usize) {
        if self.youngest == Some(slot) {
            return;
        }
        self.detach(slot);
        self.attach_front(slot);
    }

    /// Removes the entry at `slot` entirely: list links, table row, and arena
    /// slot. Returns the owned pair.
    pub fn unlink(&mut self, slot: usize) -> (K, V) {
        self.detach(slot);
        let entry = self.slots[slot].take().unwrap();
        if let Ok(occupied) = self.table.find_entry(entry.hash, |&(_, s)| s == slot) {
            occupied.remove();
        }
        self.free.push(slot);
        (entry.key, entry.value)
    }

    /// Shared borrow of the value at `slot`.
    pub fn value(&self, slot: usize) -> &V {
        &self.entry(slot).value
    }

    /// Replaces the value at `slot` wholesale, returning the previous one.
    pub fn replace_value(&mut self, slot: usize, value: V) -> V {
        std::mem::replace(&mut self.entry_mut(slot).value, value)
    }

    // Slots handed out by `lookup` and `insert_front` always hold a live
    // entry until `unlink` vacates them.
    fn entry(&self, slot: usize) -> &Entry<K, V> {
        self.slots[slot].as_ref().unwrap()
    }

    fn entry_mut(&mut self, slot: usize) -> &mut Entry<K, V> {
        self.slots[slot].as_mut().unwrap()
    }

    fn allocate(&mut self, entry: Entry<K, V>) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        }
    }

    /// Hooks `slot` in as the new youngest. Its links must be clear.
    fn attach_front(&mut self, slot: usize) {
        let old = self.youngest;
        {
            let entry = self.entry_mut(slot);
            entry.younger = None;
            entry.older = old;
        }
        if let Some(o) = old {
            self.entry_mut(o).younger = Some(slot);
        }
        self.youngest = Some(slot);
        if self.oldest.is_none() {
            self.oldest = Some(slot);
        }
    }

    /// Unhooks `slot` from the list, fixing both neighbors and both ends.
    /// The entry stays in the arena with its links cleared.
    fn detach(&mut self, slot: usize) {
        let (younger, older) = {
            let entry = self.entry_mut(slot);
            (entry.younger.take(), entry.older.take())
        };
        match younger {
            Some(y) => self.entry_mut(y).older = older,
            None => self.youngest = older,
        }
        match older {
            Some(o) => self.entry_mut(o).younger = younger,
            None => self.oldest = younger,
        }
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;
    use crate::code::DefaultHashBuilder;

    type TestIndex = EntryIndex<String, u64, DefaultHashBuilder>;

    fn index(capacity: usize) -> TestIndex {
        EntryIndex::new(capacity, DefaultHashBuilder::default())
    }

    fn insert(index: &mut TestIndex, key: &str, value: u64) -> Vec<(String, u64)> {
        let mut evicted = vec![];
        index.insert_front(key.to_string(), value, &mut evicted);
        evicted
    }

    /// Keys walked youngest to oldest.
    fn dump(index: &TestIndex) -> Vec<String> {
        let mut keys = vec![];
        let mut cursor = index.youngest;
        while let Some(slot) = cursor {
            let entry = index.entry(slot);
            keys.push(entry.key.clone());
            cursor = entry.older;
        }
        keys
    }

    fn assert_consistent(index: &TestIndex) {
        let forward = dump(index);
        assert_eq!(forward.len(), index.len());
        assert!(index.len() <= index.capacity());

        // The oldest-to-youngest walk must mirror the forward walk.
        let mut backward = vec![];
        let mut cursor = index.oldest;
        while let Some(slot) = cursor {
            let entry = index.entry(slot);
            backward.push(entry.key.clone());
            cursor = entry.younger;
        }
        backward.reverse();
        assert_eq!(forward, backward);

        // Every listed key resolves through the table, and the ends carry no
        // outer links.
        for key in &forward {
            assert!(index.lookup(key).is_some());
        }
        if let Some(slot) = index.youngest {
            assert!(index.entry(slot).younger.is_none());
        }
        if let Some(slot) = index.oldest {
            assert!(index.entry(slot).older.is_none());
        }
    }

    #[test]
    fn test_insert_front_orders_youngest_first() {
        let mut index = index(8);
        for (i, key) in ["a", "b", "c"].into_iter().enumerate() {
            let evicted = insert(&mut index, key, i as u64);
            assert!(evicted.is_empty());
        }
        assert_eq!(dump(&index), ["c", "b", "a"]);
        assert_eq!(index.len(), 3);
        assert_consistent(&index);
    }

    #[test]
    fn test_insert_front_evicts_oldest_over_capacity() {
        let mut index = index(2);
        insert(&mut index, "a", 1);
        insert(&mut index, "b", 2);
        let evicted = insert(&mut index, "c", 3);
        assert_eq!(evicted, vec![("a".to_string(), 1)]);
        assert_eq!(dump(&index), ["c", "b"]);
        assert!(index.lookup("a").is_none());
        assert_consistent(&index);
    }

    #[test]
    fn test_touch_promotes_to_youngest() {
        let mut index = index(8);
        insert(&mut index, "a", 1);
        insert(&mut index, "b", 2);
        insert(&mut index, "c", 3);

        // [c, b, a] => [a, c, b]
        let slot = index.lookup("a").unwrap();
        index.touch(slot);
        assert_eq!(dump(&index), ["a", "c", "b"]);
        assert_consistent(&index);

        // Touching the youngest changes nothing.
        index.touch(slot);
        assert_eq!(dump(&index), ["a", "c", "b"]);
        assert_consistent(&index);

        // [a, c, b] => [c, a, b]
        let slot = index.lookup("c").unwrap();
        index.touch(slot);
        assert_eq!(dump(&index), ["c", "a", "b"]);
        assert_consistent(&index);
    }

    #[test]
    fn test_unlink_each_position() {
        let mut index = index(8);
        for key in ["a", "b", "c", "d"] {
            insert(&mut index, key, 0);
        }

        // [d, c, b, a]: drop a middle entry, then each end.
        let slot = index.lookup("c").unwrap();
        assert_eq!(index.unlink(slot).0, "c");
        assert_eq!(dump(&index), ["d", "b", "a"]);
        assert_consistent(&index);

        let slot = index.lookup("d").unwrap();
        assert_eq!(index.unlink(slot).0, "d");
        assert_eq!(dump(&index), ["b", "a"]);
        assert_consistent(&index);

        let slot = index.lookup("a").unwrap();
        assert_eq!(index.unlink(slot).0, "a");
        assert_eq!(dump(&index), ["b"]);
        assert_eq!(index.youngest, index.oldest);
        assert_consistent(&index);

        let slot = index.lookup("b").unwrap();
        assert_eq!(index.unlink(slot).0, "b");
        assert_eq!(index.len(), 0);
        assert_eq!(index.youngest, None);
        assert_eq!(index.oldest, None);
        assert_consistent(&index);
    }

    #[test]
    fn test_slot_reuse_after_eviction() {
        let mut index = index(2);
        insert(&mut index, "a", 1);
        insert(&mut index, "b", 2);
        insert(&mut index, "c", 3);
        insert(&mut index, "d", 4);

        // A newcomer is linked in before the oldest entry is evicted, so the
        // arena peaks at capacity + 1 slots. Every insert after the first
        // overflow reuses a freed slot, and reused slots must not resurrect
        // stale links.
        assert_eq!(index.slots.len(), 3);
        assert_eq!(dump(&index), ["d", "c"]);
        assert!(index.lookup("a").is_none());
        assert!(index.lookup("b").is_none());
        assert_consistent(&index);

        insert(&mut index, "e", 5);
        assert_eq!(index.slots.len(), 3);
        assert_eq!(dump(&index), ["e", "d"]);
        assert_consistent(&index);
    }

    #[test]
    fn test_replace_value_keeps_len_and_order() {
        let mut index = index(4);
        insert(&mut index, "a", 1);
        insert(&mut index, "b", 2);

        let slot = index.lookup("a").unwrap();
        assert_eq!(index.replace_value(slot, 10), 1);
        assert_eq!(index.value(slot), &10);
        assert_eq!(index.len(), 2);
        assert_eq!(dump(&index), ["b", "a"]);
        assert_consistent(&index);
    }

    #[test]
    fn test_lookup_accepts_borrowed_keys() {
        let mut index = index(4);
        insert(&mut index, "alpha", 1);

        // `str` is `Equivalent<String>`, so lookups need no owned key.
        assert!(index.lookup("alpha").is_some());
        assert!(index.lookup("beta").is_none());
    }

    #[test]
    fn test_single_entry_endpoints() {
        let mut index = index(4);
        insert(&mut index, "only", 1);
        assert_eq!(index.youngest, index.oldest);

        let slot = index.lookup("only").unwrap();
        index.touch(slot);
        assert_eq!(dump(&index), ["only"]);
        assert_consistent(&index);
    }

    #[test]
    fn test_eviction_walks_in_age_order() {
        let mut index = index(3);
        let keys = (0..3).map(|i| format!("k{i}")).collect_vec();
        for (i, key) in keys.iter().enumerate() {
            insert(&mut index, key, i as u64);
        }

        // Promote k0 so the eviction victims are k1, then k2.
        let slot = index.lookup("k0").unwrap();
        index.touch(slot);

        let evicted = insert(&mut index, "k3", 3);
        assert_eq!(evicted, vec![("k1".to_string(), 1)]);
        let evicted = insert(&mut index, "k4", 4);
        assert_eq!(evicted, vec![("k2".to_string(), 2)]);
        assert_eq!(dump(&index), ["k4", "k3", "k0"]);
        assert_consistent(&index);
    }
}

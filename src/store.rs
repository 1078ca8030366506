//! In-memory digram count table.
//!
//! A [`CounterStore`] maps keys to occurrence counts. The tracker keeps
//! one keyed by [`DigramKey`] as its unsaved delta; reporting reduces
//! that to a table keyed by [`Digram`] via [`CounterStore::filter_mode`]
//! or [`CounterStore::group_modes`]. Counts only ever accumulate; the
//! sole destructive operation is [`CounterStore::clear`], which the
//! persistence layer calls after a successful merge to disk.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use crate::types::{Digram, DigramKey, ModeName};

/// Row ordering for [`CounterStore::extract_sorted`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Largest counts first. Ties fall back to key order.
    #[default]
    Descending,
    /// Smallest counts first. Ties fall back to key order.
    Ascending,
    /// Whatever order the underlying map yields.
    Unsorted,
}

/// A bag of keyed counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterStore<K: Eq + Hash> {
    counts: HashMap<K, u64>,
}

impl<K: Eq + Hash + Clone> CounterStore<K> {
    pub fn new() -> Self {
        CounterStore {
            counts: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Number of distinct keys with a nonzero count.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// The count recorded for `key`, zero if it was never observed.
    pub fn get(&self, key: &K) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Sum of all counts in the store.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Records one more occurrence of `key`.
    pub fn increment(&mut self, key: K) {
        self.add(key, 1);
    }

    /// Adds `n` occurrences of `key`. Adding zero leaves the store
    /// untouched rather than materialising an empty entry.
    pub fn add(&mut self, key: K, n: u64) {
        if n == 0 {
            return;
        }
        *self.counts.entry(key).or_insert(0) += n;
    }

    /// Folds every count from `other` into this store. Keys present in
    /// both end up with the sum of both counts.
    pub fn merge_from(&mut self, other: &CounterStore<K>) {
        for (key, n) in &other.counts {
            self.add(key.clone(), *n);
        }
    }

    /// Discards every entry.
    pub fn clear(&mut self) {
        self.counts.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, u64)> {
        self.counts.iter().map(|(key, &n)| (key, n))
    }

    /// Extracts rows for reporting, together with the grand total.
    ///
    /// The total always sums every count in the store, including rows
    /// the threshold drops. The threshold selects rows as follows:
    ///
    /// * `0` keeps every row;
    /// * `-1` keeps none (only the total is of interest);
    /// * a positive `t` keeps rows with count strictly greater than `t`;
    /// * any other negative `t` keeps rows with count strictly less
    ///   than `|t|`.
    ///
    /// Sorted orders break count ties by key, so equal inputs always
    /// produce byte-identical reports.
    pub fn extract_sorted(&self, order: SortOrder, threshold: i64) -> (u64, Vec<(K, u64)>)
    where
        K: Ord,
    {
        let total = self.total();
        let mut rows: Vec<(K, u64)> = self
            .counts
            .iter()
            .filter(|(_, &n)| threshold_admits(threshold, n))
            .map(|(key, &n)| (key.clone(), n))
            .collect();
        match order {
            SortOrder::Descending => {
                rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            }
            SortOrder::Ascending => {
                rows.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
            }
            SortOrder::Unsorted => {}
        }
        (total, rows)
    }
}

fn threshold_admits(threshold: i64, count: u64) -> bool {
    match threshold {
        0 => true,
        -1 => false,
        t if t > 0 => count > t as u64,
        t => count < t.unsigned_abs(),
    }
}

impl<K: Eq + Hash + Clone> FromIterator<(K, u64)> for CounterStore<K> {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        let mut store = CounterStore::new();
        for (key, n) in iter {
            store.add(key, n);
        }
        store
    }
}

impl CounterStore<DigramKey> {
    /// Projects away the mode, keeping only digrams observed in `mode`.
    pub fn filter_mode(&self, mode: &ModeName) -> CounterStore<Digram> {
        let mut reduced = CounterStore::new();
        for (key, n) in self.iter() {
            if &key.mode == mode {
                reduced.add(key.digram(), n);
            }
        }
        reduced
    }

    /// Projects away the mode, summing counts for digrams that occurred
    /// in several modes.
    pub fn group_modes(&self) -> CounterStore<Digram> {
        let mut reduced = CounterStore::new();
        for (key, n) in self.iter() {
            reduced.add(key.digram(), n);
        }
        reduced
    }

    /// Every mode with at least one recorded digram, in sorted order.
    pub fn distinct_modes(&self) -> BTreeSet<ModeName> {
        self.counts.keys().map(|key| key.mode.clone()).collect()
    }
}

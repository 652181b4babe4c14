//! The in-memory ordered map a single page holds.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::key::RecordKey;

/// Maximum number of entries a [`PageTree`] accepts before it must be
/// rotated out to disk and replaced by a fresh one. Chosen so an
/// encoded tree of reasonably sized documents comfortably fits inside
/// a single [`DATA_PAGE_SIZE`](crate::storage::page::DATA_PAGE_SIZE) page.
pub const TREE_SIZE: usize = 1500;

/// What a [`RecordKey`] maps to: either the live payload at that
/// `(id, lsn)`, or a tombstone recording that `id` was deleted as of
/// `lsn`. Keeping the tombstone as its own variant (rather than
/// removing the entry) is what lets newest-wins reads see a delete
/// that happened after the newest surviving insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordValue {
    Live(Value),
    Deleted,
}

impl RecordValue {
    pub fn is_deleted(&self) -> bool {
        matches!(self, RecordValue::Deleted)
    }

    pub fn as_live(&self) -> Option<&Value> {
        match self {
            RecordValue::Live(value) => Some(value),
            RecordValue::Deleted => None,
        }
    }
}

/// A bounded, ordered, in-memory view of one page's worth of records.
///
/// Entries are ordered by [`RecordKey`] (id, then lsn), so every id's
/// versions sit contiguously and the newest is always the last one in
/// id order. `floor`/`entries_descending` are built around that fact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageTree {
    entries: BTreeMap<RecordKey, RecordValue>,
}

impl PageTree {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, key: RecordKey, value: RecordValue) {
        self.entries.insert(key, value);
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= TREE_SIZE
    }

    /// The entry with the largest key less than or equal to `probe`, if
    /// any. Used with [`RecordKey::upper_bound`] to find the newest
    /// version of an id within this page.
    pub fn floor(&self, probe: RecordKey) -> Option<(RecordKey, &RecordValue)> {
        self.entries
            .range(..=probe)
            .next_back()
            .map(|(k, v)| (*k, v))
    }

    /// All entries in descending key order: highest id first, and
    /// within an id, highest lsn (newest) first.
    pub fn entries_descending(&self) -> impl Iterator<Item = (RecordKey, &RecordValue)> {
        self.entries.iter().rev().map(|(k, v)| (*k, v))
    }

    /// All entries in ascending key order.
    pub fn entries_all(&self) -> impl Iterator<Item = (RecordKey, &RecordValue)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn floor_finds_newest_version_at_or_below_probe() {
        let mut tree = PageTree::new();
        tree.set(RecordKey::new(1, 0), RecordValue::Live(json!({"v": 0})));
        tree.set(RecordKey::new(1, 5), RecordValue::Live(json!({"v": 5})));
        tree.set(RecordKey::new(2, 1), RecordValue::Live(json!({"v": "other"})));

        let (key, value) = tree.floor(RecordKey::upper_bound(1)).unwrap();
        assert_eq!(key, RecordKey::new(1, 5));
        assert_eq!(value.as_live(), Some(&json!({"v": 5})));
    }

    #[test]
    fn floor_returns_none_below_all_keys() {
        let mut tree = PageTree::new();
        tree.set(RecordKey::new(5, 0), RecordValue::Live(json!(null)));
        assert!(tree.floor(RecordKey::new(1, 0)).is_none());
    }

    #[test]
    fn entries_descending_orders_newest_id_first() {
        let mut tree = PageTree::new();
        tree.set(RecordKey::new(1, 0), RecordValue::Live(json!(1)));
        tree.set(RecordKey::new(2, 0), RecordValue::Live(json!(2)));
        let ids: Vec<u32> = tree.entries_descending().map(|(k, _)| k.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn is_full_at_tree_size() {
        let mut tree = PageTree::new();
        for id in 0..TREE_SIZE as u32 {
            tree.set(RecordKey::new(id, 0), RecordValue::Live(json!(null)));
        }
        assert!(tree.is_full());
    }
}

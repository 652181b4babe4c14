//! Composite key a [`PageTree`](crate::storage::tree::PageTree) is ordered by.
use serde::{Deserialize, Serialize};

/// Orders records first by document id, then by the log sequence number
/// the mutation that produced this entry was assigned. Ordering by id
/// first is what makes `floor` and `entries_descending` able to walk
/// straight to "the newest version of this id" without a secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub id: u32,
    pub lsn: u64,
}

impl RecordKey {
    pub fn new(id: u32, lsn: u64) -> Self {
        Self { id, lsn }
    }

    /// The largest possible key for `id`, used as a probe with `floor`
    /// to land on the newest version of that id regardless of its lsn.
    pub fn upper_bound(id: u32) -> Self {
        Self { id, lsn: u64::MAX }
    }
}

impl PartialOrd for RecordKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RecordKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id).then(self.lsn.cmp(&other.lsn))
    }
}

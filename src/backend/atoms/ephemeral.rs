//! Ephemeral lists: zero-count entries awaiting a depth-gated sweep.
//!
//! An entry moves through three states:
//!
//! - **Live**: count > 0.
//! - **Ephemeral**: count == 0, recorded on its table's list with the depth at
//!   which it got there.
//! - **Freed**: removed from the table by a sweep.
//!
//! A sweep at depth `d` frees ephemeral entries tagged with a depth greater than
//! `d` (they were orphaned inside a nested evaluation that has since returned),
//! returns entries with a positive count to the live state, and leaves the rest
//! on the list.

/// One zero-count entry awaiting a sweep. Refers to its table slot, does not own it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EphemeralRecord {
    pub(crate) slot: u32,
}

#[derive(Debug, Clone)]
pub struct EphemeralList {
    records: Vec<EphemeralRecord>,
    /// Bytes accounted per record: the record, the table entry and the
    /// kind's average payload.
    record_size: usize,
}

impl EphemeralList {
    pub fn new(record_size: usize) -> Self {
        EphemeralList {
            records: Vec::new(),
            record_size,
        }
    }

    pub fn push(&mut self, slot: u32) {
        self.records.push(EphemeralRecord { slot });
    }

    /// Take every record out for a sweep. Survivors go back through [`EphemeralList::restore`].
    pub fn take(&mut self) -> Vec<EphemeralRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn restore(&mut self, survivors: Vec<EphemeralRecord>) {
        debug_assert!(self.records.is_empty());
        self.records = survivors;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, slot: u32) -> bool {
        self.records.iter().any(|record| record.slot == slot)
    }

    pub fn stats(&self) -> EphemeralStats {
        EphemeralStats {
            item_count: self.records.len(),
            item_size: self.records.len() * self.record_size,
        }
    }
}

/// Size of the ephemeral backlog, used to decide when a sweep is worthwhile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EphemeralStats {
    pub item_count: usize,
    pub item_size: usize,
}

impl EphemeralStats {
    pub fn add(&mut self, other: EphemeralStats) {
        self.item_count += other.item_count;
        self.item_size += other.item_size;
    }
}

/// Outcome of sweeping one or more tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Entries physically removed.
    pub freed: usize,
    /// Entries that were retained again and left the ephemeral list.
    pub restored: usize,
    /// Entries still waiting on the ephemeral list.
    pub pending: usize,
}

impl SweepStats {
    pub fn add(&mut self, other: SweepStats) {
        self.freed += other.freed;
        self.restored += other.restored;
        self.pending += other.pending;
    }
}

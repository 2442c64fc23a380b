//! Hash index over asserted facts, used to reject duplicates.
//!
//! Buckets hold `(fact id, hash)` entries; a new entry goes to the front of
//! its bucket. The table grows to `2 * size + 1` buckets once it holds more
//! entries than buckets, and drops back to its baseline size when emptied.

use tracing::debug;

use super::{Fact, FactId, Field};
use crate::backend::atoms::SymbolAtom;

/// Access to stored facts by id, for comparing a candidate against indexed entries.
pub trait FactLookup {
    fn lookup(&self, id: FactId) -> Option<&Fact>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FactHashEntry {
    fact: FactId,
    hash: u64,
}

#[derive(Debug, Clone)]
pub struct FactHashTable {
    /// Each bucket is stored oldest first; lookups walk it newest first.
    buckets: Vec<Vec<FactHashEntry>>,
    count: usize,
    baseline: usize,
}

impl FactHashTable {
    pub fn new(baseline: usize) -> Self {
        let baseline = baseline.max(1);
        FactHashTable {
            buckets: vec![Vec::new(); baseline],
            count: 0,
            baseline,
        }
    }

    pub fn size(&self) -> usize {
        self.buckets.len()
    }

    pub fn baseline(&self) -> usize {
        self.baseline
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn bucket_of(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    pub fn insert(&mut self, fact: FactId, hash: u64) {
        let bucket = self.bucket_of(hash);
        self.buckets[bucket].push(FactHashEntry { fact, hash });
        self.count += 1;

        if self.count > self.buckets.len() {
            self.resize(self.buckets.len() * 2 + 1);
        }
    }

    /// Drop the entry for `fact`. Returns `false` when it was not indexed.
    pub fn remove(&mut self, fact: FactId, hash: u64) -> bool {
        let bucket = self.bucket_of(hash);
        let chain = &mut self.buckets[bucket];
        let Some(position) = chain.iter().rposition(|entry| entry.fact == fact) else {
            return false;
        };
        chain.remove(position);
        self.count -= 1;

        if self.count == 0 && self.buckets.len() != self.baseline {
            self.reset();
        }
        true
    }

    /// Find an indexed fact other than `exclude` with the same template and
    /// fields. Stored hashes are compared before contents.
    pub fn find_duplicate<L: FactLookup + ?Sized>(
        &self,
        template: SymbolAtom,
        fields: &[Field],
        hash: u64,
        exclude: Option<FactId>,
        facts: &L,
    ) -> Option<FactId> {
        self.buckets[self.bucket_of(hash)]
            .iter()
            .rev()
            .filter(|entry| entry.hash == hash && Some(entry.fact) != exclude)
            .find(|entry| {
                facts
                    .lookup(entry.fact)
                    .is_some_and(|stored| stored.same_contents(template, fields))
            })
            .map(|entry| entry.fact)
    }

    /// Whether `fact` is indexed under `hash`.
    pub fn contains(&self, fact: FactId, hash: u64) -> bool {
        self.buckets[self.bucket_of(hash)]
            .iter()
            .any(|entry| entry.fact == fact)
    }

    /// Empty the table and return it to its baseline size.
    pub fn reset(&mut self) {
        self.buckets = vec![Vec::new(); self.baseline];
        self.count = 0;
    }

    fn resize(&mut self, new_size: usize) {
        let old = std::mem::replace(&mut self.buckets, vec![Vec::new(); new_size]);
        for entry in old.into_iter().flatten() {
            let bucket = self.bucket_of(entry.hash);
            self.buckets[bucket].push(entry);
        }
        debug!(target: "atomtron::facts::hash", size = new_size, count = self.count, "Resized fact hash table");
    }
}

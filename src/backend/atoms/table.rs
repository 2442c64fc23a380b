//! Chained hash table holding one kind of interned value.
//!
//! Entries live in a slot vector; buckets and chains link slots by index. New
//! entries are appended to the end of their bucket's chain. The bucket count is
//! fixed at construction.

use std::fmt;
use std::mem::size_of;

use tracing::{debug, trace};

use super::ephemeral::{EphemeralList, EphemeralRecord, EphemeralStats, SweepStats};
use super::{Atom, AtomKind};
use crate::backend::errors::{fatal, SystemError};
use crate::backend::memory::MemoryPool;

struct Entry<K: AtomKind> {
    contents: K::Stored,
    /// Home bucket, or the traversal index while the table is reindexed.
    bucket: usize,
    next: Option<u32>,
    count: usize,
    depth: usize,
    ephemeral: bool,
    permanent: bool,
    needed: bool,
}

pub struct AtomTable<K: AtomKind> {
    buckets: Vec<Option<u32>>,
    slots: Vec<Option<Entry<K>>>,
    generations: Vec<u32>,
    free_slots: Vec<u32>,
    ephemeral: EphemeralList,
    len: usize,
    reindexed: bool,
}

impl<K: AtomKind> AtomTable<K> {
    pub fn new(bucket_count: usize) -> Self {
        let record_size =
            size_of::<EphemeralRecord>() + size_of::<Entry<K>>() + K::AVERAGE_CONTENTS_SIZE;
        AtomTable {
            buckets: vec![None; bucket_count.max(1)],
            slots: Vec::new(),
            generations: Vec::new(),
            free_slots: Vec::new(),
            ephemeral: EphemeralList::new(record_size),
            len: 0,
            reindexed: false,
        }
    }

    /// Return the entry for `input`, creating it if absent.
    ///
    /// The reference count is not touched: a new entry starts at zero, already
    /// on the ephemeral list tagged with `depth`, and survives sweeps at that
    /// depth or deeper until a holder retains it.
    pub fn intern(&mut self, input: &K::Input, pool: &mut MemoryPool, depth: usize) -> Atom<K> {
        if self.reindexed {
            fatal(SystemError::TableReindexed { kind: K::NAME });
        }

        let bucket = self.home_bucket(input);
        let mut past = None;
        let mut peek = self.buckets[bucket];
        while let Some(index) = peek {
            let entry = self.occupied(index);
            if K::matches(&entry.contents, input, pool) {
                return self.handle(index);
            }
            past = Some(index);
            peek = entry.next;
        }

        let entry = Entry {
            contents: K::store(input, pool),
            bucket,
            next: None,
            count: 0,
            depth,
            ephemeral: true,
            permanent: false,
            needed: false,
        };
        let index = self.insert_slot(entry);
        match past {
            None => self.buckets[bucket] = Some(index),
            Some(previous) => self.occupied_mut(previous).next = Some(index),
        }
        self.ephemeral.push(index);
        self.len += 1;

        trace!(target: "atomtron::atoms::intern", kind = K::NAME, bucket, index, depth, "New atom");
        self.handle(index)
    }

    /// Look up `input` without inserting.
    pub fn find(&self, input: &K::Input, pool: &MemoryPool) -> Option<Atom<K>> {
        let mut peek = self.buckets[self.home_bucket(input)];
        while let Some(index) = peek {
            let entry = self.occupied(index);
            if K::matches(&entry.contents, input, pool) {
                return Some(self.handle(index));
            }
            peek = entry.next;
        }
        None
    }

    pub fn retain(&mut self, atom: Atom<K>) {
        self.entry_mut(atom).count += 1;
    }

    /// Drop one reference. At zero the entry becomes ephemeral, tagged with
    /// `depth`, unless it is permanent or already on the ephemeral list.
    pub fn release(&mut self, atom: Atom<K>, depth: usize) {
        let entry = self.entry_mut(atom);
        if entry.count == 0 {
            fatal(SystemError::ReleaseUnderflow { kind: K::NAME });
        }

        entry.count -= 1;
        if entry.count > 0 || entry.permanent || entry.ephemeral {
            return;
        }

        entry.ephemeral = true;
        entry.depth = depth;
        self.ephemeral.push(atom.index());
    }

    /// Exempt an entry from collection.
    pub fn make_permanent(&mut self, atom: Atom<K>) {
        self.entry_mut(atom).permanent = true;
    }

    pub fn count(&self, atom: Atom<K>) -> usize {
        self.entry(atom).count
    }

    pub fn is_ephemeral(&self, atom: Atom<K>) -> bool {
        self.entry(atom).ephemeral
    }

    pub fn is_permanent(&self, atom: Atom<K>) -> bool {
        self.entry(atom).permanent
    }

    /// Depth recorded when the entry last became ephemeral.
    pub fn depth(&self, atom: Atom<K>) -> usize {
        self.entry(atom).depth
    }

    pub fn bucket(&self, atom: Atom<K>) -> usize {
        self.entry(atom).bucket
    }

    /// Whether `atom` still refers to a live entry of this table.
    pub fn contains(&self, atom: Atom<K>) -> bool {
        let index = atom.index() as usize;
        self.generations.get(index) == Some(&atom.generation())
            && matches!(self.slots.get(index), Some(Some(_)))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn ephemeral_stats(&self) -> EphemeralStats {
        self.ephemeral.stats()
    }

    /// Every live entry, in bucket order.
    pub fn iter(&self) -> Atoms<'_, K> {
        Atoms {
            table: self,
            bucket: 0,
            next: None,
        }
    }

    /// Reclaim ephemeral entries orphaned deeper than `current_depth`.
    ///
    /// `on_free` sees each payload just before it is discarded.
    pub fn sweep<F>(&mut self, current_depth: usize, pool: &mut MemoryPool, mut on_free: F) -> SweepStats
    where
        F: FnMut(&K::Stored),
    {
        if self.reindexed {
            fatal(SystemError::TableReindexed { kind: K::NAME });
        }

        let mut stats = SweepStats::default();
        let records = self.ephemeral.take();
        let mut survivors = Vec::new();

        for record in records {
            let entry = self.occupied(record.slot);
            let (count, depth, permanent) = (entry.count, entry.depth, entry.permanent);

            if count == 0 && !permanent && depth > current_depth {
                let entry = self.unlink(record.slot);
                on_free(&entry.contents);
                K::discard(&entry.contents, pool);
                stats.freed += 1;
            } else if count > 0 || permanent {
                self.occupied_mut(record.slot).ephemeral = false;
                stats.restored += 1;
            } else {
                survivors.push(record);
            }
        }

        stats.pending = survivors.len();
        self.ephemeral.restore(survivors);

        if stats.freed > 0 || stats.restored > 0 {
            debug!(
                target: "atomtron::atoms::sweep",
                kind = K::NAME,
                current_depth,
                freed = stats.freed,
                restored = stats.restored,
                pending = stats.pending,
                "Swept ephemeral atoms"
            );
        }
        stats
    }

    /// Mark an entry as needed by the next [`AtomTable::set_indices`] pass.
    pub fn mark_needed(&mut self, atom: Atom<K>) {
        self.entry_mut(atom).needed = true;
    }

    pub fn is_needed(&self, atom: Atom<K>) -> bool {
        self.entry(atom).needed
    }

    pub fn clear_needed(&mut self) {
        for entry in self.slots.iter_mut().flatten() {
            entry.needed = false;
        }
    }

    /// Replace each needed entry's bucket (every entry's, with `set_all`) by its
    /// position in a bucket-order traversal. Returns the number of indexed
    /// entries. Interning and sweeping are forbidden until
    /// [`AtomTable::restore_buckets`] runs.
    pub fn set_indices(&mut self, set_all: bool) -> usize {
        let order: Vec<u32> = self.iter().map(|atom| atom.index()).collect();
        let mut count = 0;
        for index in order {
            let entry = self.occupied_mut(index);
            if entry.needed || set_all {
                entry.bucket = count;
                count += 1;
            }
        }
        self.reindexed = true;
        count
    }

    /// Put every entry's home bucket back after [`AtomTable::set_indices`].
    pub fn restore_buckets(&mut self) {
        for bucket in 0..self.buckets.len() {
            let mut peek = self.buckets[bucket];
            while let Some(index) = peek {
                let entry = self.occupied_mut(index);
                entry.bucket = bucket;
                peek = entry.next;
            }
        }
        self.reindexed = false;
    }

    pub fn is_reindexed(&self) -> bool {
        self.reindexed
    }

    pub(crate) fn contents(&self, atom: Atom<K>) -> &K::Stored {
        &self.entry(atom).contents
    }

    fn home_bucket(&self, input: &K::Input) -> usize {
        K::hash(input, self.buckets.len() as u64) as usize
    }

    fn handle(&self, index: u32) -> Atom<K> {
        Atom::new(index, self.generations[index as usize])
    }

    fn insert_slot(&mut self, entry: Entry<K>) -> u32 {
        match self.free_slots.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(entry);
                index
            }
            None => {
                self.slots.push(Some(entry));
                self.generations.push(0);
                (self.slots.len() - 1) as u32
            }
        }
    }

    fn entry(&self, atom: Atom<K>) -> &Entry<K> {
        let index = atom.index() as usize;
        match self.slots.get(index) {
            Some(Some(entry)) if self.generations[index] == atom.generation() => entry,
            _ => fatal(SystemError::StaleAtom {
                kind: K::NAME,
                index: atom.index(),
            }),
        }
    }

    fn entry_mut(&mut self, atom: Atom<K>) -> &mut Entry<K> {
        let index = atom.index() as usize;
        let current = self.generations.get(index).copied();
        match self.slots.get_mut(index) {
            Some(Some(entry)) if current == Some(atom.generation()) => entry,
            _ => fatal(SystemError::StaleAtom {
                kind: K::NAME,
                index: atom.index(),
            }),
        }
    }

    fn occupied(&self, index: u32) -> &Entry<K> {
        match self.slots.get(index as usize) {
            Some(Some(entry)) => entry,
            _ => fatal(SystemError::StaleAtom { kind: K::NAME, index }),
        }
    }

    fn occupied_mut(&mut self, index: u32) -> &mut Entry<K> {
        match self.slots.get_mut(index as usize) {
            Some(Some(entry)) => entry,
            _ => fatal(SystemError::StaleAtom { kind: K::NAME, index }),
        }
    }

    /// Remove a slot from its bucket chain and free the slot.
    fn unlink(&mut self, index: u32) -> Entry<K> {
        let (bucket, next) = {
            let entry = self.occupied(index);
            (entry.bucket, entry.next)
        };

        let mut previous = None;
        let mut peek = self.buckets.get(bucket).copied().flatten();
        loop {
            match peek {
                Some(current) if current == index => break,
                Some(current) => {
                    previous = Some(current);
                    peek = self.occupied(current).next;
                }
                None => fatal(SystemError::MissingHashNode {
                    kind: K::NAME,
                    bucket,
                }),
            }
        }

        match previous {
            None => self.buckets[bucket] = next,
            Some(previous) => self.occupied_mut(previous).next = next,
        }

        let entry = match self.slots[index as usize].take() {
            Some(entry) => entry,
            None => fatal(SystemError::StaleAtom { kind: K::NAME, index }),
        };
        self.generations[index as usize] = self.generations[index as usize].wrapping_add(1);
        self.free_slots.push(index);
        self.len -= 1;
        entry
    }
}

impl<K: AtomKind> fmt::Debug for AtomTable<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomTable")
            .field("kind", &K::NAME)
            .field("len", &self.len)
            .field("buckets", &self.buckets.len())
            .field("ephemeral", &self.ephemeral.len())
            .finish()
    }
}

/// Iterator over a table's live entries in bucket order.
pub struct Atoms<'a, K: AtomKind> {
    table: &'a AtomTable<K>,
    bucket: usize,
    next: Option<u32>,
}

impl<'a, K: AtomKind> Iterator for Atoms<'a, K> {
    type Item = Atom<K>;

    fn next(&mut self) -> Option<Atom<K>> {
        loop {
            if let Some(index) = self.next {
                self.next = self.table.occupied(index).next;
                return Some(self.table.handle(index));
            }
            if self.bucket >= self.table.buckets.len() {
                return None;
            }
            self.next = self.table.buckets[self.bucket];
            self.bucket += 1;
        }
    }
}

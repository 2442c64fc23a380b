//! Interned atomic values.
//!
//! Symbols (and strings, which share the symbol table), floats, integers,
//! bitmaps and external addresses are interned in one [`AtomTable`] per kind.
//! Equal values share a single entry, identified by a copyable [`Atom`] handle,
//! so handle equality is value equality.
//!
//! Entries are reference counted by their holders through `retain`/`release`.
//! An entry whose count drops to zero is not freed immediately; it joins the
//! table's ephemeral list, tagged with the evaluation depth, and is reclaimed by
//! a later depth-gated sweep (see [`AtomTable::sweep`]).
//!
//! # Example
//! ```
//! use atomtron::backend::{Environment, RuntimeConfig};
//!
//! let mut env = Environment::new(RuntimeConfig::default());
//! let a = env.intern_symbol("foo");
//! let b = env.intern_symbol("bar");
//! let c = env.intern_symbol("foo");
//! assert_eq!(a, c);
//! assert_ne!(a, b);
//! assert_eq!(env.symbol_text(a), "foo");
//! ```

pub mod ephemeral;
pub mod table;


use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use super::config::TableConfig;
use super::errors::{fatal, SystemError};
use super::hashing::{hash_bitmap, hash_external_address, hash_float, hash_integer, hash_symbol};
use super::memory::{Cell, MemoryPool};

pub use ephemeral::{EphemeralList, EphemeralStats, SweepStats};
pub use table::{AtomTable, Atoms};

/// Handle to an interned value of kind `K`.
///
/// Handles are only meaningful for the table (and environment) that issued
/// them. A handle whose entry has been collected is stale; using it is a fatal
/// error.
pub struct Atom<K> {
    index: u32,
    generation: u32,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Atom<K> {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Atom {
            index,
            generation,
            _kind: PhantomData,
        }
    }

    /// Slot index inside the owning table.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl<K> Clone for Atom<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Atom<K> {}

impl<K> PartialEq for Atom<K> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<K> Eq for Atom<K> {}

impl<K> Hash for Atom<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<K: AtomKind> fmt::Debug for Atom<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Atom<{}>({}#{})", K::NAME, self.index, self.generation)
    }
}

/// Behaviour shared by every interned value kind.
///
/// `Input` is what callers look values up by; `Stored` is what the table keeps.
/// Symbol and bitmap payloads are copied into [`MemoryPool`] cells.
pub trait AtomKind: Sized + 'static {
    const NAME: &'static str;
    /// Estimated payload bytes per entry, for ephemeral size accounting.
    const AVERAGE_CONTENTS_SIZE: usize;

    type Input: ?Sized;
    type Stored;

    fn hash(input: &Self::Input, range: u64) -> u64;
    fn matches(stored: &Self::Stored, input: &Self::Input, pool: &MemoryPool) -> bool;
    fn store(input: &Self::Input, pool: &mut MemoryPool) -> Self::Stored;
    fn discard(stored: &Self::Stored, pool: &mut MemoryPool);

    fn table(tables: &AtomTables) -> &AtomTable<Self>;
    fn table_mut(tables: &mut AtomTables) -> &mut AtomTable<Self>;
}

/// Symbols and strings.
#[derive(Debug)]
pub enum SymbolKind {}

/// 64-bit floats, compared by bit pattern.
#[derive(Debug)]
pub enum FloatKind {}

/// 64-bit signed integers.
#[derive(Debug)]
pub enum IntegerKind {}

/// Byte strings of arbitrary length.
#[derive(Debug)]
pub enum BitMapKind {}

/// Opaque host addresses tagged with a registered type.
#[derive(Debug)]
pub enum ExternalAddressKind {}

pub type SymbolAtom = Atom<SymbolKind>;
pub type FloatAtom = Atom<FloatKind>;
pub type IntegerAtom = Atom<IntegerKind>;
pub type BitMapAtom = Atom<BitMapKind>;
pub type ExternalAddressAtom = Atom<ExternalAddressKind>;

/// An opaque host address and the external-address type it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExternalAddress {
    pub address: usize,
    pub type_id: u16,
}

impl ExternalAddress {
    pub fn new(address: usize, type_id: u16) -> Self {
        ExternalAddress { address, type_id }
    }
}

/// Symbol text is stored NUL-terminated, so the cell is one byte longer than the text.
fn symbol_bytes<'p>(cell: &Cell, pool: &'p MemoryPool) -> &'p [u8] {
    let bytes = pool.bytes(cell);
    &bytes[..bytes.len() - 1]
}

impl AtomKind for SymbolKind {
    const NAME: &'static str = "symbol";
    const AVERAGE_CONTENTS_SIZE: usize = 10;

    type Input = str;
    type Stored = Cell;

    fn hash(input: &str, range: u64) -> u64 {
        hash_symbol(input, range)
    }

    fn matches(stored: &Cell, input: &str, pool: &MemoryPool) -> bool {
        stored.size() == input.len() + 1 && symbol_bytes(stored, pool) == input.as_bytes()
    }

    fn store(input: &str, pool: &mut MemoryPool) -> Cell {
        let cell = pool.allocate_zeroed(input.len() + 1);
        pool.bytes_mut(&cell)[..input.len()].copy_from_slice(input.as_bytes());
        cell
    }

    fn discard(stored: &Cell, pool: &mut MemoryPool) {
        pool.release(*stored, stored.size());
    }

    fn table(tables: &AtomTables) -> &AtomTable<Self> {
        &tables.symbols
    }

    fn table_mut(tables: &mut AtomTables) -> &mut AtomTable<Self> {
        &mut tables.symbols
    }
}

impl AtomKind for FloatKind {
    const NAME: &'static str = "float";
    const AVERAGE_CONTENTS_SIZE: usize = 0;

    type Input = f64;
    type Stored = f64;

    fn hash(input: &f64, range: u64) -> u64 {
        hash_float(*input, range)
    }

    fn matches(stored: &f64, input: &f64, _pool: &MemoryPool) -> bool {
        stored.to_bits() == input.to_bits()
    }

    fn store(input: &f64, _pool: &mut MemoryPool) -> f64 {
        *input
    }

    fn discard(_stored: &f64, _pool: &mut MemoryPool) {}

    fn table(tables: &AtomTables) -> &AtomTable<Self> {
        &tables.floats
    }

    fn table_mut(tables: &mut AtomTables) -> &mut AtomTable<Self> {
        &mut tables.floats
    }
}

impl AtomKind for IntegerKind {
    const NAME: &'static str = "integer";
    const AVERAGE_CONTENTS_SIZE: usize = 0;

    type Input = i64;
    type Stored = i64;

    fn hash(input: &i64, range: u64) -> u64 {
        hash_integer(*input, range)
    }

    fn matches(stored: &i64, input: &i64, _pool: &MemoryPool) -> bool {
        stored == input
    }

    fn store(input: &i64, _pool: &mut MemoryPool) -> i64 {
        *input
    }

    fn discard(_stored: &i64, _pool: &mut MemoryPool) {}

    fn table(tables: &AtomTables) -> &AtomTable<Self> {
        &tables.integers
    }

    fn table_mut(tables: &mut AtomTables) -> &mut AtomTable<Self> {
        &mut tables.integers
    }
}

impl AtomKind for BitMapKind {
    const NAME: &'static str = "bitmap";
    const AVERAGE_CONTENTS_SIZE: usize = std::mem::size_of::<u64>();

    type Input = [u8];
    /// `None` for the empty bitmap.
    type Stored = Option<Cell>;

    fn hash(input: &[u8], range: u64) -> u64 {
        hash_bitmap(input, range)
    }

    fn matches(stored: &Option<Cell>, input: &[u8], pool: &MemoryPool) -> bool {
        match stored {
            Some(cell) => cell.size() == input.len() && pool.bytes(cell) == input,
            None => input.is_empty(),
        }
    }

    fn store(input: &[u8], pool: &mut MemoryPool) -> Option<Cell> {
        if input.is_empty() {
            return None;
        }
        let cell = pool.allocate(input.len());
        pool.bytes_mut(&cell).copy_from_slice(input);
        Some(cell)
    }

    fn discard(stored: &Option<Cell>, pool: &mut MemoryPool) {
        if let Some(cell) = stored {
            pool.release(*cell, cell.size());
        }
    }

    fn table(tables: &AtomTables) -> &AtomTable<Self> {
        &tables.bitmaps
    }

    fn table_mut(tables: &mut AtomTables) -> &mut AtomTable<Self> {
        &mut tables.bitmaps
    }
}

impl AtomKind for ExternalAddressKind {
    const NAME: &'static str = "external-address";
    const AVERAGE_CONTENTS_SIZE: usize = 0;

    type Input = ExternalAddress;
    type Stored = ExternalAddress;

    fn hash(input: &ExternalAddress, range: u64) -> u64 {
        hash_external_address(input.address, range)
    }

    fn matches(stored: &ExternalAddress, input: &ExternalAddress, _pool: &MemoryPool) -> bool {
        stored == input
    }

    fn store(input: &ExternalAddress, _pool: &mut MemoryPool) -> ExternalAddress {
        *input
    }

    fn discard(_stored: &ExternalAddress, _pool: &mut MemoryPool) {}

    fn table(tables: &AtomTables) -> &AtomTable<Self> {
        &tables.external_addresses
    }

    fn table_mut(tables: &mut AtomTables) -> &mut AtomTable<Self> {
        &mut tables.external_addresses
    }
}

impl AtomTable<SymbolKind> {
    /// Text of an interned symbol or string.
    pub fn text<'p>(&self, atom: SymbolAtom, pool: &'p MemoryPool) -> &'p str {
        match std::str::from_utf8(symbol_bytes(self.contents(atom), pool)) {
            Ok(text) => text,
            Err(_) => fatal(SystemError::CorruptSymbol),
        }
    }
}

impl AtomTable<FloatKind> {
    pub fn value(&self, atom: FloatAtom) -> f64 {
        *self.contents(atom)
    }
}

impl AtomTable<IntegerKind> {
    pub fn value(&self, atom: IntegerAtom) -> i64 {
        *self.contents(atom)
    }
}

impl AtomTable<BitMapKind> {
    pub fn bytes<'p>(&self, atom: BitMapAtom, pool: &'p MemoryPool) -> &'p [u8] {
        match self.contents(atom) {
            Some(cell) => pool.bytes(cell),
            None => &[],
        }
    }
}

impl AtomTable<ExternalAddressKind> {
    pub fn address(&self, atom: ExternalAddressAtom) -> ExternalAddress {
        *self.contents(atom)
    }
}

/// The five value tables of one environment.
pub struct AtomTables {
    pub symbols: AtomTable<SymbolKind>,
    pub floats: AtomTable<FloatKind>,
    pub integers: AtomTable<IntegerKind>,
    pub bitmaps: AtomTable<BitMapKind>,
    pub external_addresses: AtomTable<ExternalAddressKind>,
}

impl AtomTables {
    pub fn new(config: &TableConfig) -> Self {
        AtomTables {
            symbols: AtomTable::new(config.symbol_buckets),
            floats: AtomTable::new(config.float_buckets),
            integers: AtomTable::new(config.integer_buckets),
            bitmaps: AtomTable::new(config.bitmap_buckets),
            external_addresses: AtomTable::new(config.external_address_buckets),
        }
    }

    #[inline]
    pub fn get<K: AtomKind>(&self) -> &AtomTable<K> {
        K::table(self)
    }

    #[inline]
    pub fn get_mut<K: AtomKind>(&mut self) -> &mut AtomTable<K> {
        K::table_mut(self)
    }

    /// Ephemeral backlog summed over all tables.
    pub fn ephemeral_stats(&self) -> EphemeralStats {
        let mut stats = EphemeralStats::default();
        stats.add(self.symbols.ephemeral_stats());
        stats.add(self.floats.ephemeral_stats());
        stats.add(self.integers.ephemeral_stats());
        stats.add(self.bitmaps.ephemeral_stats());
        stats.add(self.external_addresses.ephemeral_stats());
        stats
    }

    /// Number of interned entries over all tables.
    pub fn len(&self) -> usize {
        self.symbols.len()
            + self.floats.len()
            + self.integers.len()
            + self.bitmaps.len()
            + self.external_addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for AtomTables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomTables")
            .field("symbols", &self.symbols.len())
            .field("floats", &self.floats.len())
            .field("integers", &self.integers.len())
            .field("bitmaps", &self.bitmaps.len())
            .field("external_addresses", &self.external_addresses.len())
            .finish()
    }
}

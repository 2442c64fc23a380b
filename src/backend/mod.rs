// Backend of the atomic-value runtime
//
// Leaves first:
// - `memory`: pooled cell allocator
// - `hashing`: bucket hash functions
// - `atoms`: interned value tables and their ephemeral lists
// - `facts`: fact values and the fact hash index
// - `environment`: the isolation unit tying them together
// - `config`, `errors`: settings and error types

pub mod atoms;
pub mod config;
pub mod environment;
pub mod errors;
pub mod facts;
pub mod hashing;
pub mod memory;

pub use atoms::{
    Atom, AtomKind, AtomTable, AtomTables, BitMapAtom, BitMapKind, EphemeralStats,
    ExternalAddress, ExternalAddressAtom, ExternalAddressKind, FloatAtom, FloatKind, IntegerAtom,
    IntegerKind, SweepStats, SymbolAtom, SymbolKind,
};
pub use config::RuntimeConfig;
pub use environment::{
    AssertOutcome, DuplicationCheck, Environment, IndexCounts, SpecialAtoms, SymbolMatches,
};
pub use errors::{fatal, ConfigError, SystemError};
pub use facts::{hash_fact, hash_fields, Fact, FactHashTable, FactId, FactLookup, Field};
pub use hashing::{hash_bitmap, hash_external_address, hash_float, hash_integer, hash_symbol};
pub use memory::{Cell, MemoryPool, MemoryStats};

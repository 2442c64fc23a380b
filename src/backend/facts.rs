//! Facts and their hash index.
//!
//! A fact is a template symbol plus an ordered list of fields. Facts are hashed
//! once, when asserted; the hash is kept on the fact and drives duplicate
//! detection in the [`FactHashTable`].

pub mod hash_table;

use std::collections::BTreeMap;
use std::fmt;

use super::atoms::{AtomTables, ExternalAddressAtom, FloatAtom, IntegerAtom, SymbolAtom};
use super::errors::{fatal, SystemError};
use super::hashing::hash_symbol;
use super::memory::MemoryPool;

pub use hash_table::{FactHashTable, FactLookup};

/// Multiplier applied to the template's symbol bucket in a fact hash.
const TEMPLATE_MULTIPLIER: u64 = 73981;
/// Offset added to a field's position before it scales the field hash.
const POSITION_OFFSET: u64 = 29;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactId(pub u64);

impl fmt::Display for FactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f-{}", self.0)
    }
}

/// One slot of a fact. Atom-valued fields compare by handle, which after
/// interning is value equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Symbol(SymbolAtom),
    String(SymbolAtom),
    Integer(IntegerAtom),
    Float(FloatAtom),
    ExternalAddress(ExternalAddressAtom),
    FactAddress(FactId),
    Multifield(Vec<Field>),
}

#[derive(Debug, Clone)]
pub struct Fact {
    pub id: FactId,
    pub template: SymbolAtom,
    pub fields: Vec<Field>,
    /// Unreduced hash, computed by [`hash_fact`] at assertion.
    pub hash_value: u64,
}

impl Fact {
    /// Same template and field-for-field equal contents.
    pub fn same_contents(&self, template: SymbolAtom, fields: &[Field]) -> bool {
        self.template == template && self.fields == fields
    }
}

/// Unreduced hash of a field list.
///
/// Each field contributes a value scaled by its position plus 29; a nested
/// multifield contributes its own unreduced hash.
pub fn hash_fields(fields: &[Field], atoms: &AtomTables, pool: &MemoryPool) -> u64 {
    let mut count = 0u64;
    for (i, field) in fields.iter().enumerate() {
        let scale = i as u64 + POSITION_OFFSET;
        let term = match field {
            Field::Symbol(atom) | Field::String(atom) => {
                hash_symbol(atoms.symbols.text(*atom, pool), 0).wrapping_mul(scale)
            }
            Field::Integer(atom) => {
                let value = atoms.integers.value(*atom) as u64;
                value.wrapping_mul(scale).wrapping_add(value)
            }
            Field::Float(atom) => {
                let value = atoms.floats.value(*atom);
                value
                    .to_bits()
                    .wrapping_mul(scale)
                    .wrapping_add(value as i64 as u64)
            }
            Field::ExternalAddress(atom) => {
                (atoms.external_addresses.address(*atom).address as u64).wrapping_mul(scale)
            }
            Field::FactAddress(id) => id.0.wrapping_mul(scale),
            Field::Multifield(nested) => hash_fields(nested, atoms, pool),
        };
        count = count.wrapping_add(term);
    }
    count
}

/// Unreduced hash of a fact: the template's symbol bucket scaled by 73981 plus
/// the field hash. Fatal while the symbol table holds traversal indices.
pub fn hash_fact(
    template: SymbolAtom,
    fields: &[Field],
    atoms: &AtomTables,
    pool: &MemoryPool,
) -> u64 {
    if atoms.symbols.is_reindexed() {
        fatal(SystemError::TableReindexed { kind: "symbol" });
    }
    (atoms.symbols.bucket(template) as u64)
        .wrapping_mul(TEMPLATE_MULTIPLIER)
        .wrapping_add(hash_fields(fields, atoms, pool))
}

/// Asserted facts, ordered by id.
#[derive(Debug, Default)]
pub struct FactList {
    facts: BTreeMap<FactId, Fact>,
    next_id: u64,
}

impl FactList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fact under a fresh id.
    pub fn add(&mut self, template: SymbolAtom, fields: Vec<Field>, hash_value: u64) -> FactId {
        let id = FactId(self.next_id);
        self.next_id += 1;
        self.facts.insert(
            id,
            Fact {
                id,
                template,
                fields,
                hash_value,
            },
        );
        id
    }

    pub fn remove(&mut self, id: FactId) -> Option<Fact> {
        self.facts.remove(&id)
    }

    pub fn get(&self, id: FactId) -> Option<&Fact> {
        self.facts.get(&id)
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fact> {
        self.facts.values()
    }
}

impl FactLookup for FactList {
    fn lookup(&self, id: FactId) -> Option<&Fact> {
        self.get(id)
    }
}

//! Interning, reference counting and value access for Environment.

use tracing::trace;

use super::Environment;
use crate::backend::atoms::{
    Atom, AtomKind, BitMapAtom, BitMapKind, ExternalAddress, ExternalAddressAtom,
    ExternalAddressKind, FloatAtom, FloatKind, IntegerAtom, IntegerKind, SymbolAtom, SymbolKind,
};
use crate::backend::facts::Field;

/// Entries given traversal indices by [`Environment::set_atom_indices`], per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexCounts {
    pub symbols: usize,
    pub floats: usize,
    pub integers: usize,
    pub bitmaps: usize,
    pub external_addresses: usize,
}

impl Environment {
    /// Look up or create the entry for `input` at the current depth. The
    /// reference count is left unchanged.
    pub fn intern<K: AtomKind>(&mut self, input: &K::Input) -> Atom<K> {
        let depth = self.depth;
        K::table_mut(&mut self.atoms).intern(input, &mut self.memory, depth)
    }

    /// Intern and retain in one step.
    pub fn install<K: AtomKind>(&mut self, input: &K::Input) -> Atom<K> {
        let atom = self.intern::<K>(input);
        self.retain(atom);
        atom
    }

    pub fn find<K: AtomKind>(&self, input: &K::Input) -> Option<Atom<K>> {
        K::table(&self.atoms).find(input, &self.memory)
    }

    pub fn retain<K: AtomKind>(&mut self, atom: Atom<K>) {
        K::table_mut(&mut self.atoms).retain(atom);
    }

    /// Drop a reference. At zero the entry becomes ephemeral at the current depth.
    pub fn release<K: AtomKind>(&mut self, atom: Atom<K>) {
        let depth = self.depth;
        K::table_mut(&mut self.atoms).release(atom, depth);
    }

    pub fn count<K: AtomKind>(&self, atom: Atom<K>) -> usize {
        K::table(&self.atoms).count(atom)
    }

    pub fn is_ephemeral<K: AtomKind>(&self, atom: Atom<K>) -> bool {
        K::table(&self.atoms).is_ephemeral(atom)
    }

    /// Whether `atom` still refers to a live entry.
    pub fn is_live<K: AtomKind>(&self, atom: Atom<K>) -> bool {
        K::table(&self.atoms).contains(atom)
    }

    pub fn make_permanent<K: AtomKind>(&mut self, atom: Atom<K>) {
        K::table_mut(&mut self.atoms).make_permanent(atom);
    }

    // ------------------------------------------------------------------
    // Per-kind entry points
    // ------------------------------------------------------------------

    pub fn intern_symbol(&mut self, text: &str) -> SymbolAtom {
        self.intern::<SymbolKind>(text)
    }

    /// Strings share the symbol table; the distinction lives in [`Field`].
    pub fn intern_string(&mut self, text: &str) -> SymbolAtom {
        self.intern::<SymbolKind>(text)
    }

    pub fn intern_integer(&mut self, value: i64) -> IntegerAtom {
        self.intern::<IntegerKind>(&value)
    }

    pub fn intern_float(&mut self, value: f64) -> FloatAtom {
        self.intern::<FloatKind>(&value)
    }

    pub fn intern_bitmap(&mut self, bytes: &[u8]) -> BitMapAtom {
        self.intern::<BitMapKind>(bytes)
    }

    pub fn intern_external_address(&mut self, address: usize, type_id: u16) -> ExternalAddressAtom {
        self.intern::<ExternalAddressKind>(&ExternalAddress::new(address, type_id))
    }

    pub fn install_symbol(&mut self, text: &str) -> SymbolAtom {
        self.install::<SymbolKind>(text)
    }

    pub fn install_integer(&mut self, value: i64) -> IntegerAtom {
        self.install::<IntegerKind>(&value)
    }

    pub fn install_float(&mut self, value: f64) -> FloatAtom {
        self.install::<FloatKind>(&value)
    }

    pub fn install_bitmap(&mut self, bytes: &[u8]) -> BitMapAtom {
        self.install::<BitMapKind>(bytes)
    }

    pub fn install_external_address(&mut self, address: usize, type_id: u16) -> ExternalAddressAtom {
        self.install::<ExternalAddressKind>(&ExternalAddress::new(address, type_id))
    }

    pub fn find_symbol(&self, text: &str) -> Option<SymbolAtom> {
        self.find::<SymbolKind>(text)
    }

    pub fn find_integer(&self, value: i64) -> Option<IntegerAtom> {
        self.find::<IntegerKind>(&value)
    }

    pub fn find_float(&self, value: f64) -> Option<FloatAtom> {
        self.find::<FloatKind>(&value)
    }

    pub fn symbol_text(&self, atom: SymbolAtom) -> &str {
        self.atoms.symbols.text(atom, &self.memory)
    }

    pub fn integer_value(&self, atom: IntegerAtom) -> i64 {
        self.atoms.integers.value(atom)
    }

    pub fn float_value(&self, atom: FloatAtom) -> f64 {
        self.atoms.floats.value(atom)
    }

    pub fn bitmap_bytes(&self, atom: BitMapAtom) -> &[u8] {
        self.atoms.bitmaps.bytes(atom, &self.memory)
    }

    pub fn external_address(&self, atom: ExternalAddressAtom) -> ExternalAddress {
        self.atoms.external_addresses.address(atom)
    }

    // ------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------

    /// Retain every atom a field refers to, recursing into multifields.
    /// Fact addresses hold no atom.
    pub fn install_field(&mut self, field: &Field) {
        match field {
            Field::Symbol(atom) | Field::String(atom) => self.retain(*atom),
            Field::Integer(atom) => self.retain(*atom),
            Field::Float(atom) => self.retain(*atom),
            Field::ExternalAddress(atom) => self.retain(*atom),
            Field::FactAddress(_) => {}
            Field::Multifield(nested) => {
                for inner in nested {
                    self.install_field(inner);
                }
            }
        }
    }

    /// Release every atom a field refers to.
    pub fn deinstall_field(&mut self, field: &Field) {
        match field {
            Field::Symbol(atom) | Field::String(atom) => self.release(*atom),
            Field::Integer(atom) => self.release(*atom),
            Field::Float(atom) => self.release(*atom),
            Field::ExternalAddress(atom) => self.release(*atom),
            Field::FactAddress(_) => {}
            Field::Multifield(nested) => {
                for inner in nested {
                    self.deinstall_field(inner);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Atomic value indexing
    // ------------------------------------------------------------------

    /// Mark an entry for [`Environment::set_atom_indices`].
    pub fn mark_needed<K: AtomKind>(&mut self, atom: Atom<K>) {
        K::table_mut(&mut self.atoms).mark_needed(atom);
    }

    pub fn clear_needed_marks(&mut self) {
        self.atoms.symbols.clear_needed();
        self.atoms.floats.clear_needed();
        self.atoms.integers.clear_needed();
        self.atoms.bitmaps.clear_needed();
        self.atoms.external_addresses.clear_needed();
    }

    /// Give needed entries (all entries with `set_all`) dense traversal
    /// indices in place of their buckets. Interning and sweeping are fatal
    /// until [`Environment::restore_atom_buckets`].
    pub fn set_atom_indices(&mut self, set_all: bool) -> IndexCounts {
        let counts = IndexCounts {
            symbols: self.atoms.symbols.set_indices(set_all),
            floats: self.atoms.floats.set_indices(set_all),
            integers: self.atoms.integers.set_indices(set_all),
            bitmaps: self.atoms.bitmaps.set_indices(set_all),
            external_addresses: self.atoms.external_addresses.set_indices(set_all),
        };
        trace!(target: "atomtron::environment::indices", ?counts, set_all, "Set atomic value indices");
        counts
    }

    pub fn restore_atom_buckets(&mut self) {
        self.atoms.symbols.restore_buckets();
        self.atoms.floats.restore_buckets();
        self.atoms.integers.restore_buckets();
        self.atoms.bitmaps.restore_buckets();
        self.atoms.external_addresses.restore_buckets();
    }

    /// Traversal index of an entry while indices are set, its bucket otherwise.
    pub fn atom_bucket<K: AtomKind>(&self, atom: Atom<K>) -> usize {
        K::table(&self.atoms).bucket(atom)
    }
}

//! The isolation unit of the runtime.
//!
//! An [`Environment`] owns the allocator, the five atomic value tables, the
//! evaluation depth, the fact list and the fact index. Nothing is shared
//! between environments, so any number of them can coexist in one process.
//! Operations are split by area into the submodules below, each adding an
//! `impl Environment` block.

mod atom_ops;
mod completion;
mod fact_storage;
mod gc;

#[cfg(test)]
mod tests;

use std::fmt;

use tracing::debug;

use super::atoms::{AtomTables, IntegerAtom, SymbolAtom};
use super::config::RuntimeConfig;
use super::errors::{fatal, SystemError};
use super::facts::{FactHashTable, FactList};
use super::memory::{MemoryPool, MemoryStats};

pub use atom_ops::IndexCounts;
pub use completion::SymbolMatches;
pub use fact_storage::{AssertOutcome, DuplicateListener, DuplicationCheck};
pub use gc::CleanupThresholds;

/// Callback run with an external address when its entry is freed.
pub type DiscardFn = Box<dyn FnMut(usize)>;

/// A registered kind of external address.
pub struct ExternalAddressType {
    pub name: String,
    discard: Option<DiscardFn>,
}

impl fmt::Debug for ExternalAddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalAddressType")
            .field("name", &self.name)
            .field("discard", &self.discard.is_some())
            .finish()
    }
}

/// Values interned and retained when the environment is created.
#[derive(Debug, Clone, Copy)]
pub struct SpecialAtoms {
    pub true_symbol: SymbolAtom,
    pub false_symbol: SymbolAtom,
    pub positive_infinity: SymbolAtom,
    pub negative_infinity: SymbolAtom,
    pub zero: IntegerAtom,
}

pub struct Environment {
    memory: MemoryPool,
    atoms: AtomTables,
    /// Nesting level of the evaluation in progress.
    depth: usize,
    specials: SpecialAtoms,
    address_types: Vec<ExternalAddressType>,

    facts: FactList,
    fact_index: FactHashTable,
    allow_duplicates: bool,
    duplicate_listener: Option<DuplicateListener>,

    cleanup: CleanupThresholds,
    config: RuntimeConfig,
}

impl Environment {
    pub fn new(config: RuntimeConfig) -> Self {
        let mut memory = MemoryPool::with_settings(
            config.memory.small_object_threshold,
            config.memory.block_size,
            config.memory.limit_bytes,
        );
        let mut atoms = AtomTables::new(&config.tables);

        let mut constant = |text: &str| {
            let table = &mut atoms.symbols;
            let atom = table.intern(text, &mut memory, 0);
            table.retain(atom);
            table.make_permanent(atom);
            atom
        };
        let true_symbol = constant("TRUE");
        let false_symbol = constant("FALSE");
        let positive_infinity = constant("+oo");
        let negative_infinity = constant("-oo");

        let zero = atoms.integers.intern(&0, &mut memory, 0);
        atoms.integers.retain(zero);
        atoms.integers.make_permanent(zero);

        debug!(
            target: "atomtron::environment",
            symbol_buckets = config.tables.symbol_buckets,
            fact_hash_size = config.facts.hash_size,
            "Created environment"
        );

        Environment {
            memory,
            atoms,
            depth: 0,
            specials: SpecialAtoms {
                true_symbol,
                false_symbol,
                positive_infinity,
                negative_infinity,
                zero,
            },
            address_types: Vec::new(),
            facts: FactList::new(),
            fact_index: FactHashTable::new(config.facts.hash_size),
            allow_duplicates: config.facts.allow_duplicates,
            duplicate_listener: None,
            cleanup: CleanupThresholds::new(&config.gc),
            config,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn specials(&self) -> &SpecialAtoms {
        &self.specials
    }

    pub fn atoms(&self) -> &AtomTables {
        &self.atoms
    }

    pub fn memory(&self) -> &MemoryPool {
        &self.memory
    }

    /// Direct access to the allocator, e.g. to install a low-memory handler.
    pub fn memory_mut(&mut self) -> &mut MemoryPool {
        &mut self.memory
    }

    // ------------------------------------------------------------------
    // Evaluation depth
    // ------------------------------------------------------------------

    pub fn evaluation_depth(&self) -> usize {
        self.depth
    }

    pub fn set_evaluation_depth(&mut self, depth: usize) {
        self.depth = depth;
    }

    pub fn enter_evaluation(&mut self) {
        self.depth += 1;
    }

    pub fn exit_evaluation(&mut self) {
        if self.depth == 0 {
            fatal(SystemError::EvaluationDepthUnderflow);
        }
        self.depth -= 1;
    }

    // ------------------------------------------------------------------
    // External address types
    // ------------------------------------------------------------------

    /// Register an external address type, returning its id. `discard` runs on
    /// the address of every entry of this type that a sweep frees.
    pub fn install_external_address_type(
        &mut self,
        name: impl Into<String>,
        discard: Option<DiscardFn>,
    ) -> u16 {
        let id = self.address_types.len() as u16;
        let name = name.into();
        debug!(target: "atomtron::environment", name = %name, id, "Installed external address type");
        self.address_types.push(ExternalAddressType { name, discard });
        id
    }

    pub fn external_address_type(&self, id: u16) -> Option<&ExternalAddressType> {
        self.address_types.get(id as usize)
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    pub fn memory_stats(&self) -> MemoryStats {
        self.memory.stats()
    }

    /// Return pooled memory to the system. See [`MemoryPool::release_all`].
    pub fn release_memory(&mut self, max_bytes: usize, force: bool) -> usize {
        self.memory.release_all(max_bytes, force)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("depth", &self.depth)
            .field("atoms", &self.atoms)
            .field("facts", &self.facts.len())
            .field("memory", &self.memory)
            .finish()
    }
}

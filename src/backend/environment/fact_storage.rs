//! Fact list operations for Environment.
//!
//! Asserting a fact hashes it, rejects it if an identical fact is already
//! asserted (unless duplication is allowed), then retains every atom it
//! refers to. Retracting releases them again.

use tracing::{debug, trace};

use super::Environment;
use crate::backend::atoms::SymbolAtom;
use crate::backend::errors::{fatal, SystemError};
use crate::backend::facts::{hash_fact, Fact, FactHashTable, FactId, Field};

/// Called with the existing fact when an assertion is rejected as a duplicate.
pub type DuplicateListener = Box<dyn FnMut(FactId)>;

/// Result of checking a candidate fact against the fact index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicationCheck {
    /// No identical fact is asserted; carries the candidate's hash.
    Unique(u64),
    /// An identical fact is already asserted.
    Duplicate(FactId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertOutcome {
    Asserted(FactId),
    /// Rejected; carries the fact that was already asserted.
    Duplicate(FactId),
}

impl AssertOutcome {
    pub fn fact_id(self) -> FactId {
        match self {
            AssertOutcome::Asserted(id) | AssertOutcome::Duplicate(id) => id,
        }
    }

    pub fn is_duplicate(self) -> bool {
        matches!(self, AssertOutcome::Duplicate(_))
    }
}

impl Environment {
    /// Unreduced hash of a candidate fact.
    pub fn hash_fact(&self, template: SymbolAtom, fields: &[Field]) -> u64 {
        hash_fact(template, fields, &self.atoms, &self.memory)
    }

    /// Check a candidate against the asserted facts. A duplicate is reported
    /// to the duplicate listener. With duplication allowed every candidate is
    /// unique.
    pub fn handle_fact_duplication(
        &mut self,
        template: SymbolAtom,
        fields: &[Field],
    ) -> DuplicationCheck {
        let hash = self.hash_fact(template, fields);
        if self.allow_duplicates {
            return DuplicationCheck::Unique(hash);
        }

        match self
            .fact_index
            .find_duplicate(template, fields, hash, None, &self.facts)
        {
            Some(existing) => {
                if let Some(listener) = self.duplicate_listener.as_mut() {
                    listener(existing);
                }
                DuplicationCheck::Duplicate(existing)
            }
            None => DuplicationCheck::Unique(hash),
        }
    }

    pub fn assert_fact(&mut self, template: SymbolAtom, fields: Vec<Field>) -> AssertOutcome {
        let hash = match self.handle_fact_duplication(template, &fields) {
            DuplicationCheck::Duplicate(existing) => {
                trace!(target: "atomtron::facts", existing = %existing, "Duplicate fact rejected");
                return AssertOutcome::Duplicate(existing);
            }
            DuplicationCheck::Unique(hash) => hash,
        };

        self.retain(template);
        for field in &fields {
            self.install_field(field);
        }

        let id = self.facts.add(template, fields, hash);
        self.fact_index.insert(id, hash);
        trace!(target: "atomtron::facts", id = %id, hash, "Asserted fact");
        AssertOutcome::Asserted(id)
    }

    /// Remove a fact and release its atoms. Returns `false` for an unknown id.
    pub fn retract_fact(&mut self, id: FactId) -> bool {
        let Some(fact) = self.facts.remove(id) else {
            return false;
        };
        if !self.fact_index.remove(id, fact.hash_value) {
            fatal(SystemError::UnindexedFact { id: id.0 });
        }

        self.release(fact.template);
        for field in &fact.fields {
            self.deinstall_field(field);
        }
        trace!(target: "atomtron::facts", id = %id, "Retracted fact");
        true
    }

    pub fn fact(&self, id: FactId) -> Option<&Fact> {
        self.facts.get(id)
    }

    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    pub fn facts(&self) -> impl Iterator<Item = &Fact> {
        self.facts.iter()
    }

    pub fn fact_hash_table(&self) -> &FactHashTable {
        &self.fact_index
    }

    /// Allow or forbid identical facts. Returns the previous setting.
    pub fn set_fact_duplication(&mut self, allow: bool) -> bool {
        std::mem::replace(&mut self.allow_duplicates, allow)
    }

    pub fn fact_duplication(&self) -> bool {
        self.allow_duplicates
    }

    pub fn set_duplicate_listener<F>(&mut self, listener: F)
    where
        F: FnMut(FactId) + 'static,
    {
        self.duplicate_listener = Some(Box::new(listener));
    }

    pub fn clear_duplicate_listener(&mut self) {
        self.duplicate_listener = None;
    }

    /// Rebuild the fact index at its configured baseline size.
    pub fn initialize_fact_hash_table(&mut self) {
        let mut index = FactHashTable::new(self.config.facts.hash_size);
        for fact in self.facts.iter() {
            index.insert(fact.id, fact.hash_value);
        }
        debug!(
            target: "atomtron::facts",
            size = index.size(),
            facts = index.len(),
            "Initialized fact hash table"
        );
        self.fact_index = index;
    }
}

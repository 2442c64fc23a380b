//! Symbol completion: find interned symbols by prefix or substring.
//!
//! Ephemeral symbols and symbols starting with `(` (internal names) are never
//! offered.

use super::Environment;
use crate::backend::atoms::SymbolAtom;

/// Result of a completion query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolMatches {
    /// Matches in symbol table traversal order.
    pub matches: Vec<SymbolAtom>,
    /// Length in bytes of the longest prefix shared by every match. Always 0
    /// for substring queries.
    pub common_prefix_length: usize,
}

impl SymbolMatches {
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

fn common_prefix_length(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

impl Environment {
    fn completion_candidates(&self) -> impl Iterator<Item = (SymbolAtom, &str)> + '_ {
        let table = &self.atoms.symbols;
        table
            .iter()
            .filter(move |atom| !table.is_ephemeral(*atom))
            .map(move |atom| (atom, table.text(atom, &self.memory)))
            .filter(|(_, text)| !text.starts_with('('))
    }

    /// Symbols beginning with `prefix`.
    pub fn find_symbol_matches(&self, prefix: &str) -> SymbolMatches {
        let mut result = SymbolMatches::default();
        let mut first: Option<&str> = None;

        for (atom, text) in self.completion_candidates() {
            if !text.starts_with(prefix) {
                continue;
            }
            result.common_prefix_length = match first {
                None => {
                    first = Some(text);
                    text.len()
                }
                Some(previous) => result
                    .common_prefix_length
                    .min(common_prefix_length(previous, text)),
            };
            result.matches.push(atom);
        }
        result
    }

    /// Symbols containing `needle` anywhere. An empty needle matches nothing.
    pub fn find_symbols_containing(&self, needle: &str) -> SymbolMatches {
        if needle.is_empty() {
            return SymbolMatches::default();
        }
        SymbolMatches {
            matches: self
                .completion_candidates()
                .filter(|(_, text)| text.contains(needle))
                .map(|(atom, _)| atom)
                .collect(),
            common_prefix_length: 0,
        }
    }
}

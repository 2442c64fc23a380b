//! atomtron - interned atomic values with depth-gated collection
//!
//! This library provides the value layer of a rule engine: symbols, strings,
//! integers, floats, bitmaps and external addresses interned in per-kind hash
//! tables, reference counted by their holders, and reclaimed in bulk by a sweep
//! keyed to the evaluation depth. Facts built from those values are indexed by
//! hash so identical facts are detected on assertion.
//!
//! # Architecture
//!
//! 1. **Memory** (`backend::memory`)
//!    - Small requests are served from pooled blocks with exact-size free lists
//!    - Large requests go straight to the system
//!    - Optional ceiling with a low-memory callback
//!
//! 2. **Atoms** (`backend::atoms`)
//!    - One chained hash table per value kind, one entry per distinct value
//!    - Zero-count entries wait on an ephemeral list, tagged with the depth
//!    - A sweep at depth `d` frees entries orphaned deeper than `d`
//!
//! 3. **Facts** (`backend::facts`)
//!    - Position-weighted fact hash
//!    - Growing/shrinking hash index for duplicate detection
//!
//! 4. **Scanner** (`scanner` module)
//!    - Reads symbol, string, integer and float literals and fact literals
//!
//! # Example
//!
//! ```rust
//! use atomtron::backend::*;
//!
//! let mut env = Environment::default();
//! let point = env.intern_symbol("point");
//! let x = Field::Integer(env.intern_integer(1));
//!
//! let first = env.assert_fact(point, vec![x.clone()]);
//! let again = env.assert_fact(point, vec![x]);
//! assert_eq!(again, AssertOutcome::Duplicate(first.fact_id()));
//!
//! // Values created inside a nested evaluation and dropped there are
//! // reclaimed once evaluation returns.
//! env.enter_evaluation();
//! let scratch = env.intern_symbol("scratch");
//! env.exit_evaluation();
//! env.remove_ephemeral_atoms();
//! assert!(!env.is_live(scratch));
//! ```

pub mod backend;
pub mod scanner;

pub use backend::{AssertOutcome, Environment, Field, RuntimeConfig};
pub use scanner::{FactLiteral, ScanError, Scanner, Token};

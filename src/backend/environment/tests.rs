//! Tests for Environment: depth-gated collection, facts, completion and
//! administration.

use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::backend::atoms::SymbolKind;
use crate::backend::config::{GcConfig, RuntimeConfig};
use crate::backend::facts::{FactId, Field};

fn small_config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.tables.symbol_buckets = 31;
    config.facts.hash_size = 3;
    config
}

/// Helper: intern `(template n...)` field lists of integers.
fn int_fields(env: &mut Environment, values: &[i64]) -> Vec<Field> {
    values
        .iter()
        .map(|v| Field::Integer(env.intern_integer(*v)))
        .collect()
}

// ============================================================================
// Construction and depth
// ============================================================================

#[test]
fn test_special_atoms_are_retained() {
    let mut env = Environment::default();
    let specials = *env.specials();

    assert_eq!(env.symbol_text(specials.true_symbol), "TRUE");
    assert_eq!(env.symbol_text(specials.false_symbol), "FALSE");
    assert_eq!(env.symbol_text(specials.positive_infinity), "+oo");
    assert_eq!(env.symbol_text(specials.negative_infinity), "-oo");
    assert_eq!(env.integer_value(specials.zero), 0);
    assert_eq!(env.count(specials.true_symbol), 1);

    env.sweep(0);
    assert!(env.is_live(specials.false_symbol));
    assert!(!env.is_ephemeral(specials.zero));
    assert_eq!(env.intern_symbol("TRUE"), specials.true_symbol);
}

#[test]
fn test_depth_tracking() {
    let mut env = Environment::default();
    assert_eq!(env.evaluation_depth(), 0);
    env.enter_evaluation();
    env.enter_evaluation();
    assert_eq!(env.evaluation_depth(), 2);
    env.exit_evaluation();
    assert_eq!(env.evaluation_depth(), 1);
    env.set_evaluation_depth(7);
    assert_eq!(env.evaluation_depth(), 7);
}

#[test]
#[should_panic(expected = "evaluation depth decremented below zero")]
fn test_exit_at_depth_zero_is_fatal() {
    let mut env = Environment::default();
    env.exit_evaluation();
}

#[test]
fn test_environments_are_isolated() {
    let mut a = Environment::default();
    let mut b = Environment::default();
    a.install_symbol("only-in-a");
    assert!(a.find_symbol("only-in-a").is_some());
    assert!(b.find_symbol("only-in-a").is_none());
    b.intern_symbol("only-in-b");
    assert!(a.find_symbol("only-in-b").is_none());
}

// ============================================================================
// Collection
// ============================================================================

#[test]
fn test_nested_evaluation_garbage_is_collected() {
    let mut env = Environment::new(small_config());

    env.set_evaluation_depth(3);
    let temp = env.intern_symbol("temp");
    let kept = env.install_symbol("kept");
    env.retain(temp);
    env.release(temp);

    let stats = env.remove_ephemeral_atoms();
    assert_eq!(stats.freed, 0);
    assert!(env.is_live(temp));

    env.set_evaluation_depth(2);
    env.remove_ephemeral_atoms();
    assert!(!env.is_live(temp));
    assert!(env.is_live(kept));
    assert_eq!(env.find_symbol("kept"), Some(kept));
    assert!(env.find_symbol("temp").is_none());
}

#[test]
fn test_every_kind_is_swept() {
    let mut env = Environment::default();
    env.enter_evaluation();
    let s = env.intern_symbol("s");
    let i = env.intern_integer(42);
    let f = env.intern_float(1.25);
    let b = env.intern_bitmap(&[9, 9, 9]);
    let x = env.intern_external_address(0x8000, 0);
    env.exit_evaluation();

    let stats = env.remove_ephemeral_atoms();
    assert_eq!(stats.freed, 5);
    assert!(!env.is_live(s));
    assert!(!env.is_live(i));
    assert!(!env.is_live(f));
    assert!(!env.is_live(b));
    assert!(!env.is_live(x));
}

#[test]
fn test_external_address_discard_runs_on_free() {
    let mut env = Environment::default();
    let freed = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&freed);
    let handle = env.install_external_address_type(
        "handle",
        Some(Box::new(move |address: usize| sink.borrow_mut().push(address))),
    );
    assert_eq!(env.external_address_type(handle).map(|t| t.name.as_str()), Some("handle"));

    env.enter_evaluation();
    let held = env.install_external_address(0x2000, handle);
    let dropped = env.intern_external_address(0x1000, handle);
    env.exit_evaluation();
    env.remove_ephemeral_atoms();

    assert_eq!(*freed.borrow(), vec![0x1000]);
    assert!(!env.is_live(dropped));
    assert_eq!(env.external_address(held).address, 0x2000);

    env.enter_evaluation();
    env.release(held);
    env.exit_evaluation();
    env.remove_ephemeral_atoms();
    assert_eq!(*freed.borrow(), vec![0x1000, 0x2000]);
}

#[test]
fn test_periodic_cleanup_adapts_thresholds() {
    let mut config = RuntimeConfig::default();
    config.gc = GcConfig {
        ephemeral_count_increment: 3,
        ephemeral_size_increment: 1 << 30,
    };
    let mut env = Environment::new(config);
    env.remove_ephemeral_atoms();
    assert_eq!(env.ephemeral_stats().item_count, 0);

    // Four zero-count atoms at the current depth stay on the lists.
    for n in 0..4 {
        env.intern_integer(100 + n);
    }
    env.enter_evaluation();
    env.intern_symbol("scratch");
    env.exit_evaluation();
    assert_eq!(env.ephemeral_stats().item_count, 5);

    let stats = env.periodic_cleanup().expect("backlog over threshold");
    assert_eq!(stats.freed, 1);
    assert_eq!(stats.pending, 4);
    assert_eq!(env.cleanup_thresholds().count_max, 4 + 3);

    assert!(env.periodic_cleanup().is_none());
}

#[test]
fn test_periodic_cleanup_idle_below_threshold() {
    let mut env = Environment::default();
    env.remove_ephemeral_atoms();
    env.intern_symbol("one");
    assert!(env.periodic_cleanup().is_none());
    assert_eq!(env.cleanup_thresholds().count_max, 1000);
}

// ============================================================================
// Facts
// ============================================================================

#[test]
fn test_assert_rejects_duplicate() {
    let mut env = Environment::new(small_config());
    let point = env.intern_symbol("point");
    let fields = int_fields(&mut env, &[1, 2]);

    let first = env.assert_fact(point, fields.clone());
    let AssertOutcome::Asserted(id) = first else {
        panic!("expected assertion, got {:?}", first);
    };
    assert_eq!(env.assert_fact(point, fields), AssertOutcome::Duplicate(id));
    assert_eq!(env.fact_count(), 1);

    let other = int_fields(&mut env, &[2, 1]);
    assert!(!env.assert_fact(point, other).is_duplicate());
    assert_eq!(env.fact_count(), 2);
}

#[test]
fn test_duplicate_listener_notified() {
    let mut env = Environment::new(small_config());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    env.set_duplicate_listener(move |id| sink.borrow_mut().push(id));

    let t = env.intern_symbol("t");
    let id = env.assert_fact(t, vec![]).fact_id();
    env.assert_fact(t, vec![]);
    env.assert_fact(t, vec![]);
    assert_eq!(*seen.borrow(), vec![id, id]);
}

#[test]
fn test_fact_duplication_setting() {
    let mut env = Environment::new(small_config());
    assert!(!env.fact_duplication());
    assert!(!env.set_fact_duplication(true));
    assert!(env.fact_duplication());

    let t = env.intern_symbol("t");
    let fields = int_fields(&mut env, &[5]);
    let a = env.assert_fact(t, fields.clone());
    let b = env.assert_fact(t, fields.clone());
    assert!(!a.is_duplicate() && !b.is_duplicate());
    assert_ne!(a.fact_id(), b.fact_id());

    assert!(env.set_fact_duplication(false));
    assert_eq!(env.assert_fact(t, fields).fact_id(), b.fact_id());
}

#[test]
fn test_assert_retains_and_retract_releases() {
    let mut env = Environment::new(small_config());

    env.enter_evaluation();
    let template = env.intern_symbol("reading");
    let name = env.intern_string("sensor");
    let value = env.intern_float(20.5);
    let fields = vec![
        Field::String(name),
        Field::Multifield(vec![Field::Float(value)]),
    ];
    let id = env.assert_fact(template, fields).fact_id();
    env.exit_evaluation();

    env.remove_ephemeral_atoms();
    assert_eq!(env.count(template), 1);
    assert_eq!(env.count(name), 1);
    assert_eq!(env.count(value), 1);

    env.enter_evaluation();
    assert!(env.retract_fact(id));
    assert!(!env.retract_fact(id));
    env.exit_evaluation();
    assert!(env.fact(id).is_none());
    assert!(env.fact_hash_table().is_empty());

    env.remove_ephemeral_atoms();
    assert!(!env.is_live(template));
    assert!(!env.is_live(name));
    assert!(!env.is_live(value));
}

#[test]
fn test_fact_index_grows_and_shrinks() {
    let mut env = Environment::new(small_config());
    let t = env.intern_symbol("n");
    let ids: Vec<FactId> = (0..4)
        .map(|n| {
            let fields = int_fields(&mut env, &[n]);
            env.assert_fact(t, fields).fact_id()
        })
        .collect();
    assert_eq!(env.fact_hash_table().size(), 7);

    for id in ids {
        env.retract_fact(id);
    }
    assert_eq!(env.fact_hash_table().size(), 3);
}

#[test]
fn test_initialize_fact_hash_table_reindexes() {
    let mut env = Environment::new(small_config());
    let t = env.intern_symbol("n");
    for n in 0..5 {
        let fields = int_fields(&mut env, &[n]);
        env.assert_fact(t, fields);
    }
    env.initialize_fact_hash_table();
    assert_eq!(env.fact_hash_table().len(), 5);

    let fields = int_fields(&mut env, &[3]);
    assert!(env.assert_fact(t, fields).is_duplicate());
}

#[test]
#[should_panic(expected = "missing from the fact hash table")]
fn test_retract_of_unindexed_fact_is_fatal() {
    let mut env = Environment::new(small_config());
    let t = env.intern_symbol("n");
    let fields = int_fields(&mut env, &[1]);
    let id = env.assert_fact(t, fields).fact_id();
    env.fact_index.reset();
    env.retract_fact(id);
}

#[test]
#[should_panic(expected = "symbol table mutated while reindexed")]
fn test_fact_hash_while_indexed_is_fatal() {
    let mut env = Environment::default();
    let t = env.intern_symbol("n");
    env.remove_ephemeral_atoms();
    env.set_atom_indices(true);
    env.assert_fact(t, Vec::new());
}

#[test]
fn test_fact_hash_matches_single_field_rule() {
    let mut env = Environment::new(small_config());
    let t = env.intern_symbol("p");
    let fields = int_fields(&mut env, &[4]);
    let bucket = env.atom_bucket(t) as u64;
    assert_eq!(env.hash_fact(t, &fields), bucket * 73981 + 4 * 29 + 4);
}

// ============================================================================
// Completion
// ============================================================================

#[test]
fn test_prefix_completion() {
    let mut env = Environment::new(small_config());
    for word in ["defrule", "deffacts", "deftemplate", "assert", "(internal"] {
        env.install_symbol(word);
    }
    env.enter_evaluation();
    env.intern_symbol("defunct");
    env.exit_evaluation();

    // Fresh entries stay marked ephemeral until a sweep has seen them retained.
    assert!(env.find_symbol_matches("def").is_empty());
    env.remove_ephemeral_atoms();

    let found = env.find_symbol_matches("def");
    let mut texts: Vec<&str> = found.matches.iter().map(|a| env.symbol_text(*a)).collect();
    texts.sort_unstable();
    assert_eq!(texts, vec!["deffacts", "defrule", "deftemplate"]);
    assert_eq!(found.common_prefix_length, 3);

    let found = env.find_symbol_matches("deft");
    assert_eq!(found.len(), 1);
    assert_eq!(found.common_prefix_length, "deftemplate".len());

    assert!(env.find_symbol_matches("(int").is_empty());
    assert!(env.find_symbol_matches("zzz").is_empty());
}

#[test]
fn test_common_prefix_of_matches() {
    let mut env = Environment::new(small_config());
    env.install_symbol("retract-all");
    env.install_symbol("retract-one");
    env.remove_ephemeral_atoms();
    let found = env.find_symbol_matches("re");
    assert_eq!(found.len(), 2);
    assert_eq!(found.common_prefix_length, "retract-".len());
}

#[test]
fn test_substring_completion() {
    let mut env = Environment::new(small_config());
    env.install_symbol("get-fact-list");
    env.install_symbol("fact-index");
    env.install_symbol("rule");
    env.remove_ephemeral_atoms();

    let found = env.find_symbols_containing("fact");
    assert_eq!(found.len(), 2);
    assert_eq!(found.common_prefix_length, 0);
    assert!(env.find_symbols_containing("").is_empty());
}

// ============================================================================
// Indexing and administration
// ============================================================================

#[test]
fn test_atom_indices_round_trip() {
    let mut env = Environment::new(small_config());
    let a = env.install_symbol("alpha");
    let b = env.install_symbol("beta");
    let home = env.atom_bucket(b);

    env.mark_needed(b);
    let counts = env.set_atom_indices(false);
    assert_eq!(counts.symbols, 1);
    assert_eq!(counts.integers, 0);
    assert_eq!(env.atom_bucket(b), 0);

    env.restore_atom_buckets();
    env.clear_needed_marks();
    assert_eq!(env.atom_bucket(b), home);

    let counts = env.set_atom_indices(true);
    assert_eq!(counts.symbols, env.atoms().symbols.len());
    assert_eq!(counts.integers, 1);
    env.restore_atom_buckets();
    assert!(env.is_live(a));
}

#[test]
#[should_panic(expected = "mutated while reindexed")]
fn test_sweep_while_indexed_is_fatal() {
    let mut env = Environment::default();
    env.set_atom_indices(true);
    env.remove_ephemeral_atoms();
}

#[test]
fn test_memory_stats_and_release() {
    let mut env = Environment::default();
    env.enter_evaluation();
    for n in 0..50 {
        env.intern_symbol(&format!("word-{}", n));
    }
    env.exit_evaluation();
    env.remove_ephemeral_atoms();

    let stats = env.memory_stats();
    assert!(stats.pool_size > 0);
    assert!(stats.mem_used >= stats.pool_size);

    let reclaimed = env.release_memory(0, false);
    assert_eq!(reclaimed, stats.pool_size);
    assert_eq!(env.memory_stats().pool_size, 0);
}

#[test]
fn test_generic_interning_matches_typed() {
    let mut env = Environment::default();
    let a = env.intern::<SymbolKind>("same");
    assert_eq!(env.intern_symbol("same"), a);
    assert_eq!(env.intern_string("same"), a);
}

//! Duplicate detection for facts read from text.

use atomtron::backend::{AssertOutcome, Environment, FactId, Field, RuntimeConfig};
use atomtron::scanner::Scanner;

/// Helper: read and assert every fact in `source`.
fn load(env: &mut Environment, source: &str) -> Vec<AssertOutcome> {
    let mut scanner = Scanner::new(source);
    let mut outcomes = Vec::new();
    while let Some(literal) = scanner.read_fact(env).unwrap() {
        outcomes.push(env.assert_fact(literal.template, literal.fields));
    }
    outcomes
}

#[test]
fn test_identical_literals_are_duplicates() {
    let mut env = Environment::default();
    let outcomes = load(
        &mut env,
        r#"
        ; two readings, one repeated
        (reading "kitchen" 21.5 (celsius calibrated))
        (reading "hall" 19.0 (celsius))
        (reading "kitchen" 21.5 (celsius calibrated))
        "#,
    );

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0], AssertOutcome::Asserted(FactId(0)));
    assert_eq!(outcomes[1], AssertOutcome::Asserted(FactId(1)));
    assert_eq!(outcomes[2], AssertOutcome::Duplicate(FactId(0)));
    assert_eq!(env.fact_count(), 2);
}

#[test]
fn test_string_and_symbol_fields_differ() {
    let mut env = Environment::default();
    let outcomes = load(&mut env, "(tag \"x\")\n(tag x)");
    assert!(outcomes.iter().all(|o| !o.is_duplicate()));
}

#[test]
fn test_integer_and_float_fields_differ() {
    let mut env = Environment::default();
    let outcomes = load(&mut env, "(n 1)\n(n 1.0)\n(n 1.0)");
    assert!(!outcomes[1].is_duplicate());
    assert!(outcomes[2].is_duplicate());
}

#[test]
fn test_single_field_difference_is_not_duplicate() {
    let mut env = Environment::default();
    let outcomes = load(&mut env, "(p a b c)\n(p a b d)\n(p a (b) c)\n(q a b c)");
    assert!(outcomes.iter().all(|o| !o.is_duplicate()));
    assert_eq!(env.fact_count(), 4);
}

#[test]
fn test_equal_facts_have_equal_hashes() {
    let mut env = Environment::default();
    env.set_fact_duplication(true);
    let outcomes = load(&mut env, "(m 4 (x \"y\") 2.5)\n(m 4 (x \"y\") 2.5)");

    let a = env.fact(outcomes[0].fact_id()).unwrap();
    let b = env.fact(outcomes[1].fact_id()).unwrap();
    assert_ne!(a.id, b.id);
    assert_eq!(a.hash_value, b.hash_value);
    assert_eq!(a.fields, b.fields);
}

#[test]
fn test_allow_duplicates_from_config() {
    let config = RuntimeConfig::parse_toml("[facts]\nallow_duplicates = true\n").unwrap();
    let mut env = Environment::new(config);
    let outcomes = load(&mut env, "(a)\n(a)\n(a)");
    assert!(outcomes.iter().all(|o| !o.is_duplicate()));
    assert_eq!(env.fact_count(), 3);
}

#[test]
fn test_retracted_fact_can_be_reasserted() {
    let mut env = Environment::default();
    let first = load(&mut env, "(once more)")[0].fact_id();
    assert!(env.retract_fact(first));

    let again = load(&mut env, "(once more)");
    assert!(!again[0].is_duplicate());
    assert_ne!(again[0].fact_id(), first);
}

#[test]
fn test_growth_keeps_every_fact_findable() {
    let config = RuntimeConfig::parse_toml("[facts]\nhash_size = 5\n").unwrap();
    let mut env = Environment::new(config);

    let source: String = (0..40).map(|n| format!("(item {} \"n{}\")\n", n, n)).collect();
    let outcomes = load(&mut env, &source);
    assert!(outcomes.iter().all(|o| !o.is_duplicate()));
    // 5 -> 11 -> 23 -> 47
    assert_eq!(env.fact_hash_table().size(), 47);

    let repeats = load(&mut env, &source);
    for (original, repeat) in outcomes.iter().zip(&repeats) {
        assert_eq!(*repeat, AssertOutcome::Duplicate(original.fact_id()));
    }
}

#[test]
fn test_fact_fields_hold_their_atoms() {
    let mut env = Environment::default();
    env.enter_evaluation();
    let id = load(&mut env, "(held \"text\" 3)")[0].fact_id();
    env.exit_evaluation();
    env.remove_ephemeral_atoms();

    let fact = env.fact(id).unwrap().clone();
    assert_eq!(env.symbol_text(fact.template), "held");
    match &fact.fields[..] {
        [Field::String(text), Field::Integer(three)] => {
            assert_eq!(env.symbol_text(*text), "text");
            assert_eq!(env.integer_value(*three), 3);
            assert_eq!(env.count(*three), 1);
        }
        other => panic!("unexpected fields {:?}", other),
    }
}

#[test]
fn test_colliding_hashes_are_told_apart() {
    let mut env = Environment::default();
    let p = env.intern_symbol("p");
    let one = vec![Field::Integer(env.intern_integer(1))];
    // v * 30 wraps to the same value for both
    let wrapped = vec![Field::Integer(env.intern_integer(i64::MIN + 1))];
    assert_eq!(env.hash_fact(p, &one), env.hash_fact(p, &wrapped));

    assert_eq!(env.assert_fact(p, one.clone()), AssertOutcome::Asserted(FactId(0)));
    assert_eq!(env.assert_fact(p, wrapped.clone()), AssertOutcome::Asserted(FactId(1)));
    assert_eq!(env.assert_fact(p, wrapped), AssertOutcome::Duplicate(FactId(1)));
    assert_eq!(env.assert_fact(p, one), AssertOutcome::Duplicate(FactId(0)));
}

#[test]
fn test_colliding_field_types_are_told_apart() {
    let mut env = Environment::default();
    let q = env.intern_symbol("q");
    let integer = vec![Field::Integer(env.intern_integer(29))];
    let address = vec![Field::FactAddress(FactId(30))];
    assert_eq!(env.hash_fact(q, &integer), env.hash_fact(q, &address));

    assert!(!env.assert_fact(q, integer).is_duplicate());
    assert!(!env.assert_fact(q, address).is_duplicate());
    assert_eq!(env.fact_count(), 2);
}

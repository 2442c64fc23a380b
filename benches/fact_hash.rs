use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use atomtron::backend::environment::Environment;
use atomtron::backend::Field;

/// Build the fields of fact N: (N "label-N" (N.5 tag))
fn fields_for(env: &mut Environment, n: usize) -> Vec<Field> {
    let tag = env.intern_symbol("tag");
    vec![
        Field::Integer(env.intern_integer(n as i64)),
        Field::String(env.intern_string(&format!("label-{}", n))),
        Field::Multifield(vec![
            Field::Float(env.intern_float(n as f64 + 0.5)),
            Field::Symbol(tag),
        ]),
    ]
}

/// Assertion cost as the fact index grows from its baseline
fn bench_assert(c: &mut Criterion) {
    let mut group = c.benchmark_group("assert_fact");

    for count in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::new("unique", count), count, |b, &count| {
            b.iter(|| {
                let mut env = Environment::default();
                let template = env.intern_symbol("row");
                for n in 0..count {
                    let fields = fields_for(&mut env, n);
                    black_box(env.assert_fact(template, fields));
                }
            });
        });

        // Duplicate detection against a full index
        group.bench_with_input(BenchmarkId::new("duplicate", count), count, |b, &count| {
            let mut env = Environment::default();
            let template = env.intern_symbol("row");
            for n in 0..count {
                let fields = fields_for(&mut env, n);
                env.assert_fact(template, fields);
            }
            let probe = fields_for(&mut env, count / 2);
            b.iter(|| black_box(env.handle_fact_duplication(template, black_box(&probe))));
        });
    }

    group.finish();
}

fn bench_hash_fact(c: &mut Criterion) {
    let mut env = Environment::default();
    let template = env.intern_symbol("row");
    let fields = fields_for(&mut env, 42);

    c.bench_function("hash_fact", |b| {
        b.iter(|| black_box(env.hash_fact(template, black_box(&fields))));
    });
}

criterion_group!(benches, bench_assert, bench_hash_fact);
criterion_main!(benches);

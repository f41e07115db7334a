//! Batch vs. streaming grouped aggregation, crossing
//! `streaming_aggregation_threshold` to show the switchover.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use datalog_ast::{AggregateFunc, Find, FindElement, Symbol};
use datalog_engine::options::ExecutorOptions;
use datalog_engine::relation::Relation;
use datalog_engine::value::{Tuple, Value};

fn sym(name: &str) -> Symbol {
    Symbol::new(name)
}

fn seeded_tuples(n: i64) -> Vec<Tuple> {
    (0..n).map(|i| Tuple::new(vec![Value::Int(i % 200), Value::Float((i % 97) as f64)])).collect()
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("grouped_sum");
    let find = Find::new(vec![
        FindElement::Variable(sym("group")),
        FindElement::Aggregate { func: AggregateFunc::Sum, arg: sym("amount"), condition: None },
    ]);
    let columns = vec![sym("group"), sym("amount")];

    for size in [100usize, 1_000, 50_000] {
        let tuples = seeded_tuples(size as i64);

        let batch_options = ExecutorOptions::default();
        let batch_relation = Relation::materialized(columns.clone(), tuples.clone());
        group.bench_with_input(BenchmarkId::new("batch", size), &size, |b, _| {
            b.iter(|| black_box(batch_relation.aggregate(&find, &batch_options).unwrap()));
        });

        let streaming_options = ExecutorOptions::default();
        group.bench_with_input(BenchmarkId::new("streaming", size), &size, |b, _| {
            b.iter_batched(
                || {
                    let tuples = tuples.clone();
                    Relation::streaming(columns.clone(), Box::new(tuples.into_iter()))
                },
                |relation| black_box(relation.aggregate(&find, &streaming_options).unwrap()),
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_aggregate);
criterion_main!(benches);

//! Benchmarks for snapshot diffing.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dash_core::{DocumentReference, DocumentSnapshot, Fields, Value};
use dash_storage::compute_changes;

fn make_docs(count: usize, version: u64) -> Vec<DocumentSnapshot> {
    (0..count)
        .map(|i| {
            let mut fields = Fields::new();
            fields.insert("order".into(), Value::Int64(i as i64));
            fields.insert("title".into(), Value::String(format!("Item {}", i)));
            DocumentSnapshot::new(DocumentReference::new("items", format!("doc-{:06}", i)), fields, version)
        })
        .collect()
}

/// Benchmark: diff of an unchanged page vs a page with a new head and one edit
fn compute_changes_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_changes");

    for count in [20usize, 200, 2000].iter() {
        let previous = make_docs(*count, 1);

        group.bench_with_input(BenchmarkId::new("unchanged", count), count, |b, _| {
            let current = previous.clone();
            b.iter(|| compute_changes(black_box(&previous), black_box(&current)))
        });

        group.bench_with_input(BenchmarkId::new("shifted", count), count, |b, _| {
            let mut current = previous.clone();
            current.pop();
            let head = DocumentSnapshot::new(DocumentReference::new("items", "head"), Fields::new(), 2);
            current.insert(0, head);
            if let Some(doc) = current.get_mut(count / 2) {
                *doc = DocumentSnapshot::new(doc.reference().clone(), Fields::new(), 3);
            }
            b.iter(|| compute_changes(black_box(&previous), black_box(&current)))
        });
    }

    group.finish();
}

criterion_group!(benches, compute_changes_benchmark);
criterion_main!(benches);

//! Benchmarks for tree reconciliation and patch application.
//!
//! Run with: cargo bench -p presage-core

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use presage_core::{UiNode, patched, reconcile};
use std::hint::black_box;

// =============================================================================
// Test Data
// =============================================================================

/// A list of `rows` items; every `stride`-th row differs in text and class
/// when `revision` changes, and every third row is conditionally absent.
fn list(rows: usize, revision: u32, stride: usize) -> UiNode {
    UiNode::element("ul")
        .attr("class", "list")
        .children((0..rows).map(|i| {
            let bumped = i % stride == 0;
            let label = if bumped {
                format!("Row {i} rev {revision}")
            } else {
                format!("Row {i}")
            };
            if i % 3 == 2 && revision % 2 == 1 {
                return UiNode::null();
            }
            UiNode::element("li")
                .attr("class", if bumped && revision > 0 { "row hot" } else { "row" })
                .child(UiNode::text(label))
                .build()
        }))
        .build()
        .with_assigned_paths()
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");
    for rows in [10usize, 100, 1_000] {
        let old = list(rows, 0, 10);
        let new = list(rows, 1, 10);
        group.throughput(Throughput::Elements(rows as u64));

        group.bench_with_input(BenchmarkId::new("identical", rows), &old, |b, tree| {
            b.iter(|| black_box(reconcile(black_box(tree), black_box(tree))));
        });
        group.bench_with_input(
            BenchmarkId::new("sparse_change", rows),
            &(old.clone(), new.clone()),
            |b, (old, new)| {
                b.iter(|| black_box(reconcile(black_box(old), black_box(new))));
            },
        );
    }
    group.finish();
}

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply");
    for rows in [10usize, 100, 1_000] {
        let old = list(rows, 0, 10);
        let patches = reconcile(&old, &list(rows, 1, 10));
        group.throughput(Throughput::Elements(patches.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("patched", rows),
            &(old, patches),
            |b, (old, patches)| {
                b.iter(|| black_box(patched(black_box(old), black_box(patches))));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_reconcile, bench_apply);
criterion_main!(benches);

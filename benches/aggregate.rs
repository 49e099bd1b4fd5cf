//! Benchmarks for progress aggregation and reconciliation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use obra::aggregate::aggregate;
use obra::budget::BudgetTemplate;
use obra::matrix::ProgressMatrix;
use obra::reconcile::reconcile;
use obra::unit::HousingUnits;

fn filled_matrix(template: &BudgetTemplate, units: usize) -> ProgressMatrix {
    let mut matrix = ProgressMatrix::zeroed(template, units);
    for (i, item) in template.items().enumerate() {
        for position in 0..units {
            matrix.set(&item.id, position, ((i * 7 + position * 13) % 101) as f64);
        }
    }
    matrix
}

fn bench_aggregate(c: &mut Criterion) {
    let template = BudgetTemplate::default_housing();
    let matrix = filled_matrix(&template, 200);

    c.bench_function("aggregate_default_200_units", |bench| {
        bench.iter(|| black_box(aggregate(&template, &matrix, 200, 12_500_000.0)))
    });
}

fn bench_reconcile(c: &mut Criterion) {
    let template = BudgetTemplate::default_housing();
    let matrix = filled_matrix(&template, 200);
    let old = HousingUnits::numbered(200);
    let mut new = old.clone();
    new.remove("u100").unwrap();

    c.bench_function("reconcile_remove_middle_200", |bench| {
        bench.iter(|| black_box(reconcile(&template, old.as_slice(), new.as_slice(), &matrix)))
    });
}

criterion_group!(benches, bench_aggregate, bench_reconcile);
criterion_main!(benches);

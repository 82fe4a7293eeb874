use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use farm_core::CropCatalog;
use farm_engine::{PollingController, SimConfig, SimulationEngine};

fn bench_ticks(c: &mut Criterion) {
    let now = Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap();

    let mut controller =
        PollingController::new_at(SimConfig::default(), CropCatalog::standard(), now).unwrap();
    c.bench_function("controller_tick", |b| {
        b.iter(|| black_box(controller.refresh_at(now)))
    });

    c.bench_function("seed_history_30d", |b| {
        b.iter(|| {
            let mut engine = SimulationEngine::new(CropCatalog::standard(), 42, now).unwrap();
            black_box(engine.generate_series(30, now).unwrap())
        })
    });
}

criterion_group!(benches, bench_ticks);
criterion_main!(benches);

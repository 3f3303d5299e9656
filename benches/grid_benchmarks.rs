use beatgrid::bridge::{continuation_point, extract_events, skyline_tokens};
use beatgrid::sequencer::{Event, StepMode, place_events, triggers_for_step};
use beatgrid::{InstrumentCatalog, NoteGrid, Tempo};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

/// Grid with a note every other step on a rotating pitch
fn busy_grid(catalog: &InstrumentCatalog, steps: usize) -> NoteGrid {
    let mut grid = NoteGrid::for_catalog(catalog, steps);
    for instrument in 0..catalog.len() {
        for step in (0..steps).step_by(2) {
            let pitch = (step / 2 + instrument * 3) % catalog[instrument].pitch_count();
            grid.toggle(instrument, pitch, step);
        }
    }
    grid
}

/// Benchmark seed extraction (runs before every composition request)
fn bench_extract_events(c: &mut Criterion) {
    let catalog = InstrumentCatalog::chiptune();
    let mut group = c.benchmark_group("extract_events");

    for steps in [16, 64, 128] {
        let grid = busy_grid(&catalog, steps);
        group.bench_with_input(BenchmarkId::from_parameter(steps), &grid, |b, grid| {
            b.iter(|| black_box(extract_events(grid, &catalog)));
        });
    }
    group.finish();

    let grid = busy_grid(&catalog, 128);
    c.bench_function("continuation_point_128", |b| {
        b.iter(|| black_box(continuation_point(&grid)));
    });
    c.bench_function("skyline_tokens_128", |b| {
        b.iter(|| black_box(skyline_tokens(&grid, &catalog)));
    });
}

/// Benchmark per-step trigger enumeration (runs inside the clock callback)
fn bench_step_triggers(c: &mut Criterion) {
    let catalog = InstrumentCatalog::chiptune();
    let tempo = Tempo::new(140.0);
    let mut group = c.benchmark_group("step_triggers");

    for steps in [16, 128] {
        let grid = busy_grid(&catalog, steps);
        group.bench_with_input(BenchmarkId::from_parameter(steps), &grid, |b, grid| {
            b.iter(|| {
                for step in 0..grid.step_count() {
                    black_box(triggers_for_step(grid, step, &tempo));
                }
            });
        });
    }
    group.finish();
}

/// Benchmark bulk placement of a full composition reply
fn bench_place_events(c: &mut Criterion) {
    let catalog = InstrumentCatalog::chiptune();
    let events: Vec<Event> = (0..48)
        .map(|i| Event::new(i % 16, i % 3, "E4", 1 + (i % 4) as u32))
        .collect();

    c.bench_function("place_events_48", |b| {
        b.iter(|| {
            let mut grid = NoteGrid::for_catalog(&catalog, 64);
            black_box(place_events(&mut grid, &catalog, &events, 8, StepMode::Clamp).ok());
        });
    });
}

criterion_group!(
    benches,
    bench_extract_events,
    bench_step_triggers,
    bench_place_events
);
criterion_main!(benches);

use beatgrid::project::ProjectStore;
use beatgrid::{FileProjectStore, InstrumentCatalog, OfflineEngine, Session, SessionConfig};
use ringbuf::traits::Consumer;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
        .ok();

    println!("=== Beatgrid ===");

    let config = match std::env::args().nth(1) {
        Some(path) => SessionConfig::load(&PathBuf::from(path))?,
        None => SessionConfig::default(),
    };

    let engine = OfflineEngine::new();
    let clock = engine.handle();
    let (mut session, mut notifications) =
        Session::new(engine, InstrumentCatalog::chiptune(), config)?;

    // Motif: lead arpeggio, sustained bass, counter-melody answer
    session.create_sustained(0, 0, 0, 1);
    session.create_sustained(0, 4, 4, 5);
    session.create_sustained(0, 7, 8, 11);
    session.create_sustained(1, 0, 0, 7);
    session.create_sustained(1, 5, 8, 15);
    session.toggle(2, 7, 12);
    session.toggle(2, 4, 14);
    clock.take_triggers();

    println!("Events:");
    for event in session.extract_events() {
        println!(
            "  step {:>2}  {:<8} {:<4} x{}",
            event.step,
            session.catalog()[event.instrument_index].name,
            event.pitch_name,
            event.length
        );
    }
    println!("Continuation point: {}", session.continuation_point());

    session.start()?;
    let steps = session.grid().step_count() * 2;
    clock.run_steps(steps);
    session.stop();
    println!("Transport after stop: {:?}", session.transport().state());

    println!("\nPlayed {} steps at {}:", steps, session.tempo());
    for trigger in clock.take_triggers() {
        println!(
            "  {:>7.3}s  {:<8} {:<4} {:.3}s",
            trigger.at, trigger.timbre, trigger.pitch, trigger.duration_secs
        );
    }

    let out_dir = std::env::temp_dir().join("beatgrid");
    let midi_path = session.export_midi("Beatgrid Demo", &out_dir)?;
    println!("\nExported MIDI to {}", midi_path.display());

    let mut store = FileProjectStore::open(out_dir.join("projects"))?;
    let record = session.save_new(&mut store, "demo", "Beatgrid Demo")?;
    println!("Saved project {} to {}", record.id, store.dir().display());
    println!("Projects for 'demo': {}", store.list_for_user("demo")?.len());

    while let Some(notification) = notifications.try_pop() {
        println!("[{:?}] {}", notification.level, notification.message);
    }

    Ok(())
}

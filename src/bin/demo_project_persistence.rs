// Quick demonstration of the project persistence system
// Run with: cargo run --bin demo_project_persistence

use beatgrid::project::{ProjectStore, record_to_grid};
use beatgrid::{FileProjectStore, InstrumentCatalog, NoteGrid, ProjectRecord, SessionConfig, Tempo};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Beatgrid - Project Persistence Demo");
    println!("===================================");

    let catalog = InstrumentCatalog::chiptune();
    let config = SessionConfig::default();

    let mut grid = NoteGrid::for_catalog(&catalog, 16);
    grid.create_sustained(0, 0, 0, 3);
    grid.create_sustained(1, 7, 4, 11);
    grid.toggle(2, 2, 12);

    let record = ProjectRecord::from_grid("demo-user", "Demo Project", &grid, Tempo::new(132.0));
    println!("Created project: {}", record.name);
    println!("   - Id: {}", record.id);
    println!("   - Steps: {}", record.step_count());
    println!("   - Notes: {}", grid.note_count());
    println!("   - Tempo: {} BPM", record.tempo_bpm);

    let dir = std::env::temp_dir().join("beatgrid_demo_projects");
    let mut store = FileProjectStore::open(&dir)?;
    let saved = store.create(record)?;
    println!("\nSaved project to: {}", store.path_for(saved.id).display());
    let size = std::fs::metadata(store.path_for(saved.id))?.len();
    println!("   - File size: {} bytes", size);

    let loaded = store.read(saved.id)?;
    let (loaded_grid, tempo) = record_to_grid(&loaded, &catalog, &config)?;
    println!("\nLoaded project successfully:");
    println!("   - Name: {}", loaded.name);
    println!("   - Notes: {}", loaded_grid.note_count());
    println!("   - Tempo: {}", tempo);

    if loaded_grid != grid {
        return Err("Loaded grid differs from the saved one".into());
    }
    println!("\nData integrity verified - grids match!");

    let copy = store.duplicate(saved.id)?;
    println!("\nDuplicated as: {}", copy.name);

    println!("\nProjects for demo-user (newest first):");
    for summary in store.list_for_user("demo-user")? {
        println!("   - {} ({}, {} BPM)", summary.name, summary.updated_at, summary.tempo_bpm);
    }

    store.delete(saved.id)?;
    store.delete(copy.id)?;
    println!("\nCleaned up demo projects");

    Ok(())
}

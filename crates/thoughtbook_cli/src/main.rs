//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `thoughtbook_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

use std::sync::{Arc, Mutex};
use thoughtbook_core::db::open_db_in_memory;
use thoughtbook_core::{Category, NewThought, ThoughtStore};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("thoughtbook_core ping={}", thoughtbook_core::ping());
    println!("thoughtbook_core version={}", thoughtbook_core::core_version());

    // Tiny in-memory roundtrip to validate store wiring independently from
    // any embedding UI runtime.
    let conn = Arc::new(Mutex::new(open_db_in_memory()?));
    let store = ThoughtStore::new(conn);
    let all = store.observe_all()?;

    let initial = all.recv().map_or(0, |snapshot| snapshot.len());
    store.create(&NewThought::new(
        "",
        "first journal entry",
        Category::Reflection,
    ))?;
    let after_create = all.recv().map_or(0, |snapshot| snapshot.len());

    println!("thoughtbook_core smoke_initial={initial} smoke_after_create={after_create}");
    Ok(())
}

//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from store/policy orchestration.
//!
//! # Invariants
//! - Repository writes enforce input validation before SQL mutations.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

pub mod prefs_repo;
pub mod thought_repo;

/// Acquires the shared connection lock.
///
/// A poisoned lock still guards a fully committed SQLite state (every
/// mutation runs in its own transaction), so the guard is recovered instead
/// of propagating the panic.
pub(crate) fn lock_conn(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

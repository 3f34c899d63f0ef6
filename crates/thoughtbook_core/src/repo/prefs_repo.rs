//! Entitlement preference storage contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist the four entitlement scalars in durable key/value form.
//! - Load a complete snapshot at startup, write through on each change.
//!
//! # Invariants
//! - Missing keys fall back to first-launch defaults.
//! - A snapshot write replaces all keys in one transaction.

use crate::repo::lock_conn;
use crate::repo::thought_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

const KEY_FIRST_LAUNCH: &str = "first_launch";
const KEY_ADS_REMOVED: &str = "ads_removed";
const KEY_SAVE_COUNT: &str = "save_count";
const KEY_REWARDED_PIN_BONUS: &str = "rewarded_pin_bonus";

/// Persisted entitlement scalars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementSnapshot {
    /// True until onboarding completes once.
    pub first_launch: bool,
    /// Monotonic: once true, never flips back through reconciliation.
    pub ads_removed: bool,
    /// Count of new-thought saves. Edits do not count.
    pub save_count: u32,
    /// Extra pin slots earned through rewarded ads. Never decremented.
    pub rewarded_pin_bonus: u32,
}

impl Default for EntitlementSnapshot {
    fn default() -> Self {
        Self {
            first_launch: true,
            ads_removed: false,
            save_count: 0,
            rewarded_pin_bonus: 0,
        }
    }
}

/// Storage interface for entitlement state.
pub trait PrefsRepository {
    fn load(&self) -> RepoResult<EntitlementSnapshot>;
    fn store(&self, snapshot: &EntitlementSnapshot) -> RepoResult<()>;
}

/// SQLite-backed preference storage over the shared journal connection.
pub struct SqlitePrefsRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePrefsRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

impl PrefsRepository for SqlitePrefsRepository {
    fn load(&self) -> RepoResult<EntitlementSnapshot> {
        let conn = lock_conn(&self.conn);
        let mut snapshot = EntitlementSnapshot::default();

        let mut stmt = conn.prepare("SELECT key, value FROM prefs;")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            let value: String = row.get(1)?;
            match key.as_str() {
                KEY_FIRST_LAUNCH => snapshot.first_launch = parse_bool(&key, &value)?,
                KEY_ADS_REMOVED => snapshot.ads_removed = parse_bool(&key, &value)?,
                KEY_SAVE_COUNT => snapshot.save_count = parse_u32(&key, &value)?,
                KEY_REWARDED_PIN_BONUS => {
                    snapshot.rewarded_pin_bonus = parse_u32(&key, &value)?;
                }
                _ => {}
            }
        }

        Ok(snapshot)
    }

    fn store(&self, snapshot: &EntitlementSnapshot) -> RepoResult<()> {
        let mut conn = lock_conn(&self.conn);
        let tx = conn.transaction()?;

        for (key, value) in [
            (KEY_FIRST_LAUNCH, bool_to_db(snapshot.first_launch)),
            (KEY_ADS_REMOVED, bool_to_db(snapshot.ads_removed)),
            (KEY_SAVE_COUNT, snapshot.save_count.to_string()),
            (
                KEY_REWARDED_PIN_BONUS,
                snapshot.rewarded_pin_bonus.to_string(),
            ),
        ] {
            tx.execute(
                "INSERT INTO prefs (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
                params![key, value],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

fn bool_to_db(value: bool) -> String {
    let text = if value { "1" } else { "0" };
    text.to_string()
}

fn parse_bool(key: &str, value: &str) -> RepoResult<bool> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean `{other}` in prefs.{key}"
        ))),
    }
}

fn parse_u32(key: &str, value: &str) -> RepoResult<u32> {
    value.parse::<u32>().map_err(|_| {
        RepoError::InvalidData(format!("invalid counter `{value}` in prefs.{key}"))
    })
}

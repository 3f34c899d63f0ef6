//! Reactive thought store: serialized writes plus push-based live queries.
//!
//! # Responsibility
//! - Own the journal connection and serialize every mutation behind it.
//! - Maintain the registry of live query subscriptions and re-emit fresh
//!   snapshots after each committed mutation.
//!
//! # Invariants
//! - Snapshots are computed under the same lock that committed the mutation,
//!   so an observer never sees a torn or stale read.
//! - A mutation's result is visible to every affected live query before the
//!   mutating call returns.
//! - A snapshot identical to the previously delivered one is not re-sent.

use crate::model::thought::{Category, NewThought, Thought, ThoughtId, ThoughtPatch};
use crate::repo::lock_conn;
use crate::repo::thought_repo::{
    RepoResult, SqliteThoughtRepository, ThoughtFilter, ThoughtRepository,
};
use log::{error, info};
use rusqlite::Connection;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{mpsc, Arc, Mutex, Weak};
use std::time::Instant;

/// Reactive, persistent collection of thoughts.
///
/// Cheap to clone; clones share the same connection and subscription
/// registry. Constructed explicitly and handed to collaborators instead of
/// living behind a process-wide singleton.
#[derive(Clone)]
pub struct ThoughtStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    conn: Arc<Mutex<Connection>>,
    subs: Mutex<Vec<QuerySub>>,
    next_sub_id: AtomicU64,
}

struct QuerySub {
    id: u64,
    filter: ThoughtFilter,
    /// Last snapshot delivered to this subscriber.
    last: Vec<Thought>,
    tx: Sender<Vec<Thought>>,
}

/// Handle for one live query.
///
/// Receives an initial snapshot on subscribe and a fresh snapshot after every
/// committed mutation that changes the view's result set. Dropping the handle
/// deregisters the query.
pub struct Subscription {
    id: u64,
    rx: Receiver<Vec<Thought>>,
    inner: Weak<StoreInner>,
}

impl Subscription {
    /// Blocks until the next snapshot arrives.
    ///
    /// Returns `None` once the store has gone away.
    pub fn recv(&self) -> Option<Vec<Thought>> {
        self.rx.recv().ok()
    }

    /// Non-blocking poll for an already-delivered snapshot.
    pub fn try_recv(&self) -> Option<Vec<Thought>> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut subs = inner.subs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            subs.retain(|sub| sub.id != self.id);
            info!(
                "event=query_unsubscribe module=store status=ok sub_id={}",
                self.id
            );
        }
    }
}

impl ThoughtStore {
    /// Creates a store over an already-migrated journal connection.
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                conn,
                subs: Mutex::new(Vec::new()),
                next_sub_id: AtomicU64::new(1),
            }),
        }
    }

    /// Creates a thought, stamping its id and `created_at`.
    ///
    /// The new record is visible to all affected live queries before this
    /// call returns.
    pub fn create(&self, draft: &NewThought) -> RepoResult<Thought> {
        self.mutate("thought_create", |repo| repo.create(draft), |_| true)
    }

    /// Merges `patch` over the stored record. `id` and `created_at` are
    /// immutable.
    pub fn update(&self, id: ThoughtId, patch: &ThoughtPatch) -> RepoResult<Thought> {
        self.mutate("thought_update", |repo| repo.update(id, patch), |_| true)
    }

    /// Hard-deletes a thought. Deleting an unknown id is a silent no-op and
    /// publishes nothing.
    pub fn delete(&self, id: ThoughtId) -> RepoResult<()> {
        self.mutate("thought_delete", |repo| repo.delete(id), |changed| *changed)
            .map(|_| ())
    }

    pub fn get_by_id(&self, id: ThoughtId) -> RepoResult<Option<Thought>> {
        let conn = lock_conn(&self.inner.conn);
        SqliteThoughtRepository::new(&conn).get(id)
    }

    /// Count of currently pinned thoughts.
    pub fn pinned_count(&self) -> RepoResult<u32> {
        let conn = lock_conn(&self.inner.conn);
        SqliteThoughtRepository::new(&conn).pinned_count()
    }

    /// Live view of all thoughts, pinned first, then newest.
    pub fn observe_all(&self) -> RepoResult<Subscription> {
        self.observe(ThoughtFilter::All)
    }

    /// Live view of thoughts whose title or text contains `query`
    /// (case-insensitive). A blank query behaves like [`observe_all`].
    ///
    /// [`observe_all`]: ThoughtStore::observe_all
    pub fn observe_search(&self, query: impl Into<String>) -> RepoResult<Subscription> {
        self.observe(ThoughtFilter::Search(query.into()))
    }

    /// Live view of thoughts in one category.
    pub fn observe_by_category(&self, category: Category) -> RepoResult<Subscription> {
        self.observe(ThoughtFilter::Category(category))
    }

    /// Number of currently registered live queries.
    pub fn active_query_count(&self) -> usize {
        self.lock_subs().len()
    }

    fn observe(&self, filter: ThoughtFilter) -> RepoResult<Subscription> {
        // Take the connection lock first so no mutation can commit between
        // the initial snapshot and registration.
        let conn = lock_conn(&self.inner.conn);
        let snapshot = SqliteThoughtRepository::new(&conn).list(&filter)?;

        let (tx, rx) = mpsc::channel();
        let _ = tx.send(snapshot.clone());

        let id = self.inner.next_sub_id.fetch_add(1, Ordering::Relaxed);
        self.lock_subs().push(QuerySub {
            id,
            filter,
            last: snapshot,
            tx,
        });

        info!("event=query_subscribe module=store status=ok sub_id={id}");

        Ok(Subscription {
            id,
            rx,
            inner: Arc::downgrade(&self.inner),
        })
    }

    /// Runs one serialized mutation and, when `affected` says the committed
    /// result changed the collection, re-evaluates every live query under the
    /// same lock.
    fn mutate<T>(
        &self,
        event: &str,
        op: impl FnOnce(&SqliteThoughtRepository<'_>) -> RepoResult<T>,
        affected: impl FnOnce(&T) -> bool,
    ) -> RepoResult<T> {
        let started_at = Instant::now();
        let conn = lock_conn(&self.inner.conn);

        let result = op(&SqliteThoughtRepository::new(&conn));
        match &result {
            Ok(value) => {
                if affected(value) {
                    self.publish_locked(&conn);
                }
                info!(
                    "event={event} module=store status=ok duration_ms={}",
                    started_at.elapsed().as_millis()
                );
            }
            Err(err) => {
                error!(
                    "event={event} module=store status=error duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
            }
        }

        result
    }

    fn publish_locked(&self, conn: &Connection) {
        let repo = SqliteThoughtRepository::new(conn);
        let mut subs = self.lock_subs();

        subs.retain_mut(|sub| {
            let snapshot = match repo.list(&sub.filter) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    error!(
                        "event=query_refresh module=store status=error sub_id={} error={err}",
                        sub.id
                    );
                    return true;
                }
            };

            if snapshot == sub.last {
                return true;
            }

            // A closed receiver means the subscriber went away without an
            // explicit drop; reap it here.
            match sub.tx.send(snapshot.clone()) {
                Ok(()) => {
                    sub.last = snapshot;
                    true
                }
                Err(_) => false,
            }
        });
    }

    fn lock_subs(&self) -> std::sync::MutexGuard<'_, Vec<QuerySub>> {
        self.inner
            .subs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

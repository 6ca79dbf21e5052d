//! Collapsing concurrent identical work into one execution.
//!
//! [`SingleFlight`] keeps at most one pending call per key. The first
//! caller for a key becomes the leader: its work is spawned onto the
//! runtime and registered under the key. Callers arriving while it runs
//! join the same shared handle instead of starting new work, and every one
//! of them observes the same outcome.
//!
//! The work runs in its own task, so dropping any waiter (the leader
//! included) never cancels it; the remaining waiters still get their
//! result. The task unregisters its key as its last step, right before the
//! outcome is published, so the map holds an entry exactly while the work is
//! outstanding.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tokio::task::JoinError;

use crate::error::{Error, Result};

type SharedCall<V> = Shared<BoxFuture<'static, Result<V>>>;

/// A map of in-flight calls keyed by `K`, each producing `Result<V>`.
pub struct SingleFlight<K, V> {
    calls: Arc<Mutex<HashMap<K, SharedCall<V>>>>,
}

impl<K, V> std::fmt::Debug for SingleFlight<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.calls.lock().len())
            .finish()
    }
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

/// How a caller took part in a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// This caller started the work.
    Leader,
    /// This caller joined work already in flight.
    Joined,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the work produced by `make` unless a call for `key` is already
    /// in flight, in which case that call's outcome is awaited instead.
    ///
    /// `make` is only invoked by the leader. Must be called from within a
    /// Tokio runtime.
    pub async fn run<F, Fut>(&self, key: K, make: F) -> (Result<V>, Role)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let (call, role) = {
            let mut calls = self.calls.lock();
            match calls.get(&key) {
                Some(existing) => (existing.clone(), Role::Joined),
                None => {
                    let registry = Arc::clone(&self.calls);
                    let owned_key = key.clone();
                    let work = make();
                    let handle = tokio::spawn(async move {
                        let outcome = work.await;
                        registry.lock().remove(&owned_key);
                        outcome
                    });
                    let call = handle.map(settle).boxed().shared();
                    calls.insert(key, call.clone());
                    (call, Role::Leader)
                }
            }
        };
        (call.await, role)
    }

    /// Returns the number of calls currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

fn settle<V>(joined: std::result::Result<Result<V>, JoinError>) -> Result<V> {
    match joined {
        Ok(outcome) => outcome,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(_) => Err(Error::network("request task was cancelled")),
    }
}

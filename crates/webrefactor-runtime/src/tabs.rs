//! Controller-side per-tab state.
//!
//! Holds the original-state snapshot and the "last successful batch"
//! memo for each tab, plus a generation number. Every operation captures
//! the generation when it starts; closing or reloading the tab moves the
//! generation on, and results arriving for an old generation are dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::debug;

use webrefactor_protocols::{MutationCommand, OriginalStateSnapshot, TabId};

/// A batch that executed without damaging the page.
#[derive(Debug, Clone, PartialEq)]
pub struct LastBatch {
    pub commands: Vec<MutationCommand>,
    pub prompt: String,
    pub url: String,
    /// 1-based attempt that succeeded.
    pub attempt: u32,
    pub recorded_at: Instant,
}

struct TabState {
    generation: u64,
    snapshot: Option<OriginalStateSnapshot>,
    last_batch: Option<LastBatch>,
    lock: Arc<Mutex<()>>,
}

pub struct TabStates {
    tabs: DashMap<TabId, TabState>,
    next_generation: AtomicU64,
    last_batch_ttl: Duration,
}

impl TabStates {
    pub fn new(last_batch_ttl: Duration) -> Self {
        Self {
            tabs: DashMap::new(),
            next_generation: AtomicU64::new(1),
            last_batch_ttl,
        }
    }

    fn fresh_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    fn fresh_state(&self) -> TabState {
        TabState {
            generation: self.fresh_generation(),
            snapshot: None,
            last_batch: None,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Serialize work on one tab. Held for the whole of a refactor.
    pub async fn lock(&self, tab: TabId) -> OwnedMutexGuard<()> {
        let lock = self
            .tabs
            .entry(tab)
            .or_insert_with(|| self.fresh_state())
            .lock
            .clone();
        lock.lock_owned().await
    }

    /// Generation of the tab's current page, creating state on first use.
    pub fn generation(&self, tab: TabId) -> u64 {
        self.tabs
            .entry(tab)
            .or_insert_with(|| self.fresh_state())
            .generation
    }

    pub fn is_current(&self, tab: TabId, generation: u64) -> bool {
        self.tabs
            .get(&tab)
            .is_some_and(|state| state.generation == generation)
    }

    /// A new page loaded in the tab: the snapshot no longer applies.
    /// The last-batch memo survives until it expires.
    pub fn page_loaded(&self, tab: TabId) -> u64 {
        let generation = self.fresh_generation();
        let mut state = self.tabs.entry(tab).or_insert_with(|| self.fresh_state());
        state.generation = generation;
        state.snapshot = None;
        generation
    }

    /// Drop everything held for the tab.
    pub fn close(&self, tab: TabId) {
        if self.tabs.remove(&tab).is_some() {
            debug!(%tab, "Dropped tab state");
        }
    }

    /// Store the snapshot if the tab is still on `generation`.
    pub fn set_snapshot(&self, tab: TabId, generation: u64, snapshot: OriginalStateSnapshot) -> bool {
        match self.tabs.get_mut(&tab) {
            Some(mut state) if state.generation == generation => {
                state.snapshot = Some(snapshot);
                true
            }
            _ => false,
        }
    }

    /// Forget the snapshot once the page has been restored from it.
    pub fn clear_snapshot(&self, tab: TabId, generation: u64) {
        if let Some(mut state) = self.tabs.get_mut(&tab) {
            if state.generation == generation {
                state.snapshot = None;
            }
        }
    }

    pub fn snapshot(&self, tab: TabId) -> Option<OriginalStateSnapshot> {
        self.tabs.get(&tab).and_then(|state| state.snapshot.clone())
    }

    /// Remember a successful batch if the tab is still on `generation`.
    pub fn record_success(&self, tab: TabId, generation: u64, batch: LastBatch) -> bool {
        match self.tabs.get_mut(&tab) {
            Some(mut state) if state.generation == generation => {
                state.last_batch = Some(batch);
                true
            }
            _ => false,
        }
    }

    /// The last successful batch, unless it has expired.
    pub fn last_batch(&self, tab: TabId) -> Option<LastBatch> {
        let state = self.tabs.get(&tab)?;
        state
            .last_batch
            .as_ref()
            .filter(|b| b.recorded_at.elapsed() <= self.last_batch_ttl)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }
}

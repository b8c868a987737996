//! Watcher registry and coalescing delivery

use hub_core::{Matches, StatusUrl};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::trace;

use crate::tree::Tree;

/// A unique identifier for a registered watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(u64);

impl std::fmt::Display for WatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "watch-{}", self.0)
    }
}

/// A registered subscription
///
/// `pending` is the single-slot mailbox: a newer delivery replaces any
/// unread one. `last_seen` starts as None so the first evaluation always
/// counts as a change.
struct Watcher {
    pattern: StatusUrl,
    key: String,
    last_seen: Option<BTreeMap<String, u64>>,
    pending: Option<Matches>,
    notify: Arc<Notify>,
}

impl Watcher {
    /// Re-run the pattern and deliver if the matched revisions changed
    fn evaluate(&mut self, id: WatchId, tree: &Tree) {
        let matches = tree.expand(&self.pattern, &self.key);
        let current: BTreeMap<String, u64> = matches
            .iter()
            .map(|(url, entry)| (url.clone(), entry.revision))
            .collect();

        if self.last_seen.as_ref() == Some(&current) {
            return;
        }

        let replaced = self.pending.replace(matches).is_some();
        self.last_seen = Some(current);
        trace!(%id, pattern = %self.key, replaced, "Delivering watch update");
        self.notify.notify_one();
    }
}

/// Result of checking a watcher's mailbox
pub(crate) enum Mailbox {
    Ready(Matches),
    Empty,
    Released,
}

/// All watchers registered on one tree
#[derive(Default)]
pub(crate) struct Watchers {
    next_id: u64,
    entries: HashMap<WatchId, Watcher>,
}

impl Watchers {
    /// Register a watcher and perform its first evaluation
    pub(crate) fn register(
        &mut self,
        pattern: StatusUrl,
        key: String,
        tree: &Tree,
    ) -> (WatchId, Arc<Notify>) {
        self.next_id += 1;
        let id = WatchId(self.next_id);
        let notify = Arc::new(Notify::new());

        let mut watcher = Watcher {
            pattern,
            key,
            last_seen: None,
            pending: None,
            notify: notify.clone(),
        };
        watcher.evaluate(id, tree);
        self.entries.insert(id, watcher);

        (id, notify)
    }

    /// Re-evaluate every watcher after a mutation
    pub(crate) fn evaluate_all(&mut self, tree: &Tree) {
        for (id, watcher) in self.entries.iter_mut() {
            watcher.evaluate(*id, tree);
        }
    }

    /// Take the pending delivery for `id`, leaving the slot empty
    pub(crate) fn take(&mut self, id: WatchId) -> Mailbox {
        match self.entries.get_mut(&id) {
            Some(watcher) => match watcher.pending.take() {
                Some(matches) => Mailbox::Ready(matches),
                None => Mailbox::Empty,
            },
            None => Mailbox::Released,
        }
    }

    /// Remove a watcher; returns false if it was already gone
    pub(crate) fn release(&mut self, id: WatchId) -> bool {
        match self.entries.remove(&id) {
            Some(watcher) => {
                // Wake a pending receiver so it observes the release
                watcher.notify.notify_one();
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

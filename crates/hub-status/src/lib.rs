//! Revisioned status tree for the status hub
//!
//! This crate provides [`Status`], the single store every hub component
//! talks through. Adapters, rules and HTTP handlers read and write URL-like
//! paths, guard their writes with [`Revision`] contracts and subscribe to
//! wildcard patterns through coalescing watches.
//!
//! The tree and the watcher registry sit behind one mutex. Every operation
//! is a bounded in-memory traversal, so nothing blocks while holding it;
//! the only suspension point is [`WatchReceiver::recv`], which waits outside
//! the lock.

mod json;
mod node;
mod tree;
mod watch;

use hub_core::{Entry, Matches, Revision, StatusError, StatusResult, StatusUrl, DEFAULT_SCHEME};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::{debug, instrument, trace};

use crate::tree::Tree;
use crate::watch::{Mailbox, Watchers};

pub use watch::WatchId;

struct Inner {
    tree: Tree,
    watchers: Watchers,
}

impl Inner {
    fn notify_watchers(&mut self) {
        let Inner { tree, watchers } = self;
        watchers.evaluate_all(tree);
    }
}

/// Handle to a shared status tree
///
/// Cloning is cheap and every clone addresses the same tree.
#[derive(Clone)]
pub struct Status {
    scheme: Arc<str>,
    inner: Arc<Mutex<Inner>>,
}

impl Status {
    /// Create an empty tree served under the default `status://` scheme
    pub fn new() -> Self {
        Self::with_scheme(DEFAULT_SCHEME)
    }

    /// Create an empty tree served under `scheme://`
    pub fn with_scheme(scheme: impl Into<String>) -> Self {
        let scheme: String = scheme.into();
        Self {
            scheme: Arc::from(scheme),
            inner: Arc::new(Mutex::new(Inner {
                tree: Tree::new(),
                watchers: Watchers::default(),
            })),
        }
    }

    /// The scheme this tree accepts
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Address of the root
    pub fn root_url(&self) -> StatusUrl {
        StatusUrl::root(self.scheme.as_ref())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Operations validate before committing, so a panic cannot leave
        // the tree half-written and the data stays usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Parse an address and check it belongs to this tree
    pub fn parse(&self, url: &str) -> StatusResult<StatusUrl> {
        let parsed: StatusUrl = url.parse()?;
        if parsed.scheme() != self.scheme.as_ref() {
            return Err(StatusError::SchemeMismatch {
                url: url.to_string(),
                expected: self.scheme.to_string(),
            });
        }
        Ok(parsed)
    }

    fn parse_concrete(&self, url: &str) -> StatusResult<StatusUrl> {
        let parsed = self.parse(url)?;
        parsed.require_concrete()?;
        Ok(parsed)
    }

    /// Current global revision (the root's revision)
    pub fn revision(&self) -> u64 {
        self.lock().tree.revision()
    }

    /// Read the value and revision at `url`
    pub fn get(&self, url: &str) -> StatusResult<Entry> {
        let url = self.parse_concrete(url)?;
        self.lock().tree.get(&url)
    }

    /// Write `value` at `url` if `expected` holds; returns the new revision
    ///
    /// Missing containers along the path are created. On any error the tree
    /// is left untouched and no watcher is notified.
    #[instrument(skip(self, value), fields(url = %url, expected = %expected))]
    pub fn set(
        &self,
        url: &str,
        value: serde_json::Value,
        expected: Revision,
    ) -> StatusResult<u64> {
        let url = self.parse_concrete(url)?;
        let mut inner = self.lock();
        let revision = inner.tree.set(&url, value, expected)?;
        debug!(revision, "Set status value");
        inner.notify_watchers();
        Ok(revision)
    }

    /// Delete the node at `url` if `expected` holds; returns the new revision
    ///
    /// Removing the root resets the whole tree to null.
    #[instrument(skip(self), fields(url = %url, expected = %expected))]
    pub fn remove(&self, url: &str, expected: Revision) -> StatusResult<u64> {
        let url = self.parse_concrete(url)?;
        let mut inner = self.lock();
        let revision = inner.tree.remove(&url, expected)?;
        debug!(revision, "Removed status node");
        inner.notify_watchers();
        Ok(revision)
    }

    /// Resolve a pattern (which may contain `*` segments) to its matches
    pub fn expand(&self, pattern: &str) -> StatusResult<Matches> {
        let parsed = self.parse(pattern)?;
        Ok(self.lock().tree.expand(&parsed, pattern))
    }

    /// Subscribe to changes of a pattern's expansion
    ///
    /// The current expansion is already waiting in the returned receiver.
    /// Later deliveries happen only when the set of matched URLs or their
    /// revisions change; unread deliveries are replaced by newer ones.
    pub fn watch(&self, pattern: &str) -> StatusResult<WatchReceiver> {
        let parsed = self.parse(pattern)?;
        let mut inner = self.lock();
        let Inner { tree, watchers } = &mut *inner;
        let (id, notify) = watchers.register(parsed, pattern.to_string(), tree);
        trace!(%id, pattern, watchers = watchers.len(), "Registered watch");

        Ok(WatchReceiver {
            id,
            notify,
            status: self.clone(),
        })
    }

    /// Remove the watcher behind `receiver` from the registry
    pub fn release(&self, receiver: &WatchReceiver) {
        self.release_id(receiver.id);
    }

    fn release_id(&self, id: WatchId) {
        if self.lock().watchers.release(id) {
            trace!(%id, "Released watch");
        }
    }

    /// Number of registered watchers
    pub fn watcher_count(&self) -> usize {
        self.lock().watchers.len()
    }

    fn take(&self, id: WatchId) -> Mailbox {
        self.lock().watchers.take(id)
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Status")
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}

/// Consumer side of a watch
///
/// Holds at most one undelivered mapping. Dropping the receiver releases the
/// watch.
pub struct WatchReceiver {
    id: WatchId,
    notify: Arc<Notify>,
    status: Status,
}

impl WatchReceiver {
    /// Identity of this watch in the registry
    pub fn id(&self) -> WatchId {
        self.id
    }

    /// Wait for the next delivery
    ///
    /// Returns None once the watch has been released.
    pub async fn recv(&mut self) -> Option<Matches> {
        loop {
            match self.status.take(self.id) {
                Mailbox::Ready(matches) => return Some(matches),
                Mailbox::Released => return None,
                Mailbox::Empty => {}
            }
            // A notification sent between `take` and here is kept as a
            // permit, so no delivery is missed.
            self.notify.notified().await;
        }
    }

    /// Take the pending delivery without waiting
    pub fn try_recv(&mut self) -> Option<Matches> {
        match self.status.take(self.id) {
            Mailbox::Ready(matches) => Some(matches),
            Mailbox::Empty | Mailbox::Released => None,
        }
    }
}

impl Drop for WatchReceiver {
    fn drop(&mut self) {
        self.status.release_id(self.id);
    }
}

impl std::fmt::Debug for WatchReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchReceiver").field("id", &self.id).finish()
    }
}

/// Thread-safe wrapper for Status
pub type SharedStatus = Arc<Status>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scheme_mismatch() {
        let status = Status::with_scheme("root");
        let err = status.get("status://foo").unwrap_err();
        assert!(matches!(err, StatusError::SchemeMismatch { .. }));
        assert!(status.expand("other://*").is_err());
    }

    #[test]
    fn test_wildcards_rejected_for_single_node_operations() {
        let status = Status::new();
        assert!(matches!(
            status.get("status://*").unwrap_err(),
            StatusError::WildcardNotAllowed { .. }
        ));
        assert!(status
            .set("status://*/x", json!(1), Revision::Unchecked)
            .is_err());
        assert!(status.remove("status://*", Revision::Unchecked).is_err());
        assert_eq!(status.revision(), 0);
    }

    #[test]
    fn test_first_delivery_is_immediate() {
        let status = Status::new();
        let mut rx = status.watch("status://missing").unwrap();
        assert_eq!(rx.try_recv(), Some(Matches::new()));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_release_and_drop_unregister() {
        let status = Status::new();
        let rx1 = status.watch("status://").unwrap();
        let rx2 = status.watch("status://a").unwrap();
        assert_eq!(status.watcher_count(), 2);

        status.release(&rx1);
        assert_eq!(status.watcher_count(), 1);

        drop(rx2);
        assert_eq!(status.watcher_count(), 0);

        // Dropping an already released receiver is harmless
        drop(rx1);
        assert_eq!(status.watcher_count(), 0);
    }

    #[tokio::test]
    async fn test_recv_returns_none_after_release() {
        let status = Status::new();
        let mut rx = status.watch("status://").unwrap();
        assert!(rx.recv().await.is_some());

        status.release(&rx);
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_recv_pending_until_delivery() {
        use tokio_test::{assert_pending, assert_ready, task};

        let status = Status::new();
        let mut rx = status.watch("status://light").unwrap();
        rx.try_recv().unwrap();

        let mut recv = task::spawn(rx.recv());
        assert_pending!(recv.poll());

        status
            .set("status://light", json!(true), Revision::Unchecked)
            .unwrap();
        assert!(recv.is_woken());
        let matches = assert_ready!(recv.poll()).unwrap();
        assert_eq!(matches["status://light"].value, json!(true));
    }

    #[tokio::test]
    async fn test_recv_wakes_on_write() {
        let status = Status::new();
        let mut rx = status.watch("status://door").unwrap();
        rx.recv().await.unwrap();

        let writer = status.clone();
        let handle = tokio::spawn(async move {
            writer
                .set("status://door", json!("open"), Revision::Unchecked)
                .unwrap()
        });

        let matches = rx.recv().await.unwrap();
        let revision = handle.await.unwrap();
        assert_eq!(matches["status://door"], Entry::new(revision, json!("open")));
    }
}

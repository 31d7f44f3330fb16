//! Snapshot sources with push notification
//!
//! Catalog data that the search page merges (inputs, nodes, fields, current
//! user) and the refresh settings are exposed as a current snapshot plus a
//! `tokio::sync::watch` subscription.

use crate::types::RefreshConfig;
use tokio::sync::watch;

/// Readable, subscribable snapshot of a collaborator's state
///
/// `None` means the collaborator has not loaded its data yet.
pub trait SnapshotSource<T>: Send + Sync {
    fn current(&self) -> Option<T>;

    fn subscribe(&self) -> watch::Receiver<Option<T>>;
}

/// Snapshot source backed by a watch channel
#[derive(Debug)]
pub struct WatchSnapshot<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T> WatchSnapshot<T>
where
    T: Clone + PartialEq + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            tx: watch::Sender::new(None),
        }
    }

    pub fn with_value(value: T) -> Self {
        Self {
            tx: watch::Sender::new(Some(value)),
        }
    }

    /// Replace the snapshot, notifying subscribers only if it changed
    pub fn publish(&self, value: T) {
        self.tx.send_if_modified(|current| {
            if current.as_ref() == Some(&value) {
                return false;
            }
            *current = Some(value);
            true
        });
    }

    pub fn clear(&self) {
        self.tx.send_if_modified(|current| current.take().is_some());
    }
}

impl<T> Default for WatchSnapshot<T>
where
    T: Clone + PartialEq + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SnapshotSource<T> for WatchSnapshot<T>
where
    T: Clone + PartialEq + Send + Sync,
{
    fn current(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.tx.subscribe()
    }
}

/// Push source of refresh settings
pub trait RefreshConfigSource: Send + Sync {
    fn current(&self) -> RefreshConfig;

    fn subscribe(&self) -> watch::Receiver<RefreshConfig>;
}

/// Refresh settings backed by a watch channel
#[derive(Debug)]
pub struct WatchRefreshConfig {
    tx: watch::Sender<RefreshConfig>,
}

impl WatchRefreshConfig {
    pub fn new(initial: RefreshConfig) -> Self {
        Self {
            tx: watch::Sender::new(initial),
        }
    }

    /// Push a new value; every update is delivered, even an unchanged one
    pub fn set(&self, config: RefreshConfig) {
        self.tx.send_replace(config);
    }
}

impl Default for WatchRefreshConfig {
    fn default() -> Self {
        Self::new(RefreshConfig::default())
    }
}

impl RefreshConfigSource for WatchRefreshConfig {
    fn current(&self) -> RefreshConfig {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<RefreshConfig> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_starts_empty() {
        let snapshot: WatchSnapshot<Vec<String>> = WatchSnapshot::new();
        assert!(snapshot.current().is_none());
    }

    #[tokio::test]
    async fn test_publish_notifies_subscribers() {
        let snapshot = WatchSnapshot::new();
        let mut rx = snapshot.subscribe();

        snapshot.publish(vec!["message".to_string()]);

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_deref(), Some(&["message".to_string()][..]));
        assert_eq!(snapshot.current().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_same_value_is_silent() {
        let snapshot = WatchSnapshot::with_value(7u32);
        let mut rx = snapshot.subscribe();
        rx.mark_unchanged();

        snapshot.publish(7);
        assert!(!rx.has_changed().unwrap());

        snapshot.publish(8);
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_clear() {
        let snapshot = WatchSnapshot::with_value("admin".to_string());
        let mut rx = snapshot.subscribe();
        rx.mark_unchanged();

        snapshot.clear();
        assert!(rx.has_changed().unwrap());
        assert!(snapshot.current().is_none());
    }

    #[tokio::test]
    async fn test_refresh_config_delivers_every_update() {
        let source = WatchRefreshConfig::new(RefreshConfig::enabled(1000));
        let mut rx = source.subscribe();
        rx.mark_unchanged();

        source.set(RefreshConfig::enabled(1000));
        assert!(rx.has_changed().unwrap());
        assert_eq!(source.current(), RefreshConfig::enabled(1000));
    }
}

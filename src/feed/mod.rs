/// Current-run feed
///
/// This module groups:
/// - The in-process fan-out hub (`CurrentRunFeed`) every nameplate and
///   panel subscribes to
/// - The replicant WebSocket client that fills the hub
///
/// Every push is a full `CurrentRun` snapshot. Subscribers treat it as a
/// wholesale replacement. A lagging subscriber resumes at the oldest
/// snapshot still buffered and drains the rest in order; each replaces
/// the previous one, so the newest value still wins.
///
/// Subscribing returns a receiver; dropping it deregisters.
pub mod replicant;

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::schema::CurrentRun;

/// Snapshots buffered per subscriber before it starts lagging.
const FEED_CAPACITY: usize = 16;

/// Injected handle to the current-run replicant.
///
/// Cheap to clone; all clones share the same subscriber list. Tests
/// construct one directly and push snapshots by hand.
#[derive(Clone)]
pub struct CurrentRunFeed {
    tx: broadcast::Sender<Arc<CurrentRun>>,
}

impl CurrentRunFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Pushes a snapshot to every subscriber.
    ///
    /// Returns the number of subscribers reached; zero is not an error,
    /// the replicant may change before anything is mounted.
    pub fn publish(&self, run: CurrentRun) -> usize {
        self.tx.send(Arc::new(run)).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<CurrentRun>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for CurrentRunFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_every_subscriber() {
        let feed = CurrentRunFeed::new();
        assert_eq!(feed.publish(CurrentRun::default()), 0);

        let mut a = feed.subscribe();
        let mut b = feed.clone().subscribe();
        let run = CurrentRun {
            title: Some("Ocarina of Time".into()),
            ..Default::default()
        };
        assert_eq!(feed.publish(run.clone()), 2);

        assert_eq!(*a.recv().await.unwrap(), run);
        assert_eq!(*b.recv().await.unwrap(), run);
    }

    #[tokio::test]
    async fn lagged_subscriber_drains_to_newest() {
        let feed = CurrentRunFeed::new();
        let mut rx = feed.subscribe();

        let total = FEED_CAPACITY + 4;
        for i in 0..total {
            feed.publish(CurrentRun {
                title: Some(format!("run {i}")),
                ..Default::default()
            });
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(4))
        ));

        // Oldest retained first, not the newest.
        let first = rx.recv().await.unwrap();
        assert_eq!(first.title.as_deref(), Some("run 4"));

        let mut last = first;
        while let Ok(run) = rx.try_recv() {
            last = run;
        }
        assert_eq!(last.title, Some(format!("run {}", total - 1)));
    }

    #[test]
    fn dropping_receiver_deregisters() {
        let feed = CurrentRunFeed::new();
        let rx = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);
        drop(rx);
        assert_eq!(feed.subscriber_count(), 0);
    }
}

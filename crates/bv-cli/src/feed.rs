//! Change feed: a producer polls the star map and hands records to a single
//! consumer over a bounded channel.
//!
//! The producer owns its own star map handle and cursor, so it never touches
//! the universe. The consumer is whoever holds the receiver; it applies
//! changes in arrival order, which is the star map's write order.

use std::time::Duration;

use bv_store::{Change, StarMap};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const CHANNEL_CAPACITY: usize = 256;

pub struct FeedProducer {
    starmap: StarMap,
    cursor: u64,
}

impl FeedProducer {
    pub fn new(starmap: StarMap) -> Self {
        Self { starmap, cursor: 0 }
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Read one batch and forward it. Returns `false` once the consumer is gone.
    pub async fn poll_once(&mut self, tx: &mpsc::Sender<Change>) -> bool {
        let changes = match self.starmap.changes_since(self.cursor) {
            Ok(changes) => changes,
            Err(e) => {
                tracing::warn!(cursor = self.cursor, "feed poll failed: {e}");
                return true;
            }
        };
        for change in changes {
            self.cursor = self.cursor.max(change.seq);
            if tx.send(change).await.is_err() {
                return false;
            }
        }
        true
    }

    /// Poll every `interval` until cancelled or the consumer hangs up.
    /// Dropping the sender on return closes the channel.
    pub async fn run(
        mut self,
        interval: Duration,
        tx: mpsc::Sender<Change>,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if !self.poll_once(&tx).await {
                        break;
                    }
                }
            }
        }
        tracing::debug!(cursor = self.cursor, "feed producer stopped");
    }
}

/// Spawn `producer` and return its task along with the receiving end.
pub fn spawn(
    producer: FeedProducer,
    interval: Duration,
    cancel: CancellationToken,
) -> (tokio::task::JoinHandle<()>, mpsc::Receiver<Change>) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let handle = tokio::spawn(producer.run(interval, tx, cancel));
    (handle, rx)
}

//! Live subscriber tracking and snapshot fan-out.
//!
//! - `SubscriberRegistry`: holds the current frame and one outbound queue per
//!   connected subscriber
//! - `SubscriberGuard`: RAII guard that unregisters a subscriber on drop

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::frame::encode_payload;
use crate::events::SnapshotEmitter;
use crate::session::SessionSnapshot;

/// Current frame and subscriber queues, guarded together so a subscriber
/// registering mid-publish sees either the old frame then the new one, or
/// just the new one.
#[derive(Default)]
struct RegistryState {
    /// Revision and payload of the last published snapshot.
    current: Option<(u64, Bytes)>,
    subscribers: HashMap<u64, mpsc::UnboundedSender<Bytes>>,
}

/// Fans committed snapshots out to every connected subscriber.
///
/// Queues are unbounded: a stalled subscriber grows its own queue but never
/// delays the others or the publisher.
pub struct SubscriberRegistry {
    state: Mutex<RegistryState>,
    next_id: AtomicU64,
    /// When cancelled, all subscriber tasks close. Replaced after close_all().
    global_cancel: RwLock<CancellationToken>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            next_id: AtomicU64::new(1),
            global_cancel: RwLock::new(CancellationToken::new()),
        }
    }

    /// Registers a subscriber.
    ///
    /// The current frame, if any, is already queued on the returned receiver.
    pub fn register(self: &Arc<Self>) -> (SubscriberGuard, mpsc::UnboundedReceiver<Bytes>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel_token = self.global_cancel.read().child_token();

        let total = {
            let mut state = self.state.lock();
            if let Some((_, frame)) = &state.current {
                // Receiver is alive: we hold it
                let _ = tx.send(frame.clone());
            }
            state.subscribers.insert(id, tx);
            state.subscribers.len()
        };
        log::info!(
            "[Broadcast] Subscriber registered: sub-{} (total: {})",
            id,
            total
        );

        let guard = SubscriberGuard {
            id,
            registry: Arc::clone(self),
            cancel_token,
        };
        (guard, rx)
    }

    fn unregister(&self, id: u64) {
        let remaining = {
            let mut state = self.state.lock();
            state.subscribers.remove(&id).map(|_| state.subscribers.len())
        };
        if let Some(remaining) = remaining {
            log::info!(
                "[Broadcast] Subscriber unregistered: sub-{} (remaining: {})",
                id,
                remaining
            );
        }
    }

    /// Publishes `snapshot` to every live subscriber.
    ///
    /// Snapshots older than the last published revision are ignored. Returns
    /// the number of subscribers the frame was queued for.
    pub fn publish(&self, snapshot: &SessionSnapshot) -> usize {
        let payload = match encode_payload(&snapshot.record) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("[Broadcast] Failed to encode snapshot: {}", e);
                return 0;
            }
        };

        let mut state = self.state.lock();
        if let Some((revision, _)) = &state.current {
            if snapshot.revision < *revision {
                log::debug!(
                    "[Broadcast] Ignoring revision {} (current {})",
                    snapshot.revision,
                    revision
                );
                return 0;
            }
        }
        state.current = Some((snapshot.revision, payload.clone()));

        let before = state.subscribers.len();
        state
            .subscribers
            .retain(|_, tx| tx.send(payload.clone()).is_ok());
        let delivered = state.subscribers.len();
        if delivered < before {
            log::debug!(
                "[Broadcast] Dropped {} closed subscriber queue(s)",
                before - delivered
            );
        }
        delivered
    }

    /// Revision of the last published snapshot.
    #[must_use]
    pub fn current_revision(&self) -> Option<u64> {
        self.state.lock().current.as_ref().map(|(revision, _)| *revision)
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// Signals every subscriber task to close.
    ///
    /// A fresh token is installed afterwards so new subscribers can still
    /// connect. Returns the number of subscribers signalled.
    pub fn close_all(&self) -> usize {
        let count = self.subscriber_count();
        if count > 0 {
            log::info!("[Broadcast] Closing {} subscriber(s)", count);
        }
        let mut token = self.global_cancel.write();
        token.cancel();
        *token = CancellationToken::new();
        count
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotEmitter for SubscriberRegistry {
    fn emit_snapshot(&self, snapshot: &SessionSnapshot) {
        let delivered = self.publish(snapshot);
        log::trace!(
            "[Broadcast] Revision {} queued for {} subscriber(s)",
            snapshot.revision,
            delivered
        );
    }
}

/// Unregisters its subscriber when dropped.
pub struct SubscriberGuard {
    id: u64,
    registry: Arc<SubscriberRegistry>,
    cancel_token: CancellationToken,
}

impl SubscriberGuard {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Cancelled by [`SubscriberRegistry::close_all`].
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}

//! Snapshot emitter abstraction for decoupling the reconciler from transport.
//!
//! The reconciler depends on the [`SnapshotEmitter`] trait rather than on the
//! subscriber registry, enabling testing and alternative transports.

use std::sync::Arc;

use crate::session::SessionSnapshot;

/// Receives every committed session snapshot.
///
/// Called outside the reconciler's critical section, once per committed
/// change, in commit order for any single source. Implementations must not
/// block on I/O: the caller is a source adapter's update path.
pub trait SnapshotEmitter: Send + Sync {
    /// Publishes a committed snapshot.
    fn emit_snapshot(&self, snapshot: &SessionSnapshot);
}

/// Logs every snapshot at debug level.
pub struct LoggingEmitter;

impl SnapshotEmitter for LoggingEmitter {
    fn emit_snapshot(&self, snapshot: &SessionSnapshot) {
        tracing::debug!(
            revision = snapshot.revision,
            state = %snapshot.record.player_state,
            songid = ?snapshot.record.songid,
            cover_url = ?snapshot.record.cover_url,
            "session_snapshot"
        );
    }
}

/// Forwards every snapshot to each inner emitter, in order.
pub struct FanoutEmitter {
    emitters: Vec<Arc<dyn SnapshotEmitter>>,
}

impl FanoutEmitter {
    pub fn new(emitters: Vec<Arc<dyn SnapshotEmitter>>) -> Self {
        Self { emitters }
    }
}

impl SnapshotEmitter for FanoutEmitter {
    fn emit_snapshot(&self, snapshot: &SessionSnapshot) {
        for emitter in &self.emitters {
            emitter.emit_snapshot(snapshot);
        }
    }
}

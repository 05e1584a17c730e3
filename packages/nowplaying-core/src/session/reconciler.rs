//! Session reconciliation.
//!
//! [`SessionReconciler`] owns the one [`SessionRecord`] of the process and
//! arbitrates updates from any number of named sources:
//!
//! - Transport changes always win: play/pause/stop is user-driven and does
//!   not depend on which source reported it.
//! - Metadata is accepted only for a genuinely new track identity, or to fill
//!   in a cover the current record lacks. A slower source repeating the
//!   previous track cannot clobber a freshly started one.
//!
//! Every committed change is copied out of the critical section as a
//! [`SessionSnapshot`] and handed to the [`SnapshotEmitter`] after the lock is
//! released, so slow subscribers never hold up other sources.
//!
//! Uncached cover art is produced on a background task. Its result comes
//! back over a channel as an [`ArtCompletion`] and is applied only if the
//! record still shows the same songid.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::artwork::ArtCache;
use crate::error::{ErrorCode, SessionError};
use crate::events::{MetadataUpdate, SnapshotEmitter};
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::session::{PlayerState, SessionRecord, SessionSnapshot};

/// Result of a background art-cache population.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtCompletion {
    /// Songid of the record that requested the art.
    pub songid: Option<String>,
    /// Art reference of the finished thumbnail.
    pub reference: String,
}

/// Record plus its revision counter, guarded together.
struct SessionInner {
    record: SessionRecord,
    revision: u64,
}

impl SessionInner {
    /// Validates `candidate` and, if it holds, makes it the current record.
    ///
    /// On failure the current record is left untouched.
    fn commit(&mut self, candidate: SessionRecord) -> Result<SessionSnapshot, SessionError> {
        candidate.validate()?;
        self.record = candidate;
        self.revision += 1;
        Ok(self.snapshot())
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            revision: self.revision,
            record: self.record.clone(),
        }
    }
}

/// Single source of truth for the unified session record.
pub struct SessionReconciler {
    inner: Mutex<SessionInner>,
    emitter: Arc<dyn SnapshotEmitter>,
    art_cache: Arc<ArtCache>,
    spawner: TokioSpawner,
    art_tx: mpsc::UnboundedSender<ArtCompletion>,
    art_rx: Mutex<Option<mpsc::UnboundedReceiver<ArtCompletion>>>,
}

impl SessionReconciler {
    /// Creates a reconciler holding the stopped record at revision 0.
    pub fn new(
        art_cache: Arc<ArtCache>,
        emitter: Arc<dyn SnapshotEmitter>,
        spawner: TokioSpawner,
    ) -> Self {
        let (art_tx, art_rx) = mpsc::unbounded_channel();
        Self {
            inner: Mutex::new(SessionInner {
                record: SessionRecord::stopped(),
                revision: 0,
            }),
            emitter,
            art_cache,
            spawner,
            art_tx,
            art_rx: Mutex::new(Some(art_rx)),
        }
    }

    /// Point-in-time copy of the current record.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().snapshot()
    }

    /// Starts the loop that applies finished art-cache work.
    ///
    /// Only the first call has an effect; the loop ends when `cancel` fires.
    pub fn start_art_completions(self: &Arc<Self>, cancel: CancellationToken) {
        let Some(mut rx) = self.art_rx.lock().take() else {
            log::warn!("[Session] Art completion loop already started");
            return;
        };

        let reconciler = Arc::clone(self);
        self.spawner.spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    completion = rx.recv() => match completion {
                        Some(completion) => {
                            reconciler.apply_art_completion(completion);
                        }
                        None => break,
                    },
                }
            }
            log::debug!("[Session] Art completion loop stopped");
        });
    }

    /// Applies a transport-state change from `source_name`.
    ///
    /// `state` is normalized case-insensitively. Equal states are a no-op;
    /// `stopped` clears every track field in the same commit. Returns whether
    /// a snapshot was emitted.
    pub fn update_transport_state(&self, source_name: &str, state: &str) -> bool {
        let new_state = match PlayerState::from_transport(state) {
            Ok(Some(new_state)) => new_state,
            Ok(None) => {
                log::debug!("[Session] {} is {}, ignoring", source_name, state);
                return false;
            }
            Err(e) => {
                log::warn!("[Session] Rejected update from {}: {}", source_name, e);
                return false;
            }
        };

        let committed = {
            let mut inner = self.inner.lock();
            if inner.record.player_state == new_state {
                log::trace!("[Session] {} -> {} (unchanged)", source_name, new_state);
                return false;
            }

            let mut candidate = inner.record.clone();
            candidate.player_state = new_state;
            if new_state == PlayerState::Stopped {
                candidate.clear_track();
            }
            inner.commit(candidate)
        };

        match committed {
            Ok(snapshot) => {
                log::info!("[Session] {} -> {}", source_name, new_state);
                self.emitter.emit_snapshot(&snapshot);
                true
            }
            Err(e) => {
                log::error!(
                    "[Session] Transport update from {} rejected ({}): {}",
                    source_name,
                    e.code(),
                    e
                );
                false
            }
        }
    }

    /// Applies track metadata from `source_name`.
    ///
    /// No-op unless `fields` names a songid different from the current one,
    /// or carries a cover locator while the record has no cover. Otherwise the
    /// present fields are merged, the state is forced to playing and the cover
    /// is resolved: synchronously on a cache hit, else in the background with
    /// a second snapshot once the thumbnail exists. Returns whether a snapshot
    /// was emitted.
    ///
    /// This is not a plain field merge: on a new songid the previous track's
    /// title, artist, album and cover are cleared first, so a field the new
    /// track does not carry reads `null` instead of the old track's value.
    pub fn update_metadata(&self, source_name: &str, fields: MetadataUpdate) -> bool {
        // Existence check only; done before locking so the lock never waits on disk
        let cached_cover = fields
            .cover_url
            .as_deref()
            .and_then(|locator| self.art_cache.lookup(locator));

        let mut pending_art = None;
        let committed = {
            let mut inner = self.inner.lock();
            let current = &inner.record;

            let track_changed = fields.songid.is_some() && fields.songid != current.songid;
            let fills_cover = fields.cover_url.is_some() && current.cover_url.is_none();
            if !track_changed && !fills_cover {
                log::trace!(
                    "[Session] Metadata from {} for {:?} ignored (no new track or cover)",
                    source_name,
                    fields.songid
                );
                return false;
            }

            let mut candidate = current.clone();
            if track_changed {
                candidate.clear_track();
            }
            merge_fields(&mut candidate, &fields);
            candidate.player_state = PlayerState::Playing;
            candidate.cover_url = cached_cover;

            if candidate.cover_url.is_none() {
                if let Some(locator) = fields.cover_url {
                    pending_art = Some((candidate.songid.clone(), locator));
                }
            }
            inner.commit(candidate)
        };

        let snapshot = match committed {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::error!(
                    "[Session] Metadata update from {} rejected ({}): {}",
                    source_name,
                    e.code(),
                    e
                );
                return false;
            }
        };

        log::info!(
            "[Session] New metadata from {}: {:?} - {:?} ({:?})",
            source_name,
            snapshot.record.artist,
            snapshot.record.title,
            snapshot.record.songid
        );
        self.emitter.emit_snapshot(&snapshot);

        if let Some((songid, locator)) = pending_art {
            self.spawn_art_population(songid, locator);
        }
        true
    }

    /// Commits a finished thumbnail if its track is still current.
    ///
    /// Returns whether a snapshot was emitted. Stale completions are dropped.
    pub fn apply_art_completion(&self, completion: ArtCompletion) -> bool {
        let committed = {
            let mut inner = self.inner.lock();
            if inner.record.songid != completion.songid {
                log::debug!(
                    "[Session] Dropping art for {:?}, now playing {:?}",
                    completion.songid,
                    inner.record.songid
                );
                return false;
            }
            if inner.record.cover_url.as_deref() == Some(completion.reference.as_str()) {
                return false;
            }

            let mut candidate = inner.record.clone();
            candidate.cover_url = Some(completion.reference);
            inner.commit(candidate)
        };

        match committed {
            Ok(snapshot) => {
                log::info!("[Session] Cover ready: {:?}", snapshot.record.cover_url);
                self.emitter.emit_snapshot(&snapshot);
                true
            }
            Err(e) => {
                log::debug!("[Session] Art completion rejected: {}", e);
                false
            }
        }
    }

    fn spawn_art_population(&self, songid: Option<String>, locator: String) {
        let art_cache = Arc::clone(&self.art_cache);
        let art_tx = self.art_tx.clone();
        self.spawner.spawn(async move {
            if let Some(reference) = art_cache.resolve_or_log(&locator).await {
                // Receiver gone means shutdown; nothing to update
                let _ = art_tx.send(ArtCompletion { songid, reference });
            }
        });
    }
}

/// Copies every present field except the cover locator into `record`.
fn merge_fields(record: &mut SessionRecord, fields: &MetadataUpdate) {
    let pairs = [
        (&mut record.songid, &fields.songid),
        (&mut record.title, &fields.title),
        (&mut record.artist, &fields.artist),
        (&mut record.album, &fields.album),
    ];
    for (slot, value) in pairs {
        if value.is_some() {
            slot.clone_from(value);
        }
    }
}

//! Normalized source events and snapshot emission.
//!
//! This module provides:
//! - [`TransportEvent`] / [`MetadataEvent`]: what adapters hand to the reconciler
//! - [`SourceEvent`]: the tagged union of both, for adapters that queue events
//! - [`SnapshotEmitter`]: how the reconciler publishes committed records
//!   without knowing about sockets

mod emitter;

pub use emitter::{FanoutEmitter, LoggingEmitter, SnapshotEmitter};

use crate::session::SessionReconciler;

/// Partial track metadata reported by a source.
///
/// Any subset of fields may be present. `cover_url` is a source locator
/// (URL or file path), not an art reference; the reconciler resolves it
/// through the art cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub songid: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub cover_url: Option<String>,
}

impl MetadataUpdate {
    /// True when no field is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.songid.is_none()
            && self.title.is_none()
            && self.artist.is_none()
            && self.album.is_none()
            && self.cover_url.is_none()
    }
}

/// A play/pause/stop change reported by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    /// Diagnostic name of the reporting source.
    pub source_name: String,
    /// Raw transport-state string, normalized by the reconciler.
    pub state: String,
}

/// Track metadata reported by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEvent {
    /// Diagnostic name of the reporting source.
    pub source_name: String,
    pub fields: MetadataUpdate,
}

/// Either kind of normalized event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    Transport(TransportEvent),
    Metadata(MetadataEvent),
}

impl SourceEvent {
    /// Applies the event through the matching reconciler entry point.
    ///
    /// Returns whether the record changed (and was broadcast).
    pub fn apply(self, reconciler: &SessionReconciler) -> bool {
        match self {
            SourceEvent::Transport(event) => {
                reconciler.update_transport_state(&event.source_name, &event.state)
            }
            SourceEvent::Metadata(event) => {
                reconciler.update_metadata(&event.source_name, event.fields)
            }
        }
    }
}

impl From<TransportEvent> for SourceEvent {
    fn from(event: TransportEvent) -> Self {
        SourceEvent::Transport(event)
    }
}

impl From<MetadataEvent> for SourceEvent {
    fn from(event: MetadataEvent) -> Self {
        SourceEvent::Metadata(event)
    }
}

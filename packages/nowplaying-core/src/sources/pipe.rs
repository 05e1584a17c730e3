//! AirPlay metadata-pipe source.
//!
//! Turns decoded [`PipeEvent`]s into reconciler calls. Picture bytes are
//! staged through the art cache first so the reconciler only ever sees a
//! locator.

use std::sync::Arc;

use async_trait::async_trait;

use crate::artwork::ArtCache;
use crate::error::ErrorCode;
use crate::events::MetadataUpdate;
use crate::pipe::{PipeEvent, PipeEventHandler, PipeTrack};
use crate::session::SessionReconciler;

/// Source name reported to the reconciler.
pub const PIPE_SOURCE_NAME: &str = "AirPlay";

/// Pipe event handler that feeds the session reconciler.
pub struct PipeSource {
    reconciler: Arc<SessionReconciler>,
    art_cache: Arc<ArtCache>,
}

impl PipeSource {
    pub fn new(reconciler: Arc<SessionReconciler>, art_cache: Arc<ArtCache>) -> Self {
        Self {
            reconciler,
            art_cache,
        }
    }

    async fn stage(&self, songid: &str, bytes: &[u8]) -> Option<String> {
        match self.art_cache.stage_bytes(songid, bytes).await {
            Ok(locator) => Some(locator),
            Err(e) => {
                log::warn!(
                    "[Pipe] Failed to stage artwork for {} ({}): {}",
                    songid,
                    e.code(),
                    e
                );
                None
            }
        }
    }

    async fn on_track(&self, track: PipeTrack) {
        let cover_url = match &track.artwork {
            Some(bytes) => self.stage(&track.songid, bytes).await,
            None => None,
        };

        let fields = MetadataUpdate {
            songid: Some(track.songid),
            title: Some(track.title),
            artist: Some(track.artist),
            album: track.album,
            cover_url,
        };
        self.reconciler.update_metadata(PIPE_SOURCE_NAME, fields);
    }

    async fn on_artwork(&self, songid: String, bytes: Vec<u8>) {
        let Some(cover_url) = self.stage(&songid, &bytes).await else {
            return;
        };
        let fields = MetadataUpdate {
            songid: Some(songid),
            cover_url: Some(cover_url),
            ..Default::default()
        };
        self.reconciler.update_metadata(PIPE_SOURCE_NAME, fields);
    }
}

#[async_trait]
impl PipeEventHandler for PipeSource {
    async fn handle(&self, event: PipeEvent) {
        match event {
            PipeEvent::Transport(state) => {
                self.reconciler
                    .update_transport_state(PIPE_SOURCE_NAME, state.as_str());
            }
            PipeEvent::Track(track) => self.on_track(track).await,
            PipeEvent::Artwork { songid, bytes } => self.on_artwork(songid, bytes).await,
        }
    }
}

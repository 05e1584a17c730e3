//! The unified session record and its point-in-time snapshots.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Playback classification shared by every source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlayerState {
    /// Wire name of the state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Playing => "playing",
            Self::Paused => "paused",
        }
    }

    /// Normalizes a transport-state string reported by a source.
    ///
    /// Matching is case-insensitive. Besides the three canonical names this
    /// accepts the renderer vocabulary (`PAUSED_PLAYBACK`, `NO_MEDIA_PRESENT`).
    /// `TRANSITIONING` is a momentary state and yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownTransportState`] for anything else.
    pub fn from_transport(raw: &str) -> Result<Option<Self>, SessionError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "playing" => Ok(Some(Self::Playing)),
            "paused" | "paused_playback" => Ok(Some(Self::Paused)),
            "stopped" | "no_media_present" => Ok(Some(Self::Stopped)),
            "transitioning" => Ok(None),
            _ => Err(SessionError::UnknownTransportState(raw.to_string())),
        }
    }
}

impl FromStr for PlayerState {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_transport(s)?.ok_or_else(|| SessionError::UnknownTransportState(s.to_string()))
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single "now playing" record pushed to every subscriber.
///
/// Serializes to the subscriber JSON object: absent fields are written as
/// `null`, never omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub player_state: PlayerState,
    pub songid: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Art reference to a thumbnail that already exists in the art cache.
    pub cover_url: Option<String>,
}

impl SessionRecord {
    /// The process-start shape: stopped, every track field absent.
    #[must_use]
    pub fn stopped() -> Self {
        Self::default()
    }

    /// Clears the track identity and every descriptive field.
    pub fn clear_track(&mut self) {
        self.songid = None;
        self.title = None;
        self.artist = None;
        self.album = None;
        self.cover_url = None;
    }

    /// Checks the record-level invariants.
    ///
    /// # Errors
    ///
    /// A stopped record must not carry any track field.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.player_state != PlayerState::Stopped {
            return Ok(());
        }
        let fields = [
            ("songid", &self.songid),
            ("title", &self.title),
            ("artist", &self.artist),
            ("album", &self.album),
            ("cover_url", &self.cover_url),
        ];
        match fields.iter().find(|(_, value)| value.is_some()) {
            Some((name, _)) => Err(SessionError::StoppedWithTrackField(name)),
            None => Ok(()),
        }
    }
}

/// A point-in-time copy of the record, taken inside the reconciler's
/// critical section.
///
/// `revision` increases by one on every committed change, so consumers can
/// tell which of two snapshots is newer even if they are published out of
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub revision: u64,
    pub record: SessionRecord,
}

//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by the metadata pipe format and the subscriber
//! wire protocol; changing them would break compatibility with existing
//! metadata producers and display clients.

// ─────────────────────────────────────────────────────────────────────────────
// Metadata Pipe
// ─────────────────────────────────────────────────────────────────────────────

/// Opening marker of an item block.
pub const ITEM_START: &[u8] = b"<item>";

/// Closing marker of an item block.
pub const ITEM_END: &[u8] = b"</item>";

/// Play stream resumed.
pub const CODE_PLAY_RESUME: &str = "prsm";

/// Play stream paused.
pub const CODE_PAUSE: &str = "paus";

/// Play stream ended.
pub const CODE_PLAY_END: &str = "pend";

/// Track metadata bundle starts.
pub const CODE_METADATA_START: &str = "mdst";

/// Track metadata bundle ends.
pub const CODE_METADATA_END: &str = "mden";

/// Artist name (DMAP `asar`).
pub const CODE_ARTIST: &str = "asar";

/// Track title (DMAP `minm`).
pub const CODE_TITLE: &str = "minm";

/// Album name (DMAP `asal`).
pub const CODE_ALBUM: &str = "asal";

/// Cover art picture bytes.
pub const CODE_PICTURE: &str = "PICT";

/// Prefix for songids derived from pipe metadata.
pub const PIPE_SONGID_PREFIX: &str = "airplay";

// ─────────────────────────────────────────────────────────────────────────────
// Subscriber Wire Protocol
// ─────────────────────────────────────────────────────────────────────────────

/// Size of the big-endian length prefix in front of every frame.
pub const FRAME_HEADER_LEN: usize = 4;

/// Read buffer for draining (and discarding) subscriber input.
pub const SUBSCRIBER_READ_BUF: usize = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Art Cache
// ─────────────────────────────────────────────────────────────────────────────

/// File extension of cached thumbnails.
pub const THUMBNAIL_EXTENSION: &str = "jpg";

/// JPEG quality for cached thumbnails.
pub const THUMBNAIL_JPEG_QUALITY: u8 = 90;

/// Number of hash bytes used in cache file names (32 hex characters).
pub const CACHE_KEY_BYTES: usize = 16;

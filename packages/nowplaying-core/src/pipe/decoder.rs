//! Streaming decoder for the metadata pipe.
//!
//! Bytes are appended in arrival order with [`PipeDecoder::feed`]. Complete
//! item blocks are cut out of the buffer and classified:
//!
//! - transport codes become [`PipeEvent::Transport`] right away;
//! - `mdst` resets the staged track;
//! - artist, title, album and picture items are staged until both artist and
//!   title are known, at which point one [`PipeEvent::Track`] is emitted;
//! - a picture arriving after that commit (and before the next `mdst`) becomes
//!   [`PipeEvent::Artwork`] for the committed track.
//!
//! The output depends only on the bytes fed, not on how they were chunked.

use crate::error::ErrorCode;
use crate::pipe::item::{parse_item, PipeItem};
use crate::protocol_constants::{
    CODE_ALBUM, CODE_ARTIST, CODE_METADATA_END, CODE_METADATA_START, CODE_PAUSE, CODE_PICTURE,
    CODE_PLAY_END, CODE_PLAY_RESUME, CODE_TITLE, ITEM_END, ITEM_START, PIPE_SONGID_PREFIX,
};
use crate::session::PlayerState;

/// A track whose artist and title are both known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeTrack {
    pub songid: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    /// Raw picture bytes staged before the commit.
    pub artwork: Option<Vec<u8>>,
}

/// Event decoded from the pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeEvent {
    Transport(PlayerState),
    Track(PipeTrack),
    /// Picture for an already committed track.
    Artwork { songid: String, bytes: Vec<u8> },
}

/// Derives the songid of a pipe track.
#[must_use]
pub fn pipe_songid(artist: &str, title: &str) -> String {
    format!("{}-{}-{}", PIPE_SONGID_PREFIX, artist, title)
}

/// Fields seen since the last `mdst`.
#[derive(Debug, Default)]
struct StagedTrack {
    artist: Option<String>,
    title: Option<String>,
    album: Option<String>,
    artwork: Option<Vec<u8>>,
}

impl StagedTrack {
    fn take_committed(&mut self) -> Option<PipeTrack> {
        if self.artist.is_none() || self.title.is_none() {
            return None;
        }
        let staged = std::mem::take(self);
        let artist = staged.artist.unwrap_or_default();
        let title = staged.title.unwrap_or_default();
        Some(PipeTrack {
            songid: pipe_songid(&artist, &title),
            title,
            artist,
            album: staged.album,
            artwork: staged.artwork,
        })
    }
}

/// Incremental item-block decoder with its staged track accumulator.
#[derive(Debug, Default)]
pub struct PipeDecoder {
    buffer: Vec<u8>,
    staged: StagedTrack,
    /// Songid committed since the last `mdst`, target of late artwork.
    committed: Option<String>,
}

impl PipeDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops buffered bytes and all staged state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Bytes held back waiting for the rest of a block.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Appends `chunk` and decodes every complete block now in the buffer.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<PipeEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(block) = self.next_block() {
            match parse_item(&block) {
                Ok(item) => self.handle_item(item, &mut events),
                Err(e) => {
                    log::warn!("[Pipe] Skipping malformed item ({}): {}", e.code(), e);
                    log::debug!("[Pipe] Malformed block: {}", String::from_utf8_lossy(&block));
                }
            }
        }
        events
    }

    /// Cuts the first complete block out of the buffer.
    ///
    /// Bytes before the start marker are discarded. Without a start marker only
    /// a tail that could still become one is kept.
    fn next_block(&mut self) -> Option<Vec<u8>> {
        let Some(start) = find(&self.buffer, ITEM_START, 0) else {
            let keep = (ITEM_START.len() - 1).min(self.buffer.len());
            self.buffer.drain(..self.buffer.len() - keep);
            return None;
        };
        self.buffer.drain(..start);

        let end = find(&self.buffer, ITEM_END, ITEM_START.len())?;
        let block: Vec<u8> = self.buffer.drain(..end + ITEM_END.len()).collect();
        Some(block)
    }

    fn handle_item(&mut self, item: PipeItem, events: &mut Vec<PipeEvent>) {
        log::trace!("[Pipe] Item {}", item.code);

        let code = item.code.as_str();
        if let Some(state) = transport_state(code) {
            events.push(PipeEvent::Transport(state));
            return;
        }

        match code {
            CODE_METADATA_START => {
                self.staged = StagedTrack::default();
                self.committed = None;
                return;
            }
            CODE_METADATA_END => return,
            _ => {}
        }

        // Empty payloads carry nothing to stage
        if item.data.as_deref().map_or(true, <[u8]>::is_empty) {
            return;
        }

        match code {
            CODE_ARTIST => self.staged.artist = item.text(),
            CODE_TITLE => self.staged.title = item.text(),
            CODE_ALBUM => self.staged.album = item.text(),
            CODE_PICTURE => {
                let Some(data) = item.data else {
                    return;
                };
                let pending = self.staged.artist.is_some() || self.staged.title.is_some();
                match (&self.committed, pending) {
                    (Some(songid), false) => {
                        events.push(PipeEvent::Artwork {
                            songid: songid.clone(),
                            bytes: data,
                        });
                    }
                    _ => self.staged.artwork = Some(data),
                }
                return;
            }
            _ => return,
        }

        if let Some(track) = self.staged.take_committed() {
            log::debug!("[Pipe] Committing {}", track.songid);
            self.committed = Some(track.songid.clone());
            events.push(PipeEvent::Track(track));
        }
    }
}

fn transport_state(code: &str) -> Option<PlayerState> {
    match code {
        CODE_PLAY_RESUME => Some(PlayerState::Playing),
        CODE_PAUSE => Some(PlayerState::Paused),
        CODE_PLAY_END => Some(PlayerState::Stopped),
        _ => None,
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    fn item(code: &str, data: Option<&[u8]>) -> Vec<u8> {
        let mut out = format!(
            "<item><type>636f7265</type><code>{}</code><length>{}</length>",
            hex::encode(code),
            data.map_or(0, <[u8]>::len)
        );
        if let Some(data) = data {
            out.push_str("\n<data encoding=\"base64\">\n");
            out.push_str(&STANDARD.encode(data));
            out.push_str("</data>");
        }
        out.push_str("</item>\n");
        out.into_bytes()
    }

    fn session_bytes() -> Vec<u8> {
        let mut bytes = b"noise before the first item".to_vec();
        for part in [
            item("prsm", None),
            item("mdst", None),
            item("asal", Some(b"Discovery")),
            item("asar", Some(b"Daft Punk")),
            item("minm", Some("One More Time \u{2665}".as_bytes())),
            item("mden", None),
            item("PICT", Some(&[0x89, b'P', b'N', b'G'])),
            item("paus", None),
            b"<item><code>not xml</item>".to_vec(),
            item("ssnc", Some(b"ignored")),
            item("mdst", None),
            item("PICT", Some(&[1, 2, 3])),
            item("minm", Some(b"Feel Good Inc")),
            item("asar", Some(b"Gorillaz")),
            item("pend", None),
        ] {
            bytes.extend(part);
        }
        bytes
    }

    fn feed_in_chunks(bytes: &[u8], chunk: usize) -> Vec<PipeEvent> {
        let mut decoder = PipeDecoder::new();
        bytes
            .chunks(chunk)
            .flat_map(|c| decoder.feed(c))
            .collect()
    }

    #[test]
    fn decodes_a_full_session() {
        let events = PipeDecoder::new().feed(&session_bytes());
        assert_eq!(
            events,
            vec![
                PipeEvent::Transport(PlayerState::Playing),
                PipeEvent::Track(PipeTrack {
                    songid: "airplay-Daft Punk-One More Time \u{2665}".into(),
                    title: "One More Time \u{2665}".into(),
                    artist: "Daft Punk".into(),
                    album: Some("Discovery".into()),
                    artwork: None,
                }),
                PipeEvent::Artwork {
                    songid: "airplay-Daft Punk-One More Time \u{2665}".into(),
                    bytes: vec![0x89, b'P', b'N', b'G'],
                },
                PipeEvent::Transport(PlayerState::Paused),
                PipeEvent::Track(PipeTrack {
                    songid: "airplay-Gorillaz-Feel Good Inc".into(),
                    title: "Feel Good Inc".into(),
                    artist: "Gorillaz".into(),
                    album: None,
                    artwork: Some(vec![1, 2, 3]),
                }),
                PipeEvent::Transport(PlayerState::Stopped),
            ]
        );
    }

    #[test]
    fn chunk_boundaries_do_not_change_events() {
        let bytes = session_bytes();
        let whole = PipeDecoder::new().feed(&bytes);
        for chunk in [1, 2, 3, 5, 7, 13, 64, 4096] {
            assert_eq!(feed_in_chunks(&bytes, chunk), whole, "chunk size {}", chunk);
        }
    }

    #[test]
    fn split_inside_markers() {
        let bytes = item("prsm", None);
        let mut decoder = PipeDecoder::new();
        assert!(decoder.feed(&bytes[..3]).is_empty());
        assert!(decoder.feed(&bytes[3..bytes.len() - 4]).is_empty());
        assert_eq!(
            decoder.feed(&bytes[bytes.len() - 4..]),
            vec![PipeEvent::Transport(PlayerState::Playing)]
        );
    }

    #[test]
    fn artist_then_title_commits_once_after_title() {
        let mut decoder = PipeDecoder::new();
        assert!(decoder.feed(&item("mdst", None)).is_empty());
        assert!(decoder.feed(&item("asar", Some(b"A"))).is_empty());

        let events = decoder.feed(&item("minm", Some(b"B")));
        assert_eq!(
            events,
            vec![PipeEvent::Track(PipeTrack {
                songid: "airplay-A-B".into(),
                title: "B".into(),
                artist: "A".into(),
                album: None,
                artwork: None,
            })]
        );
        assert!(decoder.feed(&item("mden", None)).is_empty());
    }

    #[test]
    fn metadata_start_discards_partial_track() {
        let mut decoder = PipeDecoder::new();
        decoder.feed(&item("asar", Some(b"Old Artist")));
        decoder.feed(&item("mdst", None));

        assert!(decoder.feed(&item("minm", Some(b"Title"))).is_empty());
    }

    #[test]
    fn malformed_block_does_not_stall_the_buffer() {
        let mut decoder = PipeDecoder::new();
        let mut bytes = b"<item><type>zz</type><code>qq</code></item>".to_vec();
        bytes.extend(item("paus", None));

        assert_eq!(
            decoder.feed(&bytes),
            vec![PipeEvent::Transport(PlayerState::Paused)]
        );
        assert_eq!(decoder.buffered_len(), 1);
    }

    #[test]
    fn noise_without_marker_is_not_kept() {
        let mut decoder = PipeDecoder::new();
        decoder.feed(&[b'x'; 1000]);
        assert!(decoder.buffered_len() < ITEM_START.len());
    }

    #[test]
    fn stray_end_marker_before_start_is_skipped() {
        let mut decoder = PipeDecoder::new();
        let mut bytes = b"</item>".to_vec();
        bytes.extend(item("pend", None));
        assert_eq!(
            decoder.feed(&bytes),
            vec![PipeEvent::Transport(PlayerState::Stopped)]
        );
    }

    #[test]
    fn reset_clears_buffer_and_staged_fields() {
        let mut decoder = PipeDecoder::new();
        decoder.feed(&item("asar", Some(b"A")));
        let partial = item("minm", Some(b"B"));
        decoder.feed(&partial[..10]);

        decoder.reset();
        assert_eq!(decoder.buffered_len(), 0);
        assert!(decoder.feed(&item("minm", Some(b"B"))).is_empty());
    }

    #[test]
    fn empty_values_are_not_staged() {
        let mut decoder = PipeDecoder::new();
        decoder.feed(&item("asar", Some(b"")));
        assert!(decoder.feed(&item("minm", Some(b"B"))).is_empty());
    }
}

//! Network renderer source.
//!
//! Device discovery and event subscription happen elsewhere; this adapter
//! receives the evented state variables of one renderer and normalizes them:
//!
//! - `TransportState` is passed to the reconciler as-is (the reconciler owns
//!   the vocabulary, including `PAUSED_PLAYBACK` and `TRANSITIONING`);
//! - `Metadata` carries a DIDL-Lite document describing the current track.

use std::sync::Arc;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{ErrorCode, RendererError};
use crate::events::MetadataUpdate;
use crate::session::SessionReconciler;

/// Source name reported to the reconciler.
pub const RENDERER_SOURCE_NAME: &str = "UPNP";

/// One evented state variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateVariable {
    pub name: String,
    pub value: String,
}

impl StateVariable {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Feeds renderer events to the session reconciler.
pub struct RendererSource {
    reconciler: Arc<SessionReconciler>,
}

impl RendererSource {
    pub fn new(reconciler: Arc<SessionReconciler>) -> Self {
        Self { reconciler }
    }

    /// Handles one event notification.
    ///
    /// Transport state is applied before metadata. Empty values are skipped.
    pub fn on_event(&self, variables: &[StateVariable]) {
        let lookup = |name: &str| {
            variables
                .iter()
                .find(|v| v.name == name)
                .map(|v| v.value.as_str())
                .filter(|v| !v.trim().is_empty())
        };

        if let Some(state) = lookup("TransportState") {
            self.reconciler
                .update_transport_state(RENDERER_SOURCE_NAME, state);
        }

        if let Some(didl) = lookup("Metadata") {
            match parse_didl(didl) {
                Ok(fields) if fields.is_empty() => {
                    log::debug!("[Renderer] Metadata without usable fields");
                }
                Ok(fields) => {
                    self.reconciler.update_metadata(RENDERER_SOURCE_NAME, fields);
                }
                Err(e) => {
                    log::warn!("[Renderer] Dropping metadata ({}): {}", e.code(), e);
                }
            }
        }
    }
}

/// Extracts track fields from a DIDL-Lite document.
///
/// Accepts the document raw or entity-escaped. The first `<item>`'s `id`
/// becomes the songid; `upnp:artist` wins over `dc:creator`.
///
/// # Errors
///
/// Returns [`RendererError::Didl`] when the XML is malformed.
pub fn parse_didl(didl: &str) -> Result<MetadataUpdate, RendererError> {
    let unescaped = if didl.trim_start().starts_with('<') {
        didl.to_string()
    } else {
        html_escape::decode_html_entities(didl).to_string()
    };

    let mut reader = Reader::from_str(&unescaped);
    let mut buf = Vec::new();
    let mut fields = MetadataUpdate::default();
    let mut creator = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"item" => {
                    if fields.songid.is_none() {
                        fields.songid = get_attr(e, b"id");
                    }
                }
                b"dc:title" => set_once(&mut fields.title, read_text(&mut reader, e)?),
                b"upnp:artist" => set_once(&mut fields.artist, read_text(&mut reader, e)?),
                b"dc:creator" => set_once(&mut creator, read_text(&mut reader, e)?),
                b"upnp:album" => set_once(&mut fields.album, read_text(&mut reader, e)?),
                b"upnp:albumArtURI" => {
                    set_once(&mut fields.cover_url, read_text(&mut reader, e)?);
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"item" => {
                if fields.songid.is_none() {
                    fields.songid = get_attr(e, b"id");
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(RendererError::Didl(e.to_string())),
        }
        buf.clear();
    }

    if fields.artist.is_none() {
        fields.artist = creator;
    }
    Ok(fields)
}

fn read_text(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> Result<String, RendererError> {
    let text = reader
        .read_text(start.name())
        .map_err(|e| RendererError::Didl(e.to_string()))?
        .to_string();
    Ok(html_escape::decode_html_entities(&text).trim().to_string())
}

fn get_attr(elem: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    elem.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
        .filter(|v| !v.is_empty())
}

fn set_once(slot: &mut Option<String>, value: String) {
    if slot.is_none() && !value.is_empty() {
        *slot = Some(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artwork::ArtCache;
    use crate::events::SnapshotEmitter;
    use crate::runtime::TokioSpawner;
    use crate::session::{PlayerState, SessionRecord};
    use crate::state::Config;
    use crate::test_support::RecordingEmitter;
    use reqwest::Client;
    use tempfile::TempDir;

    const DIDL: &str = r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/"><item id="101" parentID="0" restricted="1"><dc:title>One More Time</dc:title><upnp:artist role="Performer">Daft Punk</upnp:artist><upnp:artist role="Composer">Thomas Bangalter</upnp:artist><upnp:album>Discovery</upnp:album><upnp:albumArtURI>http://192.168.1.20/art?id=101&amp;size=600</upnp:albumArtURI><upnp:class>object.item.audioItem.musicTrack</upnp:class></item></DIDL-Lite>"#;

    fn source(dir: &TempDir) -> (RendererSource, Arc<SessionReconciler>, Arc<RecordingEmitter>) {
        let config = Config {
            art_cache_dir: dir.path().join("cache"),
            art_staging_dir: dir.path().join("staging"),
            ..Default::default()
        };
        let recorder = Arc::new(RecordingEmitter::default());
        let reconciler = Arc::new(SessionReconciler::new(
            Arc::new(ArtCache::new(&config, Client::new())),
            Arc::clone(&recorder) as Arc<dyn SnapshotEmitter>,
            TokioSpawner::current(),
        ));
        (RendererSource::new(Arc::clone(&reconciler)), reconciler, recorder)
    }

    #[test]
    fn parses_track_fields() {
        let fields = parse_didl(DIDL).unwrap();
        assert_eq!(fields.songid.as_deref(), Some("101"));
        assert_eq!(fields.title.as_deref(), Some("One More Time"));
        assert_eq!(fields.artist.as_deref(), Some("Daft Punk"));
        assert_eq!(fields.album.as_deref(), Some("Discovery"));
        assert_eq!(
            fields.cover_url.as_deref(),
            Some("http://192.168.1.20/art?id=101&size=600")
        );
    }

    #[test]
    fn parses_escaped_document() {
        let escaped = DIDL
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;");
        assert_eq!(parse_didl(&escaped).unwrap(), parse_didl(DIDL).unwrap());
    }

    #[test]
    fn creator_is_the_artist_fallback() {
        let didl = r#"<DIDL-Lite><item id="7"><dc:title>Song</dc:title><dc:creator>Someone</dc:creator></item></DIDL-Lite>"#;
        let fields = parse_didl(didl).unwrap();
        assert_eq!(fields.artist.as_deref(), Some("Someone"));
        assert_eq!(fields.cover_url, None);
    }

    #[test]
    fn malformed_didl_is_an_error() {
        let didl = "<DIDL-Lite><item id=\"7\"><dc:title>Song</item>";
        assert!(matches!(parse_didl(didl), Err(RendererError::Didl(_))));
    }

    #[tokio::test]
    async fn event_applies_state_then_metadata() {
        let dir = TempDir::new().unwrap();
        let (source, reconciler, recorder) = source(&dir);

        source.on_event(&[
            StateVariable::new("TransportState", "PAUSED_PLAYBACK"),
            StateVariable::new("Metadata", DIDL),
        ]);

        let snapshots = recorder.snapshots();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].record.player_state, PlayerState::Paused);
        let record = reconciler.snapshot().record;
        assert_eq!(record.player_state, PlayerState::Playing);
        assert_eq!(record.songid.as_deref(), Some("101"));
    }

    #[tokio::test]
    async fn transitioning_and_bad_metadata_change_nothing() {
        let dir = TempDir::new().unwrap();
        let (source, reconciler, recorder) = source(&dir);

        source.on_event(&[
            StateVariable::new("TransportState", "TRANSITIONING"),
            StateVariable::new("Metadata", "<DIDL-Lite><item"),
        ]);

        assert_eq!(recorder.count(), 0);
        assert_eq!(reconciler.snapshot().record, SessionRecord::stopped());
    }

    #[tokio::test]
    async fn no_media_present_stops() {
        let dir = TempDir::new().unwrap();
        let (source, reconciler, _) = source(&dir);

        source.on_event(&[StateVariable::new("Metadata", DIDL)]);
        source.on_event(&[StateVariable::new("TransportState", "NO_MEDIA_PRESENT")]);

        assert_eq!(reconciler.snapshot().record, SessionRecord::stopped());
    }
}

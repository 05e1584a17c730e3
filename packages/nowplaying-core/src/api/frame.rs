//! Subscriber wire framing.
//!
//! Every message is a 4-byte big-endian payload length followed by the UTF-8
//! JSON encoding of the full [`SessionRecord`].

use bytes::Bytes;
use tokio_util::codec::LengthDelimitedCodec;

use crate::protocol_constants::FRAME_HEADER_LEN;
use crate::session::SessionRecord;

/// Codec that writes and reads subscriber frames.
#[must_use]
pub fn frame_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(FRAME_HEADER_LEN)
        .big_endian()
        .new_codec()
}

/// JSON payload for `record`, without the length prefix.
pub fn encode_payload(record: &SessionRecord) -> serde_json::Result<Bytes> {
    serde_json::to_vec(record).map(Bytes::from)
}

/// Parses a frame payload back into a record.
pub fn decode_payload(payload: &[u8]) -> serde_json::Result<SessionRecord> {
    serde_json::from_slice(payload)
}

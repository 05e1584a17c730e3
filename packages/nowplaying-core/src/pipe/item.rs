//! Parsing of a single metadata-pipe item block.
//!
//! An item looks like:
//!
//! ```text
//! <item><type>636f7265</type><code>61736172</code><length>9</length>
//! <data encoding="base64">
//! RGFmdCBQdW5r</data></item>
//! ```
//!
//! `type` and `code` are four-character identifiers written as hex. `data` is
//! optional; when it carries `encoding="base64"` the payload is base64,
//! otherwise it is plain text.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{PipeError, PipeResult};

/// A decoded item block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeItem {
    /// Item code, e.g. `asar` or `PICT`.
    pub code: String,
    /// Decoded payload, if the item carried one.
    pub data: Option<Vec<u8>>,
}

impl PipeItem {
    /// Payload as trimmed text, with invalid UTF-8 replaced.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        self.data
            .as_deref()
            .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
    }
}

/// Parses one complete `<item>...</item>` block.
///
/// # Errors
///
/// Fails when the XML is malformed, the block has no `code`, the code is not
/// valid hex, or a base64 payload does not decode.
pub fn parse_item(block: &[u8]) -> PipeResult<PipeItem> {
    let xml = std::str::from_utf8(block).map_err(|e| PipeError::Xml(e.to_string()))?;
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut code = None;
    let mut data = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"code" => {
                    let raw = read_element_text(&mut reader, e)?;
                    code = Some(decode_code(&raw)?);
                }
                b"data" => {
                    let base64 = attr_value(e, b"encoding").as_deref() == Some("base64");
                    let raw = read_element_text(&mut reader, e)?;
                    data = Some(decode_data(&raw, base64)?);
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(PipeError::Xml(e.to_string())),
        }
        buf.clear();
    }

    let code = code.ok_or(PipeError::MissingCode)?;
    Ok(PipeItem { code, data })
}

fn read_element_text(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> PipeResult<String> {
    let text = reader
        .read_text(start.name())
        .map_err(|e| PipeError::Xml(e.to_string()))?
        .to_string();
    Ok(html_escape::decode_html_entities(&text).into_owned())
}

fn attr_value(elem: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    elem.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// `61736172` -> `asar`.
fn decode_code(raw: &str) -> PipeResult<String> {
    let trimmed = raw.trim();
    let bytes = hex::decode(trimmed).map_err(|_| PipeError::InvalidCode(trimmed.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn decode_data(raw: &str, base64: bool) -> PipeResult<Vec<u8>> {
    if !base64 {
        return Ok(raw.as_bytes().to_vec());
    }
    // Base64 payloads are line-wrapped
    let compact: String = raw.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(STANDARD.decode(compact)?)
}

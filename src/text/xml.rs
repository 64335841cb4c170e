//! XML detection on top of a detected text encoding.

use std::borrow::Cow;
use std::io::SeekFrom;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use crate::error::Result;
use crate::formats::ReadSeek;
use crate::reader::EndianReader;
use crate::text::encoding;
use crate::text::TextLayeredDetector;
use crate::types::{DetectorOptions, FormatSummary, TextSummary, XmlSummary};

/// Bytes of the stream the XML detector looks at.
const XML_PREFIX_LEN: u64 = 64 * 1024;

/// Decode `bytes` as the encoding named by `text`, minus any BOM.
///
/// Returns `None` for encodings without a decoder.
pub fn decode_prefix<'a>(bytes: &'a [u8], text: &TextSummary) -> Option<Cow<'a, str>> {
    let enc = encoding::by_name(&text.encoding_name)?;
    let bom_len = if text.has_bom { enc.bom_len(bytes) } else { 0 };
    let body = bytes.get(bom_len..).unwrap_or_default();

    if let Some(decoder) = enc.decoder() {
        let (decoded, _had_errors) = decoder.decode_without_bom_handling(body);
        return Some(decoded);
    }
    match enc.code_page {
        Some(12000) => Some(Cow::Owned(decode_utf32(body, u32::from_le_bytes))),
        Some(12001) => Some(Cow::Owned(decode_utf32(body, u32::from_be_bytes))),
        _ => None,
    }
}

fn decode_utf32(bytes: &[u8], to_u32: fn([u8; 4]) -> u32) -> String {
    bytes
        .chunks_exact(4)
        .map(|quad| {
            let value = to_u32([quad[0], quad[1], quad[2], quad[3]]);
            char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER)
        })
        .collect()
}

/// Whether `decoded` opens like an XML document.
///
/// Returns the declaration's `encoding` pseudo-attribute as the inner option.
pub fn sniff_xml(decoded: &str) -> Option<Option<String>> {
    let mut reader = Reader::from_str(decoded);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Decl(decl)) => {
                let declared = decl
                    .encoding()
                    .and_then(|enc| enc.ok())
                    .map(|enc| String::from_utf8_lossy(&enc).into_owned());
                return Some(declared);
            }
            Ok(Event::Start(_)) | Ok(Event::Empty(_)) | Ok(Event::DocType(_)) => {
                return Some(None);
            }
            Ok(Event::Comment(_)) | Ok(Event::PI(_)) => {}
            Ok(Event::Text(t)) if t.iter().all(u8::is_ascii_whitespace) => {}
            Ok(_) => return None,
            Err(e) => {
                debug!(error = %e, "not XML");
                return None;
            }
        }
    }
}

/// Upgrades a text summary to XML when the document opens with a
/// declaration, a doctype or a root element.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlDetector;

impl TextLayeredDetector for XmlDetector {
    fn name(&self) -> &'static str {
        "XML"
    }

    fn read_format(
        &self,
        stream: &mut dyn ReadSeek,
        text: &TextSummary,
        options: &DetectorOptions,
    ) -> Result<Option<FormatSummary>> {
        let limit = options.scan_limit.map_or(XML_PREFIX_LEN, |l| l.min(XML_PREFIX_LEN));
        stream.seek(SeekFrom::Start(0))?;
        let mut prefix = vec![0u8; usize::try_from(limit).unwrap_or(usize::MAX)];
        let filled = EndianReader::new(&mut *stream).read_up_to(&mut prefix)?;
        prefix.truncate(filled);

        let Some(decoded) = decode_prefix(&prefix, text) else {
            return Ok(None);
        };
        let summary = sniff_xml(&decoded).map(|declared| {
            debug!(encoding = %text.encoding_name, declared = ?declared, "XML document");
            FormatSummary::Xml(XmlSummary {
                text: text.clone(),
                xml_declaration_encoding: declared,
            })
        });
        Ok(summary)
    }
}

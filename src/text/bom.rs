//! Byte-order-mark table.

use std::io::SeekFrom;

use tracing::debug;

use crate::error::Result;
use crate::formats::ReadSeek;
use crate::reader::EndianReader;
use crate::signature::SignatureSet;
use crate::text::encoding::{self, DetectableEncoding};
use crate::text::TextDetector;
use crate::types::{DetectorOptions, TextSummary};

/// Matches the leading bytes against every registered BOM, longest first,
/// so `FF FE 00 00` reads as UTF-32LE rather than UTF-16LE.
#[derive(Debug, Clone)]
pub struct BomTextDetector {
    table: SignatureSet<&'static DetectableEncoding>,
}

impl BomTextDetector {
    pub fn new() -> Self {
        let table = SignatureSet::new(
            encoding::with_bom().flat_map(|enc| enc.boms.iter().map(move |bom| (*bom, enc))),
        );
        Self { table }
    }

    /// Encoding whose BOM starts `bytes`.
    pub fn lookup(&self, bytes: &[u8]) -> Option<&'static DetectableEncoding> {
        self.table.find(bytes).map(|(_, enc)| *enc)
    }

    pub fn required_len(&self) -> usize {
        self.table.required_len()
    }
}

impl Default for BomTextDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl TextDetector for BomTextDetector {
    fn name(&self) -> &'static str {
        "BOM"
    }

    fn read_format(
        &self,
        stream: &mut dyn ReadSeek,
        _options: &DetectorOptions,
    ) -> Result<Option<TextSummary>> {
        stream.seek(SeekFrom::Start(0))?;
        let mut head = vec![0u8; self.required_len()];
        let filled = EndianReader::new(&mut *stream).read_up_to(&mut head)?;
        head.truncate(filled);

        let found = self.lookup(&head);
        if let Some(enc) = found {
            debug!(encoding = enc.name, "byte-order mark matched");
        }
        Ok(found.map(|enc| enc.summary(true)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn detect(bytes: &[u8]) -> Option<TextSummary> {
        BomTextDetector::new()
            .read_format(&mut Cursor::new(bytes), &DetectorOptions::default())
            .unwrap()
    }

    #[test]
    fn test_utf16le_bom() {
        let summary = detect(&[0xFF, 0xFE, b'h', 0, b'i', 0]).unwrap();
        assert_eq!(summary.encoding_name, "utf-16LE");
        assert!(summary.has_bom);
    }

    #[test]
    fn test_longest_bom_wins() {
        let summary = detect(&[0xFF, 0xFE, 0x00, 0x00, b'h', 0, 0, 0]).unwrap();
        assert_eq!(summary.encoding_name, "utf-32LE");
        let summary = detect(&[0x00, 0x00, 0xFE, 0xFF]).unwrap();
        assert_eq!(summary.encoding_name, "utf-32BE");
    }

    #[test]
    fn test_bom_only_encodings() {
        let summary = detect(&[0x2B, 0x2F, 0x76, 0x38, b'A']).unwrap();
        assert_eq!(summary.encoding_name, "utf-7");
        assert_eq!(summary.code_page, None);

        let summary = detect(&[0x84, 0x31, 0x95, 0x33]).unwrap();
        assert_eq!(summary.encoding_name, "gb18030");
    }

    #[test]
    fn test_utf7_prefix_without_fourth_byte() {
        assert!(detect(b"+/vendor/lib is the path\n").is_none());
        assert!(detect(b"+/v").is_none());
        assert_eq!(detect(b"+/v+-").unwrap().encoding_name, "utf-7");
    }

    #[test]
    fn test_short_and_plain_streams() {
        assert!(detect(&[0xEF, 0xBB]).is_none());
        assert!(detect(b"plain").is_none());
        assert!(detect(&[]).is_none());
        assert_eq!(detect(&[0xEF, 0xBB, 0xBF]).unwrap().encoding_name, "utf-8");
    }
}

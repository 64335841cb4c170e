//! Streaming text encoding classifier.
//!
//! Four hypothesis checkers (ASCII/code page, UTF-8, UTF-16, UTF-32) are
//! advanced one byte at a time, so their state carries across chunk
//! boundaries and the verdict does not depend on how the input was split.
//! Validity only ever decays; once every checker has failed the scan stops.

use std::io::SeekFrom;

use bitflags::bitflags;
use tracing::debug;

use crate::error::Result;
use crate::formats::ReadSeek;
use crate::reader::EndianReader;
use crate::text::encoding::{self, DetectableEncoding};
use crate::text::TextDetector;
use crate::types::{DetectorOptions, Endianness, TextSummary};

bitflags! {
    /// Sticky observations of the ASCII / code-page checker.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct AsciiFlags: u8 {
        /// A control byte other than tab, CR or LF.
        const CONTROL = 0x01;
        /// A byte at or above 0x7F.
        const HIGH = 0x02;
    }
}

#[derive(Debug, Default)]
struct AsciiChecker {
    flags: AsciiFlags,
}

impl AsciiChecker {
    fn feed(&mut self, byte: u8) {
        if byte < 0x20 && !matches!(byte, b'\t' | b'\n' | b'\r') {
            self.flags |= AsciiFlags::CONTROL;
        }
        if byte >= 0x7F {
            self.flags |= AsciiFlags::HIGH;
        }
    }

    fn is_ascii(&self) -> bool {
        self.flags.is_empty()
    }

    fn is_code_page(&self) -> bool {
        !self.flags.contains(AsciiFlags::CONTROL)
    }
}

#[derive(Debug)]
struct Utf8Checker {
    valid: bool,
    pending: u8,
    multibyte_seen: bool,
}

impl Default for Utf8Checker {
    fn default() -> Self {
        Self {
            valid: true,
            pending: 0,
            multibyte_seen: false,
        }
    }
}

impl Utf8Checker {
    fn feed(&mut self, byte: u8) {
        if !self.valid {
            return;
        }
        if self.pending > 0 {
            if (0x80..=0xBF).contains(&byte) {
                self.pending -= 1;
                if self.pending == 0 {
                    self.multibyte_seen = true;
                }
            } else {
                self.valid = false;
            }
            return;
        }
        match byte {
            0x00 => self.valid = false,
            0x01..=0x7F => {}
            0xC2..=0xDF => self.pending = 1,
            0xE0..=0xEF => self.pending = 2,
            0xF0..=0xF4 => self.pending = 3,
            _ => self.valid = false,
        }
    }
}

/// One byte order of the UTF-16 hypothesis.
#[derive(Debug)]
struct Utf16Order {
    valid: bool,
    pending_low: bool,
    saw_surrogate: bool,
}

impl Default for Utf16Order {
    fn default() -> Self {
        Self {
            valid: true,
            pending_low: false,
            saw_surrogate: false,
        }
    }
}

impl Utf16Order {
    fn feed_high(&mut self, high: u8) {
        if !self.valid {
            return;
        }
        if self.pending_low {
            if (0xDC..=0xDF).contains(&high) {
                self.pending_low = false;
                self.saw_surrogate = true;
            } else {
                self.valid = false;
            }
        } else if (0xD8..=0xDF).contains(&high) {
            self.pending_low = true;
        }
    }
}

#[derive(Debug)]
struct Utf16Checker {
    little: Utf16Order,
    big: Utf16Order,
    first: Option<u8>,
    units: u64,
    seen_even: [bool; 256],
    seen_odd: [bool; 256],
}

impl Default for Utf16Checker {
    fn default() -> Self {
        Self {
            little: Utf16Order::default(),
            big: Utf16Order::default(),
            first: None,
            units: 0,
            seen_even: [false; 256],
            seen_odd: [false; 256],
        }
    }
}

impl Utf16Checker {
    fn feed(&mut self, byte: u8) {
        match self.first.take() {
            None => {
                self.seen_even[usize::from(byte)] = true;
                self.first = Some(byte);
            }
            Some(first) => {
                self.seen_odd[usize::from(byte)] = true;
                self.units += 1;
                if first == 0 && byte == 0 {
                    self.little.valid = false;
                    self.big.valid = false;
                    return;
                }
                self.little.feed_high(byte);
                self.big.feed_high(first);
            }
        }
    }

    fn is_alive(&self) -> bool {
        self.little.valid || self.big.valid
    }

    /// Chosen byte order, if either is still plausible.
    fn verdict(&self) -> Option<Endianness> {
        if self.units == 0 {
            return None;
        }
        match (self.little.valid, self.big.valid) {
            (false, false) => None,
            (true, false) => Some(Endianness::Little),
            (false, true) => Some(Endianness::Big),
            (true, true) => match (self.little.saw_surrogate, self.big.saw_surrogate) {
                (true, false) => Some(Endianness::Little),
                (false, true) => Some(Endianness::Big),
                _ => {
                    // The high byte of mostly-Latin text stays near zero, so
                    // the position holding it shows fewer distinct values.
                    let even = distinct(&self.seen_even);
                    let odd = distinct(&self.seen_odd);
                    if even < odd {
                        Some(Endianness::Big)
                    } else {
                        Some(Endianness::Little)
                    }
                }
            },
        }
    }
}

fn distinct(seen: &[bool; 256]) -> usize {
    seen.iter().filter(|s| **s).count()
}

#[derive(Debug)]
struct Utf32Checker {
    quad: [u8; 4],
    filled: usize,
    quads: u64,
    little: bool,
    big: bool,
}

impl Default for Utf32Checker {
    fn default() -> Self {
        Self {
            quad: [0; 4],
            filled: 0,
            quads: 0,
            little: true,
            big: true,
        }
    }
}

impl Utf32Checker {
    /// Largest second-highest byte accepted in a code point.
    const MAX_PLANE_BYTE: u8 = 10;

    fn feed(&mut self, byte: u8) {
        self.quad[self.filled] = byte;
        self.filled += 1;
        if self.filled < 4 {
            return;
        }
        self.filled = 0;
        self.quads += 1;

        let [b0, b1, b2, b3] = self.quad;
        if self.quad == [0; 4] {
            self.little = false;
            self.big = false;
            return;
        }
        if b3 != 0 || b2 > Self::MAX_PLANE_BYTE {
            self.little = false;
        }
        if b0 != 0 || b1 > Self::MAX_PLANE_BYTE {
            self.big = false;
        }
    }

    fn is_alive(&self) -> bool {
        self.little || self.big
    }

    fn verdict(&self) -> Option<Endianness> {
        if self.quads == 0 {
            None
        } else if self.little {
            Some(Endianness::Little)
        } else if self.big {
            Some(Endianness::Big)
        } else {
            None
        }
    }
}

/// Outcome of the streaming classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Ascii,
    Utf8,
    CodePage,
    Utf32(Endianness),
    Utf16(Endianness),
}

impl Verdict {
    /// Registry entry reported for this verdict.
    pub fn encoding(self) -> &'static DetectableEncoding {
        match self {
            Verdict::Ascii | Verdict::Utf8 => &encoding::UTF_8,
            Verdict::CodePage => &encoding::WINDOWS_1252,
            Verdict::Utf32(Endianness::Little) => &encoding::UTF_32LE,
            Verdict::Utf32(Endianness::Big) => &encoding::UTF_32BE,
            Verdict::Utf16(Endianness::Little) => &encoding::UTF_16LE,
            Verdict::Utf16(Endianness::Big) => &encoding::UTF_16BE,
        }
    }
}

/// Per-file classifier state. Feed it chunks, then ask for the verdict.
#[derive(Debug, Default)]
pub struct EncodingClassifier {
    ascii: AsciiChecker,
    utf8: Utf8Checker,
    utf16: Utf16Checker,
    utf32: Utf32Checker,
    consumed: u64,
}

impl EncodingClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance every live checker over `chunk`.
    pub fn feed(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            self.ascii.feed(byte);
            self.utf8.feed(byte);
            self.utf16.feed(byte);
            self.utf32.feed(byte);
        }
        self.consumed += chunk.len() as u64;
    }

    /// Whether any hypothesis is still standing.
    pub fn is_alive(&self) -> bool {
        self.ascii.is_code_page()
            || self.utf8.valid
            || self.utf16.is_alive()
            || self.utf32.is_alive()
    }

    /// Bytes fed so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Pick an encoding; `None` means the bytes look binary.
    pub fn verdict(&self) -> Option<Verdict> {
        if self.consumed == 0 {
            return None;
        }
        if self.ascii.is_ascii() {
            return Some(Verdict::Ascii);
        }
        if self.utf8.valid && self.utf8.multibyte_seen {
            return Some(Verdict::Utf8);
        }
        if self.ascii.is_code_page() {
            return Some(Verdict::CodePage);
        }
        if let Some(order) = self.utf32.verdict() {
            return Some(Verdict::Utf32(order));
        }
        if let Some(order) = self.utf16.verdict() {
            return Some(Verdict::Utf16(order));
        }
        if self.utf8.valid {
            return Some(Verdict::Utf8);
        }
        None
    }
}

/// Classify an in-memory buffer.
pub fn classify(bytes: &[u8]) -> Option<Verdict> {
    let mut classifier = EncodingClassifier::new();
    classifier.feed(bytes);
    classifier.verdict()
}

/// Classify a stream from byte 0 in `options.chunk_size` chunks, stopping at
/// `options.scan_limit` or once every hypothesis has failed.
pub fn classify_stream(
    stream: &mut dyn ReadSeek,
    options: &DetectorOptions,
) -> Result<Option<Verdict>> {
    options.validate()?;
    stream.seek(SeekFrom::Start(0))?;
    let mut reader = EndianReader::new(stream);
    let mut classifier = EncodingClassifier::new();
    let mut chunk = vec![0u8; options.chunk_size];

    loop {
        let want = match options.scan_limit {
            Some(limit) => {
                let left = limit.saturating_sub(classifier.consumed());
                if left == 0 {
                    break;
                }
                chunk.len().min(usize::try_from(left).unwrap_or(usize::MAX))
            }
            None => chunk.len(),
        };
        let read = reader.read_up_to(&mut chunk[..want])?;
        if read == 0 {
            break;
        }
        classifier.feed(&chunk[..read]);
        if !classifier.is_alive() {
            debug!(consumed = classifier.consumed(), "every text hypothesis failed");
            break;
        }
        if read < want {
            break;
        }
    }

    Ok(classifier.verdict())
}

/// Text detector backed by [`classify_stream`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTextDetector;

impl TextDetector for HeuristicTextDetector {
    fn name(&self) -> &'static str {
        "Heuristic"
    }

    fn read_format(
        &self,
        stream: &mut dyn ReadSeek,
        options: &DetectorOptions,
    ) -> Result<Option<TextSummary>> {
        let verdict = classify_stream(stream, options)?;
        if let Some(v) = verdict {
            debug!(verdict = ?v, encoding = v.encoding().name, "text classified");
        }
        Ok(verdict.map(|v| v.encoding().summary(false)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn utf16(text: &str, order: Endianness) -> Vec<u8> {
        text.encode_utf16()
            .flat_map(|unit| match order {
                Endianness::Little => unit.to_le_bytes(),
                Endianness::Big => unit.to_be_bytes(),
            })
            .collect()
    }

    fn utf32(text: &str, order: Endianness) -> Vec<u8> {
        text.chars()
            .flat_map(|c| match order {
                Endianness::Little => u32::from(c).to_le_bytes(),
                Endianness::Big => u32::from(c).to_be_bytes(),
            })
            .collect()
    }

    fn classify_in_chunks(bytes: &[u8], size: usize) -> Option<Verdict> {
        let mut classifier = EncodingClassifier::new();
        for chunk in bytes.chunks(size.max(1)) {
            classifier.feed(chunk);
        }
        classifier.verdict()
    }

    #[test]
    fn test_ascii() {
        assert_eq!(classify(b"Hello, world!\r\n\tindented"), Some(Verdict::Ascii));
        assert_eq!(Verdict::Ascii.encoding().name, "utf-8");
    }

    #[test]
    fn test_utf8_multibyte() {
        assert_eq!(classify("naïve café".as_bytes()), Some(Verdict::Utf8));
        assert_eq!(classify("日本語のテキスト".as_bytes()), Some(Verdict::Utf8));
    }

    #[test]
    fn test_code_page() {
        // "café" in windows-1252
        assert_eq!(classify(b"caf\xE9 au lait"), Some(Verdict::CodePage));
        assert_eq!(Verdict::CodePage.encoding().code_page, Some(1252));
    }

    #[test]
    fn test_utf16_latin() {
        let text = "Plain Latin text, with a résumé.";
        assert_eq!(
            classify(&utf16(text, Endianness::Little)),
            Some(Verdict::Utf16(Endianness::Little))
        );
        assert_eq!(
            classify(&utf16(text, Endianness::Big)),
            Some(Verdict::Utf16(Endianness::Big))
        );
    }

    #[test]
    fn test_utf16_surrogates_pick_order() {
        let text = "smile \u{1F600} please";
        assert_eq!(
            classify(&utf16(text, Endianness::Little)),
            Some(Verdict::Utf16(Endianness::Little))
        );
        assert_eq!(
            classify(&utf16(text, Endianness::Big)),
            Some(Verdict::Utf16(Endianness::Big))
        );
    }

    #[test]
    fn test_utf16_broken_surrogate_invalidates_order() {
        // high surrogate followed by 'A' in little-endian
        let bytes = [0x3D, 0xD8, 0x41, 0x00, 0x42, 0x00];
        let mut checker = Utf16Checker::default();
        for b in bytes {
            checker.feed(b);
        }
        assert!(!checker.little.valid);
        assert!(checker.big.valid);
    }

    #[test]
    fn test_utf16_zero_unit_kills_both_orders() {
        let mut checker = Utf16Checker::default();
        for b in [0x41, 0x00, 0x00, 0x00] {
            checker.feed(b);
        }
        assert!(!checker.is_alive());
    }

    #[test]
    fn test_utf32() {
        let text = "abc";
        assert_eq!(
            classify(&utf32(text, Endianness::Little)),
            Some(Verdict::Utf32(Endianness::Little))
        );
        assert_eq!(
            classify(&utf32(text, Endianness::Big)),
            Some(Verdict::Utf32(Endianness::Big))
        );
    }

    #[test]
    fn test_binary() {
        let bytes: Vec<u8> = (0..=255u8).cycle().take(1024).collect();
        assert_eq!(classify(&bytes), None);
        assert_eq!(classify(&[]), None);
    }

    #[test]
    fn test_early_stop() {
        let mut classifier = EncodingClassifier::new();
        classifier.feed(&[0x00, 0x00, 0x00, 0x00, 0xFF, 0x01]);
        assert!(!classifier.is_alive());
    }

    #[test]
    fn test_stream_respects_scan_limit() {
        // valid ASCII prefix, binary beyond the limit
        let mut data = vec![b'a'; 4096];
        data.extend_from_slice(&[0u8; 64]);
        let mut options = DetectorOptions::new();
        options.scan_limit = Some(4096);
        let verdict = classify_stream(&mut Cursor::new(&data), &options).unwrap();
        assert_eq!(verdict, Some(Verdict::Ascii));

        options.scan_limit = None;
        let verdict = classify_stream(&mut Cursor::new(&data), &options).unwrap();
        assert_ne!(verdict, Some(Verdict::Ascii));
    }

    #[test]
    fn test_stream_rejects_bad_chunk_size() {
        let mut options = DetectorOptions::new();
        options.chunk_size = 6;
        assert!(classify_stream(&mut Cursor::new(b"abc"), &options).is_err());
    }

    #[test]
    fn test_detector_summary() {
        let summary = HeuristicTextDetector
            .read_format(&mut Cursor::new(b"Hello"), &DetectorOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(summary.encoding_name, "utf-8");
        assert!(!summary.has_bom);
    }

    proptest! {
        #[test]
        fn prop_printable_ascii_is_ascii(text in "[ -~\t\r\n]{1,512}") {
            prop_assert_eq!(classify(text.as_bytes()), Some(Verdict::Ascii));
        }

        #[test]
        fn prop_utf8_independent_of_chunking(
            prefix in "[a-z ]{0,64}",
            body in "\\PC{0,64}",
            wide in "[éü€中\u{1F600}]",
        ) {
            let text = format!("{}{}{}", prefix, wide, body).replace('\0', "");
            let bytes = text.as_bytes();
            let whole = classify(bytes);
            prop_assert_eq!(whole, Some(Verdict::Utf8));
            for size in [1, 2, 4096, bytes.len()] {
                prop_assert_eq!(classify_in_chunks(bytes, size), whole);
            }
        }

        #[test]
        fn prop_any_bytes_independent_of_chunking(
            bytes in proptest::collection::vec(any::<u8>(), 0..256),
            size in 1usize..17,
        ) {
            prop_assert_eq!(classify_in_chunks(&bytes, size), classify(&bytes));
        }
    }
}

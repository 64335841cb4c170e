//! Registry of detectable text encodings.
//!
//! Every encoding the text detectors can report is a static entry here. An
//! entry without a code page is only ever reported from its byte-order mark.
//! Pure 7-bit text is reported as UTF-8, of which it is a subset.

use encoding_rs::Encoding;

use crate::signature::{matches, Signature};
use crate::types::TextSummary;

/// A text encoding the detectors can report.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct DetectableEncoding {
    /// Short name, e.g. `utf-16LE`.
    pub name: &'static str,
    /// Display name, e.g. `Unicode (Big-Endian)`.
    pub full_name: &'static str,
    /// Windows code-page identifier.
    pub code_page: Option<u32>,
    /// Byte-order marks; empty when the encoding defines none.
    pub boms: &'static [Signature],
}

impl DetectableEncoding {
    /// Summary for a stream detected as this encoding.
    pub fn summary(&self, has_bom: bool) -> TextSummary {
        TextSummary {
            encoding_name: self.name.to_string(),
            encoding_full_name: self.full_name.to_string(),
            code_page: self.code_page,
            has_bom,
        }
    }

    /// Length of the byte-order mark that starts `bytes`, or 0.
    pub fn bom_len(&self, bytes: &[u8]) -> usize {
        self.boms
            .iter()
            .find(|bom| matches(bytes, bom))
            .map_or(0, Signature::required_len)
    }

    /// Whether the streaming classifier may report this encoding.
    pub fn is_heuristic(&self) -> bool {
        self.code_page.is_some()
    }

    /// The `encoding_rs` decoder for this encoding, where one exists.
    ///
    /// UTF-32 has no WHATWG decoder.
    pub fn decoder(&self) -> Option<&'static Encoding> {
        match self.code_page {
            Some(65001) => Some(encoding_rs::UTF_8),
            Some(1252) => Some(encoding_rs::WINDOWS_1252),
            Some(1200) => Some(encoding_rs::UTF_16LE),
            Some(1201) => Some(encoding_rs::UTF_16BE),
            _ if self.name == GB18030.name => Some(encoding_rs::GB18030),
            _ => None,
        }
    }
}

pub static WINDOWS_1252: DetectableEncoding = DetectableEncoding {
    name: "windows-1252",
    full_name: "Western European (Windows)",
    code_page: Some(1252),
    boms: &[],
};

pub static UTF_8: DetectableEncoding = DetectableEncoding {
    name: "utf-8",
    full_name: "Unicode (UTF-8)",
    code_page: Some(65001),
    boms: &[Signature::new(&[0xEF, 0xBB, 0xBF])],
};

pub static UTF_16LE: DetectableEncoding = DetectableEncoding {
    name: "utf-16LE",
    full_name: "Unicode",
    code_page: Some(1200),
    boms: &[Signature::new(&[0xFF, 0xFE])],
};

pub static UTF_16BE: DetectableEncoding = DetectableEncoding {
    name: "utf-16BE",
    full_name: "Unicode (Big-Endian)",
    code_page: Some(1201),
    boms: &[Signature::new(&[0xFE, 0xFF])],
};

pub static UTF_32LE: DetectableEncoding = DetectableEncoding {
    name: "utf-32LE",
    full_name: "Unicode (UTF-32)",
    code_page: Some(12000),
    boms: &[Signature::new(&[0xFF, 0xFE, 0x00, 0x00])],
};

pub static UTF_32BE: DetectableEncoding = DetectableEncoding {
    name: "utf-32BE",
    full_name: "Unicode (UTF-32 Big-Endian)",
    code_page: Some(12001),
    boms: &[Signature::new(&[0x00, 0x00, 0xFE, 0xFF])],
};

pub static UTF_7: DetectableEncoding = DetectableEncoding {
    name: "utf-7",
    full_name: "Unicode (UTF-7)",
    code_page: None,
    // "+/v" followed by one of "8", "9", "+" or "/"
    boms: &[
        Signature::new(&[0x2B, 0x2F, 0x76, 0x38]),
        Signature::new(&[0x2B, 0x2F, 0x76, 0x39]),
        Signature::new(&[0x2B, 0x2F, 0x76, 0x2B]),
        Signature::new(&[0x2B, 0x2F, 0x76, 0x2F]),
    ],
};

pub static UTF_1: DetectableEncoding = DetectableEncoding {
    name: "utf-1",
    full_name: "Unicode (UTF-1)",
    code_page: None,
    boms: &[Signature::new(&[0xF7, 0x64, 0x4C])],
};

pub static SCSU: DetectableEncoding = DetectableEncoding {
    name: "scsu",
    full_name: "Standard Compression Scheme for Unicode",
    code_page: None,
    boms: &[Signature::new(&[0x0E, 0xFE, 0xFF])],
};

pub static BOCU_1: DetectableEncoding = DetectableEncoding {
    name: "bocu-1",
    full_name: "Binary Ordered Compression for Unicode",
    code_page: None,
    boms: &[Signature::new(&[0xFB, 0xEE, 0x28])],
};

pub static UTF_EBCDIC: DetectableEncoding = DetectableEncoding {
    name: "utf-ebcdic",
    full_name: "Unicode (UTF-EBCDIC)",
    code_page: None,
    boms: &[Signature::new(&[0xDD, 0x73, 0x66, 0x73])],
};

pub static GB18030: DetectableEncoding = DetectableEncoding {
    name: "gb18030",
    full_name: "Chinese Simplified (GB18030)",
    code_page: None,
    boms: &[Signature::new(&[0x84, 0x31, 0x95, 0x33])],
};

/// Every registered encoding.
pub static ALL: &[&DetectableEncoding] = &[
    &WINDOWS_1252,
    &UTF_8,
    &UTF_16LE,
    &UTF_16BE,
    &UTF_32LE,
    &UTF_32BE,
    &UTF_7,
    &UTF_1,
    &SCSU,
    &BOCU_1,
    &UTF_EBCDIC,
    &GB18030,
];

/// Look up an encoding by its short name, ignoring ASCII case.
pub fn by_name(name: &str) -> Option<&'static DetectableEncoding> {
    ALL.iter()
        .copied()
        .find(|enc| enc.name.eq_ignore_ascii_case(name))
}

/// Encodings that define a byte-order mark.
pub fn with_bom() -> impl Iterator<Item = &'static DetectableEncoding> {
    ALL.iter().copied().filter(|enc| !enc.boms.is_empty())
}

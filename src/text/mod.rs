//! Text encoding detection.
//!
//! Text detectors run only when no binary detector claimed the stream. The
//! byte-order-mark table is tried first, then the streaming classifier; a
//! detected encoding may then be handed to layered detectors such as XML.

pub mod bom;
pub mod classifier;
pub mod encoding;
pub mod xml;

pub use bom::BomTextDetector;
pub use classifier::{EncodingClassifier, HeuristicTextDetector};
pub use encoding::DetectableEncoding;
pub use xml::XmlDetector;

use crate::error::Result;
use crate::formats::ReadSeek;
use crate::types::{DetectorOptions, FormatSummary, TextSummary};

/// Contract for detectors that infer a text encoding.
pub trait TextDetector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Inspect the stream from byte 0, up to `options.scan_limit`.
    ///
    /// `Ok(None)` means the stream is not text this detector recognizes.
    fn read_format(
        &self,
        stream: &mut dyn ReadSeek,
        options: &DetectorOptions,
    ) -> Result<Option<TextSummary>>;
}

/// Contract for formats that live on top of an already-detected encoding.
pub trait TextLayeredDetector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Re-read the stream under `text`'s encoding.
    ///
    /// `Ok(None)` leaves the plain text summary standing.
    fn read_format(
        &self,
        stream: &mut dyn ReadSeek,
        text: &TextSummary,
        options: &DetectorOptions,
    ) -> Result<Option<FormatSummary>>;
}

/// The built-in text detectors in probing order.
pub fn default_text_detectors() -> Vec<Box<dyn TextDetector>> {
    vec![
        Box::new(BomTextDetector::new()),
        Box::new(HeuristicTextDetector),
    ]
}

/// The built-in text-layered detectors.
pub fn default_layered_detectors() -> Vec<Box<dyn TextLayeredDetector>> {
    vec![Box::new(XmlDetector)]
}

//! Per-file detection pipeline.
//!
//! A [`Registry`] holds the ordered detector lists and is built once, then
//! shared read-only. For one stream it tries, in order: every binary
//! detector whose signature matches, the text detectors, and the
//! text-layered detectors over whatever text summary was produced.

use std::fs::File;
use std::io::{BufReader, SeekFrom};
use std::path::Path;

use tracing::debug;

use crate::error::{DetectorError, Result};
use crate::formats::{self, BinaryDetector, ReadSeek};
use crate::reader::EndianReader;
use crate::text::{self, TextDetector, TextLayeredDetector};
use crate::types::{DetectorOptions, FormatSummary, RecognizedFile, TextSummary};

/// Ordered detector lists.
pub struct Registry {
    binary: Vec<Box<dyn BinaryDetector>>,
    text: Vec<Box<dyn TextDetector>>,
    layered: Vec<Box<dyn TextLayeredDetector>>,
}

impl Default for Registry {
    /// ELF, PE and Mach-O; BOM table then the streaming classifier; XML.
    fn default() -> Self {
        Self {
            binary: formats::default_binary_detectors(),
            text: text::default_text_detectors(),
            layered: text::default_layered_detectors(),
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("binary", &self.binary.iter().map(|d| d.name()).collect::<Vec<_>>())
            .field("text", &self.text.iter().map(|d| d.name()).collect::<Vec<_>>())
            .field("layered", &self.layered.iter().map(|d| d.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    /// An empty registry; every stream comes out `Unknown`.
    pub fn new() -> Self {
        Self {
            binary: Vec::new(),
            text: Vec::new(),
            layered: Vec::new(),
        }
    }

    pub fn with_binary(mut self, detector: impl BinaryDetector + 'static) -> Self {
        self.binary.push(Box::new(detector));
        self
    }

    pub fn with_text(mut self, detector: impl TextDetector + 'static) -> Self {
        self.text.push(Box::new(detector));
        self
    }

    pub fn with_layered(mut self, detector: impl TextLayeredDetector + 'static) -> Self {
        self.layered.push(Box::new(detector));
        self
    }

    pub fn binary_detectors(&self) -> &[Box<dyn BinaryDetector>] {
        &self.binary
    }

    pub fn text_detectors(&self) -> &[Box<dyn TextDetector>] {
        &self.text
    }

    pub fn layered_detectors(&self) -> &[Box<dyn TextLayeredDetector>] {
        &self.layered
    }

    /// Leading bytes needed to test every binary signature.
    pub fn signature_len(&self) -> usize {
        self.binary
            .iter()
            .map(|d| d.bytes_to_read_signature())
            .max()
            .unwrap_or(0)
    }

    /// Identify the format of `stream`.
    ///
    /// A binary detector whose signature matched but whose parse failed does
    /// not stop later binary detectors. If none succeeds, the first such
    /// fault is returned rather than falling back to text detection.
    pub fn detect(
        &self,
        stream: &mut dyn ReadSeek,
        options: &DetectorOptions,
    ) -> Result<FormatSummary> {
        options.validate()?;

        let len = stream.seek(SeekFrom::End(0))?;
        if len == 0 {
            debug!("empty stream");
            return Ok(FormatSummary::Unknown);
        }

        stream.seek(SeekFrom::Start(0))?;
        let mut head = vec![0u8; self.signature_len()];
        let filled = EndianReader::new(&mut *stream).read_up_to(&mut head)?;
        head.truncate(filled);

        let mut first_fault: Option<DetectorError> = None;
        for detector in self.binary.iter().filter(|d| d.has_signature()) {
            if !detector.check_signature(&head) {
                continue;
            }
            debug!(detector = detector.name(), "signature matched");
            stream.seek(SeekFrom::Start(0))?;
            match detector.read_format(stream, options) {
                Ok(summary) => return Ok(summary),
                Err(e) => {
                    debug!(detector = detector.name(), error = %e, "structured parse failed");
                    if first_fault.is_none() {
                        first_fault = Some(e);
                    }
                }
            }
        }
        if let Some(fault) = first_fault {
            return Err(fault);
        }

        let Some(text) = self.detect_text(stream, options)? else {
            return Ok(FormatSummary::Unknown);
        };
        Ok(self.layer(stream, text, options))
    }

    fn detect_text(
        &self,
        stream: &mut dyn ReadSeek,
        options: &DetectorOptions,
    ) -> Result<Option<TextSummary>> {
        let mut first_fault: Option<DetectorError> = None;
        for detector in &self.text {
            stream.seek(SeekFrom::Start(0))?;
            match detector.read_format(stream, options) {
                Ok(Some(summary)) => {
                    debug!(detector = detector.name(), encoding = %summary.encoding_name, "text detected");
                    return Ok(Some(summary));
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(detector = detector.name(), error = %e, "text detector failed");
                    if first_fault.is_none() {
                        first_fault = Some(e);
                    }
                }
            }
        }
        match first_fault {
            Some(fault) => Err(fault),
            None => Ok(None),
        }
    }

    /// Offer `text` to the layered detectors; the first upgrade wins.
    fn layer(
        &self,
        stream: &mut dyn ReadSeek,
        text: TextSummary,
        options: &DetectorOptions,
    ) -> FormatSummary {
        for detector in &self.layered {
            let attempt = stream
                .seek(SeekFrom::Start(0))
                .map_err(DetectorError::from)
                .and_then(|_| detector.read_format(stream, &text, options));
            match attempt {
                Ok(Some(summary)) => {
                    debug!(detector = detector.name(), "text summary upgraded");
                    return summary;
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(detector = detector.name(), error = %e, "layered detector failed");
                }
            }
        }
        FormatSummary::Text(text)
    }

    /// Identify the file at `path`.
    pub fn detect_file(&self, path: &Path, options: &DetectorOptions) -> Result<FormatSummary> {
        let mut stream = BufReader::new(File::open(path)?);
        self.detect(&mut stream, options)
    }

    /// Identify the file at `path` and pair the result with its path.
    pub fn recognize(&self, path: &Path, options: &DetectorOptions) -> Result<RecognizedFile> {
        let summary = self.detect_file(path, options)?;
        Ok(RecognizedFile::new(path, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::elf::ElfDetector;
    use crate::signature::Signature;
    use crate::testdata::{build_elf, build_fat, build_macho, build_pe};
    use crate::types::Endianness;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn detect(bytes: &[u8]) -> Result<FormatSummary> {
        Registry::default().detect(&mut Cursor::new(bytes), &DetectorOptions::default())
    }

    /// Claims every stream and counts how often it was asked to parse.
    struct Counting {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    const ANY: &[Signature] = &[Signature::new(&[])];

    impl BinaryDetector for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn signatures(&self) -> &[Signature] {
            ANY
        }

        fn read_format(
            &self,
            _stream: &mut dyn ReadSeek,
            _options: &DetectorOptions,
        ) -> Result<FormatSummary> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(DetectorError::ElfParseError {
                    message: "synthetic".into(),
                })
            } else {
                Ok(FormatSummary::Unknown)
            }
        }
    }

    #[test]
    fn test_binary_formats() {
        let elf = build_elf(2, 1, 0x3E, &[(3, b"/lib64/ld-linux-x86-64.so.2\0")]);
        match detect(&elf).unwrap() {
            FormatSummary::Elf(s) => assert_eq!(s.interpreter, "/lib64/ld-linux-x86-64.so.2"),
            other => panic!("expected ELF, got {:?}", other),
        }

        let pe = build_pe(0x8664, Some(0x20B), None);
        assert_eq!(detect(&pe).unwrap().kind(), "PE");

        let le = build_macho(32, false, 7, &[]);
        let be = build_macho(32, true, 18, &[]);
        match detect(&build_fat(&[le, be], false)).unwrap() {
            FormatSummary::MachO(s) => {
                assert!(s.is_fat);
                assert_eq!(s.inner_apps[0].endianness, Endianness::Little);
                assert_eq!(s.inner_apps[1].endianness, Endianness::Big);
            }
            other => panic!("expected Mach-O, got {:?}", other),
        }
    }

    #[test]
    fn test_text_and_xml() {
        let summary = detect(b"Hello").unwrap();
        let text = summary.as_text().unwrap();
        assert_eq!(text.encoding_name, "utf-8");
        assert!(!text.has_bom);
        assert_eq!(summary.kind(), "Text");

        let summary = detect(&[0xFF, 0xFE, b'h', 0, b'i', 0]).unwrap();
        assert_eq!(summary.as_text().unwrap().encoding_name, "utf-16LE");
        assert!(summary.as_text().unwrap().has_bom);

        let summary = detect(b"+/vendor/lib is the path\n").unwrap();
        assert_eq!(summary.as_text().unwrap().encoding_name, "utf-8");
        assert!(!summary.as_text().unwrap().has_bom);

        let summary = detect(b"<?xml version=\"1.0\"?>\n<doc/>").unwrap();
        assert_eq!(summary.kind(), "XML");
    }

    #[test]
    fn test_binary_garbage_is_unknown() {
        let bytes: Vec<u8> = (0..=255u8).collect();
        assert!(detect(&bytes).unwrap().is_unknown());
    }

    #[test]
    fn test_empty_stream_invokes_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = Registry::new().with_binary(Counting {
            calls: Arc::clone(&calls),
            fail: false,
        });
        let summary = registry
            .detect(&mut Cursor::new(Vec::new()), &DetectorOptions::default())
            .unwrap();
        assert!(summary.is_unknown());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_malformed_binary_is_an_error() {
        // ELF signature with an invalid class byte
        let mut elf = build_elf(2, 1, 0x3E, &[]);
        elf[4] = 9;
        let err = detect(&elf).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_fault_does_not_stop_later_detectors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut elf = build_elf(2, 1, 0x3E, &[]);
        elf[4] = 9;
        let registry = Registry::new()
            .with_binary(ElfDetector)
            .with_binary(Counting {
                calls: Arc::clone(&calls),
                fail: false,
            });
        let summary = registry
            .detect(&mut Cursor::new(elf), &DetectorOptions::default())
            .unwrap();
        assert!(summary.is_unknown());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_first_fault_wins() {
        let registry = Registry::new()
            .with_binary(Counting {
                calls: Arc::new(AtomicUsize::new(0)),
                fail: true,
            })
            .with_binary(ElfDetector);
        let mut elf = build_elf(2, 1, 0x3E, &[]);
        elf[4] = 9;
        let err = registry
            .detect(&mut Cursor::new(elf), &DetectorOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("synthetic"));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let mut options = DetectorOptions::new();
        options.chunk_size = 0;
        let err = Registry::default()
            .detect(&mut Cursor::new(b"abc".to_vec()), &options)
            .unwrap_err();
        assert!(matches!(err, DetectorError::ConfigError { .. }));
    }

    #[test]
    fn test_registry_debug_lists_names() {
        let shown = format!("{:?}", Registry::default());
        assert!(shown.contains("Mach-O"));
        assert!(shown.contains("Heuristic"));
        assert!(shown.contains("XML"));
    }
}

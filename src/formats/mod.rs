//! Executable container format parsers.
//!
//! This module provides signature-probed structured parsers for:
//! - ELF (Executable and Linkable Format)
//! - PE/COFF (Portable Executable)
//! - Mach-O (Mach Object), including fat/universal containers

pub mod elf;
pub mod macho;
pub mod pe;

use std::io::{Read, Seek};

use crate::error::Result;
use crate::signature::{match_any, Signature};
use crate::types::{DetectorOptions, FormatSummary};

/// Magic byte signatures for format detection.
pub mod magic {
    /// ELF magic bytes: 0x7F 'E' 'L' 'F'
    pub const ELF: [u8; 4] = [0x7F, b'E', b'L', b'F'];

    /// PE/COFF DOS stub magic: 'M' 'Z'
    pub const MZ: [u8; 2] = [b'M', b'Z'];

    /// PE signature: 'P' 'E' '\0' '\0'
    pub const PE: [u8; 4] = [b'P', b'E', 0, 0];

    /// Mach-O 32-bit big-endian
    pub const MACHO_32_BE: [u8; 4] = [0xFE, 0xED, 0xFA, 0xCE];

    /// Mach-O 32-bit little-endian
    pub const MACHO_32_LE: [u8; 4] = [0xCE, 0xFA, 0xED, 0xFE];

    /// Mach-O 64-bit big-endian
    pub const MACHO_64_BE: [u8; 4] = [0xFE, 0xED, 0xFA, 0xCF];

    /// Mach-O 64-bit little-endian
    pub const MACHO_64_LE: [u8; 4] = [0xCF, 0xFA, 0xED, 0xFE];

    /// Mach-O fat/universal, 32-bit descriptors
    pub const MACHO_FAT: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

    /// Mach-O fat/universal, 64-bit descriptors
    pub const MACHO_FAT_64: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBF];
}

/// A seekable byte stream; object-safe stand-in for `Read + Seek`.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// Contract for signature-probed binary format parsers.
pub trait BinaryDetector: Send + Sync {
    /// Short display name of the format.
    fn name(&self) -> &'static str;

    /// Signatures that confirm the format, any one of which suffices.
    fn signatures(&self) -> &[Signature];

    fn has_signature(&self) -> bool {
        !self.signatures().is_empty()
    }

    /// Leading bytes required by [`BinaryDetector::check_signature`].
    fn bytes_to_read_signature(&self) -> usize {
        self.signatures()
            .iter()
            .map(Signature::required_len)
            .max()
            .unwrap_or(0)
    }

    fn check_signature(&self, bytes: &[u8]) -> bool {
        match_any(bytes, self.signatures()).is_some()
    }

    /// Parse the stream from byte 0.
    ///
    /// Only called after the signature matched; a structural fault is an
    /// error, never a silent "not this format".
    fn read_format(&self, stream: &mut dyn ReadSeek, options: &DetectorOptions)
        -> Result<FormatSummary>;
}

/// The built-in binary detectors in probing order.
pub fn default_binary_detectors() -> Vec<Box<dyn BinaryDetector>> {
    vec![
        Box::new(elf::ElfDetector),
        Box::new(pe::PeDetector),
        Box::new(macho::MachODetector),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_lengths() {
        let detectors = default_binary_detectors();
        let names: Vec<_> = detectors.iter().map(|d| d.name()).collect();
        assert_eq!(names, ["ELF", "PE", "Mach-O"]);
        for detector in &detectors {
            assert!(detector.has_signature());
            assert!(detector.bytes_to_read_signature() >= 2);
        }
    }

    #[test]
    fn test_check_signature() {
        let detectors = default_binary_detectors();
        let elf = [0x7F, b'E', b'L', b'F', 2, 1, 0, 0];
        let hits: Vec<_> = detectors
            .iter()
            .filter(|d| d.check_signature(&elf))
            .map(|d| d.name())
            .collect();
        assert_eq!(hits, ["ELF"]);

        let fat = [0xCA, 0xFE, 0xBA, 0xBE];
        assert!(detectors[2].check_signature(&fat));
        assert!(!detectors[0].check_signature(&fat[..2]));
    }
}

//! Format Identifier - executable container and text encoding detection
//!
//! This library inspects the leading bytes and internal structure of a file
//! and reports what kind of file it is:
//!
//! - **Executable containers**: ELF, PE/COFF and Mach-O (including fat /
//!   universal binaries), with architecture, bitness, endianness and a few
//!   format-specific facts.
//! - **Text**: byte-order-mark lookup, then a streaming heuristic that
//!   separates ASCII, UTF-8, UTF-16, UTF-32 and single-byte code pages.
//! - **XML**: layered over a detected text encoding.
//!
//! Whole directory trees can be scanned in parallel with a [`Scanner`].
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use format_identifier::{identify_bytes, identify_file};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let summary = identify_file("/bin/ls")?;
//!     println!("{}", summary);
//!
//!     let summary = identify_bytes(b"Hello")?;
//!     assert_eq!(summary.kind(), "Text");
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::similar_names)]

pub mod error;
pub mod formats;
pub mod formatter;
pub mod pipeline;
pub mod reader;
pub mod scanner;
pub mod signature;
pub mod text;
pub mod types;

#[cfg(test)]
mod testdata;

pub use error::{DetectorError, Result};
pub use pipeline::Registry;
pub use scanner::{scan_paths, CancellationToken, ScanOptions, ScanReport, Scanner};
pub use types::{
    Architecture, DetectorOptions, ElfFileType, ElfSummary, Endianness, FormatSummary,
    MachOFileType, MachOSummary, PeSummary, RecognizedFile, TextSummary, XmlSummary,
};

use std::io::Cursor;
use std::path::Path;

/// Identify the file at `path` with the default detectors and options.
///
/// # Example
///
/// ```rust,no_run
/// use format_identifier::identify_file;
///
/// let summary = identify_file("/bin/ls")?;
/// println!("Format: {}", summary.kind());
/// # Ok::<(), format_identifier::DetectorError>(())
/// ```
pub fn identify_file<P: AsRef<Path>>(path: P) -> Result<FormatSummary> {
    Registry::default().detect_file(path.as_ref(), &DetectorOptions::new())
}

/// Identify an in-memory buffer with the default detectors and options.
///
/// ```rust
/// use format_identifier::identify_bytes;
///
/// let summary = identify_bytes(&[0xFF, 0xFE, b'h', 0, b'i', 0])?;
/// assert_eq!(summary.as_text().unwrap().encoding_name, "utf-16LE");
/// # Ok::<(), format_identifier::DetectorError>(())
/// ```
pub fn identify_bytes(data: &[u8]) -> Result<FormatSummary> {
    identify_bytes_with_options(data, &DetectorOptions::new())
}

/// Identify an in-memory buffer with custom options.
pub fn identify_bytes_with_options(
    data: &[u8],
    options: &DetectorOptions,
) -> Result<FormatSummary> {
    Registry::default().detect(&mut Cursor::new(data), options)
}

/// Get version information for this library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

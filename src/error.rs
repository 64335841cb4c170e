//! Error types for format detection.
//!
//! Structural faults raised by the binary parsers are kept apart from plain
//! I/O failures so the pipeline and the scanner can decide which ones abort a
//! single file and which ones only skip an entry.

use thiserror::Error;

/// Primary error type for format detection.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is too small to contain the structure being read.
    #[error("File too small: expected at least {expected} bytes, got {actual}")]
    FileTooSmall { expected: u64, actual: u64 },

    /// A signature matched during probing but the structured read disagrees.
    #[error("Invalid {format} magic: expected {expected}, got {actual}")]
    InvalidMagic {
        format: &'static str,
        expected: String,
        actual: String,
    },

    /// A structured read ran past the end of the stream.
    #[error("Truncated data at offset {offset}: expected {expected} more bytes")]
    TruncatedData { offset: u64, expected: u64 },

    /// Error parsing ELF format.
    #[error("ELF parse error: {message}")]
    ElfParseError { message: String },

    /// Error parsing PE/COFF format.
    #[error("PE/COFF parse error: {message}")]
    PeParseError { message: String },

    /// Error parsing Mach-O format.
    #[error("Mach-O parse error: {message}")]
    MachOParseError { message: String },

    /// Mach-O load commands consumed more bytes than the header declares.
    #[error("Mach-O load commands overrun: consumed {consumed} bytes of {declared} declared")]
    LoadCommandOverrun { consumed: u64, declared: u32 },

    /// Nested fat containers exceeded the configured depth.
    #[error("Fat container nesting exceeds depth limit {limit}")]
    RecursionLimit { limit: usize },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

impl DetectorError {
    /// Whether this is a malformed-structure fault raised after a signature
    /// was confirmed.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, DetectorError::Io(_) | DetectorError::ConfigError { .. })
    }

    /// Whether this is a permission failure on the underlying path.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, DetectorError::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied)
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        DetectorError::ConfigError {
            message: message.into(),
        }
    }
}

/// Result type alias for detection operations.
pub type Result<T> = std::result::Result<T, DetectorError>;

/// Extension trait for adding format context to errors.
pub trait ResultExt<T> {
    /// Wrap an I/O or truncation error as an ELF parse error.
    fn elf_context(self, msg: &str) -> Result<T>;
    /// Wrap an I/O or truncation error as a PE parse error.
    fn pe_context(self, msg: &str) -> Result<T>;
    /// Wrap an I/O or truncation error as a Mach-O parse error.
    fn macho_context(self, msg: &str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn elf_context(self, msg: &str) -> Result<T> {
        self.map_err(|e| match e {
            DetectorError::Io(_) | DetectorError::TruncatedData { .. } => {
                DetectorError::ElfParseError {
                    message: format!("{msg}: {e}"),
                }
            }
            other => other,
        })
    }

    fn pe_context(self, msg: &str) -> Result<T> {
        self.map_err(|e| match e {
            DetectorError::Io(_) | DetectorError::TruncatedData { .. } => {
                DetectorError::PeParseError {
                    message: format!("{msg}: {e}"),
                }
            }
            other => other,
        })
    }

    fn macho_context(self, msg: &str) -> Result<T> {
        self.map_err(|e| match e {
            DetectorError::Io(_) | DetectorError::TruncatedData { .. } => {
                DetectorError::MachOParseError {
                    message: format!("{msg}: {e}"),
                }
            }
            other => other,
        })
    }
}

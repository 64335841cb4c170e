//! Core types for format detection.
//!
//! This module defines the closed set of format summaries produced by the
//! detectors, the architecture and byte-order identifiers they carry, and
//! the options that tune a detection run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{DetectorError, Result};

/// Processor architecture named by an executable header.
///
/// Covers the machines the ELF, PE and Mach-O tables map to a name; any
/// other raw machine value is kept in `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Architecture {
    // x86 family
    X86,
    X86_64,

    // ARM family
    Arm,
    AArch64,

    // RISC-V family
    RiscV32,
    RiscV64,
    RiscV128,

    // MIPS family
    Mips,
    Mips64,

    // PowerPC family
    Ppc,
    Ppc64,

    // IBM mainframe
    S390,
    S390x,

    // SPARC family
    Sparc,
    Sparc64,

    M68k,
    Sh,
    Ia64,
    Alpha,
    Parisc,

    // LoongArch
    LoongArch32,
    LoongArch64,

    Hexagon,
    Xtensa,
    Vax,
    I860,
    Avr,
    Msp430,
    Bpf,
    /// EFI Byte Code
    Ebc,

    // Unknown with numeric ID
    Unknown(u32),
}

impl Architecture {
    /// Returns a human-readable name for this architecture.
    pub fn name(&self) -> &'static str {
        match self {
            Architecture::X86 => "x86 (i386)",
            Architecture::X86_64 => "x86-64 (AMD64)",
            Architecture::Arm => "ARM (32-bit)",
            Architecture::AArch64 => "AArch64 (ARM64)",
            Architecture::RiscV32 => "RISC-V (32-bit)",
            Architecture::RiscV64 => "RISC-V (64-bit)",
            Architecture::RiscV128 => "RISC-V (128-bit)",
            Architecture::Mips => "MIPS (32-bit)",
            Architecture::Mips64 => "MIPS (64-bit)",
            Architecture::Ppc => "PowerPC (32-bit)",
            Architecture::Ppc64 => "PowerPC (64-bit)",
            Architecture::S390 => "IBM S/390",
            Architecture::S390x => "IBM z/Architecture",
            Architecture::Sparc => "SPARC (32-bit)",
            Architecture::Sparc64 => "SPARC (64-bit)",
            Architecture::M68k => "Motorola 68000",
            Architecture::Sh => "SuperH",
            Architecture::Ia64 => "Intel IA-64 (Itanium)",
            Architecture::Alpha => "DEC Alpha",
            Architecture::Parisc => "HP PA-RISC",
            Architecture::LoongArch32 => "LoongArch (32-bit)",
            Architecture::LoongArch64 => "LoongArch (64-bit)",
            Architecture::Hexagon => "Qualcomm Hexagon",
            Architecture::Xtensa => "Tensilica Xtensa",
            Architecture::Vax => "DEC VAX",
            Architecture::I860 => "Intel i860",
            Architecture::Avr => "Atmel AVR",
            Architecture::Msp430 => "TI MSP430",
            Architecture::Bpf => "Linux BPF",
            Architecture::Ebc => "EFI Byte Code",
            Architecture::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::Unknown(id) => write!(f, "unknown(0x{:04X})", id),
            other => write!(f, "{}", format!("{:?}", other).to_lowercase()),
        }
    }
}

/// Byte ordering (endianness).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    /// Little-endian byte order.
    #[default]
    Little,
    /// Big-endian byte order.
    Big,
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endianness::Little => write!(f, "little"),
            Endianness::Big => write!(f, "big"),
        }
    }
}

/// ELF object file type (`e_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElfFileType {
    None,
    Relocatable,
    Executable,
    SharedObject,
    Core,
    Other(u16),
}

impl From<u16> for ElfFileType {
    fn from(value: u16) -> Self {
        match value {
            0 => ElfFileType::None,
            1 => ElfFileType::Relocatable,
            2 => ElfFileType::Executable,
            3 => ElfFileType::SharedObject,
            4 => ElfFileType::Core,
            other => ElfFileType::Other(other),
        }
    }
}

impl fmt::Display for ElfFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElfFileType::None => write!(f, "none"),
            ElfFileType::Relocatable => write!(f, "relocatable"),
            ElfFileType::Executable => write!(f, "executable"),
            ElfFileType::SharedObject => write!(f, "shared object"),
            ElfFileType::Core => write!(f, "core"),
            ElfFileType::Other(v) => write!(f, "other(0x{:04X})", v),
        }
    }
}

/// Mach-O file type (`filetype` in the thin header).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachOFileType {
    Object,
    Execute,
    FixedVmLibrary,
    Core,
    Preload,
    Dylib,
    Dylinker,
    Bundle,
    DylibStub,
    Dsym,
    KextBundle,
    Other(u32),
}

impl From<u32> for MachOFileType {
    fn from(value: u32) -> Self {
        match value {
            0x1 => MachOFileType::Object,
            0x2 => MachOFileType::Execute,
            0x3 => MachOFileType::FixedVmLibrary,
            0x4 => MachOFileType::Core,
            0x5 => MachOFileType::Preload,
            0x6 => MachOFileType::Dylib,
            0x7 => MachOFileType::Dylinker,
            0x8 => MachOFileType::Bundle,
            0x9 => MachOFileType::DylibStub,
            0xA => MachOFileType::Dsym,
            0xB => MachOFileType::KextBundle,
            other => MachOFileType::Other(other),
        }
    }
}

impl fmt::Display for MachOFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachOFileType::Other(v) => write!(f, "other(0x{:X})", v),
            other => write!(f, "{}", format!("{:?}", other).to_lowercase()),
        }
    }
}

/// Summary of a PE/COFF image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeSummary {
    pub architecture: Architecture,
    pub bits: u8,
    pub endianness: Endianness,
    /// Data directory 14 (CLR runtime header) is populated.
    pub has_clr_header: bool,
}

/// Summary of an ELF image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElfSummary {
    pub architecture: Architecture,
    pub bits: u8,
    pub endianness: Endianness,
    pub file_type: ElfFileType,
    /// Program interpreter path, empty when there is no interpreter segment.
    pub interpreter: String,
}

/// Summary of a Mach-O image or fat container.
///
/// A fat container owns the summaries of its embedded images in file order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MachOSummary {
    pub bits: u8,
    pub endianness: Endianness,
    pub is_fat: bool,
    /// `None` for fat containers.
    pub architecture: Option<Architecture>,
    pub file_type: Option<MachOFileType>,
    pub has_code_signature: bool,
    pub inner_apps: Vec<MachOSummary>,
}

/// Summary of a text file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextSummary {
    pub encoding_name: String,
    pub encoding_full_name: String,
    pub code_page: Option<u32>,
    pub has_bom: bool,
}

/// Summary of an XML document, layered over its text encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct XmlSummary {
    pub text: TextSummary,
    /// `encoding` pseudo-attribute of the XML declaration, if any.
    pub xml_declaration_encoding: Option<String>,
}

/// The closed set of detection results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormatSummary {
    Pe(PeSummary),
    Elf(ElfSummary),
    MachO(MachOSummary),
    Text(TextSummary),
    Xml(XmlSummary),
    Unknown,
}

/// A single field value exposed for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Str(String),
    Number(u64),
    Bool(bool),
    Endian(Endianness),
    Arch(Architecture),
    Apps(Vec<MachOSummary>),
    Missing,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(s) => write!(f, "{}", s),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Endian(e) => write!(f, "{}", e),
            FieldValue::Arch(a) => write!(f, "{}", a),
            FieldValue::Apps(apps) => {
                write!(f, "[")?;
                for (i, app) in apps.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write_fields(f, &app.fields())?;
                }
                write!(f, "]")
            }
            FieldValue::Missing => write!(f, "-"),
        }
    }
}

fn write_fields(f: &mut fmt::Formatter<'_>, fields: &[(&'static str, FieldValue)]) -> fmt::Result {
    write!(f, "{{")?;
    for (i, (name, value)) in fields.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}: {}", name, value)?;
    }
    write!(f, "}}")
}

impl PeSummary {
    pub const FIELD_NAMES: &'static [&'static str] =
        &["architecture", "bits", "endianness", "has_clr_header"];

    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("architecture", FieldValue::Arch(self.architecture)),
            ("bits", FieldValue::Number(u64::from(self.bits))),
            ("endianness", FieldValue::Endian(self.endianness)),
            ("has_clr_header", FieldValue::Bool(self.has_clr_header)),
        ]
    }
}

impl ElfSummary {
    pub const FIELD_NAMES: &'static [&'static str] =
        &["architecture", "bits", "endianness", "file_type", "interpreter"];

    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("architecture", FieldValue::Arch(self.architecture)),
            ("bits", FieldValue::Number(u64::from(self.bits))),
            ("endianness", FieldValue::Endian(self.endianness)),
            ("file_type", FieldValue::Str(self.file_type.to_string())),
            ("interpreter", FieldValue::Str(self.interpreter.clone())),
        ]
    }
}

impl MachOSummary {
    pub const FIELD_NAMES: &'static [&'static str] = &[
        "bits",
        "endianness",
        "is_fat",
        "architecture",
        "file_type",
        "has_code_signature",
        "inner_apps",
    ];

    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("bits", FieldValue::Number(u64::from(self.bits))),
            ("endianness", FieldValue::Endian(self.endianness)),
            ("is_fat", FieldValue::Bool(self.is_fat)),
            (
                "architecture",
                self.architecture.map_or(FieldValue::Missing, FieldValue::Arch),
            ),
            (
                "file_type",
                self.file_type
                    .map_or(FieldValue::Missing, |t| FieldValue::Str(t.to_string())),
            ),
            ("has_code_signature", FieldValue::Bool(self.has_code_signature)),
            ("inner_apps", FieldValue::Apps(self.inner_apps.clone())),
        ]
    }
}

impl TextSummary {
    pub const FIELD_NAMES: &'static [&'static str] =
        &["encoding_name", "encoding_full_name", "code_page", "has_bom"];

    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("encoding_name", FieldValue::Str(self.encoding_name.clone())),
            (
                "encoding_full_name",
                FieldValue::Str(self.encoding_full_name.clone()),
            ),
            (
                "code_page",
                self.code_page
                    .map_or(FieldValue::Missing, |cp| FieldValue::Number(u64::from(cp))),
            ),
            ("has_bom", FieldValue::Bool(self.has_bom)),
        ]
    }
}

impl XmlSummary {
    pub const FIELD_NAMES: &'static [&'static str] = &[
        "encoding_name",
        "encoding_full_name",
        "code_page",
        "has_bom",
        "xml_declaration_encoding",
    ];

    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        let mut fields = self.text.fields();
        fields.push((
            "xml_declaration_encoding",
            self.xml_declaration_encoding
                .clone()
                .map_or(FieldValue::Missing, FieldValue::Str),
        ));
        fields
    }
}

impl FormatSummary {
    /// Short name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            FormatSummary::Pe(_) => "PE",
            FormatSummary::Elf(_) => "ELF",
            FormatSummary::MachO(_) => "Mach-O",
            FormatSummary::Text(_) => "Text",
            FormatSummary::Xml(_) => "XML",
            FormatSummary::Unknown => "Unknown",
        }
    }

    /// Declared field names of the variant, in reporting order.
    pub fn field_names(&self) -> &'static [&'static str] {
        match self {
            FormatSummary::Pe(_) => PeSummary::FIELD_NAMES,
            FormatSummary::Elf(_) => ElfSummary::FIELD_NAMES,
            FormatSummary::MachO(_) => MachOSummary::FIELD_NAMES,
            FormatSummary::Text(_) => TextSummary::FIELD_NAMES,
            FormatSummary::Xml(_) => XmlSummary::FIELD_NAMES,
            FormatSummary::Unknown => &[],
        }
    }

    /// Field names paired with their values, for the reporting boundary.
    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        match self {
            FormatSummary::Pe(s) => s.fields(),
            FormatSummary::Elf(s) => s.fields(),
            FormatSummary::MachO(s) => s.fields(),
            FormatSummary::Text(s) => s.fields(),
            FormatSummary::Xml(s) => s.fields(),
            FormatSummary::Unknown => Vec::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, FormatSummary::Unknown)
    }

    /// The text layer of a text or XML summary.
    pub fn as_text(&self) -> Option<&TextSummary> {
        match self {
            FormatSummary::Text(t) => Some(t),
            FormatSummary::Xml(x) => Some(&x.text),
            _ => None,
        }
    }
}

impl fmt::Display for FormatSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())?;
        if self.is_unknown() {
            return Ok(());
        }
        write_fields(f, &self.fields())
    }
}

/// Detection outcome for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedFile {
    pub path: PathBuf,
    pub summary: FormatSummary,
    /// Fault that made the file unrecognized, if any.
    pub error: Option<String>,
}

impl RecognizedFile {
    pub fn new(path: impl Into<PathBuf>, summary: FormatSummary) -> Self {
        Self {
            path: path.into(),
            summary,
            error: None,
        }
    }

    pub fn failed(path: impl Into<PathBuf>, error: &DetectorError) -> Self {
        Self {
            path: path.into(),
            summary: FormatSummary::Unknown,
            error: Some(error.to_string()),
        }
    }
}

/// Options for a detection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorOptions {
    /// Bytes read per classifier step; a positive multiple of 4.
    pub chunk_size: usize,
    /// Maximum bytes the text detectors inspect; a positive multiple of 4.
    pub scan_limit: Option<u64>,
    /// Deepest fat-in-fat nesting the Mach-O parser accepts.
    pub max_fat_depth: usize,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            chunk_size: 4096,
            scan_limit: None,
            max_fat_depth: 4,
        }
    }

    /// Inspect whole files.
    pub fn thorough() -> Self {
        Self {
            chunk_size: 64 * 1024,
            scan_limit: None,
            max_fat_depth: 8,
        }
    }

    /// Inspect at most the first 64KB of text.
    pub fn fast() -> Self {
        Self {
            chunk_size: 4096,
            scan_limit: Some(64 * 1024),
            max_fat_depth: 2,
        }
    }

    /// Check the alignment constraints of the chunk size and scan limit, and
    /// that fat containers can be opened at all.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_size % 4 != 0 {
            return Err(DetectorError::config(format!(
                "chunk size {} is not a positive multiple of 4",
                self.chunk_size
            )));
        }
        if self.max_fat_depth == 0 {
            return Err(DetectorError::config("fat depth limit must be at least 1"));
        }
        if let Some(limit) = self.scan_limit {
            if limit == 0 || limit % 4 != 0 {
                return Err(DetectorError::config(format!(
                    "scan limit {} is not a positive multiple of 4",
                    limit
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thin(bits: u8, endianness: Endianness) -> MachOSummary {
        MachOSummary {
            bits,
            endianness,
            is_fat: false,
            architecture: Some(Architecture::X86),
            file_type: Some(MachOFileType::Execute),
            has_code_signature: false,
            inner_apps: Vec::new(),
        }
    }

    fn fat(apps: Vec<MachOSummary>) -> FormatSummary {
        FormatSummary::MachO(MachOSummary {
            bits: 32,
            endianness: Endianness::Big,
            is_fat: true,
            architecture: None,
            file_type: None,
            has_code_signature: false,
            inner_apps: apps,
        })
    }

    #[test]
    fn test_inner_app_order_matters() {
        let a = thin(32, Endianness::Little);
        let b = thin(32, Endianness::Big);
        let ab = fat(vec![a.clone(), b.clone()]);
        let ba = fat(vec![b, a]);
        assert_eq!(ab, ab.clone());
        assert_ne!(ab, ba);
        assert_ne!(ba, ab);
    }

    #[test]
    fn test_every_field_participates_in_equality() {
        let base = PeSummary {
            architecture: Architecture::X86_64,
            bits: 64,
            endianness: Endianness::Little,
            has_clr_header: false,
        };
        let mut other = base.clone();
        other.has_clr_header = true;
        assert_ne!(base, other);

        let text = TextSummary {
            encoding_name: "utf-8".into(),
            encoding_full_name: "Unicode (UTF-8)".into(),
            code_page: Some(65001),
            has_bom: false,
        };
        let mut bom = text.clone();
        bom.has_bom = true;
        assert_ne!(FormatSummary::Text(text.clone()), FormatSummary::Text(bom));
        assert_ne!(
            FormatSummary::Text(text.clone()),
            FormatSummary::Xml(XmlSummary {
                text,
                xml_declaration_encoding: None
            })
        );
    }

    #[test]
    fn test_fields_match_names() {
        let summaries = [
            fat(vec![thin(64, Endianness::Little)]),
            FormatSummary::Elf(ElfSummary {
                architecture: Architecture::AArch64,
                bits: 64,
                endianness: Endianness::Little,
                file_type: ElfFileType::Executable,
                interpreter: "/lib/ld-linux-aarch64.so.1".into(),
            }),
            FormatSummary::Unknown,
        ];
        for summary in &summaries {
            let names: Vec<_> = summary.fields().iter().map(|(n, _)| *n).collect();
            assert_eq!(names, summary.field_names());
        }
    }

    #[test]
    fn test_display() {
        let elf = FormatSummary::Elf(ElfSummary {
            architecture: Architecture::X86_64,
            bits: 64,
            endianness: Endianness::Little,
            file_type: ElfFileType::SharedObject,
            interpreter: String::new(),
        });
        let shown = elf.to_string();
        assert!(shown.starts_with("ELF{"));
        assert!(shown.contains("architecture: x86_64"));
        assert_eq!(FormatSummary::Unknown.to_string(), "Unknown");

        let nested = fat(vec![thin(32, Endianness::Big)]).to_string();
        assert!(nested.contains("inner_apps: [{bits: 32"));
    }

    #[test]
    fn test_options() {
        assert!(DetectorOptions::new().validate().is_ok());
        assert!(DetectorOptions::thorough().validate().is_ok());
        assert!(DetectorOptions::fast().validate().is_ok());

        let mut bad = DetectorOptions::new();
        bad.chunk_size = 4094;
        assert!(bad.validate().is_err());

        let mut bad = DetectorOptions::new();
        bad.scan_limit = Some(0);
        assert!(bad.validate().is_err());

        let mut bad = DetectorOptions::new();
        bad.max_fat_depth = 0;
        assert!(matches!(
            bad.validate(),
            Err(DetectorError::ConfigError { .. })
        ));
        bad.max_fat_depth = 1;
        assert!(bad.validate().is_ok());
    }
}

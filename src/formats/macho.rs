//! Mach-O (Mach Object) parser.
//!
//! Handles the four thin header variants and both fat container layouts.
//! A fat container is parsed by re-entering the top-level parse at each
//! embedded image's offset, so a summary owns its children in file order.

use std::io::{Read, Seek};

use tracing::trace;

use crate::error::{DetectorError, Result, ResultExt};
use crate::formats::{magic, BinaryDetector, ReadSeek};
use crate::reader::{EndianReader, PointerWidth};
use crate::signature::{match_any, Signature};
use crate::types::{
    Architecture, DetectorOptions, Endianness, FormatSummary, MachOFileType, MachOSummary,
};

/// Mach-O CPU type constants.
pub mod cpu_type {
    pub const VAX: u32 = 1;
    pub const MC680X0: u32 = 6;
    pub const X86: u32 = 7;
    pub const X86_64: u32 = 0x01000007;
    pub const MC98000: u32 = 10;
    pub const HPPA: u32 = 11;
    pub const ARM: u32 = 12;
    pub const ARM64: u32 = 0x0100000C;
    pub const ARM64_32: u32 = 0x0200000C;
    pub const MC88000: u32 = 13;
    pub const SPARC: u32 = 14;
    pub const I860: u32 = 15;
    pub const POWERPC: u32 = 18;
    pub const POWERPC64: u32 = 0x01000012;
}

/// Load command types the parser cares about.
pub mod load_command {
    pub const LC_CODE_SIGNATURE: u32 = 0x1D;
}

const MACH_HEADER_SIZE: u64 = 28;
const MACH_HEADER_64_SIZE: u64 = 32;
const LOAD_COMMAND_HEADER_SIZE: u32 = 8;
const FAT_HEADER_SIZE: u64 = 8;
const FAT_ARCH_SIZE: u64 = 20;
const FAT_ARCH_64_SIZE: u64 = 32;

const SIGNATURES: &[Signature] = &[
    Signature::new(&magic::MACHO_32_BE),
    Signature::new(&magic::MACHO_32_LE),
    Signature::new(&magic::MACHO_64_BE),
    Signature::new(&magic::MACHO_64_LE),
    Signature::new(&magic::MACHO_FAT),
    Signature::new(&magic::MACHO_FAT_64),
];

/// What the leading magic says about the rest of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Thin {
        width: PointerWidth,
        endianness: Endianness,
    },
    Fat {
        width: PointerWidth,
    },
}

fn layout_from_magic(bytes: &[u8]) -> Option<Layout> {
    let sig = match_any(bytes, SIGNATURES)?;
    let layout = match sig.bytes() {
        b if b == magic::MACHO_32_BE => Layout::Thin {
            width: PointerWidth::Bits32,
            endianness: Endianness::Big,
        },
        b if b == magic::MACHO_32_LE => Layout::Thin {
            width: PointerWidth::Bits32,
            endianness: Endianness::Little,
        },
        b if b == magic::MACHO_64_BE => Layout::Thin {
            width: PointerWidth::Bits64,
            endianness: Endianness::Big,
        },
        b if b == magic::MACHO_64_LE => Layout::Thin {
            width: PointerWidth::Bits64,
            endianness: Endianness::Little,
        },
        b if b == magic::MACHO_FAT_64 => Layout::Fat {
            width: PointerWidth::Bits64,
        },
        _ => Layout::Fat {
            width: PointerWidth::Bits32,
        },
    };
    Some(layout)
}

/// Map a Mach-O CPU type to an architecture.
pub fn cpu_type_to_architecture(cpu: u32) -> Architecture {
    match cpu {
        cpu_type::VAX => Architecture::Vax,
        cpu_type::MC680X0 | cpu_type::MC88000 => Architecture::M68k,
        cpu_type::X86 => Architecture::X86,
        cpu_type::X86_64 => Architecture::X86_64,
        cpu_type::MC98000 | cpu_type::POWERPC => Architecture::Ppc,
        cpu_type::POWERPC64 => Architecture::Ppc64,
        cpu_type::HPPA => Architecture::Parisc,
        cpu_type::ARM => Architecture::Arm,
        cpu_type::ARM64 | cpu_type::ARM64_32 => Architecture::AArch64,
        cpu_type::SPARC => Architecture::Sparc,
        cpu_type::I860 => Architecture::I860,
        other => Architecture::Unknown(other),
    }
}

fn macho_error(message: impl Into<String>) -> DetectorError {
    DetectorError::MachOParseError {
        message: message.into(),
    }
}

/// Parse a Mach-O image or fat container from the start of `stream`.
pub fn parse<R: Read + Seek>(stream: R, options: &DetectorOptions) -> Result<MachOSummary> {
    let mut reader = EndianReader::new(stream);
    let file_len = reader.stream_len()?;
    parse_at(&mut reader, 0, file_len, 0, options.max_fat_depth)
}

/// Parse the image occupying `[base, limit)`.
///
/// `depth` counts the fat containers enclosing this image.
fn parse_at<R: Read + Seek>(
    reader: &mut EndianReader<R>,
    base: u64,
    limit: u64,
    depth: usize,
    max_depth: usize,
) -> Result<MachOSummary> {
    reader.seek_to(base)?;
    let bytes = reader.read_bytes(4).macho_context("magic")?;
    let layout = layout_from_magic(&bytes).ok_or_else(|| DetectorError::InvalidMagic {
        format: "Mach-O",
        expected: "FEEDFACE/FEEDFACF/CAFEBABE/CAFEBABF".to_string(),
        actual: hex::encode_upper(&bytes),
    })?;

    match layout {
        Layout::Thin { width, endianness } => {
            parse_thin(reader, base, limit, width, endianness)
        }
        Layout::Fat { width } => {
            if depth >= max_depth {
                return Err(DetectorError::RecursionLimit { limit: max_depth });
            }
            parse_fat(reader, base, limit, width, depth, max_depth)
        }
    }
}

fn parse_fat<R: Read + Seek>(
    reader: &mut EndianReader<R>,
    base: u64,
    limit: u64,
    width: PointerWidth,
    depth: usize,
    max_depth: usize,
) -> Result<MachOSummary> {
    // Fat headers are big-endian regardless of the embedded images.
    reader.set_endianness(Endianness::Big);
    let nfat_arch = reader.read_u32().macho_context("fat header")?;

    let descriptor_size = match width {
        PointerWidth::Bits32 => FAT_ARCH_SIZE,
        PointerWidth::Bits64 => FAT_ARCH_64_SIZE,
    };
    let table_end = u64::from(nfat_arch)
        .checked_mul(descriptor_size)
        .and_then(|table| table.checked_add(base + FAT_HEADER_SIZE))
        .filter(|end| *end <= limit)
        .ok_or_else(|| {
            macho_error(format!(
                "{} fat architecture descriptors do not fit in the file",
                nfat_arch
            ))
        })?;
    trace!(nfat_arch, table_end, "reading fat descriptors");

    let mut slices = Vec::with_capacity(nfat_arch as usize);
    for index in 0..nfat_arch {
        let _cpu_type = reader.read_u32().macho_context("fat descriptor")?;
        let _cpu_subtype = reader.read_u32().macho_context("fat descriptor")?;
        let (offset, size) = match width {
            PointerWidth::Bits32 => (
                u64::from(reader.read_u32().macho_context("fat descriptor")?),
                u64::from(reader.read_u32().macho_context("fat descriptor")?),
            ),
            PointerWidth::Bits64 => (
                reader.read_u64().macho_context("fat descriptor")?,
                reader.read_u64().macho_context("fat descriptor")?,
            ),
        };
        let _align = reader.read_u32().macho_context("fat descriptor")?;
        if width == PointerWidth::Bits64 {
            let _reserved = reader.read_u32().macho_context("fat descriptor")?;
        }

        let start = base.checked_add(offset);
        let end = start.and_then(|s| s.checked_add(size));
        match (start, end) {
            (Some(start), Some(end)) if end <= limit => slices.push((start, end)),
            _ => {
                return Err(macho_error(format!(
                    "fat architecture {} at offset 0x{:X} size {} exceeds the file",
                    index, offset, size
                )))
            }
        }
    }

    let mut inner_apps = Vec::with_capacity(slices.len());
    for (start, end) in slices {
        inner_apps.push(parse_at(reader, start, end, depth + 1, max_depth)?);
    }

    Ok(MachOSummary {
        bits: width.bits(),
        endianness: Endianness::Big,
        is_fat: true,
        architecture: None,
        file_type: None,
        has_code_signature: false,
        inner_apps,
    })
}

fn parse_thin<R: Read + Seek>(
    reader: &mut EndianReader<R>,
    base: u64,
    limit: u64,
    width: PointerWidth,
    endianness: Endianness,
) -> Result<MachOSummary> {
    reader.set_endianness(endianness);
    reader.set_pointer_width(width);

    let cpu = reader.read_u32().macho_context("mach header")?;
    let _cpu_subtype = reader.read_u32().macho_context("mach header")?;
    let file_type = reader.read_u32().macho_context("mach header")?;
    let ncmds = reader.read_u32().macho_context("mach header")?;
    let size_of_cmds = reader.read_u32().macho_context("mach header")?;
    let _flags = reader.read_u32().macho_context("mach header")?;
    let header_size = if width == PointerWidth::Bits64 {
        let _reserved = reader.read_u32().macho_context("mach header")?;
        MACH_HEADER_64_SIZE
    } else {
        MACH_HEADER_SIZE
    };

    if base + header_size + u64::from(size_of_cmds) > limit {
        return Err(macho_error(format!(
            "load commands of {} bytes extend past the image",
            size_of_cmds
        )));
    }

    let mut consumed: u64 = 0;
    let mut has_code_signature = false;
    for index in 0..ncmds {
        let cmd = reader.read_u32().macho_context("load command")?;
        let cmd_size = reader.read_u32().macho_context("load command")?;
        if cmd_size < LOAD_COMMAND_HEADER_SIZE {
            return Err(macho_error(format!(
                "load command {} declares size {}",
                index, cmd_size
            )));
        }
        consumed += u64::from(cmd_size);
        if consumed > u64::from(size_of_cmds) {
            return Err(DetectorError::LoadCommandOverrun {
                consumed,
                declared: size_of_cmds,
            });
        }
        if cmd == load_command::LC_CODE_SIGNATURE {
            has_code_signature = true;
            break;
        }
        reader.skip(u64::from(cmd_size - LOAD_COMMAND_HEADER_SIZE))?;
    }

    Ok(MachOSummary {
        bits: width.bits(),
        endianness,
        is_fat: false,
        architecture: Some(cpu_type_to_architecture(cpu)),
        file_type: Some(MachOFileType::from(file_type)),
        has_code_signature,
        inner_apps: Vec::new(),
    })
}

/// Detector for thin Mach-O images and fat containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct MachODetector;

impl BinaryDetector for MachODetector {
    fn name(&self) -> &'static str {
        "Mach-O"
    }

    fn signatures(&self) -> &[Signature] {
        SIGNATURES
    }

    fn read_format(
        &self,
        stream: &mut dyn ReadSeek,
        options: &DetectorOptions,
    ) -> Result<FormatSummary> {
        parse(stream, options).map(FormatSummary::MachO)
    }
}

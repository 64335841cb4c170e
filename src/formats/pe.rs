//! PE/COFF (Portable Executable) parser.
//!
//! Walks the DOS stub, the COFF file header and the optional header. The
//! optional header magic decides the width of the image base and the
//! stack/heap reservation fields, and whether `BaseOfData` is present.

use std::io::{Read, Seek};

use crate::error::{DetectorError, Result, ResultExt};
use crate::formats::{magic, BinaryDetector, ReadSeek};
use crate::reader::{EndianReader, PointerWidth};
use crate::signature::Signature;
use crate::types::{Architecture, DetectorOptions, Endianness, FormatSummary, PeSummary};

/// PE machine type constants.
pub mod machine {
    pub const UNKNOWN: u16 = 0x0000;
    pub const I386: u16 = 0x014C;
    pub const R3000: u16 = 0x0162;
    pub const R4000: u16 = 0x0166;
    pub const R10000: u16 = 0x0168;
    pub const WCEMIPSV2: u16 = 0x0169;
    pub const ALPHA: u16 = 0x0184;
    pub const SH3: u16 = 0x01A2;
    pub const SH3DSP: u16 = 0x01A3;
    pub const SH3E: u16 = 0x01A4;
    pub const SH4: u16 = 0x01A6;
    pub const SH5: u16 = 0x01A8;
    pub const ARM: u16 = 0x01C0;
    pub const THUMB: u16 = 0x01C2;
    pub const ARMNT: u16 = 0x01C4;
    pub const POWERPC: u16 = 0x01F0;
    pub const POWERPCFP: u16 = 0x01F1;
    pub const IA64: u16 = 0x0200;
    pub const MIPS16: u16 = 0x0266;
    pub const ALPHA64: u16 = 0x0284;
    pub const MIPSFPU: u16 = 0x0366;
    pub const MIPSFPU16: u16 = 0x0466;
    pub const EBC: u16 = 0x0EBC;
    pub const RISCV32: u16 = 0x5032;
    pub const RISCV64: u16 = 0x5064;
    pub const RISCV128: u16 = 0x5128;
    pub const LOONGARCH32: u16 = 0x6232;
    pub const LOONGARCH64: u16 = 0x6264;
    pub const AMD64: u16 = 0x8664;
    pub const ARM64EC: u16 = 0xA641;
    pub const ARM64X: u16 = 0xA64E;
    pub const ARM64: u16 = 0xAA64;
}

/// PE optional header magic values.
pub mod optional_magic {
    pub const PE32: u16 = 0x10B;
    pub const PE32PLUS: u16 = 0x20B;
}

/// Offset of `e_lfanew` in the DOS header.
const LFANEW_OFFSET: u64 = 0x3C;

/// Size of the DOS header.
const DOS_HEADER_SIZE: u64 = 0x40;

/// Data directory index of the CLR runtime header.
pub const CLR_DIRECTORY_INDEX: u32 = 14;

/// Fixed part of the optional header before the data directories.
const PE32_FIXED_SIZE: u64 = 96;
const PE32PLUS_FIXED_SIZE: u64 = 112;

const SIGNATURES: &[Signature] = &[Signature::new(&magic::MZ)];

/// Map PE machine type to an architecture and its bit width.
///
/// The bit width stands in for the optional header when none is present.
pub fn machine_to_architecture(machine: u16) -> (Architecture, u8) {
    match machine {
        machine::UNKNOWN => (Architecture::Unknown(0), 0),

        machine::I386 => (Architecture::X86, 32),

        machine::R3000
        | machine::R4000
        | machine::R10000
        | machine::WCEMIPSV2
        | machine::MIPS16
        | machine::MIPSFPU
        | machine::MIPSFPU16 => (Architecture::Mips, 32),

        machine::ALPHA | machine::ALPHA64 => (Architecture::Alpha, 64),

        machine::SH3 | machine::SH3DSP | machine::SH3E | machine::SH4 => (Architecture::Sh, 32),
        machine::SH5 => (Architecture::Sh, 64),

        machine::ARM | machine::THUMB | machine::ARMNT => (Architecture::Arm, 32),

        machine::POWERPC | machine::POWERPCFP => (Architecture::Ppc, 32),

        machine::IA64 => (Architecture::Ia64, 64),

        machine::EBC => (Architecture::Ebc, 64),

        machine::RISCV32 => (Architecture::RiscV32, 32),
        machine::RISCV64 => (Architecture::RiscV64, 64),
        machine::RISCV128 => (Architecture::RiscV128, 128),

        machine::LOONGARCH32 => (Architecture::LoongArch32, 32),
        machine::LOONGARCH64 => (Architecture::LoongArch64, 64),

        machine::AMD64 => (Architecture::X86_64, 64),

        machine::ARM64EC | machine::ARM64X | machine::ARM64 => (Architecture::AArch64, 64),

        other => (Architecture::Unknown(u32::from(other)), 32),
    }
}

fn pe_error(message: impl Into<String>) -> DetectorError {
    DetectorError::PeParseError {
        message: message.into(),
    }
}

/// What the optional header contributes to the summary.
struct OptionalHeader {
    bits: u8,
    has_clr_header: bool,
}

fn read_optional_header<R: Read + Seek>(
    reader: &mut EndianReader<R>,
    declared_size: u16,
) -> Result<OptionalHeader> {
    let magic = reader.read_u16()?;
    let (width, fixed_size) = match magic {
        optional_magic::PE32 => (PointerWidth::Bits32, PE32_FIXED_SIZE),
        optional_magic::PE32PLUS => (PointerWidth::Bits64, PE32PLUS_FIXED_SIZE),
        other => return Err(pe_error(format!("unknown optional header magic 0x{:04X}", other))),
    };
    if u64::from(declared_size) < fixed_size {
        return Err(pe_error(format!(
            "optional header size {} below the {} bytes its magic requires",
            declared_size, fixed_size
        )));
    }
    reader.set_pointer_width(width);

    let _linker_version = reader.read_u16()?;
    let _size_of_code = reader.read_u32()?;
    let _size_of_initialized_data = reader.read_u32()?;
    let _size_of_uninitialized_data = reader.read_u32()?;
    let _address_of_entry_point = reader.read_u32()?;
    let _base_of_code = reader.read_u32()?;
    if width == PointerWidth::Bits32 {
        let _base_of_data = reader.read_u32()?;
    }
    let _image_base = reader.read_pointer()?;
    let _section_alignment = reader.read_u32()?;
    let _file_alignment = reader.read_u32()?;
    let _os_version = reader.read_u32()?;
    let _image_version = reader.read_u32()?;
    let _subsystem_version = reader.read_u32()?;
    let _win32_version_value = reader.read_u32()?;
    let _size_of_image = reader.read_u32()?;
    let _size_of_headers = reader.read_u32()?;
    let _checksum = reader.read_u32()?;
    let _subsystem = reader.read_u16()?;
    let _dll_characteristics = reader.read_u16()?;
    let _size_of_stack_reserve = reader.read_pointer()?;
    let _size_of_stack_commit = reader.read_pointer()?;
    let _size_of_heap_reserve = reader.read_pointer()?;
    let _size_of_heap_commit = reader.read_pointer()?;
    let _loader_flags = reader.read_u32()?;
    let number_of_rva_and_sizes = reader.read_u32()?;

    // Directories past the declared optional header size do not exist.
    let room = (u64::from(declared_size) - fixed_size) / 8;
    let directories = u64::from(number_of_rva_and_sizes).min(room);

    let has_clr_header = if directories > u64::from(CLR_DIRECTORY_INDEX) {
        reader.skip(u64::from(CLR_DIRECTORY_INDEX) * 8)?;
        let rva = reader.read_u32()?;
        let size = reader.read_u32()?;
        rva != 0 && size != 0
    } else {
        false
    };

    Ok(OptionalHeader {
        bits: width.bits(),
        has_clr_header,
    })
}

/// Parse PE/COFF file.
pub fn parse<R: Read + Seek>(stream: R) -> Result<PeSummary> {
    let mut reader = EndianReader::new(stream);
    reader.seek_to(0)?;

    let file_len = reader.stream_len()?;
    if file_len < DOS_HEADER_SIZE {
        return Err(DetectorError::FileTooSmall {
            expected: DOS_HEADER_SIZE,
            actual: file_len,
        });
    }

    let mz = reader.read_bytes(2)?;
    if mz[..] != magic::MZ {
        return Err(DetectorError::InvalidMagic {
            format: "DOS",
            expected: hex::encode_upper(magic::MZ),
            actual: hex::encode_upper(&mz),
        });
    }

    reader.seek_to(LFANEW_OFFSET)?;
    let pe_offset = u64::from(reader.read_u32()?);
    if pe_offset >= file_len {
        return Err(pe_error(format!(
            "COFF header offset 0x{:X} beyond file length {}",
            pe_offset, file_len
        )));
    }

    reader.seek_to(pe_offset)?;
    let signature = reader.read_bytes(4).pe_context("PE signature")?;
    if signature[..] != magic::PE {
        return Err(DetectorError::InvalidMagic {
            format: "PE",
            expected: hex::encode_upper(magic::PE),
            actual: hex::encode_upper(&signature),
        });
    }

    // COFF file header
    let machine = reader.read_u16().pe_context("COFF machine")?;
    let _number_of_sections = reader.read_u16().pe_context("COFF section count")?;
    let _time_date_stamp = reader.read_u32().pe_context("COFF timestamp")?;
    let _pointer_to_symbol_table = reader.read_u32().pe_context("COFF symbol table")?;
    let _number_of_symbols = reader.read_u32().pe_context("COFF symbol count")?;
    let size_of_optional_header = reader.read_u16().pe_context("COFF optional header size")?;
    let _characteristics = reader.read_u16().pe_context("COFF characteristics")?;

    let (architecture, machine_bits) = machine_to_architecture(machine);

    let (bits, has_clr_header) = if size_of_optional_header == 0 {
        (machine_bits, false)
    } else {
        let optional = read_optional_header(&mut reader, size_of_optional_header)
            .pe_context("optional header")?;
        (optional.bits, optional.has_clr_header)
    };

    Ok(PeSummary {
        architecture,
        bits,
        endianness: Endianness::Little,
        has_clr_header,
    })
}

/// Detector for PE/COFF images.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeDetector;

impl BinaryDetector for PeDetector {
    fn name(&self) -> &'static str {
        "PE"
    }

    fn signatures(&self) -> &[Signature] {
        SIGNATURES
    }

    fn read_format(
        &self,
        stream: &mut dyn ReadSeek,
        _options: &DetectorOptions,
    ) -> Result<FormatSummary> {
        parse(stream).map(FormatSummary::Pe)
    }
}

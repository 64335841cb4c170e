//! ELF (Executable and Linkable Format) parser.
//!
//! The identification bytes select the word size and byte order for every
//! later field; the program header table is then walked to find the
//! requested program interpreter.

use memchr::memchr;
use std::io::{Read, Seek};

use crate::error::{DetectorError, Result, ResultExt};
use crate::formats::{magic, BinaryDetector, ReadSeek};
use crate::reader::{EndianReader, PointerWidth};
use crate::signature::Signature;
use crate::types::{
    Architecture, DetectorOptions, ElfFileType, ElfSummary, Endianness, FormatSummary,
};

/// ELF class values (32-bit vs 64-bit)
pub mod class {
    pub const ELFCLASS32: u8 = 1;
    pub const ELFCLASS64: u8 = 2;
}

/// ELF data encoding (endianness)
pub mod data {
    pub const ELFDATA2LSB: u8 = 1; // Little-endian
    pub const ELFDATA2MSB: u8 = 2; // Big-endian
}

/// Program header segment types.
pub mod segment {
    pub const PT_NULL: u32 = 0;
    pub const PT_LOAD: u32 = 1;
    pub const PT_DYNAMIC: u32 = 2;
    pub const PT_INTERP: u32 = 3;
    pub const PT_NOTE: u32 = 4;
}

/// Size of `e_ident`.
const EI_NIDENT: usize = 16;

/// Smallest complete header (32-bit class).
const MIN_HEADER_SIZE: u64 = 52;

/// Longest interpreter path accepted.
const MAX_INTERPRETER_LEN: u64 = 4096;

const SIGNATURES: &[Signature] = &[Signature::new(&magic::ELF)];

/// Map `e_machine` to an architecture.
pub fn e_machine_to_architecture(e_machine: u16, is_64: bool) -> Architecture {
    match e_machine {
        // SPARC
        0x02 | 0x12 => Architecture::Sparc,
        // Intel 80386, Intel MCU
        0x03 | 0x06 => Architecture::X86,
        // Motorola 68000
        0x04 => Architecture::M68k,
        // Intel 80860
        0x07 => Architecture::I860,
        // MIPS I
        0x08 => {
            if is_64 {
                Architecture::Mips64
            } else {
                Architecture::Mips
            }
        }
        // IBM System/370
        0x09 => Architecture::S390,
        // MIPS RS3000 LE
        0x0A => Architecture::Mips,
        // HP PA-RISC
        0x0F => Architecture::Parisc,
        // PowerPC 32-bit
        0x14 => Architecture::Ppc,
        // PowerPC 64-bit
        0x15 => Architecture::Ppc64,
        // IBM S/390
        0x16 => {
            if is_64 {
                Architecture::S390x
            } else {
                Architecture::S390
            }
        }
        // ARM 32-bit
        0x28 => Architecture::Arm,
        // DEC Alpha (unofficial)
        0x29 | 0x9026 => Architecture::Alpha,
        // Hitachi SuperH
        0x2A => Architecture::Sh,
        // SPARC V9 64-bit
        0x2B => Architecture::Sparc64,
        // Intel IA-64
        0x32 => Architecture::Ia64,
        // AMD x86-64
        0x3E => Architecture::X86_64,
        // DEC VAX
        0x4B => Architecture::Vax,
        // Atmel AVR
        0x53 => Architecture::Avr,
        // Tensilica Xtensa
        0x5E => Architecture::Xtensa,
        // TI MSP430
        0x69 => Architecture::Msp430,
        // Qualcomm Hexagon
        0xA4 => Architecture::Hexagon,
        // ARM 64-bit
        0xB7 => Architecture::AArch64,
        // Linux BPF
        0xF7 => Architecture::Bpf,
        // RISC-V
        0xF3 => {
            if is_64 {
                Architecture::RiscV64
            } else {
                Architecture::RiscV32
            }
        }
        // LoongArch
        0x102 => {
            if is_64 {
                Architecture::LoongArch64
            } else {
                Architecture::LoongArch32
            }
        }
        other => Architecture::Unknown(u32::from(other)),
    }
}

/// Program header fields the parser needs.
#[derive(Debug, Clone, Copy)]
struct ProgramHeader {
    p_type: u32,
    p_offset: u64,
    p_filesz: u64,
}

/// Read one program header at the current position.
///
/// 64-bit entries carry `p_flags` right after `p_type`; 32-bit entries
/// place it after the size fields.
fn read_program_header<R: Read + Seek>(reader: &mut EndianReader<R>) -> Result<ProgramHeader> {
    let is_64 = reader.pointer_width() == PointerWidth::Bits64;

    let p_type = reader.read_u32()?;
    if is_64 {
        let _p_flags = reader.read_u32()?;
    }
    let p_offset = reader.read_pointer()?;
    let _p_vaddr = reader.read_pointer()?;
    let _p_paddr = reader.read_pointer()?;
    let p_filesz = reader.read_pointer()?;
    let _p_memsz = reader.read_pointer()?;
    if !is_64 {
        let _p_flags = reader.read_u32()?;
    }
    let _p_align = reader.read_pointer()?;

    Ok(ProgramHeader {
        p_type,
        p_offset,
        p_filesz,
    })
}

fn elf_error(message: impl Into<String>) -> DetectorError {
    DetectorError::ElfParseError {
        message: message.into(),
    }
}

/// Locate the first `PT_INTERP` segment and read its path.
fn read_interpreter<R: Read + Seek>(
    reader: &mut EndianReader<R>,
    phoff: u64,
    phentsize: u16,
    phnum: u16,
    file_len: u64,
) -> Result<String> {
    if phnum == 0 {
        return Ok(String::new());
    }

    let min_entry = if reader.pointer_width() == PointerWidth::Bits64 {
        56
    } else {
        32
    };
    if u64::from(phentsize) < min_entry {
        return Err(elf_error(format!(
            "program header entry size {} below minimum {}",
            phentsize, min_entry
        )));
    }

    let table_end = u64::from(phnum)
        .checked_mul(u64::from(phentsize))
        .and_then(|size| size.checked_add(phoff));
    if table_end.map_or(true, |end| end > file_len) {
        return Err(elf_error(format!(
            "program header table at 0x{:X} ({} entries) extends past end of file",
            phoff, phnum
        )));
    }

    for index in 0..u64::from(phnum) {
        reader.seek_to(phoff + index * u64::from(phentsize))?;
        let header = read_program_header(reader)
            .elf_context(&format!("program header {}", index))?;

        if header.p_type != segment::PT_INTERP {
            continue;
        }

        let end = header.p_offset.checked_add(header.p_filesz);
        if end.map_or(true, |end| end > file_len) {
            return Err(elf_error(format!(
                "interpreter segment at 0x{:X} (size {}) extends past end of file",
                header.p_offset, header.p_filesz
            )));
        }
        if header.p_filesz > MAX_INTERPRETER_LEN {
            return Err(elf_error(format!(
                "interpreter segment size {} exceeds {}",
                header.p_filesz, MAX_INTERPRETER_LEN
            )));
        }

        reader.seek_to(header.p_offset)?;
        let raw = reader.read_bytes(header.p_filesz as usize)?;
        let path = match memchr(0, &raw) {
            Some(nul) => &raw[..nul],
            None => &raw[..],
        };
        return Ok(String::from_utf8_lossy(path).into_owned());
    }

    Ok(String::new())
}

/// Main ELF parsing function.
pub fn parse<R: Read + Seek>(stream: R) -> Result<ElfSummary> {
    let mut reader = EndianReader::new(stream);
    reader.seek_to(0)?;

    let file_len = reader.stream_len()?;
    if file_len < MIN_HEADER_SIZE {
        return Err(DetectorError::FileTooSmall {
            expected: MIN_HEADER_SIZE,
            actual: file_len,
        });
    }

    let ident = reader.read_bytes(EI_NIDENT)?;
    if ident[..4] != magic::ELF {
        return Err(DetectorError::InvalidMagic {
            format: "ELF",
            expected: hex::encode_upper(magic::ELF),
            actual: hex::encode_upper(&ident[..4]),
        });
    }

    let width = match ident[4] {
        class::ELFCLASS32 => PointerWidth::Bits32,
        class::ELFCLASS64 => PointerWidth::Bits64,
        other => return Err(elf_error(format!("invalid class {}", other))),
    };
    let endianness = match ident[5] {
        data::ELFDATA2LSB => Endianness::Little,
        data::ELFDATA2MSB => Endianness::Big,
        other => return Err(elf_error(format!("invalid data encoding {}", other))),
    };

    // Everything past e_ident honours the declared class and encoding.
    reader.set_pointer_width(width);
    reader.set_endianness(endianness);

    let e_type = reader.read_u16().elf_context("e_type")?;
    let e_machine = reader.read_u16().elf_context("e_machine")?;
    let _e_version = reader.read_u32().elf_context("e_version")?;
    let _e_entry = reader.read_pointer().elf_context("e_entry")?;
    let e_phoff = reader.read_pointer().elf_context("e_phoff")?;
    let _e_shoff = reader.read_pointer().elf_context("e_shoff")?;
    let _e_flags = reader.read_u32().elf_context("e_flags")?;
    let _e_ehsize = reader.read_u16().elf_context("e_ehsize")?;
    let e_phentsize = reader.read_u16().elf_context("e_phentsize")?;
    let e_phnum = reader.read_u16().elf_context("e_phnum")?;

    let interpreter = read_interpreter(&mut reader, e_phoff, e_phentsize, e_phnum, file_len)?;

    Ok(ElfSummary {
        architecture: e_machine_to_architecture(e_machine, width == PointerWidth::Bits64),
        bits: width.bits(),
        endianness,
        file_type: ElfFileType::from(e_type),
        interpreter,
    })
}

/// Detector for ELF images.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElfDetector;

impl BinaryDetector for ElfDetector {
    fn name(&self) -> &'static str {
        "ELF"
    }

    fn signatures(&self) -> &[Signature] {
        SIGNATURES
    }

    fn read_format(
        &self,
        stream: &mut dyn ReadSeek,
        _options: &DetectorOptions,
    ) -> Result<FormatSummary> {
        parse(stream).map(FormatSummary::Elf)
    }
}

//! Synthetic executable images for unit tests.

fn put(buf: &mut Vec<u8>, value: u64, size: usize, big_endian: bool) {
    let bytes = value.to_le_bytes();
    let mut field = bytes[..size].to_vec();
    if big_endian {
        field.reverse();
    }
    buf.extend_from_slice(&field);
}

/// ELF image with one program header per segment, payloads appended in order.
pub(crate) fn build_elf(class: u8, endian: u8, machine: u16, segments: &[(u32, &[u8])]) -> Vec<u8> {
    let is_64 = class == 2;
    let big = endian == 2;
    let ptr = if is_64 { 8 } else { 4 };
    let ehsize = if is_64 { 64 } else { 52 };
    let phentsize = if is_64 { 56 } else { 32 };

    let mut data = vec![0x7F, b'E', b'L', b'F', class, endian, 1, 0];
    data.resize(16, 0);
    put(&mut data, 2, 2, big); // e_type: executable
    put(&mut data, u64::from(machine), 2, big);
    put(&mut data, 1, 4, big); // e_version
    put(&mut data, 0x40_1000, ptr, big); // e_entry
    put(&mut data, ehsize as u64, ptr, big); // e_phoff
    put(&mut data, 0, ptr, big); // e_shoff
    put(&mut data, 0, 4, big); // e_flags
    put(&mut data, ehsize as u64, 2, big);
    put(&mut data, phentsize as u64, 2, big);
    put(&mut data, segments.len() as u64, 2, big);
    put(&mut data, 0, 2, big); // e_shentsize
    put(&mut data, 0, 2, big); // e_shnum
    put(&mut data, 0, 2, big); // e_shstrndx
    assert_eq!(data.len(), ehsize);

    let mut offset = (ehsize + phentsize * segments.len()) as u64;
    for (p_type, payload) in segments {
        let len = payload.len() as u64;
        put(&mut data, u64::from(*p_type), 4, big);
        if is_64 {
            put(&mut data, 4, 4, big); // p_flags
        }
        put(&mut data, offset, ptr, big); // p_offset
        put(&mut data, 0, ptr, big); // p_vaddr
        put(&mut data, 0, ptr, big); // p_paddr
        put(&mut data, len, ptr, big); // p_filesz
        put(&mut data, len, ptr, big); // p_memsz
        if !is_64 {
            put(&mut data, 4, 4, big); // p_flags
        }
        put(&mut data, 1, ptr, big); // p_align
        offset += len;
    }
    for (_, payload) in segments {
        data.extend_from_slice(payload);
    }
    data
}

/// Offset of the PE signature in images from [`build_pe`].
pub(crate) const PE_OFFSET: usize = 0x80;

/// PE image with an optional header of the given magic (or none), and an
/// optional CLR data directory `(rva, size)`.
pub(crate) fn build_pe(machine: u16, optional_magic: Option<u16>, clr: Option<(u32, u32)>) -> Vec<u8> {
    let mut data = vec![0u8; PE_OFFSET];
    data[0] = b'M';
    data[1] = b'Z';
    data[0x3C..0x40].copy_from_slice(&(PE_OFFSET as u32).to_le_bytes());
    data.extend_from_slice(b"PE\0\0");

    let mut optional = Vec::new();
    if let Some(magic) = optional_magic {
        let plus = magic == 0x20B;
        let ptr = if plus { 8 } else { 4 };
        put(&mut optional, u64::from(magic), 2, false);
        put(&mut optional, 0x0E, 2, false); // linker version
        put(&mut optional, 0x1000, 4, false); // SizeOfCode
        put(&mut optional, 0x200, 4, false); // SizeOfInitializedData
        put(&mut optional, 0, 4, false); // SizeOfUninitializedData
        put(&mut optional, 0x1000, 4, false); // AddressOfEntryPoint
        put(&mut optional, 0x1000, 4, false); // BaseOfCode
        if !plus {
            put(&mut optional, 0x2000, 4, false); // BaseOfData
        }
        put(&mut optional, 0x40_0000, ptr, false); // ImageBase
        put(&mut optional, 0x1000, 4, false); // SectionAlignment
        put(&mut optional, 0x200, 4, false); // FileAlignment
        put(&mut optional, 6, 4, false); // OS version
        put(&mut optional, 0, 4, false); // image version
        put(&mut optional, 6, 4, false); // subsystem version
        put(&mut optional, 0, 4, false); // Win32VersionValue
        put(&mut optional, 0x3000, 4, false); // SizeOfImage
        put(&mut optional, 0x400, 4, false); // SizeOfHeaders
        put(&mut optional, 0, 4, false); // CheckSum
        put(&mut optional, 3, 2, false); // Subsystem: console
        put(&mut optional, 0x8160, 2, false); // DllCharacteristics
        put(&mut optional, 0x10_0000, ptr, false); // SizeOfStackReserve
        put(&mut optional, 0x1000, ptr, false); // SizeOfStackCommit
        put(&mut optional, 0x10_0000, ptr, false); // SizeOfHeapReserve
        put(&mut optional, 0x1000, ptr, false); // SizeOfHeapCommit
        put(&mut optional, 0, 4, false); // LoaderFlags
        put(&mut optional, 16, 4, false); // NumberOfRvaAndSizes
        for index in 0..16 {
            let (rva, size) = match (index, clr) {
                (14, Some(dir)) => dir,
                _ => (0, 0),
            };
            put(&mut optional, u64::from(rva), 4, false);
            put(&mut optional, u64::from(size), 4, false);
        }
    }

    put(&mut data, u64::from(machine), 2, false);
    put(&mut data, 1, 2, false); // NumberOfSections
    put(&mut data, 0, 4, false); // TimeDateStamp
    put(&mut data, 0, 4, false); // PointerToSymbolTable
    put(&mut data, 0, 4, false); // NumberOfSymbols
    put(&mut data, optional.len() as u64, 2, false);
    put(&mut data, 0x22, 2, false); // Characteristics
    data.extend_from_slice(&optional);
    data.resize(data.len() + 0x40, 0);
    data
}

/// Thin Mach-O image with the given `(cmd, cmdsize)` load commands.
pub(crate) fn build_macho(bits: u8, big_endian: bool, cpu_type: u32, commands: &[(u32, u32)]) -> Vec<u8> {
    let mut data = match (bits, big_endian) {
        (64, false) => vec![0xCF, 0xFA, 0xED, 0xFE],
        (64, true) => vec![0xFE, 0xED, 0xFA, 0xCF],
        (_, false) => vec![0xCE, 0xFA, 0xED, 0xFE],
        (_, true) => vec![0xFE, 0xED, 0xFA, 0xCE],
    };
    let size_of_cmds: u32 = commands.iter().map(|(_, size)| size).sum();
    put(&mut data, u64::from(cpu_type), 4, big_endian);
    put(&mut data, 3, 4, big_endian); // cpusubtype
    put(&mut data, 2, 4, big_endian); // filetype: execute
    put(&mut data, commands.len() as u64, 4, big_endian);
    put(&mut data, u64::from(size_of_cmds), 4, big_endian);
    put(&mut data, 0x0020_0085, 4, big_endian); // flags
    if bits == 64 {
        put(&mut data, 0, 4, big_endian); // reserved
    }
    for (cmd, size) in commands {
        put(&mut data, u64::from(*cmd), 4, big_endian);
        put(&mut data, u64::from(*size), 4, big_endian);
        data.resize(data.len() + (*size as usize).saturating_sub(8), 0);
    }
    data
}

/// Fat container holding `slices` in order; `wide` selects 64-bit descriptors.
pub(crate) fn build_fat(slices: &[Vec<u8>], wide: bool) -> Vec<u8> {
    let mut data = if wide {
        vec![0xCA, 0xFE, 0xBA, 0xBF]
    } else {
        vec![0xCA, 0xFE, 0xBA, 0xBE]
    };
    put(&mut data, slices.len() as u64, 4, true);

    let descriptor_size = if wide { 32 } else { 20 };
    let mut offset = (8 + descriptor_size * slices.len() + 15) & !15;
    let mut placed = Vec::new();
    for slice in slices {
        put(&mut data, 7, 4, true); // cputype
        put(&mut data, 3, 4, true); // cpusubtype
        let ptr = if wide { 8 } else { 4 };
        put(&mut data, offset as u64, ptr, true);
        put(&mut data, slice.len() as u64, ptr, true);
        put(&mut data, 4, 4, true); // align 2^4
        if wide {
            put(&mut data, 0, 4, true); // reserved
        }
        placed.push(offset);
        offset = (offset + slice.len() + 15) & !15;
    }
    for (slice, at) in slices.iter().zip(placed) {
        data.resize(at, 0);
        data.extend_from_slice(slice);
    }
    data
}

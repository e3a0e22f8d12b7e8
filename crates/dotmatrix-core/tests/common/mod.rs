#![allow(dead_code)]

use once_cell::sync::Lazy;

/// Where [`rom_with_program`] places its code. The entry point jumps here.
pub const PROGRAM_START: usize = 0x0150;

/// 32 KiB NoMBC image whose program is an endless `JR -2`.
pub static IDLE_ROM: Lazy<Vec<u8>> = Lazy::new(|| rom_with_program(&[0x18, 0xFE]));

/// Build an image with a valid header. `rom_size_code` decides the length.
pub fn build_rom(cart_type: u8, rom_size_code: u8, ram_size_code: u8) -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000 << rom_size_code];
    // JP PROGRAM_START
    rom[0x0100..0x0104].copy_from_slice(&[0x00, 0xC3, PROGRAM_START as u8, 0x01]);
    rom[0x0134..0x0134 + 9].copy_from_slice(b"DOTMATRIX");
    rom[0x0147] = cart_type;
    rom[0x0148] = rom_size_code;
    rom[0x0149] = ram_size_code;
    fix_checksum(&mut rom);
    rom
}

pub fn rom_with_program(program: &[u8]) -> Vec<u8> {
    let mut rom = build_rom(0x00, 0x00, 0x00);
    rom[PROGRAM_START..PROGRAM_START + program.len()].copy_from_slice(program);
    rom
}

pub fn fix_checksum(rom: &mut [u8]) {
    let mut x = 0u8;
    for &b in &rom[0x0134..=0x014C] {
        x = x.wrapping_sub(b).wrapping_sub(1);
    }
    rom[0x014D] = x;
}

/// Mark every bank with its own number at offset 0 of the bank.
pub fn tag_banks(rom: &mut [u8]) {
    for (bank, chunk) in rom.chunks_mut(0x4000).enumerate().skip(1) {
        chunk[0] = bank as u8;
    }
}

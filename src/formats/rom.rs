//! Paged cartridge ROM images for the PC-6001 mkII Warrior cartridge.
//!
//! Every 0x2000-byte page starts with a small Z80 loader mapped at 0x4000.
//! It copies the page payload to its load address, then either jumps to the
//! continuation stub (switch the next page in, restart the loader) or, on
//! the last page, to the trampoline that maps all-RAM and enters the
//! program. Page 0 only installs the trampoline at 0xC800.
//!
//! Each loader ends with a BLOAD-style header at 0x4040 that it reads its
//! own copy parameters from.

use super::magic;
use crate::error::{Result, TranscodeError};
use crate::types::AddressTriple;
use tracing::debug;

/// Size of one bank-switched page.
pub const ROM_PAGE_SIZE: usize = 0x2000;

/// Address the cartridge page is mapped at.
pub const ROM_START: u16 = 0x4000;

/// Size of the per-page loader, fake BLOAD header included.
pub const PAGE_LOADER_SIZE: usize = 0x47;

/// Payload bytes carried by one page.
pub const PAGE_PAYLOAD_SIZE: usize = ROM_PAGE_SIZE - PAGE_LOADER_SIZE;

/// Entry used by every page but the last: switch to the next page.
pub const CONTINUATION_ENTRY: u16 = ROM_START + 0x38;

/// Where page 0 installs the trampoline.
pub const TRAMPOLINE_START: u16 = 0xC800;

/// Size of the trampoline, padding included.
pub const TRAMPOLINE_SIZE: usize = 16;

/// Entry point in the cartridge header.
const ROM_ENTRY: u16 = ROM_START + 0x10;

/// First payload byte of a page.
const PAYLOAD_START: u16 = ROM_START + PAGE_LOADER_SIZE as u16;

/// Bank C switch ports (Beluga, Warrior mkII).
const BELUGA_BANK_PORT: u8 = 0x70;
const WARRIOR_BANK_PORT: u8 = 0x32;

/// PC-6001 mkII bank switch register 0 and the all-RAM setting.
const BANK_REGISTER_0_PORT: u8 = 0xF0;
const ALL_RAM: u8 = 0xDD;

/// MSX VDP register 1 shadow; unused RAM on a PC-6001.
const VDP_REG1_SHADOW: u16 = 0xF3E0;

/// Z80 opcodes used by the page loader and trampoline.
pub mod opcode {
    pub const NOP: u8 = 0x00;
    pub const LD_A_IMM: u8 = 0x3E;
    pub const LD_A_MEM: u8 = 0x3A;
    pub const LD_MEM_A: u8 = 0x32;
    pub const AND_IMM: u8 = 0xE6;
    pub const OR_IMM: u8 = 0xF6;
    pub const XOR_A: u8 = 0xAF;
    pub const LD_HL_IMM: u8 = 0x21;
    pub const LD_HL_MEM: u8 = 0x2A;
    pub const LD_B_H: u8 = 0x44;
    pub const LD_C_L: u8 = 0x4D;
    pub const OUT_IMM_A: u8 = 0xD3;
    pub const JP: u8 = 0xC3;
    pub const JP_HL: u8 = 0xE9;
    pub const JR: u8 = 0x18;

    /// ED-prefixed instructions.
    pub const ED: u8 = 0xED;
    pub const ED_LD_DE_MEM: u8 = 0x5B;
    pub const ED_SBC_HL_DE: u8 = 0x52;
    pub const ED_LDIR: u8 = 0xB0;
}

/// Minimal Z80 emitter.
#[derive(Debug, Default)]
struct Asm {
    code: Vec<u8>,
}

impl Asm {
    fn op(&mut self, bytes: &[u8]) -> &mut Self {
        self.code.extend_from_slice(bytes);
        self
    }

    fn op_word(&mut self, bytes: &[u8], word: u16) -> &mut Self {
        self.code.extend_from_slice(bytes);
        self.code.extend_from_slice(&word.to_le_bytes());
        self
    }

    fn nops(&mut self, count: usize) -> &mut Self {
        self.code.resize(self.code.len() + count, opcode::NOP);
        self
    }
}

/// The loader at the start of every page.
pub fn page_loader(start: u16, stop: u16, entry: u16, next_page: u8) -> Vec<u8> {
    use opcode::*;

    let mut asm = Asm::default();
    asm.op(b"AB")
        .op_word(&[], ROM_ENTRY)
        .nops(18)
        .op_word(&[LD_A_MEM], VDP_REG1_SHADOW)
        .op(&[AND_IMM, 0xFC])
        .op(&[OR_IMM, 0x02])
        .op_word(&[LD_MEM_A], VDP_REG1_SHADOW)
        .nops(3)
        .op_word(&[ED, ED_LD_DE_MEM], PAYLOAD_START - 6)
        .op(&[XOR_A])
        .op_word(&[LD_HL_MEM], PAYLOAD_START - 4)
        .op(&[ED, ED_SBC_HL_DE])
        .op(&[LD_B_H, LD_C_L])
        .op_word(&[LD_HL_IMM], PAYLOAD_START)
        .op(&[ED, ED_LDIR])
        .op_word(&[LD_HL_MEM], PAYLOAD_START - 2)
        .op(&[JP_HL])
        .op(&[LD_A_IMM, next_page])
        .op(&[OUT_IMM_A, BELUGA_BANK_PORT])
        .op(&[OUT_IMM_A, WARRIOR_BANK_PORT]);

    // Jump back to the code after the 4-byte cartridge header.
    let back = (asm.code.len() - 4 + 2) as u8;
    asm.op(&[JR, back.wrapping_neg()])
        .op(&[magic::BLOAD])
        .op_word(&[], start)
        .op_word(&[], stop)
        .op_word(&[], entry);

    debug_assert_eq!(asm.code.len(), PAGE_LOADER_SIZE);
    asm.code
}

/// Page 0 payload: map all-RAM, then enter the program.
pub fn trampoline(entry: u16) -> Vec<u8> {
    use opcode::*;

    let mut asm = Asm::default();
    asm.op(&[LD_A_IMM, ALL_RAM])
        .op(&[OUT_IMM_A, BANK_REGISTER_0_PORT])
        .op_word(&[JP], entry)
        .nops(9);
    asm.code
}

/// Build a paged ROM image for `payload` loaded at `addresses`.
pub fn build_paged_rom(payload: &[u8], addresses: &AddressTriple) -> Result<Vec<u8>> {
    if payload.len() != addresses.len() {
        return Err(TranscodeError::InvalidContainer {
            message: format!(
                "payload is {} bytes but {} covers {}",
                payload.len(),
                addresses,
                addresses.len()
            ),
        });
    }

    let pages = 1 + payload.len().div_ceil(PAGE_PAYLOAD_SIZE);
    let mut rom = Vec::with_capacity(pages * ROM_PAGE_SIZE);
    let mut next_page = 1u8;

    rom.extend(page_loader(
        TRAMPOLINE_START,
        TRAMPOLINE_START + TRAMPOLINE_SIZE as u16,
        CONTINUATION_ENTRY,
        next_page,
    ));
    rom.extend(trampoline(addresses.entry));
    rom.resize(ROM_PAGE_SIZE, 0x00);

    let mut addr = addresses.start;
    for chunk in payload.chunks(PAGE_PAYLOAD_SIZE) {
        let stop = addr + chunk.len() as u16;
        let entry = if stop < addresses.stop_exclusive {
            CONTINUATION_ENTRY
        } else {
            TRAMPOLINE_START
        };
        next_page += 1;
        debug!(page = next_page - 1, start = addr, stop, entry, "rom page");

        rom.extend(page_loader(addr, stop, entry, next_page));
        rom.extend_from_slice(chunk);
        rom.resize(rom.len() + PAGE_PAYLOAD_SIZE - chunk.len(), 0x00);
        addr = stop;
    }

    Ok(rom)
}

/// Output name for a ROM built from a BLOAD file stem: the stem without its
/// address suffix, plus `_warrior.rom`.
pub fn rom_file_name(file_stem: &str) -> String {
    let prefix = super::bload::parse_address_suffix(file_stem)
        .map_or(file_stem, |(prefix, _)| prefix);
    format!("{prefix}_warrior.rom")
}

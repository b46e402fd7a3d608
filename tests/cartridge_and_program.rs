//! Black-box integration coverage: load a whole iNES image through the
//! public crate API and drive a hand-assembled 6502 program to completion,
//! rather than poking the CPU/bus/mapper pieces in isolation as the
//! colocated unit tests do.

use ferrite_nes::arena::Arena;
use ferrite_nes::cartridge::{Cartridge, Mirroring};
use ferrite_nes::config::Config;
use ferrite_nes::nes::Nes;

const PRG_SIZE: usize = 16 * 1024;

/// Build a minimal NROM (mapper 0) iNES image with `prg` placed at the start
/// of the 16 KiB PRG bank and the reset vector pointed at $8000.
fn build_nrom(prg: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; 16 + PRG_SIZE];
    rom[0..4].copy_from_slice(b"NES\x1A");
    rom[4] = 1; // one 16 KiB PRG bank
    rom[5] = 0; // no CHR ROM, falls back to CHR RAM
    rom[6] = 0; // horizontal mirroring, mapper low nibble 0, no trainer/battery

    let prg_start = 16;
    rom[prg_start..prg_start + prg.len()].copy_from_slice(prg);
    rom[prg_start + 0x3FFC] = 0x00; // reset vector low
    rom[prg_start + 0x3FFD] = 0x80; // reset vector high -> $8000
    rom
}

#[test]
fn parses_nrom_header_and_selects_mapper_zero() {
    let rom = build_nrom(&[]);
    let mut arena = Arena::new();
    let cartridge = Cartridge::from_bytes(&rom, &mut arena).expect("valid NROM image");
    assert_eq!(cartridge.header().mapper_number, 0);
    assert_eq!(cartridge.header().prg_rom_size, PRG_SIZE);
    assert_eq!(cartridge.header().mirroring, Mirroring::Horizontal);
}

#[test]
fn truncated_image_is_rejected() {
    let mut rom = build_nrom(&[]);
    rom.truncate(20);
    let mut arena = Arena::new();
    assert!(Cartridge::from_bytes(&rom, &mut arena).is_err());
}

#[test]
fn trainer_block_is_skipped_before_prg_data() {
    let mut prg = vec![0u8; PRG_SIZE];
    prg[0] = 0xA9; // LDA #$42
    prg[1] = 0x42;
    prg[0x3FFC] = 0x00;
    prg[0x3FFD] = 0x80;

    let mut rom = vec![0u8; 16];
    rom[0..4].copy_from_slice(b"NES\x1A");
    rom[4] = 1;
    rom[5] = 0;
    rom[6] = 0x04; // trainer present
    rom.extend(vec![0xFFu8; 512]); // trainer block, must be skipped
    rom.extend(prg);

    let mut arena = Arena::new();
    let cartridge = Cartridge::from_bytes(&rom, &mut arena).expect("trainer-bearing NROM image");
    assert_eq!(cartridge.read_prg(0x8000), 0xA9);
    assert_eq!(cartridge.read_prg(0x8001), 0x42);
}

#[test]
fn hand_assembled_loop_runs_to_completion_and_stores_result() {
    // LDX #$00
    // loop: INX
    //       CPX #$10
    //       BNE loop
    //       STX $10
    //       JMP self (park here once the loop result is stored)
    let program: &[u8] = &[
        0xA2, 0x00, // $8000 LDX #$00
        0xE8, //       $8002 INX
        0xE0, 0x10, // $8003 CPX #$10
        0xD0, 0xFB, // $8005 BNE $8002
        0x86, 0x10, // $8007 STX $10
        0x4C, 0x09, 0x80, // $8009 JMP $8009
    ];
    let mut prg = vec![0u8; PRG_SIZE];
    prg[..program.len()].copy_from_slice(program);
    prg[0x3FFC] = 0x00;
    prg[0x3FFD] = 0x80;

    let rom = build_nrom(&prg);
    let mut nes = Nes::new(Config::default());
    nes.load_cartridge(&rom).expect("valid NROM image");

    nes.run_frame();

    assert_eq!(nes.bus.read8(0x0010), 0x10);
    assert_eq!(nes.cpu.x, 0x10);
    assert_eq!(nes.cpu.pc, 0x8009);
}

//! NES cartridge implementation
//!
//! Handles the iNES / NES 2.0 ROM container format: header parsing, PRG/CHR
//! extraction, and dispatch to the mapper implementation named by the
//! header. Mapper objects own the PRG/CHR/PRG-RAM storage directly; the
//! cartridge is a thin header-metadata wrapper plus the boxed mapper.

use log::info;

use crate::arena::Arena;
use crate::error::RomError;
use crate::mappers::{self, Mapper};

const INES_HEADER_SIZE: usize = 16;
const PRG_ROM_BANK_UNIT: usize = 16 * 1024;
const CHR_ROM_BANK_UNIT: usize = 8 * 1024;

/// Nametable mirroring mode, either fixed by the header or overridden by the
/// active mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    SingleScreenLower,
    SingleScreenUpper,
    FourScreen,
}

/// Parsed iNES/NES 2.0 header fields, kept around for diagnostics and for
/// decisions (PRG-RAM sizing, trainer presence) that only matter at load
/// time.
#[derive(Debug, Clone, Copy)]
pub struct RomHeader {
    pub prg_rom_size: usize,
    pub chr_rom_size: usize,
    pub prg_ram_size: usize,
    pub mapper_number: u8,
    pub mirroring: Mirroring,
    pub has_battery: bool,
    pub is_nes2: bool,
    pub is_pal: bool,
}

impl RomHeader {
    fn parse(data: &[u8]) -> Result<(Self, bool), RomError> {
        if data.len() < INES_HEADER_SIZE || data[0..4] != [0x4E, 0x45, 0x53, 0x1A] {
            return Err(RomError::InvalidHeader);
        }

        let flags6 = data[6];
        let flags7 = data[7];
        let flags9 = data[9];
        let flags10 = data[10];

        let has_trainer = (flags6 & 0x04) != 0;
        let has_battery = (flags6 & 0x02) != 0;
        let four_screen = (flags6 & 0x08) != 0;
        let mirroring = if four_screen {
            Mirroring::FourScreen
        } else if (flags6 & 0x01) != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        let mapper_low = (flags6 >> 4) & 0x0F;
        let mapper_mid = flags7 & 0xF0;
        let is_nes2 = (flags7 & 0x0C) == 0x08;

        let (prg_rom_size, chr_rom_size, prg_ram_size, mapper_number) = if is_nes2 {
            let prg_hi = (flags9 & 0x0F) as usize;
            let chr_hi = ((flags9 >> 4) & 0x0F) as usize;
            let prg_rom_size = ((prg_hi << 8) | data[4] as usize) * PRG_ROM_BANK_UNIT;
            let chr_rom_size = ((chr_hi << 8) | data[5] as usize) * CHR_ROM_BANK_UNIT;
            let prg_ram_shift = flags10 & 0x0F;
            let prg_ram_size = if prg_ram_shift == 0 {
                0
            } else {
                64usize << prg_ram_shift
            };
            let mapper_high = ((data[8] as u16 & 0x0F) << 8) as u8;
            let mapper_number = mapper_high | mapper_mid | mapper_low;
            (prg_rom_size, chr_rom_size, prg_ram_size, mapper_number)
        } else {
            let prg_rom_size = data[4] as usize * PRG_ROM_BANK_UNIT;
            let chr_rom_size = data[5] as usize * CHR_ROM_BANK_UNIT;
            let prg_ram_size = if data[8] == 0 {
                8 * 1024
            } else {
                data[8] as usize * 8 * 1024
            };
            let mapper_number = mapper_mid | mapper_low;
            (prg_rom_size, chr_rom_size, prg_ram_size, mapper_number)
        };

        let is_pal = (flags9 & 0x01) != 0;

        Ok((
            RomHeader {
                prg_rom_size,
                chr_rom_size,
                prg_ram_size,
                mapper_number,
                mirroring,
                has_battery,
                is_nes2,
                is_pal,
            },
            has_trainer,
        ))
    }
}

pub struct Cartridge {
    mapper: Box<dyn Mapper>,
    header: RomHeader,
}

impl std::fmt::Debug for Cartridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cartridge")
            .field("mapper", &"<dyn Mapper>")
            .field("header", &self.header)
            .finish()
    }
}

impl Cartridge {
    /// Parse an iNES/NES 2.0 image and construct the mapper it names.
    /// Auxiliary mapper scratch (four-screen VRAM, MMC5 expansion RAM) is
    /// carved out of `arena`, which the caller resets between cart loads.
    pub fn from_bytes(data: &[u8], arena: &mut Arena) -> Result<Self, RomError> {
        let (header, has_trainer) = RomHeader::parse(data)?;

        let prg_start = if has_trainer {
            INES_HEADER_SIZE + 512
        } else {
            INES_HEADER_SIZE
        };
        let prg_end = prg_start + header.prg_rom_size;
        let chr_end = prg_end + header.chr_rom_size;

        if data.len() < chr_end {
            return Err(RomError::Truncated {
                expected: chr_end,
                found: data.len(),
            });
        }

        let prg_rom = data[prg_start..prg_end].to_vec();
        let chr_rom = if header.chr_rom_size == 0 {
            Vec::new()
        } else {
            data[prg_end..chr_end].to_vec()
        };

        let mapper = mappers::create_mapper(&header, prg_rom, chr_rom, arena)?;

        info!(
            "cartridge loaded: mapper {}, PRG {}KiB, CHR {}KiB, mirroring {:?}, battery {}, {}",
            header.mapper_number,
            header.prg_rom_size / 1024,
            if header.chr_rom_size == 0 { 8 } else { header.chr_rom_size / 1024 },
            header.mirroring,
            header.has_battery,
            if header.is_pal { "PAL" } else { "NTSC" },
        );

        Ok(Cartridge { mapper, header })
    }

    pub fn header(&self) -> &RomHeader {
        &self.header
    }

    pub fn read_prg(&self, addr: u16) -> u8 {
        self.mapper.read_prg(addr)
    }

    pub fn write_prg(&mut self, addr: u16, data: u8) {
        self.mapper.write_prg(addr, data);
    }

    pub fn read_chr(&mut self, addr: u16) -> u8 {
        self.mapper.read_chr(addr)
    }

    pub fn write_chr(&mut self, addr: u16, data: u8) {
        self.mapper.write_chr(addr, data);
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mapper.mirroring()
    }

    pub fn irq_pending(&self) -> bool {
        self.mapper.irq_pending()
    }

    pub fn acknowledge_irq(&mut self) {
        self.mapper.acknowledge_irq();
    }

    pub fn on_scanline_tick(&mut self) {
        self.mapper.on_scanline_tick();
    }

    pub fn on_cpu_cycle(&mut self) {
        self.mapper.on_cpu_cycle();
    }

    pub fn read_expansion(&self, addr: u16) -> Option<u8> {
        self.mapper.read_expansion(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_rom(prg_banks: u8, chr_banks: u8, flags6: u8, flags7: u8) -> Vec<u8> {
        let mut rom = vec![0u8; INES_HEADER_SIZE];
        rom[0..4].copy_from_slice(b"NES\x1A");
        rom[4] = prg_banks;
        rom[5] = chr_banks;
        rom[6] = flags6;
        rom[7] = flags7;
        rom.extend(vec![0u8; prg_banks as usize * PRG_ROM_BANK_UNIT]);
        rom.extend(vec![0u8; chr_banks as usize * CHR_ROM_BANK_UNIT]);
        rom
    }

    #[test]
    fn parses_ines_header_from_spec_example() {
        // "4E 45 53 1A 02 01 01 00 ..." — magic, PRG=2x16KiB, CHR=1x8KiB,
        // mirroring vertical, mapper 0.
        let rom = minimal_rom(2, 1, 0x01, 0x00);
        let (header, trainer) = RomHeader::parse(&rom).unwrap();
        assert!(!trainer);
        assert_eq!(header.prg_rom_size, 2 * PRG_ROM_BANK_UNIT);
        assert_eq!(header.chr_rom_size, CHR_ROM_BANK_UNIT);
        assert_eq!(header.mirroring, Mirroring::Vertical);
        assert_eq!(header.mapper_number, 0);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut rom = minimal_rom(1, 1, 0, 0);
        rom[0] = 0;
        assert_eq!(RomHeader::parse(&rom).unwrap_err(), RomError::InvalidHeader);
    }

    #[test]
    fn nes2_prg_ram_uses_shift_formula() {
        let mut rom = minimal_rom(1, 1, 0, 0x08); // flags7 NES2 marker bits = %10
        rom[10] = 0x02; // prg ram shift = 2 -> 64 << 2 = 256
        let (header, _) = RomHeader::parse(&rom).unwrap();
        assert!(header.is_nes2);
        assert_eq!(header.prg_ram_size, 64 << 2);
    }

    #[test]
    fn missing_chr_rom_is_not_an_error() {
        let rom = minimal_rom(1, 0, 0, 0);
        let mut arena = Arena::new();
        let cart = Cartridge::from_bytes(&rom, &mut arena).unwrap();
        assert_eq!(cart.header().chr_rom_size, 0);
    }

    #[test]
    fn trainer_present_shifts_prg_start_by_512_bytes() {
        let mut rom = vec![0u8; INES_HEADER_SIZE];
        rom[0..4].copy_from_slice(b"NES\x1A");
        rom[4] = 1; // one 16 KiB PRG bank
        rom[5] = 0;
        rom[6] = 0x04; // trainer present
        rom.extend(vec![0xEEu8; 512]); // trainer block
        let mut prg = vec![0u8; PRG_ROM_BANK_UNIT];
        prg[0] = 0xAA;
        rom.extend(prg);

        let mut arena = Arena::new();
        let cart = Cartridge::from_bytes(&rom, &mut arena).unwrap();
        assert_eq!(cart.read_prg(0x8000), 0xAA);
    }

    #[test]
    fn truncated_rom_is_rejected() {
        let mut rom = minimal_rom(2, 1, 0, 0);
        rom.truncate(rom.len() - 10);
        let mut arena = Arena::new();
        assert!(matches!(
            Cartridge::from_bytes(&rom, &mut arena).unwrap_err(),
            RomError::Truncated { .. }
        ));
    }
}

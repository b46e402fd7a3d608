//! Mapper 9 (MMC2)
//!
//! One switchable 8 KiB PRG bank at $8000-$9FFF, the last three 8 KiB banks
//! fixed above it, and two 4 KiB CHR windows each toggling between a pair
//! of banks based on a latch. The latch flips when the PPU fetches tile
//! $FD or $FE at specific pattern-table addresses during rendering, which
//! is how Punch-Out!! doubles its effective CHR set without CPU
//! intervention.

use super::Mapper;
use crate::cartridge::Mirroring;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Latch {
    Fd,
    Fe,
}

pub struct Mapper009 {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,

    prg_bank: u8,
    chr_fd_0000: u8,
    chr_fe_0000: u8,
    chr_fd_1000: u8,
    chr_fe_1000: u8,
    latch0: Latch,
    latch1: Latch,
    mirroring: Mirroring,
}

impl Mapper009 {
    pub fn new(prg_rom: Vec<u8>, chr_rom: Vec<u8>) -> Self {
        let chr = if chr_rom.is_empty() { vec![0u8; 8 * 1024] } else { chr_rom };
        Mapper009 {
            prg_rom,
            chr,
            prg_bank: 0,
            chr_fd_0000: 0,
            chr_fe_0000: 0,
            chr_fd_1000: 0,
            chr_fe_1000: 0,
            latch0: Latch::Fd,
            latch1: Latch::Fe,
            mirroring: Mirroring::Vertical,
        }
    }

    fn bank_count(&self) -> u8 {
        (self.prg_rom.len() / (8 * 1024)).max(1) as u8
    }

    fn bank_from_end(&self, n: u8) -> u8 {
        self.bank_count().saturating_sub(n)
    }

    fn chr_window(&self, addr: u16) -> (usize, usize) {
        let offset = (addr & 0x0FFF) as usize;
        if addr < 0x1000 {
            let bank = match self.latch0 {
                Latch::Fd => self.chr_fd_0000,
                Latch::Fe => self.chr_fe_0000,
            };
            (bank as usize * 4 * 1024, offset)
        } else {
            let bank = match self.latch1 {
                Latch::Fd => self.chr_fd_1000,
                Latch::Fe => self.chr_fe_1000,
            };
            (bank as usize * 4 * 1024, offset)
        }
    }

    fn update_latch(&mut self, addr: u16) {
        match addr & 0x1FFF {
            0x0FD8 => self.latch0 = Latch::Fd,
            0x0FE8 => self.latch0 = Latch::Fe,
            0x1FD8..=0x1FDF => self.latch1 = Latch::Fd,
            0x1FE8..=0x1FEF => self.latch1 = Latch::Fe,
            _ => {}
        }
    }
}

impl Mapper for Mapper009 {
    fn read_prg(&self, addr: u16) -> u8 {
        let bank = match addr {
            0x8000..=0x9FFF => self.prg_bank % self.bank_count(),
            0xA000..=0xBFFF => self.bank_from_end(3),
            0xC000..=0xDFFF => self.bank_from_end(2),
            0xE000..=0xFFFF => self.bank_from_end(1),
            _ => return 0,
        };
        self.prg_rom[bank as usize * 8 * 1024 + (addr & 0x1FFF) as usize]
    }

    fn write_prg(&mut self, addr: u16, data: u8) {
        match addr {
            0xA000..=0xAFFF => self.prg_bank = data & 0x0F,
            0xB000..=0xBFFF => self.chr_fd_0000 = data & 0x1F,
            0xC000..=0xCFFF => self.chr_fe_0000 = data & 0x1F,
            0xD000..=0xDFFF => self.chr_fd_1000 = data & 0x1F,
            0xE000..=0xEFFF => self.chr_fe_1000 = data & 0x1F,
            0xF000..=0xFFFF => {
                self.mirroring = if data & 0x01 == 0 { Mirroring::Vertical } else { Mirroring::Horizontal };
            }
            _ => {}
        }
    }

    fn read_chr(&mut self, addr: u16) -> u8 {
        let (base, offset) = self.chr_window(addr);
        let data = self.chr.get(base + offset).copied().unwrap_or(0);
        self.update_latch(addr);
        data
    }

    fn write_chr(&mut self, _addr: u16, _data: u8) {}

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn reset(&mut self) {
        self.prg_bank = 0;
        self.chr_fd_0000 = 0;
        self.chr_fe_0000 = 0;
        self.chr_fd_1000 = 0;
        self.chr_fe_1000 = 0;
        self.latch0 = Latch::Fd;
        self.latch1 = Latch::Fe;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_flips_on_trigger_tile_fetch_and_selects_new_bank() {
        let mut chr = vec![0u8; 32 * 4 * 1024];
        chr[1 * 4 * 1024] = 0xAB; // chr_fe_0000 bank 1
        let mut m = Mapper009::new(vec![0u8; 5 * 8 * 1024], chr);
        m.chr_fe_0000 = 1;
        assert_eq!(m.latch0, Latch::Fd);
        m.read_chr(0x0FE8);
        assert_eq!(m.latch0, Latch::Fe);
        assert_eq!(m.read_chr(0x0000), 0xAB);
    }

    #[test]
    fn upper_prg_banks_are_fixed_to_the_last_three() {
        let mut prg = vec![0u8; 5 * 8 * 1024];
        prg[4 * 8 * 1024] = 0x11;
        let m = Mapper009::new(prg, Vec::new());
        assert_eq!(m.read_prg(0xE000), 0x11);
    }
}

//! Mapper implementations for NES cartridges
//!
//! The NES uses pluggable memory mappers on the cartridge to extend the
//! console's native 32 KiB PRG / 8 KiB CHR address windows. Each mapper is
//! a capability object implementing [`Mapper`]; `create_mapper` selects one
//! by the header's mapper number.

mod mapper000; // NROM
mod mapper001; // MMC1
mod mapper002; // UxROM
mod mapper003; // CNROM
mod mapper004; // MMC3
mod mapper005; // MMC5
mod mapper007; // AxROM
mod mapper009; // MMC2
mod mapper069; // FME-7
mod mapper071; // Camerica/Codemasters
mod mapper180; // UNROM-180

pub use mapper000::Mapper000;
pub use mapper001::Mapper001;
pub use mapper002::Mapper002;
pub use mapper003::Mapper003;
pub use mapper004::Mapper004;
pub use mapper005::Mapper005;
pub use mapper007::Mapper007;
pub use mapper009::Mapper009;
pub use mapper069::Mapper069;
pub use mapper071::Mapper071;
pub use mapper180::Mapper180;

use crate::arena::Arena;
use crate::cartridge::{Mirroring, RomHeader};
use crate::error::RomError;

/// Capability object every mapper implements. CHR accessors take `&mut
/// self` because at least one required mapper (MMC2) mutates bank-select
/// latches as a side effect of a CHR fetch.
pub trait Mapper: Send {
    fn read_prg(&self, addr: u16) -> u8;
    fn write_prg(&mut self, addr: u16, data: u8);
    fn read_chr(&mut self, addr: u16) -> u8;
    fn write_chr(&mut self, addr: u16, data: u8);
    fn mirroring(&self) -> Mirroring;

    /// Whether the mapper currently has an unacknowledged IRQ request.
    fn irq_pending(&self) -> bool {
        false
    }
    fn acknowledge_irq(&mut self) {}

    /// IRQ clock driven once per rendering-enabled visible scanline. MMC3
    /// treats this the same as a precise PPU address-line-12 rising edge
    /// would; MMC5 treats it as a literal scanline counter.
    fn on_scanline_tick(&mut self) {}

    /// CPU clock, called once per CPU cycle elapsed. FME-7's IRQ counter is
    /// driven directly off the CPU clock rather than PPU rendering events.
    fn on_cpu_cycle(&mut self) {}

    /// Mapper-owned memory exposed outside the normal PRG window (MMC5
    /// expansion RAM, FME-7 RAM-as-PRG slots read through $5000-$5FFF).
    fn read_expansion(&self, _addr: u16) -> Option<u8> {
        None
    }

    fn reset(&mut self);
}

pub(crate) fn chr_ram_or_rom(chr_rom: Vec<u8>, ram_size: usize) -> (Vec<u8>, bool) {
    if chr_rom.is_empty() {
        (vec![0u8; ram_size], true)
    } else {
        (chr_rom, false)
    }
}

/// Build the mapper named by the ROM header. Mapper-specific auxiliary
/// memory (four-screen nametable pages, MMC5 expansion RAM) is carved from
/// `arena`.
pub fn create_mapper(
    header: &RomHeader,
    prg_rom: Vec<u8>,
    chr_rom: Vec<u8>,
    arena: &mut Arena,
) -> Result<Box<dyn Mapper>, RomError> {
    let prg_ram = vec![0u8; header.prg_ram_size.max(8 * 1024)];
    let mirroring = header.mirroring;

    let mapper: Box<dyn Mapper> = match header.mapper_number {
        0 => Box::new(Mapper000::new(prg_rom, chr_rom, mirroring)),
        1 => Box::new(Mapper001::new(prg_rom, chr_rom, prg_ram, mirroring)),
        2 => Box::new(Mapper002::new(prg_rom, chr_rom, mirroring)),
        3 => Box::new(Mapper003::new(prg_rom, chr_rom, mirroring)),
        4 => Box::new(Mapper004::new(prg_rom, chr_rom, prg_ram, mirroring)),
        5 => Box::new(Mapper005::new(prg_rom, chr_rom, prg_ram, arena)?),
        7 => Box::new(Mapper007::new(prg_rom, chr_rom)),
        9 => Box::new(Mapper009::new(prg_rom, chr_rom)),
        69 => Box::new(Mapper069::new(prg_rom, chr_rom, prg_ram)),
        71 => Box::new(Mapper071::new(prg_rom, chr_rom, mirroring)),
        180 => Box::new(Mapper180::new(prg_rom, chr_rom, mirroring)),
        other => return Err(RomError::UnsupportedMapper(other)),
    };

    Ok(mapper)
}

//! CPU-facing memory bus and the "vram bus" the PPU reaches through it.
//!
//! The CPU only ever holds a `&mut Bus`; the PPU, APU shadow, controllers and
//! cartridge are reached exclusively through it, which is what keeps the
//! three components from holding back-references to each other. `read8`/
//! `write8` resolve the CPU's 8 KiB-granularity bank (`addr >> 13`) for the
//! internal-RAM region and dispatch everything else by the documented
//! address ranges. The PPU's own nametable/palette/CHR access is exposed as
//! a handful of methods here (the "vram bus") that `Ppu::tick` calls back
//! into via a disjoint borrow of this struct's fields.
//!
//! Memory Map:
//! - 0x0000 - 0x1FFF: 2KB internal RAM, mirrored every 0x0800
//! - 0x2000 - 0x3FFF: PPU registers, mirrored every 8
//! - 0x4000 - 0x4017: APU and I/O registers
//! - 0x4018 - 0x401F: APU/IO test registers, normally disabled
//! - 0x4020 - 0xFFFF: cartridge space

use log::trace;

use crate::apu::Apu;
use crate::arena::Arena;
use crate::cartridge::{Cartridge, Mirroring};
use crate::controller::Controller;
use crate::error::RomError;
use crate::ppu::Ppu;

const RAM_SIZE: usize = 0x0800;
const NAMETABLE_PAGE_SIZE: usize = 0x0400;

/// Four 1 KiB nametable slots, each pointing at one of the backing pages.
/// Two pages live in console-internal VRAM; four-screen carts contribute two
/// more, carved out of the auxiliary arena at cartridge insertion.
pub struct Bus {
    ram: [u8; RAM_SIZE],
    nametables: [u8; NAMETABLE_PAGE_SIZE * 2],
    four_screen_pages: Option<Vec<u8>>,
    palette_ram: [u8; 32],

    pub ppu: Ppu,
    pub apu: Apu,
    pub controller1: Controller,
    pub controller2: Controller,
    cartridge: Option<Cartridge>,

    open_bus: u8,
    total_cycles: u64,
}

impl Bus {
    pub fn new() -> Self {
        Bus {
            ram: [0; RAM_SIZE],
            nametables: [0; NAMETABLE_PAGE_SIZE * 2],
            four_screen_pages: None,
            palette_ram: [0; 32],
            ppu: Ppu::new(),
            apu: Apu::new(),
            controller1: Controller::new(),
            controller2: Controller::new(),
            cartridge: None,
            open_bus: 0,
            total_cycles: 0,
        }
    }

    pub fn reset(&mut self) {
        self.ram = [0; RAM_SIZE];
        self.nametables = [0; NAMETABLE_PAGE_SIZE * 2];
        self.palette_ram = [0; 32];
        self.ppu.reset();
        self.apu.reset();
        self.controller1.reset();
        self.controller2.reset();
        self.open_bus = 0;
        self.total_cycles = 0;
        if let Some(cart) = &mut self.cartridge {
            // Mapper register state persists across a soft reset on real
            // hardware; only the console side resets here.
            let _ = cart;
        }
    }

    /// Insert a cartridge, carving out four-screen nametable backing from
    /// `arena` if the header requests it.
    pub fn insert_cartridge(&mut self, cartridge: Cartridge, arena: &mut Arena) -> Result<(), RomError> {
        if cartridge.mirroring() == Mirroring::FourScreen {
            self.four_screen_pages = Some(arena.alloc_zeroed(NAMETABLE_PAGE_SIZE * 2)?);
        } else {
            self.four_screen_pages = None;
        }
        self.cartridge = Some(cartridge);
        Ok(())
    }

    pub fn remove_cartridge(&mut self) {
        self.cartridge = None;
        self.four_screen_pages = None;
    }

    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.cartridge.as_ref()
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Advance mapper-visible clocks by `cycles` CPU cycles (FME-7's IRQ
    /// counter is driven this way rather than off PPU activity).
    pub fn tick_cpu_cycles(&mut self, cycles: u32) {
        self.total_cycles += cycles as u64;
        if let Some(cart) = &mut self.cartridge {
            for _ in 0..cycles {
                cart.on_cpu_cycle();
            }
        }
    }

    pub fn read8(&mut self, addr: u16) -> u8 {
        let value = match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            0x2000..=0x3FFF => self.ppu_register_read(addr & 0x2007),
            0x4000..=0x4015 => self.apu.read_register(addr),
            0x4016 => (self.open_bus & 0xE0) | (self.controller1.read() & 0x01),
            0x4017 => (self.open_bus & 0xE0) | (self.controller2.read() & 0x01),
            0x4018..=0x401F => {
                trace!("read from disabled APU/IO test register ${:04X}", addr);
                self.open_bus
            }
            0x4020..=0xFFFF => {
                if let Some(cart) = &self.cartridge {
                    cart.read_prg(addr)
                } else {
                    self.open_bus
                }
            }
        };
        self.open_bus = value;
        value
    }

    /// Returns the number of extra CPU cycles consumed (OAM DMA stall).
    pub fn write8(&mut self, addr: u16, data: u8) -> u32 {
        self.open_bus = data;
        match addr {
            0x0000..=0x1FFF => {
                self.ram[(addr & 0x07FF) as usize] = data;
                0
            }
            0x2000..=0x3FFF => {
                self.ppu_register_write(addr & 0x2007, data);
                0
            }
            0x4014 => self.oam_dma(data),
            0x4016 => {
                self.controller1.write(data);
                self.controller2.write(data);
                0
            }
            0x4000..=0x4017 => {
                self.apu.write_register(addr, data);
                0
            }
            0x4018..=0x401F => {
                trace!("write to disabled APU/IO test register ${:04X} = ${:02X}", addr, data);
                0
            }
            0x4020..=0xFFFF => {
                if let Some(cart) = &mut self.cartridge {
                    cart.write_prg(addr, data);
                } else {
                    trace!("write to cartridge space with no cartridge: ${:04X}", addr);
                }
                0
            }
        }
    }

    fn oam_dma(&mut self, page: u8) -> u32 {
        let base = (page as u16) << 8;
        for i in 0..256u16 {
            let byte = self.read8(base + i);
            self.ppu.oam_dma_write(byte);
        }
        if self.total_cycles % 2 == 1 {
            514
        } else {
            513
        }
    }

    fn ppu_register_read(&mut self, reg: u16) -> u8 {
        let Bus { ppu, nametables, four_screen_pages, palette_ram, cartridge, open_bus, .. } = self;
        ppu.cpu_read(reg, *open_bus, &mut VramView { nametables, four_screen_pages, palette_ram, cartridge })
    }

    fn ppu_register_write(&mut self, reg: u16, data: u8) {
        let Bus { ppu, nametables, four_screen_pages, palette_ram, cartridge, .. } = self;
        ppu.cpu_write(reg, data, &mut VramView { nametables, four_screen_pages, palette_ram, cartridge });
    }

    /// Advance the PPU by one dot, driving the two-executor pixel pipeline
    /// through the same vram view the register handlers use. Sets `nmi` true
    /// exactly once, on entry to vblank. The mapper's scanline IRQ clock is
    /// driven from `a12_rise` alone, which fires exactly once per
    /// rendering-enabled visible scanline; mappers that only count scanlines
    /// (MMC5) and mappers that model a precise A12 edge (MMC3) both read
    /// that as their single clock source, so it is never delivered twice for
    /// the same scanline and never fires during vblank or with rendering
    /// disabled.
    pub fn tick_ppu(&mut self) -> PpuTickResult {
        let Bus { ppu, nametables, four_screen_pages, palette_ram, cartridge, .. } = self;
        let mut view = VramView { nametables, four_screen_pages, palette_ram, cartridge };
        let result = ppu.tick(&mut view);
        if result.a12_rise {
            if let Some(cart) = &mut self.cartridge {
                cart.on_scanline_tick();
            }
        }
        result
    }

    pub fn irq_pending(&self) -> bool {
        self.apu.irq_pending() || self.cartridge.as_ref().map_or(false, |c| c.irq_pending())
    }

    pub fn acknowledge_cartridge_irq(&mut self) {
        if let Some(cart) = &mut self.cartridge {
            cart.acknowledge_irq();
        }
    }
}

/// A disjoint, reborrowed view of the pieces of [`Bus`] the PPU needs: the
/// console-internal nametable pages, the four-screen extension (if any), the
/// palette, and the cartridge for CHR reads and the active mirroring mode.
pub struct VramView<'a> {
    pub(crate) nametables: &'a mut [u8; NAMETABLE_PAGE_SIZE * 2],
    pub(crate) four_screen_pages: &'a mut Option<Vec<u8>>,
    pub(crate) palette_ram: &'a mut [u8; 32],
    pub(crate) cartridge: &'a mut Option<Cartridge>,
}

impl<'a> VramView<'a> {
    pub fn read_chr(&mut self, addr: u16) -> u8 {
        self.cartridge.as_mut().map_or(0, |c| c.read_chr(addr))
    }

    pub fn write_chr(&mut self, addr: u16, data: u8) {
        if let Some(cart) = self.cartridge.as_mut() {
            cart.write_chr(addr, data);
        }
    }

    pub fn mirroring(&self) -> Mirroring {
        self.cartridge.as_ref().map_or(Mirroring::Horizontal, |c| c.mirroring())
    }

    pub fn read_nametable(&self, addr: u16) -> u8 {
        let (page, offset) = self.nametable_slot(addr);
        page[offset]
    }

    pub fn write_nametable(&mut self, addr: u16, data: u8) {
        let mirroring = self.mirroring();
        let slot = (addr >> 10) & 0x03;
        let offset = (addr & 0x03FF) as usize;
        match physical_page(mirroring, slot) {
            PhysicalPage::Internal(n) => self.nametables[n * NAMETABLE_PAGE_SIZE + offset] = data,
            PhysicalPage::FourScreen(n) => {
                if let Some(extra) = self.four_screen_pages.as_mut() {
                    extra[n * NAMETABLE_PAGE_SIZE + offset] = data;
                }
            }
        }
    }

    fn nametable_slot(&self, addr: u16) -> (&[u8], usize) {
        let mirroring = self.mirroring();
        let slot = (addr >> 10) & 0x03;
        let offset = (addr & 0x03FF) as usize;
        match physical_page(mirroring, slot) {
            PhysicalPage::Internal(n) => (&self.nametables[n * NAMETABLE_PAGE_SIZE..][..NAMETABLE_PAGE_SIZE], offset),
            PhysicalPage::FourScreen(n) => match self.four_screen_pages.as_deref() {
                Some(extra) => (&extra[n * NAMETABLE_PAGE_SIZE..][..NAMETABLE_PAGE_SIZE], offset),
                None => (&self.nametables[0..NAMETABLE_PAGE_SIZE], offset),
            },
        }
    }

    pub fn read_palette(&self, addr: u16) -> u8 {
        self.palette_ram[mirror_palette_addr(addr)]
    }

    pub fn write_palette(&mut self, addr: u16, data: u8) {
        self.palette_ram[mirror_palette_addr(addr)] = data;
    }
}

enum PhysicalPage {
    Internal(usize),
    FourScreen(usize),
}

/// Maps a nametable slot (0-3) to its backing page under the active
/// mirroring mode. Horizontal and vertical use the two console-internal
/// pages; the single-screen modes collapse all four slots onto one page;
/// four-screen routes all four slots to distinct pages, the upper two
/// supplied by the cartridge's arena-backed extension.
fn physical_page(mirroring: Mirroring, slot: u16) -> PhysicalPage {
    match mirroring {
        Mirroring::Horizontal => PhysicalPage::Internal((slot >> 1) as usize),
        Mirroring::Vertical => PhysicalPage::Internal((slot & 0x01) as usize),
        Mirroring::SingleScreenLower => PhysicalPage::Internal(0),
        Mirroring::SingleScreenUpper => PhysicalPage::Internal(1),
        Mirroring::FourScreen => match slot {
            0 => PhysicalPage::Internal(0),
            1 => PhysicalPage::Internal(1),
            2 => PhysicalPage::FourScreen(0),
            _ => PhysicalPage::FourScreen(1),
        },
    }
}

fn mirror_palette_addr(addr: u16) -> usize {
    let addr = addr & 0x1F;
    if addr >= 0x10 && addr & 0x03 == 0 {
        (addr & 0x0F) as usize
    } else {
        addr as usize
    }
}

pub struct PpuTickResult {
    pub nmi: bool,
    pub a12_rise: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ram_mirrors_across_four_images() {
        let mut bus = Bus::new();
        bus.write8(0x0042, 0x7A);
        assert_eq!(bus.read8(0x0842), 0x7A);
        assert_eq!(bus.read8(0x1042), 0x7A);
        assert_eq!(bus.read8(0x1842), 0x7A);
    }

    #[test]
    fn unmapped_cartridge_space_reads_open_bus() {
        let mut bus = Bus::new();
        bus.write8(0x00FF, 0x55); // sets open_bus via RAM write path
        assert_eq!(bus.read8(0x6000), 0x55);
    }

    #[test]
    fn oam_dma_parity_changes_stall_length() {
        let mut bus = Bus::new();
        bus.tick_cpu_cycles(1); // total_cycles = 1 (odd)
        let cycles = bus.write8(0x4014, 0x00);
        assert_eq!(cycles, 514);
    }

    #[test]
    fn palette_mirror_law_3f10_aliases_3f00() {
        let mut bus = Bus::new();
        let Bus { nametables, four_screen_pages, palette_ram, cartridge, .. } = &mut bus;
        let mut view = VramView { nametables, four_screen_pages, palette_ram, cartridge };
        view.write_palette(0x3F10, 0x2C);
        assert_eq!(view.read_palette(0x3F00), 0x2C);
    }
}

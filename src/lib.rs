//! ferrite-nes: a Nintendo Entertainment System core for constrained
//! dual-core microcontroller targets.
//!
//! The crate is organized around [`bus::Bus`], which owns the PPU, APU
//! register shadow, controllers, and the active cartridge, so the CPU only
//! ever needs a single mutable borrow. See `DESIGN.md` for how each module
//! maps back to the system it models.

pub mod apu;
pub mod arena;
pub mod bus;
pub mod cartridge;
pub mod config;
pub mod controller;
pub mod cpu;
pub mod error;
pub mod mappers;
pub mod nes;
pub mod ppu;
pub mod scanout;
pub mod scheduler;

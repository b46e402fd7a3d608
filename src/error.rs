//! Error taxonomy for the NES core
//!
//! The core distinguishes exactly two failure modes that can occur before a
//! cartridge is playable: a malformed ROM image, and exhaustion of the
//! auxiliary bump allocator used for mapper scratch space. Nothing else in
//! the core is fallible — illegal opcodes execute as NOP, out-of-range bus
//! accesses read open-bus, and mapper IRQ storms are simply latched (see
//! the crate-level error handling notes).

use thiserror::Error;

/// Errors that can occur while parsing an iNES/NES 2.0 ROM image.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RomError {
    #[error("missing or invalid iNES header magic")]
    InvalidHeader,

    #[error("ROM file truncated: expected at least {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("unsupported mapper number: {0}")]
    UnsupportedMapper(u8),

    #[error("mapper auxiliary memory allocation failed: {0}")]
    ExpansionMemory(#[from] ArenaError),
}

/// Raised when the auxiliary bump arena cannot satisfy an allocation during
/// mapper initialization (e.g. four-screen nametable VRAM).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("auxiliary arena exhausted: requested {requested} bytes, {remaining} remaining")]
pub struct ArenaError {
    pub requested: usize,
    pub remaining: usize,
}

/// Top-level error type for cartridge load, composing the two taxonomy
/// members above. The host harness downcasts or matches on this; library
/// callers elsewhere should prefer the specific error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error(transparent)]
    Rom(#[from] RomError),

    #[error(transparent)]
    Arena(#[from] ArenaError),
}

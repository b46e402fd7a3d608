//! Command-line entry point: loads a ROM, applies an optional TOML config,
//! and either opens an interactive window or (with `--snapshot`) runs a
//! fixed number of frames headlessly and writes the result to a PNG.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use ferrite_nes::config::Config;
use ferrite_nes::nes::Nes;
use ferrite_nes::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH};

#[derive(Parser, Debug)]
#[command(name = "ferrite-nes", version, about = "A Nintendo Entertainment System core")]
struct Cli {
    /// Path to an iNES/NES 2.0 ROM image.
    rom: PathBuf,

    /// Optional TOML configuration file; falls back to built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run headlessly for this many frames and write a PNG snapshot instead
    /// of opening a window.
    #[arg(long, requires = "snapshot")]
    frames: Option<u64>,

    /// Output path for a headless snapshot (see `--frames`).
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let rom_data = fs::read(&cli.rom).with_context(|| format!("failed to read ROM {}", cli.rom.display()))?;

    let mut nes = Nes::new(config);
    nes.load_cartridge(&rom_data).with_context(|| "failed to load cartridge")?;

    match (&cli.snapshot, cli.frames) {
        (Some(path), Some(frames)) => run_headless(&mut nes, frames, path),
        _ => nes.run(),
    }
}

fn run_headless(nes: &mut Nes, frames: u64, path: &PathBuf) -> Result<()> {
    for _ in 0..frames {
        nes.run_frame();
    }

    let mut rgb8 = vec![0u8; (SCREEN_WIDTH * SCREEN_HEIGHT * 3) as usize];
    for (i, &pixel) in nes.display().iter().enumerate() {
        let r = ((pixel >> 11) & 0x1F) as u8;
        let g = ((pixel >> 5) & 0x3F) as u8;
        let b = (pixel & 0x1F) as u8;
        rgb8[i * 3] = (r << 3) | (r >> 2);
        rgb8[i * 3 + 1] = (g << 2) | (g >> 4);
        rgb8[i * 3 + 2] = (b << 3) | (b >> 2);
    }

    let image = image::RgbImage::from_raw(SCREEN_WIDTH, SCREEN_HEIGHT, rgb8)
        .context("framebuffer size did not match image dimensions")?;
    image.save(path).with_context(|| format!("failed to write snapshot to {}", path.display()))?;
    Ok(())
}

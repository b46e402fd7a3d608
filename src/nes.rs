//! Top-level system wiring: owns the CPU, the bus (which in turn owns the
//! PPU/APU/controllers/cartridge), the auxiliary arena, and the scanout
//! compositor, and drives the per-frame CPU/PPU stepping loop the host
//! harness calls into.

use anyhow::{Context, Result};
use log::{debug, info};
use sdl2::{
    event::Event,
    keyboard::Keycode,
    pixels::PixelFormatEnum,
    render::TextureCreator,
    video::WindowContext,
};

use crate::arena::Arena;
use crate::bus::Bus;
use crate::cartridge::Cartridge;
use crate::config::Config;
use crate::controller::Controller;
use crate::cpu::Cpu;
use crate::error::RomError;
use crate::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::scanout::{Compositor, Orientation};

/// CPU cycles per NTSC frame (the PPU runs at 3x this rate).
const CYCLES_PER_FRAME: u32 = 29780;

/// The NES system: CPU, bus-owned peripherals, and the host-facing scanout
/// path.
pub struct Nes {
    pub cpu: Cpu,
    pub bus: Bus,
    arena: Arena,
    compositor: Compositor,
    display: Vec<u16>,
    config: Config,
}

impl Nes {
    pub fn new(config: Config) -> Self {
        let mut bus = Bus::new();
        bus.ppu.set_tv_system(config.tv_system());
        let compositor = Compositor::new(crate::scheduler::Scheduler::new(config.scheduler_mode()), Orientation::RowMajor);

        Nes {
            cpu: Cpu::new(),
            bus,
            arena: Arena::new(),
            compositor,
            display: vec![0u16; (SCREEN_WIDTH * SCREEN_HEIGHT) as usize],
            config,
        }
    }

    /// Load an NES cartridge from raw iNES/NES 2.0 ROM bytes and reset the
    /// system onto it. The auxiliary arena is reclaimed first, since mapper
    /// scratch from any previously loaded cart is no longer reachable.
    pub fn load_cartridge(&mut self, rom_data: &[u8]) -> Result<(), RomError> {
        self.arena.reset();
        let cartridge = Cartridge::from_bytes(rom_data, &mut self.arena)?;
        self.bus.insert_cartridge(cartridge, &mut self.arena)?;
        self.reset();
        info!("cartridge loaded successfully");
        Ok(())
    }

    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu.reset(&mut self.bus);
    }

    /// The composited, overlay-applied RGB565 framebuffer, row-major
    /// regardless of the sink's own orientation (the compositor resolves
    /// orientation when it writes into this buffer).
    pub fn display(&self) -> &[u16] {
        &self.display
    }

    pub fn overlay_lines(&mut self, frame: u64, skipped_frames: u64, extra: &[&str]) {
        self.compositor.overlay.set_lines(frame, skipped_frames, extra);
    }

    /// Run one frame's worth of CPU cycles (the NTSC frame length of 29780
    /// CPU cycles), ticking the PPU three times and servicing any NMI edge
    /// for every CPU cycle consumed, then composite the finished frame.
    pub fn run_frame(&mut self) {
        let mut cycles_run = 0u32;
        while cycles_run < CYCLES_PER_FRAME {
            let cpu_cycles = self.cpu.step(&mut self.bus);
            self.bus.tick_cpu_cycles(cpu_cycles);
            cycles_run += cpu_cycles;

            for _ in 0..cpu_cycles * 3 {
                let result = self.bus.tick_ppu();
                if result.nmi {
                    self.cpu.request_nmi();
                }
            }
        }
        self.composite_frame();
        debug!("frame completed, {} cycles run", cycles_run);
    }

    fn composite_frame(&mut self) {
        let split = (SCREEN_WIDTH / 2) as usize;
        for y in 0..SCREEN_HEIGHT as u16 {
            let start = y as usize * SCREEN_WIDTH as usize;
            let row = &self.bus.ppu.framebuffer()[start..start + SCREEN_WIDTH as usize];
            self.compositor.composite_scanline(y, row, &mut self.display, split);
        }
    }

    /// Open a window and run the interactive emulation loop until the user
    /// closes it or presses Escape.
    pub fn run(&mut self) -> Result<()> {
        let scale = self.config_scale();
        let key_bindings = self.build_key_bindings();

        let sdl_context = sdl2::init().map_err(|e| anyhow::anyhow!("failed to initialize SDL2: {}", e))?;
        let video_subsystem = sdl_context
            .video()
            .map_err(|e| anyhow::anyhow!("failed to initialize SDL2 video subsystem: {}", e))?;
        let window = video_subsystem
            .window("ferrite-nes", SCREEN_WIDTH * scale, SCREEN_HEIGHT * scale)
            .position_centered()
            .build()
            .with_context(|| "failed to create window")?;

        let mut canvas = window
            .into_canvas()
            .accelerated()
            .present_vsync()
            .build()
            .with_context(|| "failed to create canvas")?;

        let texture_creator: TextureCreator<WindowContext> = canvas.texture_creator();
        let mut texture = texture_creator
            .create_texture_streaming(PixelFormatEnum::RGB565, SCREEN_WIDTH, SCREEN_HEIGHT)
            .with_context(|| "failed to create texture")?;
        canvas
            .set_scale(scale as f32, scale as f32)
            .map_err(|e| anyhow::anyhow!("failed to set canvas scale: {}", e))?;

        let mut event_pump = sdl_context
            .event_pump()
            .map_err(|e| anyhow::anyhow!("failed to get event pump: {}", e))?;

        'running: loop {
            for event in event_pump.poll_iter() {
                match event {
                    Event::Quit { .. } | Event::KeyDown { keycode: Some(Keycode::Escape), .. } => break 'running,
                    Event::KeyDown { keycode: Some(key), .. } => self.handle_key(&key_bindings, key, true),
                    Event::KeyUp { keycode: Some(key), .. } => self.handle_key(&key_bindings, key, false),
                    _ => {}
                }
            }

            self.run_frame();

            let pixels = self.display_bytes();
            texture
                .update(None, &pixels, SCREEN_WIDTH as usize * 2)
                .with_context(|| "failed to update texture")?;

            canvas.copy(&texture, None, None).map_err(|e| anyhow::anyhow!("failed to copy texture: {}", e))?;
            canvas.present();
        }

        Ok(())
    }

    fn config_scale(&self) -> u32 {
        self.config.window_scale
    }

    fn display_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.display.len() * 2);
        for &pixel in &self.display {
            bytes.extend_from_slice(&pixel.to_le_bytes());
        }
        bytes
    }

    fn build_key_bindings(&self) -> Vec<(Keycode, u8)> {
        let map = &self.config.controller1_keymap;
        [
            (&map.a, Controller::BUTTON_A),
            (&map.b, Controller::BUTTON_B),
            (&map.select, Controller::BUTTON_SELECT),
            (&map.start, Controller::BUTTON_START),
            (&map.up, Controller::BUTTON_UP),
            (&map.down, Controller::BUTTON_DOWN),
            (&map.left, Controller::BUTTON_LEFT),
            (&map.right, Controller::BUTTON_RIGHT),
        ]
        .into_iter()
        .filter_map(|(name, button)| Keycode::from_name(name).map(|key| (key, button)))
        .collect()
    }

    fn handle_key(&mut self, bindings: &[(Keycode, u8)], key: Keycode, pressed: bool) {
        for (bound_key, button) in bindings {
            if *bound_key == key {
                self.bus.controller1.set_button_pressed(*button, pressed);
            }
        }
    }
}

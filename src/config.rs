//! Host harness configuration, loaded from an optional TOML file and
//! overridable from the command line (see `main.rs`).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ppu::TvSystem;
use crate::scheduler::Mode as SchedulerMode;

fn default_scale() -> u32 {
    3
}

fn default_tv_system() -> String {
    "ntsc".to_string()
}

fn default_scheduler_mode() -> String {
    "single-threaded".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window_scale: u32,
    pub tv_system: String,
    pub scheduler_mode: String,
    pub controller1_keymap: KeyMap,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            window_scale: default_scale(),
            tv_system: default_tv_system(),
            scheduler_mode: default_scheduler_mode(),
            controller1_keymap: KeyMap::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyMap {
    pub a: String,
    pub b: String,
    pub select: String,
    pub start: String,
    pub up: String,
    pub down: String,
    pub left: String,
    pub right: String,
}

impl Default for KeyMap {
    fn default() -> Self {
        KeyMap {
            a: "Z".into(),
            b: "X".into(),
            select: "RShift".into(),
            start: "Return".into(),
            up: "Up".into(),
            down: "Down".into(),
            left: "Left".into(),
            right: "Right".into(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn tv_system(&self) -> TvSystem {
        match self.tv_system.to_ascii_lowercase().as_str() {
            "pal" => TvSystem::Pal,
            "dendy" => TvSystem::Dendy,
            _ => TvSystem::Ntsc,
        }
    }

    pub fn scheduler_mode(&self) -> SchedulerMode {
        match self.scheduler_mode.to_ascii_lowercase().as_str() {
            "two-executor" | "dual" => SchedulerMode::TwoExecutor,
            _ => SchedulerMode::SingleThreaded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load(Path::new("/nonexistent/path/to/config.toml")).unwrap();
        assert_eq!(config.window_scale, 3);
    }

    #[test]
    fn unknown_tv_system_string_defaults_to_ntsc() {
        let mut config = Config::default();
        config.tv_system = "unknown".to_string();
        assert_eq!(config.tv_system(), TvSystem::Ntsc);
    }

    #[test]
    fn parses_partial_toml_with_serde_defaults() {
        let config: Config = toml::from_str("window_scale = 4\n").unwrap();
        assert_eq!(config.window_scale, 4);
        assert_eq!(config.tv_system, "ntsc");
    }
}

// Configuration loaded from vkut.toml
//
// Every section falls back to sensible defaults when the file or a field is
// missing, so a bare `Config::load()` always succeeds.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

pub const CONFIG_FILE: &str = "vkut.toml";

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub camera: CameraConfig,
    pub debug: DebugConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "vkut".to_string(),
            width: 1280,
            height: 720,
            fullscreen: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    /// "fifo" (vsync), "fifo_relaxed", "mailbox" or "immediate".
    pub present_mode: String,
    pub clear_color: [f32; 4],
    /// Swap-chain depth; also the number of presentation sync slots.
    pub frame_count: usize,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            present_mode: "fifo".to_string(),
            clear_color: [0.0, 0.0, 0.0, 0.0],
            frame_count: 3,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub move_speed: f32,
    pub turn_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            move_speed: 20.0,
            turn_speed: std::f32::consts::FRAC_PI_2,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub show_fps: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            show_fps: true,
        }
    }
}

impl Config {
    /// Load configuration from vkut.toml, falling back to defaults on any error.
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE).unwrap_or_else(|e| {
            log::warn!("Failed to load {}: {}. Using defaults.", CONFIG_FILE, e);
            Config::default()
        })
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Preferred present mode as a Vulkan enum. FIFO is the fallback since it
    /// is the only mode every driver must support.
    pub fn preferred_present_mode(&self) -> ash::vk::PresentModeKHR {
        use ash::vk::PresentModeKHR;
        match self.graphics.present_mode.to_lowercase().as_str() {
            "immediate" => PresentModeKHR::IMMEDIATE,
            "mailbox" => PresentModeKHR::MAILBOX,
            "fifo" => PresentModeKHR::FIFO,
            "fifo_relaxed" => PresentModeKHR::FIFO_RELAXED,
            other => {
                log::warn!("Unknown present mode '{}', defaulting to FIFO", other);
                PresentModeKHR::FIFO
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;

    #[test]
    fn defaults_when_unparsed() {
        let config = Config::default();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.graphics.frame_count, 3);
        assert_eq!(config.preferred_present_mode(), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn parses_partial_toml() {
        let config = Config::parse(
            r#"
            [window]
            title = "demo"
            width = 800

            [graphics]
            present_mode = "mailbox"
            "#,
        )
        .unwrap();
        assert_eq!(config.window.title, "demo");
        assert_eq!(config.window.width, 800);
        // Unset fields keep their defaults.
        assert_eq!(config.window.height, 720);
        assert_eq!(config.preferred_present_mode(), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn unknown_present_mode_falls_back_to_fifo() {
        let mut config = Config::default();
        config.graphics.present_mode = "triple-turbo".into();
        assert_eq!(config.preferred_present_mode(), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load_from_path("definitely/not/here.toml").unwrap();
        assert_eq!(config.graphics.frame_count, 3);
    }
}

//! # Engine Configuration
//!
//! Configuration for the window, the surface/render pipeline and shader
//! lookup. Every section has sensible defaults so an empty file (or no file
//! at all) yields a working setup.
//!
//! ## Configuration Categories
//!
//! - **Window Config**: title, initial size, fullscreen
//! - **Rendering Config**: background rendering, overscan, tile scale
//! - **Shader Config**: where program sources live and which GLSL dialect
//!   they are written in

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use crate::config::{Config, ConfigError};

/// Fixed left inset applied when `static_overscan` is enabled.
pub const STATIC_OVERSCAN_LEFT: i32 = 24;

/// Fixed top inset applied when `static_overscan` is enabled.
pub const STATIC_OVERSCAN_TOP: i32 = 16;

/// # Window Configuration
///
/// A width and height of zero (without fullscreen) opens a maximized window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial width in pixels
    pub width: u32,
    /// Initial height in pixels
    pub height: u32,
    /// Open on the primary monitor in fullscreen
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Pyland".to_string(),
            width: 600,
            height: 400,
            fullscreen: false,
        }
    }
}

/// # Rendering Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderingConfig {
    /// Always render into an offscreen buffer and blit to the window
    pub force_background_rendering: bool,
    /// Use the fixed overscan insets instead of the explicit ones below
    pub static_overscan: bool,
    /// Left inset in pixels for foreground surfaces
    pub overscan_left: i32,
    /// Top inset in pixels for foreground surfaces
    pub overscan_top: i32,
    /// Pixels per map tile
    pub tile_pixels: f32,
    /// RGBA clear colour
    pub clear_color: [f32; 4],
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            force_background_rendering: false,
            static_overscan: false,
            overscan_left: 0,
            overscan_top: 0,
            tile_pixels: 32.0,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl RenderingConfig {
    /// Effective `(left, top)` overscan in pixels
    pub fn overscan(&self) -> (i32, i32) {
        if self.static_overscan {
            (STATIC_OVERSCAN_LEFT, STATIC_OVERSCAN_TOP)
        } else {
            (self.overscan_left, self.overscan_top)
        }
    }
}

/// GLSL flavour the shader sources are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShaderDialect {
    /// Desktop OpenGL, `.glv` / `.glf`
    DesktopGl,
    /// OpenGL ES, `.glesv` / `.glesf`
    Gles,
}

impl ShaderDialect {
    /// File extension of vertex shader sources
    pub fn vertex_extension(self) -> &'static str {
        match self {
            Self::DesktopGl => "glv",
            Self::Gles => "glesv",
        }
    }

    /// File extension of fragment shader sources
    pub fn fragment_extension(self) -> &'static str {
        match self {
            Self::DesktopGl => "glf",
            Self::Gles => "glesf",
        }
    }
}

/// # Shader Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Directory containing `<name>.<ext>` program sources
    pub search_dir: PathBuf,
    /// Dialect, which selects file extensions
    pub dialect: ShaderDialect,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            search_dir: PathBuf::from("resources/shaders"),
            dialect: ShaderDialect::DesktopGl,
        }
    }
}

/// # Engine Configuration
///
/// Top-level configuration consumed by [`crate::engine::Engine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Main window settings
    pub window: WindowConfig,
    /// Surface and render pipeline settings
    pub rendering: RenderingConfig,
    /// Shader lookup settings
    pub shaders: ShaderConfig,
    /// Default log filter used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            rendering: RenderingConfig::default(),
            shaders: ShaderConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Check values that parse fine but cannot drive the engine
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.rendering.tile_pixels.is_finite() && self.rendering.tile_pixels > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "tile_pixels must be positive, got {}",
                self.rendering.tile_pixels
            )));
        }
        if self.shaders.search_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("shader search_dir is empty".to_string()));
        }
        if self.window.fullscreen && (self.window.width == 0 || self.window.height == 0) {
            return Err(ConfigError::Invalid(
                "fullscreen windows need an explicit size".to_string(),
            ));
        }
        Ok(())
    }
}

impl Config for EngineConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rendering.overscan(), (0, 0));
        assert_eq!(config.shaders.dialect, ShaderDialect::DesktopGl);
    }

    #[test]
    fn test_static_overscan_overrides_explicit_insets() {
        let rendering = RenderingConfig {
            static_overscan: true,
            overscan_left: 3,
            overscan_top: 7,
            ..RenderingConfig::default()
        };
        assert_eq!(rendering.overscan(), (24, 16));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            "[rendering]\nforce_background_rendering = true\n\n[shaders]\ndialect = \"Gles\"\n",
        )
        .unwrap();

        assert!(config.rendering.force_background_rendering);
        assert_eq!(config.shaders.dialect, ShaderDialect::Gles);
        assert_eq!(config.window, WindowConfig::default());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.rendering.tile_pixels = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = EngineConfig::default();
        config.shaders.search_dir = PathBuf::new();
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.window = WindowConfig {
            width: 0,
            height: 0,
            fullscreen: true,
            ..WindowConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dialect_extensions() {
        assert_eq!(ShaderDialect::DesktopGl.vertex_extension(), "glv");
        assert_eq!(ShaderDialect::DesktopGl.fragment_extension(), "glf");
        assert_eq!(ShaderDialect::Gles.vertex_extension(), "glesv");
        assert_eq!(ShaderDialect::Gles.fragment_extension(), "glesf");
    }
}

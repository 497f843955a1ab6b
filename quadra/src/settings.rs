use std::fs;
use std::io;
use std::path::PathBuf;

use engine::regression::env_flag;
use serde::{Deserialize, Serialize};

use crate::theme::ThemeId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GpuSettings {
    pub enabled: bool,
}

impl Default for GpuSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardSettings {
    pub cols: u32,
    pub rows: u32,
    /// Cells never shrink below this many pixels, even in a tiny window.
    pub min_cell_px: u32,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            cols: 10,
            rows: 20,
            min_cell_px: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WindowSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderSettings {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub theme: ThemeId,
    #[serde(default)]
    pub gpu: GpuSettings,
    #[serde(default)]
    pub board: BoardSettings,
    #[serde(default)]
    pub window: WindowSettings,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            version: default_version(),
            theme: ThemeId::default(),
            gpu: GpuSettings::default(),
            board: BoardSettings::default(),
            window: WindowSettings::default(),
        }
    }
}

impl RenderSettings {
    pub fn sanitized(mut self) -> Self {
        self.version = default_version();
        self.board.cols = self.board.cols.clamp(4, 40);
        self.board.rows = self.board.rows.clamp(4, 60);
        self.board.min_cell_px = self.board.min_cell_px.clamp(2, 64);
        self.window.width = self.window.width.clamp(320, 7680);
        self.window.height = self.window.height.clamp(240, 4320);
        self
    }

    /// Applies `QUADRA_DISABLE_GPU` and `QUADRA_THEME`.
    pub fn with_env_overrides(mut self) -> Self {
        if env_flag("QUADRA_DISABLE_GPU") {
            self.gpu.enabled = false;
        }
        if let Ok(name) = std::env::var("QUADRA_THEME") {
            match name.parse::<ThemeId>() {
                Ok(theme) => self.theme = theme,
                Err(err) => log::warn!("ignoring QUADRA_THEME: {err}"),
            }
        }
        self
    }
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_env() -> Self {
        if let Some(explicit) = std::env::var_os("QUADRA_SETTINGS_PATH") {
            return Self {
                path: PathBuf::from(explicit),
            };
        }

        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME").map(|home| {
                    let mut p = PathBuf::from(home);
                    p.push(".config");
                    p
                })
            })
            .unwrap_or_else(|| PathBuf::from("."));

        let mut path = base;
        path.push("quadra");
        path.push("settings.json");
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn load(&self) -> RenderSettings {
        let Ok(bytes) = fs::read(&self.path) else {
            return RenderSettings::default();
        };
        serde_json::from_slice::<RenderSettings>(&bytes)
            .map(RenderSettings::sanitized)
            .unwrap_or_else(|err| {
                log::warn!("invalid settings at {}: {err}", self.path.display());
                RenderSettings::default()
            })
    }

    pub fn save(&self, settings: &RenderSettings) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(settings)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_clamps_board_and_window() {
        let settings = RenderSettings {
            version: 7,
            board: BoardSettings {
                cols: 1,
                rows: 500,
                min_cell_px: 0,
            },
            window: WindowSettings {
                width: 10,
                height: 100_000,
            },
            ..RenderSettings::default()
        }
        .sanitized();

        assert_eq!(settings.version, 1);
        assert_eq!(settings.board.cols, 4);
        assert_eq!(settings.board.rows, 60);
        assert_eq!(settings.board.min_cell_px, 2);
        assert_eq!(settings.window.width, 320);
        assert_eq!(settings.window.height, 4320);
    }

    #[test]
    fn serde_defaults_fill_missing_sections() {
        let parsed: RenderSettings = serde_json::from_str(r#"{"theme":"wolf-hour"}"#)
            .expect("settings JSON should parse");
        assert_eq!(parsed.theme, ThemeId::WolfHour);
        assert_eq!(parsed.gpu, GpuSettings::default());
        assert_eq!(parsed.board, BoardSettings::default());
    }

    #[test]
    fn store_round_trips_through_disk_and_falls_back_on_garbage() {
        let dir = std::env::temp_dir().join(format!("quadra_settings_{}", std::process::id()));
        let store = SettingsStore::new(dir.join("settings.json"));
        assert_eq!(store.load(), RenderSettings::default(), "missing file");

        let mut settings = RenderSettings::default();
        settings.theme = ThemeId::CrystalCave;
        settings.gpu.enabled = false;
        store.save(&settings).expect("save");
        assert_eq!(store.load(), settings);

        fs::write(store.path(), b"{ not json").expect("write garbage");
        assert_eq!(store.load(), RenderSettings::default());
        let _ = fs::remove_dir_all(dir);
    }
}

// Player settings and persistence
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Settings shared by both playback controllers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSettings {
    pub version: i32, // Settings schema version for future migrations
    /// Initial output volume, 0.0 to 1.0
    pub volume: f32,
    /// How often the elapsed/progress callbacks fire, in milliseconds
    pub tick_interval_ms: u64,
    /// Engine ring-buffer depth, in milliseconds of audio
    pub buffer_ms: u64,
    /// Output device name; None picks the system default
    pub device: Option<String>,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            version: 1,
            volume: 1.0,
            tick_interval_ms: 1000,
            buffer_ms: 250,
            device: None,
        }
    }
}

impl PlayerSettings {
    /// Load settings from file, or return defaults if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            log::debug!("no settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read settings file: {}", e))?;

        let settings: PlayerSettings =
            serde_json::from_str(&content).map_err(|e| format!("Failed to parse settings: {}", e))?;

        Ok(settings)
    }

    /// Save settings to file
    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| format!("Failed to create settings directory: {}", e))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        fs::write(path, content).map_err(|e| format!("Failed to write settings file: {}", e))?;

        Ok(())
    }
}

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::EditorError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub frame_rate: u32,
    pub looping: bool,
    pub onion_skin: bool,
    pub brush_size: u32,
    pub color: String,
    /// Background classification workers.
    pub workers: usize,
    /// Decoded bitmaps kept for redraw / compositing.
    pub cache_capacity: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            canvas_width: 882,
            canvas_height: 582,
            frame_rate: 12,
            looping: false,
            onion_skin: false,
            brush_size: 12,
            color: "#332941".into(),
            workers: 2,
            cache_capacity: 256,
        }
    }
}

impl EditorConfig {
    pub fn from_json(text: &str) -> Result<Self, EditorError> { Ok(serde_json::from_str(text)?) }

    pub fn load(path: &Path) -> Result<Self, EditorError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

use renderer::{parse_color, Brush, CompositeMode, Rgba};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
}

pub const MIN_BRUSH: u32 = 1;
pub const MAX_BRUSH: u32 = 100;

#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub tool: Tool,
    color: String,
    rgba: Rgba<u8>,
    brush_size: u32,
}

impl ToolSettings {
    pub fn new(color: &str, brush_size: u32) -> Self {
        let mut settings = Self { tool: Tool::Brush, color: "#332941".into(), rgba: Rgba([0x33, 0x29, 0x41, 255]), brush_size: 12 };
        settings.set_color(color);
        settings.set_brush_size(brush_size);
        settings
    }

    pub fn color(&self) -> &str { &self.color }

    pub fn brush_size(&self) -> u32 { self.brush_size }

    /// Keeps the previous color when `color` does not parse.
    pub fn set_color(&mut self, color: &str) -> bool {
        match parse_color(color) {
            Ok(rgba) => {
                self.color = color.to_string();
                self.rgba = rgba;
                true
            }
            Err(err) => {
                tracing::debug!("color rejected: {err}");
                false
            }
        }
    }

    pub fn set_brush_size(&mut self, size: u32) { self.brush_size = size.clamp(MIN_BRUSH, MAX_BRUSH); }

    /// Stroke parameters for a gesture starting now.
    pub fn brush(&self) -> Brush {
        let mode = match self.tool {
            Tool::Brush => CompositeMode::SourceOver,
            Tool::Eraser => CompositeMode::DestinationOut,
        };
        Brush { mode, color: self.rgba, width: self.brush_size as f32 }
    }
}

impl Default for ToolSettings {
    fn default() -> Self { Self::new("#332941", 12) }
}

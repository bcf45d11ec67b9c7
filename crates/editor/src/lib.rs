//! Editing session for frame-by-frame raster animation.
//!
//! [`Editor`] owns the timeline, the undo history, the per-layer drawing
//! surfaces and the playback scheduler. UI code calls its mutators and reads
//! its accessors; it never touches the pieces directly.

use thiserror::Error;

mod config;
mod drawing;
mod editor;
pub mod playback;
mod registry;
mod tools;

pub use config::EditorConfig;
pub use drawing::{DrawingSession, GestureState};
pub use editor::{Editor, Shortcut};
pub use playback::{PlayState, PlaybackEvent, PlaybackSettings};
pub use registry::{SurfaceHandle, SurfaceRegistry};
pub use tools::{Tool, ToolSettings};

pub use renderer::{Point, Surface};
pub use timeline::{ActionKind, Direction, Frame, FrameFill, KeyframeState, Layer, LayerId};

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),
}

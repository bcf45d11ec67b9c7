use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

mod history;
mod layer;
mod store;

pub use history::{ActionKind, History, Snapshot};
pub use layer::{Bitmap, Keyframe, KeyframeState, Layer, LayerSettings};
pub use store::{Direction, FrameFill, TimelineStore};

#[derive(Debug, Error, PartialEq)]
pub enum TimelineError {
    #[error("layer name must not be empty")]
    EmptyName,
    #[error("layer name '{0}' is already taken")]
    NameTaken(String),
    #[error("opacity {0} is outside 0.0..=1.0")]
    OpacityOutOfRange(f32),
    #[error("layer {0} not found")]
    UnknownLayer(LayerId),
    #[error("keyframe {0} not found")]
    UnknownKeyframe(KeyframeId),
    #[error("layer is already at the {0:?} boundary")]
    AtBoundary(Direction),
    #[error("cannot delete the last layer")]
    LastLayer,
}

pub type Frame = usize; // 0-based frame index into the timeline

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(Uuid);

impl LayerId {
    pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for LayerId {
    fn default() -> Self { Self::new() }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyframeId(Uuid);

impl KeyframeId {
    pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for KeyframeId {
    fn default() -> Self { Self::new() }
}

impl fmt::Display for KeyframeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{KeyframeId, LayerId};

/// Opaque, immutable bitmap payload.
///
/// The core never parses it; the renderer decides what the string means.
/// Clones share storage, so snapshots never copy pixel data. The empty
/// string is the blank bitmap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bitmap(Arc<str>);

impl Bitmap {
    pub fn blank() -> Self { Self(Arc::from("")) }

    pub fn new(payload: impl Into<Arc<str>>) -> Self { Self(payload.into()) }

    pub fn is_blank(&self) -> bool { self.0.is_empty() }

    pub fn as_str(&self) -> &str { &self.0 }

    /// True when both handles point at the same stored payload.
    pub fn same_payload(&self, other: &Bitmap) -> bool { Arc::ptr_eq(&self.0, &other.0) }
}

impl Default for Bitmap {
    fn default() -> Self { Self::blank() }
}

impl From<String> for Bitmap {
    fn from(s: String) -> Self { Self(Arc::from(s)) }
}

impl From<&str> for Bitmap {
    fn from(s: &str) -> Self { Self(Arc::from(s)) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyframeState {
    #[default]
    Empty,
    Filled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub id: KeyframeId,
    pub layer: LayerId,
    pub state: KeyframeState,
    pub bitmap: Bitmap,
}

impl Keyframe {
    pub fn blank(layer: LayerId) -> Self {
        Self { id: KeyframeId::new(), layer, state: KeyframeState::Empty, bitmap: Bitmap::blank() }
    }

    /// Fresh identity carrying the same payload and classification.
    pub fn duplicate(&self) -> Self {
        Self { id: KeyframeId::new(), layer: self.layer, state: self.state, bitmap: self.bitmap.clone() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerSettings {
    pub opacity: f32,
    pub hidden: bool,
    pub locked: bool,
    pub level: usize,
}

impl LayerSettings {
    pub fn at_level(level: usize) -> Self { Self { opacity: 1.0, hidden: false, locked: false, level } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub settings: LayerSettings,
    pub keyframes: Vec<Keyframe>,
}

impl Layer {
    /// A new layer always starts with one blank keyframe.
    pub fn new(name: impl Into<String>, level: usize) -> Self {
        let id = LayerId::new();
        Self { id, name: name.into(), settings: LayerSettings::at_level(level), keyframes: vec![Keyframe::blank(id)] }
    }

    pub fn level(&self) -> usize { self.settings.level }

    pub fn keyframe_at(&self, frame: usize) -> Option<&Keyframe> { self.keyframes.get(frame) }

    /// A layer is drawable at `frame` iff its own sequence reaches that index.
    pub fn is_drawable_at(&self, frame: usize) -> bool { frame < self.keyframes.len() }

    pub fn keyframe_index(&self, id: KeyframeId) -> Option<usize> { self.keyframes.iter().position(|k| k.id == id) }
}

use renderer::{Brush, Point, RenderError, Surface};
use timeline::{Bitmap, Frame, KeyframeId, Layer, LayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureState {
    Idle,
    Active,
}

#[derive(Debug, Clone)]
struct ActiveStroke {
    keyframe: KeyframeId,
    frame: Frame,
    brush: Brush,
    last: Point,
    touched: bool,
}

/// Result of ending a gesture.
#[derive(Debug)]
pub(crate) struct FinishedStroke {
    pub keyframe: KeyframeId,
    pub frame: Frame,
    /// Whether any stroke segment changed a pixel.
    pub touched: bool,
    pub bitmap: Result<Bitmap, RenderError>,
}

/// Pointer-gesture state machine for one layer surface: idle -> active -> idle.
#[derive(Debug, Clone)]
pub struct DrawingSession {
    layer: LayerId,
    stroke: Option<ActiveStroke>,
}

impl DrawingSession {
    pub fn new(layer: LayerId) -> Self { Self { layer, stroke: None } }

    pub fn layer(&self) -> LayerId { self.layer }

    pub fn state(&self) -> GestureState {
        if self.stroke.is_some() { GestureState::Active } else { GestureState::Idle }
    }

    /// Pointer-down. Refused unless `layer` has a keyframe at `frame`.
    ///
    /// `brush` is sampled here and used for the whole gesture.
    pub fn begin(&mut self, layer: &Layer, frame: Frame, brush: Brush, at: Point) -> bool {
        if self.stroke.is_some() || layer.id != self.layer { return false; }
        let Some(keyframe) = layer.keyframe_at(frame) else { return false };
        self.stroke = Some(ActiveStroke { keyframe: keyframe.id, frame, brush, last: at, touched: false });
        true
    }

    /// Pointer-move. Ignored while idle.
    pub fn extend(&mut self, surface: &mut Surface, to: Point) -> bool {
        let Some(stroke) = self.stroke.as_mut() else { return false };
        let changed = surface.stroke_segment(&stroke.brush, stroke.last, to);
        stroke.last = to;
        stroke.touched |= changed;
        changed
    }

    /// Pointer-up / pointer-leave: serialises the surface and returns to idle.
    pub(crate) fn finish(&mut self, surface: &Surface) -> Option<FinishedStroke> {
        let stroke = self.stroke.take()?;
        Some(FinishedStroke { keyframe: stroke.keyframe, frame: stroke.frame, touched: stroke.touched, bitmap: surface.to_bitmap() })
    }

    /// Drops an in-flight gesture without committing.
    pub fn cancel(&mut self) { self.stroke = None; }
}

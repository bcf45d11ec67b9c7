use image::{Rgba, RgbaImage};
use timeline::Bitmap;

use crate::{codec, RenderError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self { Self { x, y } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositeMode {
    /// Paint over existing pixels.
    #[default]
    SourceOver,
    /// Erase towards transparency.
    DestinationOut,
}

/// Stroke parameters, fixed for the length of one gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush {
    pub mode: CompositeMode,
    pub color: Rgba<u8>,
    pub width: f32,
}

/// A fixed-size RGBA drawing target, one per layer.
#[derive(Debug, Clone)]
pub struct Surface {
    pixels: RgbaImage,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self { Self { pixels: RgbaImage::new(width, height) } }

    pub fn width(&self) -> u32 { self.pixels.width() }
    pub fn height(&self) -> u32 { self.pixels.height() }
    pub fn image(&self) -> &RgbaImage { &self.pixels }

    pub fn clear(&mut self) {
        for p in self.pixels.pixels_mut() { *p = Rgba([0, 0, 0, 0]); }
    }

    pub fn is_transparent(&self) -> bool { codec::is_transparent(&self.pixels) }

    /// Draws `image` at the origin, clipped to the surface, with source-over blending.
    pub fn draw_image(&mut self, image: &RgbaImage, opacity: f32) {
        let w = self.width().min(image.width());
        let h = self.height().min(image.height());
        for y in 0..h {
            for x in 0..w {
                blend_over(self.pixels.get_pixel_mut(x, y), *image.get_pixel(x, y), opacity);
            }
        }
    }

    /// Serialises the current pixels to a bitmap payload.
    pub fn to_bitmap(&self) -> Result<Bitmap, RenderError> { codec::encode_image(&self.pixels) }

    /// Strokes a round-capped segment. Returns whether any pixel changed.
    pub fn stroke_segment(&mut self, brush: &Brush, from: Point, to: Point) -> bool {
        // thin brushes still cover the pixel nearest the path
        let radius = (brush.width / 2.0).max(0.75);
        let min_x = (from.x.min(to.x) - radius).floor().max(0.0) as u32;
        let min_y = (from.y.min(to.y) - radius).floor().max(0.0) as u32;
        let max_x = (from.x.max(to.x) + radius).ceil().min(self.width() as f32);
        let max_y = (from.y.max(to.y) + radius).ceil().min(self.height() as f32);
        if max_x <= 0.0 || max_y <= 0.0 { return false; }
        let (max_x, max_y) = (max_x as u32, max_y as u32);

        let mut changed = false;
        for y in min_y..max_y {
            for x in min_x..max_x {
                let center = Point::new(x as f32 + 0.5, y as f32 + 0.5);
                if distance_to_segment(center, from, to) > radius { continue; }
                let px = self.pixels.get_pixel_mut(x, y);
                let before = *px;
                match brush.mode {
                    CompositeMode::SourceOver => blend_over(px, brush.color, 1.0),
                    CompositeMode::DestinationOut => erase(px, brush.color[3]),
                }
                changed |= *px != before;
            }
        }
        changed
    }
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 { 0.0 } else { (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0) };
    let (cx, cy) = (a.x + t * dx, a.y + t * dy);
    ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt()
}

/// Non-premultiplied source-over.
fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>, opacity: f32) {
    let sa = src[3] as f32 / 255.0 * opacity.clamp(0.0, 1.0);
    if sa <= 0.0 { return; }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        let v = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        dst[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

fn erase(dst: &mut Rgba<u8>, strength: u8) {
    let keep = 1.0 - strength as f32 / 255.0;
    let a = (dst[3] as f32 * keep).round() as u8;
    *dst = if a == 0 { Rgba([0, 0, 0, 0]) } else { Rgba([dst[0], dst[1], dst[2], a]) };
}

//! Raster side of the editor.
//!
//! - Payload codec (PNG data URLs <-> RGBA) and keyframe classification
//! - Fixed-size drawing surfaces with brush / eraser strokes
//! - Decoded-bitmap cache shared by redraw and compositing

use thiserror::Error;

pub mod cache;
pub mod codec;
pub mod color;
pub mod surface;

pub use cache::BitmapCache;
pub use codec::{classify, decode_bitmap, encode_image};
pub use color::parse_color;
pub use surface::{Brush, CompositeMode, Point, Surface};

pub use image::{Rgba, RgbaImage};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("bitmap payload is blank")]
    Blank,
    #[error("bitmap payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),
    #[error("unrecognised color '{0}'")]
    Color(String),
}

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{ImageFormat, RgbaImage};
use timeline::{Bitmap, KeyframeState};

use crate::RenderError;

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Decodes a payload into RGBA pixels.
///
/// Accepts `data:<mime>;base64,<data>` URLs as well as bare base64.
pub fn decode_bitmap(bitmap: &Bitmap) -> Result<RgbaImage, RenderError> {
    if bitmap.is_blank() { return Err(RenderError::Blank); }
    let raw = bitmap.as_str();
    let encoded = match raw.find("base64,") {
        Some(idx) if raw.starts_with("data:") => &raw[idx + "base64,".len()..],
        _ => raw,
    };
    let bytes = BASE64.decode(encoded.trim())?;
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

/// Serialises pixels to a PNG data URL. Fully transparent images become the blank bitmap.
pub fn encode_image(image: &RgbaImage) -> Result<Bitmap, RenderError> {
    if is_transparent(image) { return Ok(Bitmap::blank()); }
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(Bitmap::from(format!("{DATA_URL_PREFIX}{}", BASE64.encode(&buf))))
}

pub fn is_transparent(image: &RgbaImage) -> bool { image.pixels().all(|p| p.0[3] == 0) }

/// `Empty` iff every pixel's alpha is zero. Undecodable payloads count as empty.
pub fn classify(bitmap: &Bitmap) -> KeyframeState {
    if bitmap.is_blank() { return KeyframeState::Empty; }
    match decode_bitmap(bitmap) {
        Ok(image) if !is_transparent(&image) => KeyframeState::Filled,
        Ok(_) => KeyframeState::Empty,
        Err(err) => {
            tracing::warn!("classify: undecodable payload treated as empty: {err}");
            KeyframeState::Empty
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn dot(x: u32, y: u32) -> RgbaImage {
        let mut img = RgbaImage::new(8, 8);
        img.put_pixel(x, y, Rgba([10, 20, 30, 255]));
        img
    }

    #[test]
    fn transparent_image_encodes_to_blank() {
        let bitmap = encode_image(&RgbaImage::new(4, 4)).unwrap();
        assert!(bitmap.is_blank());
        assert_eq!(classify(&bitmap), KeyframeState::Empty);
    }

    #[test]
    fn painted_pixels_survive_the_data_url() {
        let bitmap = encode_image(&dot(3, 5)).unwrap();
        assert!(bitmap.as_str().starts_with(DATA_URL_PREFIX));
        let back = decode_bitmap(&bitmap).unwrap();
        assert_eq!(back.dimensions(), (8, 8));
        assert_eq!(*back.get_pixel(3, 5), Rgba([10, 20, 30, 255]));
        assert_eq!(classify(&bitmap), KeyframeState::Filled);
    }

    #[test]
    fn bare_base64_is_accepted() {
        let url = encode_image(&dot(0, 0)).unwrap();
        let bare = Bitmap::from(url.as_str().trim_start_matches(DATA_URL_PREFIX));
        assert!(decode_bitmap(&bare).is_ok());
    }

    #[test]
    fn garbage_is_an_error_and_classifies_empty() {
        let junk = Bitmap::from("data:image/png;base64,!!!not-base64");
        assert!(matches!(decode_bitmap(&junk), Err(RenderError::Base64(_))));
        let not_png = Bitmap::from(BASE64.encode(b"hello"));
        assert!(matches!(decode_bitmap(&not_png), Err(RenderError::Image(_))));
        assert_eq!(classify(&junk), KeyframeState::Empty);
    }

    #[test]
    fn identical_pixels_encode_identically() {
        assert_eq!(encode_image(&dot(1, 1)).unwrap(), encode_image(&dot(1, 1)).unwrap());
    }
}

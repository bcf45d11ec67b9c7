use image::Rgba;

use crate::RenderError;

/// Parses `#rrggbb`, `#rgb` and `rgb(r, g, b)` into an opaque color.
pub fn parse_color(input: &str) -> Result<Rgba<u8>, RenderError> {
    let s = input.trim();
    let bad = || RenderError::Color(input.to_string());
    if let Some(hex) = s.strip_prefix('#') {
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Err(bad()),
        };
        let v = u32::from_str_radix(&expanded, 16).map_err(|_| bad())?;
        return Ok(Rgba([((v >> 16) & 0xff) as u8, ((v >> 8) & 0xff) as u8, (v & 0xff) as u8, 255]));
    }
    let body = s.strip_prefix("rgb(").and_then(|rest| rest.strip_suffix(')')).ok_or_else(bad)?;
    let parts: Vec<u8> = body.split(',').map(|p| p.trim().parse::<u8>()).collect::<Result<_, _>>().map_err(|_| bad())?;
    match parts.as_slice() {
        [r, g, b] => Ok(Rgba([*r, *g, *b, 255])),
        _ => Err(bad()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_palette_forms() {
        assert_eq!(parse_color("#332941").unwrap(), Rgba([0x33, 0x29, 0x41, 255]));
        assert_eq!(parse_color("#fff").unwrap(), Rgba([255, 255, 255, 255]));
        assert_eq!(parse_color("rgb(207, 126, 207)").unwrap(), Rgba([207, 126, 207, 255]));
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["", "#12", "#gggggg", "rgb(1,2)", "rgb(1,2,300)", "blue"] {
            assert!(parse_color(bad).is_err(), "{bad}");
        }
    }
}

//! Color specifications and the AutoCAD Color Index (ACI) palette.

use std::fmt;
use std::str::FromStr;

/// A resolved color: `BYLAYER`, `BYBLOCK`, a true color or a native index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpec {
    ByLayer,
    ByBlock,
    Rgb(u8, u8, u8),
    Index(u8),
}

impl ColorSpec {
    /// Parse a color value. Accepts the `BYLAYER`/`BYBLOCK` literals, `#RGB`
    /// and `#RRGGBB`, native indices `1`–`255`, and CSS color names.
    pub fn parse(value: &str) -> Option<ColorSpec> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if value.eq_ignore_ascii_case("bylayer") {
            return Some(ColorSpec::ByLayer);
        }
        if value.eq_ignore_ascii_case("byblock") {
            return Some(ColorSpec::ByBlock);
        }
        if let Some(hex) = value.strip_prefix('#') {
            return parse_hex(hex);
        }
        if value.bytes().all(|b| b.is_ascii_digit()) {
            return match value.parse::<u16>() {
                Ok(index @ 1..=255) => Some(ColorSpec::Index(index as u8)),
                _ => None,
            };
        }
        if value.eq_ignore_ascii_case("none")
            || value.eq_ignore_ascii_case("transparent")
            || value.eq_ignore_ascii_case("currentcolor")
        {
            return None;
        }
        svgtypes::Color::from_str(value)
            .ok()
            .map(|c| ColorSpec::Rgb(c.red, c.green, c.blue))
    }

    /// RGB value, looking indices up in the ACI palette.
    pub fn rgb(&self) -> Option<(u8, u8, u8)> {
        match *self {
            ColorSpec::Rgb(r, g, b) => Some((r, g, b)),
            ColorSpec::Index(index) => Some(aci_rgb(index)),
            ColorSpec::ByLayer | ColorSpec::ByBlock => None,
        }
    }

    /// DXF group 62 value: 256 for `BYLAYER`, 0 for `BYBLOCK`, otherwise the
    /// (nearest) palette index.
    pub fn aci(&self) -> i16 {
        match *self {
            ColorSpec::ByLayer => 256,
            ColorSpec::ByBlock => 0,
            ColorSpec::Index(index) => i16::from(index),
            ColorSpec::Rgb(r, g, b) => i16::from(nearest_aci(r, g, b)),
        }
    }

    /// DXF group 420 value for true colors.
    pub fn true_color(&self) -> Option<i32> {
        match *self {
            ColorSpec::Rgb(r, g, b) => Some(i32::from(r) << 16 | i32::from(g) << 8 | i32::from(b)),
            _ => None,
        }
    }
}

impl fmt::Display for ColorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorSpec::ByLayer => f.write_str("BYLAYER"),
            ColorSpec::ByBlock => f.write_str("BYBLOCK"),
            ColorSpec::Rgb(r, g, b) => write!(f, "#{:02X}{:02X}{:02X}", r, g, b),
            ColorSpec::Index(index) => write!(f, "{}", index),
        }
    }
}

impl FromStr for ColorSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColorSpec::parse(s).ok_or_else(|| format!("Invalid color: {:?}", s))
    }
}

fn parse_hex(hex: &str) -> Option<ColorSpec> {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let expand = |i: usize| channel(&hex[i..=i].repeat(2));
            Some(ColorSpec::Rgb(expand(0)?, expand(1)?, expand(2)?))
        }
        6 => Some(ColorSpec::Rgb(
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        )),
        _ => None,
    }
}

/// Normalize a color value, or return `default` when it is not a color.
/// The result displays canonically (`#FFFFFF`, `BYLAYER`, `7`).
pub fn normalize_color(value: &str, default: ColorSpec) -> ColorSpec {
    ColorSpec::parse(value).unwrap_or(default)
}

/// Only `#RGB`/`#RRGGBB` values, expanded to six uppercase digits.
pub fn hex_color(value: &str) -> Option<ColorSpec> {
    value.trim().strip_prefix('#').and_then(parse_hex)
}

const FIXED: [(u8, u8, u8); 10] = [
    (0, 0, 0),
    (255, 0, 0),
    (255, 255, 0),
    (0, 255, 0),
    (0, 255, 255),
    (0, 0, 255),
    (255, 0, 255),
    (255, 255, 255),
    (128, 128, 128),
    (192, 192, 192),
];

const LEVELS: [f64; 5] = [255.0, 165.0, 127.0, 76.0, 38.0];

const GRAYS: [u8; 6] = [51, 80, 105, 130, 190, 255];

/// Fully saturated color for a hue in degrees, channels in `0..=1`.
fn hue_rgb(degrees: f64) -> (f64, f64, f64) {
    let h = degrees / 60.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    }
}

/// RGB value of an ACI index. Index 0 (`BYBLOCK`) maps to black.
pub fn aci_rgb(index: u8) -> (u8, u8, u8) {
    match index {
        0..=9 => FIXED[index as usize],
        10..=249 => {
            let offset = index - 10;
            let (r, g, b) = hue_rgb(f64::from(offset / 10) * 15.0);
            let step = offset % 10;
            let level = LEVELS[(step / 2) as usize];
            let shade = |c: f64| {
                if step % 2 == 0 {
                    (c * level) as u8
                } else {
                    (level * (1.0 + c) / 2.0) as u8
                }
            };
            (shade(r), shade(g), shade(b))
        }
        _ => {
            let gray = GRAYS[(index - 250) as usize];
            (gray, gray, gray)
        }
    }
}

/// Palette index (1–255) closest to an RGB value by Euclidean distance.
pub fn nearest_aci(r: u8, g: u8, b: u8) -> u8 {
    let distance = |index: u8| {
        let (pr, pg, pb) = aci_rgb(index);
        let dr = i32::from(pr) - i32::from(r);
        let dg = i32::from(pg) - i32::from(g);
        let db = i32::from(pb) - i32::from(b);
        dr * dr + dg * dg + db * db
    };
    (1..=255u8).min_by_key(|index| distance(*index)).unwrap_or(7)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_hex() {
        let normalize = |value| normalize_color(value, ColorSpec::ByLayer).to_string();
        assert_eq!(normalize("#fff"), "#FFFFFF");
        assert_eq!(normalize("#FFFFFF"), "#FFFFFF");
        assert_eq!(normalize("#12ab9F"), "#12AB9F");
        assert_eq!(normalize("#12ab"), "BYLAYER");
        assert_eq!(normalize("#ggg"), "BYLAYER");
    }

    #[test]
    fn test_normalize_is_a_fixed_point() {
        for value in &["#fff", "red", "bylayer", "ByBlock", "42", "#0a0B0c"] {
            let once = normalize_color(value, ColorSpec::ByLayer).to_string();
            assert_eq!(normalize_color(&once, ColorSpec::ByLayer).to_string(), once);
        }
    }

    #[test]
    fn test_literals_indices_and_names() {
        assert_eq!(ColorSpec::parse("bylayer"), Some(ColorSpec::ByLayer));
        assert_eq!(ColorSpec::parse(" BYBLOCK "), Some(ColorSpec::ByBlock));
        assert_eq!(ColorSpec::parse("7"), Some(ColorSpec::Index(7)));
        assert_eq!(ColorSpec::parse("0"), None);
        assert_eq!(ColorSpec::parse("256"), None);
        assert_eq!(ColorSpec::parse("red"), Some(ColorSpec::Rgb(255, 0, 0)));
        assert_eq!(ColorSpec::parse("none"), None);
        assert_eq!(ColorSpec::parse("transparent"), None);
        assert_eq!(normalize_color("nonsense", ColorSpec::Index(3)), ColorSpec::Index(3));
    }

    #[test]
    fn test_hex_color_only_accepts_hex() {
        assert_eq!(hex_color(" #abc"), Some(ColorSpec::Rgb(0xAA, 0xBB, 0xCC)));
        assert_eq!(hex_color("red"), None);
    }

    #[test]
    fn test_palette() {
        assert_eq!(aci_rgb(1), (255, 0, 0));
        assert_eq!(aci_rgb(7), (255, 255, 255));
        assert_eq!(aci_rgb(10), (255, 0, 0));
        assert_eq!(aci_rgb(11), (255, 127, 127));
        assert_eq!(aci_rgb(12), (165, 0, 0));
        assert_eq!(aci_rgb(13), (165, 82, 82));
        assert_eq!(aci_rgb(20), (255, 63, 0));
        assert_eq!(aci_rgb(250), (51, 51, 51));
        assert_eq!(aci_rgb(255), (255, 255, 255));
    }

    #[test]
    fn test_nearest_aci() {
        assert_eq!(nearest_aci(255, 0, 0), 1);
        assert_eq!(nearest_aci(255, 255, 255), 7);
        assert_eq!(nearest_aci(250, 2, 3), 1);
        assert_eq!(nearest_aci(128, 128, 128), 8);
        assert_eq!(ColorSpec::Rgb(0, 0, 250).aci(), 5);
        assert_eq!(ColorSpec::ByLayer.aci(), 256);
        assert_eq!(ColorSpec::ByBlock.aci(), 0);
    }

    #[test]
    fn test_true_color() {
        assert_eq!(ColorSpec::Rgb(0x12, 0x34, 0x56).true_color(), Some(0x12_3456));
        assert_eq!(ColorSpec::Index(3).true_color(), None);
    }
}

//! Length and lineweight conversions.

use std::str::FromStr;

use svgtypes::{Length, LengthUnit};

/// Millimeters per unit. Pixels follow the CSS reference of 96 px per inch.
fn millimeters_per(unit: LengthUnit) -> Option<f64> {
    match unit {
        LengthUnit::None | LengthUnit::Mm => Some(1.0),
        LengthUnit::Cm => Some(10.0),
        LengthUnit::In => Some(25.4),
        LengthUnit::Pt => Some(25.4 / 72.0),
        LengthUnit::Pc => Some(25.4 / 6.0),
        LengthUnit::Px => Some(25.4 / 96.0),
        _ => None,
    }
}

/// Parse a length such as `210mm`, `8.5in` or `12` into millimeters.
///
/// Unitless numbers are taken as millimeters. Relative units (`em`, `ex`,
/// `%`) keep their magnitude. Returns `None` when the value is not a length.
pub fn parse_length(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let length = Length::from_str(value).ok()?;
    Some(match millimeters_per(length.unit) {
        Some(factor) => length.number * factor,
        None => length.number,
    })
}

/// True when `value` carries an absolute unit (`pt`, `mm`, `in`, ...), so
/// its converted size no longer depends on the drawing scale.
pub fn has_absolute_unit(value: &str) -> bool {
    match Length::from_str(value.trim()) {
        Ok(length) => length.unit != LengthUnit::None && millimeters_per(length.unit).is_some(),
        Err(_) => false,
    }
}

/// Like [`parse_length`] but treats missing and malformed values as zero.
pub fn parse_length_or_zero(value: Option<&str>) -> f64 {
    value.and_then(parse_length).unwrap_or(0.0)
}

/// Stroke widths are plain numbers in most drawings; fall back to length
/// parsing for values carrying a unit.
pub fn parse_stroke_width(value: &str) -> Option<f64> {
    let value = value.trim();
    value.parse::<f64>().ok().or_else(|| parse_length(value))
}

/// Convert a lineweight in millimeters to DXF hundredths of a millimeter.
pub fn lineweight_to_hundredths(weight_mm: f64) -> i16 {
    (weight_mm * 100.0).round() as i16
}

//! Rule based mapping of primitives to layers, colors, line types, hatch
//! patterns and text styles.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use glob::Pattern;
use log::{debug, trace, warn};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::color::{self, normalize_color, ColorSpec};
use crate::config::MappingConfig;
use crate::error::Error;
use crate::primitive::Primitive;
use crate::style::{is_no_paint, Style};

/// Classes starting with this prefix name the element's material.
pub const MATERIAL_PREFIX: &str = "material-";

/// Text style used when no font family applies.
pub const DEFAULT_STYLE_NAME: &str = "STANDARD";

/// Longest symbol table name DXF accepts.
pub const MAX_STYLE_NAME_LENGTH: usize = 255;

pub const CONTINUOUS: &str = "Continuous";
pub const DASHED: &str = "DASHED";

/// A rule selector: `class:GLOB`, `tag:GLOB`, `id:GLOB`, `attr:NAME=GLOB`,
/// `style:NAME=GLOB` or `any`.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Class(Pattern),
    Tag(Pattern),
    Id(Pattern),
    Attr { name: String, pattern: Pattern },
    Style { name: String, pattern: Pattern },
    Any,
}

impl Selector {
    pub fn matches(&self, primitive: &Primitive) -> bool {
        match self {
            Selector::Any => true,
            Selector::Class(pattern) => primitive.classes.iter().any(|c| pattern.matches(c)),
            Selector::Tag(pattern) => pattern.matches(primitive.kind()),
            Selector::Id(pattern) => primitive.id.as_deref().map_or(false, |id| pattern.matches(id)),
            Selector::Attr { name, pattern } => primitive
                .attributes
                .get(name)
                .map_or(false, |value| pattern.matches(value)),
            Selector::Style { name, pattern } => primitive
                .style
                .get(name)
                .map_or(false, |value| pattern.matches(value)),
        }
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let selector = s.trim();
        let invalid = |reason: &str| Error::Selector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        };
        if selector.eq_ignore_ascii_case("any") {
            return Ok(Selector::Any);
        }
        let mut split = selector.splitn(2, ':');
        let kind = split.next().unwrap_or("").trim().to_ascii_lowercase();
        let value = split
            .next()
            .map(str::trim)
            .ok_or_else(|| invalid("expected KIND:PATTERN or any"))?;
        let glob = |text: &str| Pattern::new(text.trim()).map_err(|e| invalid(e.msg));
        let named = || -> Result<(String, Pattern), Error> {
            let mut parts = value.splitn(2, '=');
            let name = parts.next().unwrap_or("").trim();
            let pattern = parts.next().ok_or_else(|| invalid("expected NAME=PATTERN"))?;
            if name.is_empty() {
                return Err(invalid("empty name"));
            }
            Ok((name.to_string(), glob(pattern)?))
        };
        match kind.as_str() {
            "class" => Ok(Selector::Class(glob(value)?)),
            "tag" => Ok(Selector::Tag(glob(value)?)),
            "id" => Ok(Selector::Id(glob(value)?)),
            "attr" => named().map(|(name, pattern)| Selector::Attr { name, pattern }),
            "style" => named().map(|(name, pattern)| Selector::Style { name, pattern }),
            _ => Err(invalid("unknown selector kind")),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Any => f.write_str("any"),
            Selector::Class(pattern) => write!(f, "class:{}", pattern),
            Selector::Tag(pattern) => write!(f, "tag:{}", pattern),
            Selector::Id(pattern) => write!(f, "id:{}", pattern),
            Selector::Attr { name, pattern } => write!(f, "attr:{}={}", name, pattern),
            Selector::Style { name, pattern } => write!(f, "style:{}={}", name, pattern),
        }
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// One ordered selector → layer rule. Unset fields fall back to values
/// derived from the primitive's style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRule {
    pub selector: Selector,
    pub layer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineweight: Option<f64>,
}

impl MappingRule {
    pub fn new(selector: Selector, layer: &str) -> Self {
        Self {
            selector,
            layer: layer.to_string(),
            color: None,
            linetype: None,
            lineweight: None,
        }
    }

    pub fn catch_all() -> Self {
        Self {
            color: Some("BYLAYER".to_string()),
            linetype: Some(CONTINUOUS.to_string()),
            ..Self::new(Selector::Any, "0")
        }
    }

    fn architectural(selector: &str, layer: &str, lineweight: f64) -> Option<Self> {
        Some(Self {
            color: Some("#000000".to_string()),
            linetype: Some(CONTINUOUS.to_string()),
            lineweight: Some(lineweight),
            ..Self::new(selector.parse().ok()?, layer)
        })
    }
}

/// Resolved layer assignment for one primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerAttributes {
    pub layer: String,
    pub color: ColorSpec,
    pub linetype: String,
    pub lineweight_mm: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineweight: Option<f64>,
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub pattern: String,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub angle: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub solid: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FontEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
}

/// A fill pattern resolved from a `url(#id)` fill.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternFill {
    pub name: String,
    pub scale: f64,
    pub angle: f64,
    pub color: Option<ColorSpec>,
    pub solid: bool,
}

/// A text style resolved from a font family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextStyleSpec {
    pub name: String,
    pub font: Option<String>,
}

/// String keyed table with case-insensitive lookup and aliasing by the
/// part after the first `-`.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable<T> {
    entries: BTreeMap<String, T>,
}

impl<T> Default for LookupTable<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T: Clone + PartialEq> LookupTable<T> {
    pub fn insert(&mut self, key: &str, value: T) {
        self.entries.insert(key.to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &BTreeMap<String, T> {
        &self.entries
    }

    fn find(&self, key: &str) -> Option<&T> {
        self.entries.get(key).or_else(|| {
            self.entries
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        let key = key.trim();
        self.find(key).or_else(|| {
            let mut split = key.splitn(2, '-');
            split.next();
            split.next().filter(|s| !s.is_empty()).and_then(|alias| self.find(alias))
        })
    }

    /// Replace or add every entry of `other`.
    pub fn overlay(&mut self, other: &BTreeMap<String, T>) {
        for (key, value) in other {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    /// Entries that are new or differ from `defaults`.
    pub fn changes_from(&self, defaults: &LookupTable<T>) -> BTreeMap<String, T> {
        self.entries
            .iter()
            .filter(|(key, value)| defaults.entries.get(key.as_str()) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

impl<T> std::iter::FromIterator<(String, T)> for LookupTable<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

fn default_materials() -> LookupTable<MaterialEntry> {
    let entry = |layer: &str, lineweight: f64| MaterialEntry {
        layer: Some(layer.to_string()),
        color: None,
        linetype: Some(CONTINUOUS.to_string()),
        lineweight: Some(lineweight),
    };
    vec![
        ("concrete", entry("A-CONC", 0.35)),
        ("steel", entry("A-STEL", 0.35)),
        ("masonry", entry("A-MASN", 0.35)),
        ("brick", entry("A-MASN", 0.35)),
        ("wood", entry("A-WOOD", 0.25)),
        ("insulation", entry("A-INSL", 0.18)),
        ("glass", entry("A-GLAZ", 0.18)),
        ("earth", entry("A-EART", 0.18)),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect()
}

fn default_patterns() -> LookupTable<PatternEntry> {
    let entry = |pattern: &str, scale: f64, angle: f64| PatternEntry {
        pattern: pattern.to_string(),
        scale,
        angle,
        color: None,
        solid: pattern == "SOLID",
    };
    vec![
        ("solid", entry("SOLID", 1.0, 0.0)),
        ("hatch", entry("ANSI31", 1.0, 0.0)),
        ("concrete", entry("ANSI37", 1.0, 0.0)),
        ("steel", entry("ANSI32", 1.0, 0.0)),
        ("masonry", entry("ANSI31", 1.0, 0.0)),
        ("brick", entry("BRICK", 1.0, 0.0)),
        ("wood", entry("LINE", 0.5, 45.0)),
        ("insulation", entry("DASH", 1.0, 0.0)),
        ("glass", entry("LINE", 0.5, 45.0)),
        ("earth", entry("EARTH", 1.0, 0.0)),
        ("crosshatch", entry("NET", 1.0, 0.0)),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect()
}

fn default_fonts() -> LookupTable<FontEntry> {
    let entry = |style: &str, font: &str| FontEntry {
        style: Some(style.to_string()),
        font: Some(font.to_string()),
    };
    vec![
        ("arial", entry("ARIAL", "arial.ttf")),
        ("helvetica", entry("ARIAL", "arial.ttf")),
        ("sans-serif", entry("ARIAL", "arial.ttf")),
        ("times new roman", entry("TIMES", "times.ttf")),
        ("serif", entry("TIMES", "times.ttf")),
        ("courier new", entry("COURIER", "cour.ttf")),
        ("monospace", entry("COURIER", "cour.ttf")),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect()
}

/// Uppercase, with anything but alphanumerics, `-` and `_` replaced by `_`.
pub fn sanitize_layer_name(value: &str) -> String {
    let sanitized: String = value
        .to_uppercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if sanitized.is_empty() {
        "MATERIAL".to_string()
    } else {
        sanitized
    }
}

/// Keep alphanumerics, `-` and `_`, turn spaces into `_` and drop the rest.
pub fn sanitize_style_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
            _ => None,
        })
        .take(MAX_STYLE_NAME_LENGTH)
        .collect();
    if sanitized.is_empty() {
        DEFAULT_STYLE_NAME.to_string()
    } else {
        sanitized
    }
}

/// Id referenced by a `url(#id)` paint value, lower-cased.
pub fn fill_pattern_id(fill: &str) -> Option<String> {
    let fill = fill.trim();
    if !fill.get(..4).map_or(false, |p| p.eq_ignore_ascii_case("url(")) {
        return None;
    }
    let inner = fill.get(4..)?.splitn(2, ')').next()?.trim();
    let inner = inner.trim_matches(|c| c == '"' || c == '\'');
    let id = inner.rsplit('#').next()?.trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_lowercase())
    }
}

/// Color derived from the style: a hex stroke, else a hex fill, else
/// `BYLAYER`.
pub fn color_from_style(style: &Style) -> ColorSpec {
    [style.stroke(), style.fill()]
        .iter()
        .filter(|value| !is_no_paint(**value))
        .find_map(|value| value.and_then(color::hex_color))
        .unwrap_or(ColorSpec::ByLayer)
}

pub fn lineweight_from_style(style: &Style) -> Option<f64> {
    style.stroke_width()
}

pub fn linetype_from_style(style: &Style) -> String {
    match style.stroke_dasharray() {
        Some(dash) if !dash.is_empty() && dash != "none" && dash != "0" => DASHED.to_string(),
        _ => CONTINUOUS.to_string(),
    }
}

/// Resolves primitives through material classes and ordered rules.
///
/// The resolver is read-only while converting; use one instance per rule
/// set when converting concurrently.
#[derive(Debug, Clone)]
pub struct MappingResolver {
    rules: Vec<MappingRule>,
    materials: LookupTable<MaterialEntry>,
    patterns: LookupTable<PatternEntry>,
    fonts: LookupTable<FontEntry>,
}

impl Default for MappingResolver {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl MappingResolver {
    /// Built-in rules and tables.
    pub fn with_defaults() -> Self {
        Self {
            rules: Self::default_rules(),
            materials: default_materials(),
            patterns: default_patterns(),
            fonts: default_fonts(),
        }
    }

    /// Built-in tables with the given rules (plus the catch-all).
    pub fn with_rules(rules: Vec<MappingRule>) -> Self {
        let mut resolver = Self::with_defaults();
        resolver.set_rules(rules);
        resolver
    }

    pub fn default_rules() -> Vec<MappingRule> {
        let mut rules: Vec<MappingRule> = [
            ("class:IfcWall*", "A-WALL", 0.35),
            ("class:IfcSlab*", "A-SLAB", 0.35),
            ("class:IfcColumn*", "A-COLU", 0.35),
            ("class:IfcBeam*", "A-BEAM", 0.35),
            ("class:IfcDoor*", "A-DOOR", 0.25),
            ("class:IfcWindow*", "A-WIN", 0.25),
            ("class:PredefinedType-DIMENSION", "A-DIMS", 0.18),
            ("class:DIMENSION", "A-DIMS", 0.18),
            ("class:PredefinedType-TEXT", "A-ANNO", 0.18),
            ("class:annotation", "A-ANNO", 0.18),
            ("class:IfcAnnotation*", "A-ANNO", 0.18),
            ("class:GRID", "A-GRID", 0.18),
            ("class:PredefinedType-GRID", "A-GRID", 0.18),
            ("tag:text", "A-TEXT", 0.18),
        ]
        .iter()
        .filter_map(|(selector, layer, weight)| MappingRule::architectural(selector, layer, *weight))
        .collect();
        rules.push(MappingRule::catch_all());
        rules
    }

    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    /// Replace the rule list. A catch-all `any` rule is appended unless the
    /// list already ends with one.
    pub fn set_rules(&mut self, mut rules: Vec<MappingRule>) {
        let last = rules.len().saturating_sub(1);
        for (i, rule) in rules.iter().enumerate() {
            if rule.selector == Selector::Any && i < last {
                warn!(
                    "set_rules: rule {} ({}) matches everything, later rules are unreachable",
                    i, rule.layer
                );
            }
        }
        if rules.last().map_or(true, |rule| rule.selector != Selector::Any) {
            rules.push(MappingRule::catch_all());
        }
        self.rules = rules;
    }

    pub fn materials(&self) -> &LookupTable<MaterialEntry> {
        &self.materials
    }

    pub fn patterns(&self) -> &LookupTable<PatternEntry> {
        &self.patterns
    }

    pub fn fonts(&self) -> &LookupTable<FontEntry> {
        &self.fonts
    }

    /// Overlay user tables onto the built-in ones and replace the rules if
    /// the configuration carries any.
    pub fn apply_config(&mut self, config: &MappingConfig) {
        let defaults = Self::with_defaults();
        self.materials = defaults.materials;
        self.patterns = defaults.patterns;
        self.fonts = defaults.fonts;
        self.materials.overlay(&config.materials);
        self.patterns.overlay(&config.patterns);
        self.fonts.overlay(&config.fonts);
        if let Some(rules) = &config.rules {
            self.set_rules(rules.clone());
        }
    }

    /// The configuration that reproduces this resolver: only entries and
    /// rules differing from the built-in defaults.
    pub fn to_config(&self) -> MappingConfig {
        let defaults = Self::with_defaults();
        MappingConfig {
            materials: self.materials.changes_from(&defaults.materials),
            patterns: self.patterns.changes_from(&defaults.patterns),
            fonts: self.fonts.changes_from(&defaults.fonts),
            rules: if self.rules == defaults.rules {
                None
            } else {
                Some(self.rules.clone())
            },
        }
    }

    pub fn resolve(&self, primitive: &Primitive) -> LayerAttributes {
        let style = &primitive.style;
        if let Some(material) = primitive
            .classes
            .iter()
            .find(|class| class.starts_with(MATERIAL_PREFIX))
        {
            let suffix = &material[MATERIAL_PREFIX.len()..];
            let entry = self.materials.get(material).cloned().unwrap_or_default();
            let style_color = color_from_style(style);
            let attributes = LayerAttributes {
                layer: entry
                    .layer
                    .filter(|layer| !layer.trim().is_empty())
                    .unwrap_or_else(|| format!("MAT-{}", sanitize_layer_name(suffix))),
                color: entry
                    .color
                    .as_deref()
                    .map_or(style_color, |c| normalize_color(c, style_color)),
                linetype: entry
                    .linetype
                    .unwrap_or_else(|| linetype_from_style(style)),
                lineweight_mm: entry.lineweight.or_else(|| lineweight_from_style(style)),
            };
            debug!("resolve: {} by material {:?}", primitive.label(), material);
            return attributes;
        }

        for rule in &self.rules {
            if rule.selector.matches(primitive) {
                trace!("resolve: {} matched {}", primitive.label(), rule.selector);
                let layer = rule.layer.trim();
                let style_color = color_from_style(style);
                return LayerAttributes {
                    layer: if layer.is_empty() { "0" } else { layer }.to_string(),
                    color: rule
                        .color
                        .as_deref()
                        .map_or(style_color, |c| normalize_color(c, style_color)),
                    linetype: rule
                        .linetype
                        .clone()
                        .filter(|linetype| !linetype.trim().is_empty())
                        .unwrap_or_else(|| linetype_from_style(style)),
                    lineweight_mm: rule.lineweight.or_else(|| lineweight_from_style(style)),
                };
            }
        }

        // Only reachable when the rules were edited behind `set_rules`.
        LayerAttributes {
            layer: "0".to_string(),
            color: color_from_style(style),
            linetype: linetype_from_style(style),
            lineweight_mm: lineweight_from_style(style),
        }
    }

    /// Pattern for a `fill: url(#id)` style, if the id is known.
    pub fn pattern_for(&self, style: &Style) -> Option<PatternFill> {
        let id = fill_pattern_id(style.fill()?)?;
        let entry = self.patterns.get(&id)?;
        Some(PatternFill {
            name: entry.pattern.trim().to_uppercase(),
            scale: if entry.scale > 0.0 { entry.scale } else { 1.0 },
            angle: entry.angle,
            color: entry.color.as_deref().and_then(ColorSpec::parse),
            solid: entry.solid || entry.pattern.trim().eq_ignore_ascii_case("SOLID"),
        })
    }

    /// Text style for a `font-family` list. Families are tried in order;
    /// an unknown family becomes a style of its own.
    pub fn font_for(&self, family: Option<&str>) -> TextStyleSpec {
        let family = match family.map(str::trim).filter(|f| !f.is_empty()) {
            Some(family) => family,
            None => {
                return TextStyleSpec {
                    name: DEFAULT_STYLE_NAME.to_string(),
                    font: None,
                }
            }
        };
        let candidates: Vec<String> = family
            .split(',')
            .map(|f| {
                f.trim()
                    .trim_matches(|c| c == '"' || c == '\'')
                    .trim()
                    .to_lowercase()
            })
            .filter(|f| !f.is_empty())
            .collect();
        for candidate in &candidates {
            if let Some(entry) = self.fonts.get(candidate) {
                let style = entry.style.as_deref().unwrap_or(candidate);
                return TextStyleSpec {
                    name: sanitize_style_name(style),
                    font: entry.font.clone(),
                };
            }
        }
        let first = family
            .split(',')
            .next()
            .unwrap_or(family)
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .trim();
        TextStyleSpec {
            name: sanitize_style_name(first),
            font: if first.is_empty() {
                None
            } else {
                Some(first.to_string())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::Shape;
    use crate::style::parse_declarations;

    fn primitive(shape: Shape, classes: &[&str], style: &str) -> Primitive {
        Primitive {
            classes: classes.iter().map(|s| s.to_string()).collect(),
            style: parse_declarations(style),
            ..Primitive::new(shape, vec![(0.0, 0.0).into(), (1.0, 0.0).into()])
        }
    }

    fn line(classes: &[&str], style: &str) -> Primitive {
        primitive(Shape::Line, classes, style)
    }

    #[test]
    fn test_selector_parse_and_display() {
        for text in &[
            "any",
            "class:IfcWall*",
            "tag:text",
            "id:w?",
            "attr:data-kind=wall*",
            "style:stroke=#FF*",
        ] {
            let selector: Selector = text.parse().unwrap();
            assert_eq!(&selector.to_string(), text);
        }
        assert_eq!("  ANY ".parse::<Selector>().unwrap(), Selector::Any);
        assert!("wall".parse::<Selector>().is_err());
        assert!("shape:x".parse::<Selector>().is_err());
        assert!("attr:novalue".parse::<Selector>().is_err());
        assert!("class:[".parse::<Selector>().is_err());
    }

    #[test]
    fn test_selector_matching() {
        let mut p = line(&["IfcWallStandardCase", "cut"], "stroke: #FF0000");
        p.id = Some("w12".to_string());
        p.attributes.insert("data-kind".into(), "wall-ext".into());
        let matches = |s: &str| s.parse::<Selector>().unwrap().matches(&p);
        assert!(matches("class:IfcWall*"));
        assert!(!matches("class:ifcwall*"));
        assert!(matches("tag:line"));
        assert!(!matches("tag:text"));
        assert!(matches("id:w1?"));
        assert!(matches("attr:data-kind=wall*"));
        assert!(!matches("attr:missing=*"));
        assert!(matches("style:stroke=#FF*"));
        assert!(matches("any"));
    }

    #[test]
    fn test_set_rules_ends_with_catch_all() {
        let mut resolver = MappingResolver::with_rules(vec![]);
        resolver.set_rules(vec![
            MappingRule::new(Selector::Any, "FIRST"),
            MappingRule::new(Selector::Tag("line".parse().unwrap()), "L-LINE"),
        ]);
        assert_eq!(resolver.rules().len(), 3);
        assert_eq!(resolver.rules()[0].layer, "FIRST");
        assert_eq!(resolver.rules().last().map(|r| &r.selector), Some(&Selector::Any));
        assert_eq!(resolver.resolve(&line(&[], "")).layer, "FIRST");

        resolver.set_rules(vec![
            MappingRule::new(Selector::Tag("line".parse().unwrap()), "L-LINE"),
            MappingRule::new(Selector::Any, "REST"),
        ]);
        assert_eq!(resolver.rules().len(), 2);
        assert_eq!(resolver.rules()[1].layer, "REST");
    }

    #[test]
    fn test_catch_all_only() {
        let resolver = MappingResolver::with_rules(vec![]);
        assert_eq!(resolver.rules().len(), 1);
        for p in &[
            line(&["IfcWall"], "stroke: #FF0000; stroke-width: 0.5"),
            primitive(
                Shape::Circle {
                    radius_x: 1.0,
                    radius_y: 1.0,
                },
                &[],
                "fill: #00FF00",
            ),
        ] {
            let attributes = resolver.resolve(p);
            assert_eq!(attributes.layer, "0");
            assert_eq!(attributes.color, ColorSpec::ByLayer);
            assert_eq!(attributes.color.to_string(), "BYLAYER");
        }
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let resolver = MappingResolver::with_defaults();
        let attributes = resolver.resolve(&line(&["IfcWall", "IfcDoor"], ""));
        assert_eq!(attributes.layer, "A-WALL");
        assert_eq!(attributes.color, ColorSpec::Rgb(0, 0, 0));
        assert_eq!(attributes.lineweight_mm, Some(0.35));

        let attributes = resolver.resolve(&line(&[], "stroke: #abc; stroke-dasharray: 2 1; stroke-width: 0.13"));
        assert_eq!(attributes.layer, "0");
        assert_eq!(attributes.linetype, CONTINUOUS);
        assert_eq!(attributes.color, ColorSpec::ByLayer);
    }

    #[test]
    fn test_unset_rule_fields_use_style() {
        let resolver = MappingResolver::with_rules(vec![MappingRule::new(
            "class:wall".parse().unwrap(),
            "WALLS",
        )]);
        let attributes =
            resolver.resolve(&line(&["wall"], "stroke: #abc; stroke-dasharray: 2 1; stroke-width: 0.13"));
        assert_eq!(attributes.layer, "WALLS");
        assert_eq!(attributes.color, ColorSpec::Rgb(0xAA, 0xBB, 0xCC));
        assert_eq!(attributes.linetype, DASHED);
        assert_eq!(attributes.lineweight_mm, Some(0.13));
    }

    #[test]
    fn test_material_class() {
        let resolver = MappingResolver::with_defaults();
        let attributes = resolver.resolve(&line(
            &["IfcWall", "material-concrete", "material-steel"],
            "fill: #808080; stroke: none",
        ));
        assert_eq!(attributes.layer, "A-CONC");
        assert_eq!(attributes.color, ColorSpec::Rgb(0x80, 0x80, 0x80));
        assert_eq!(attributes.lineweight_mm, Some(0.35));

        let attributes = resolver.resolve(&line(&["material-Rammed earth!"], ""));
        assert_eq!(attributes.layer, "MAT-RAMMED_EARTH_");
        assert_eq!(attributes.color, ColorSpec::ByLayer);
        assert_eq!(attributes.linetype, CONTINUOUS);
        assert_eq!(attributes.lineweight_mm, None);

        // Case-insensitive key lookup.
        let attributes = resolver.resolve(&line(&["material-Steel"], ""));
        assert_eq!(attributes.layer, "A-STEL");
        assert_eq!(resolver.resolve(&line(&["material-"], "")).layer, "MAT-MATERIAL");
    }

    #[test]
    fn test_style_defaults() {
        let style = parse_declarations("stroke: transparent; fill: #0f0");
        assert_eq!(color_from_style(&style), ColorSpec::Rgb(0, 255, 0));
        let style = parse_declarations("stroke: red; fill: none");
        assert_eq!(color_from_style(&style), ColorSpec::ByLayer);
        let style = parse_declarations("stroke-dasharray: none; stroke-width: 1mm");
        assert_eq!(linetype_from_style(&style), CONTINUOUS);
        assert_eq!(lineweight_from_style(&style), Some(1.0));
        let style = parse_declarations("stroke-dasharray: 0");
        assert_eq!(linetype_from_style(&style), CONTINUOUS);
    }

    #[test]
    fn test_lookup_aliases() {
        let table = default_patterns();
        assert_eq!(table.get("CONCRETE").map(|e| e.pattern.as_str()), Some("ANSI37"));
        assert_eq!(table.get("hatch-brick").map(|e| e.pattern.as_str()), Some("BRICK"));
        assert!(table.get("unknown").is_none());
    }

    #[test]
    fn test_pattern_for() {
        let resolver = MappingResolver::with_defaults();
        let pattern = resolver
            .pattern_for(&parse_declarations("fill: url(#Pattern-Concrete)"))
            .unwrap();
        assert_eq!(pattern.name, "ANSI37");
        assert!(!pattern.solid);
        let pattern = resolver
            .pattern_for(&parse_declarations("fill: url('#solid')"))
            .unwrap();
        assert!(pattern.solid);
        assert!(resolver.pattern_for(&parse_declarations("fill: #808080")).is_none());
        assert!(resolver.pattern_for(&parse_declarations("fill: url(#nope)")).is_none());
        assert_eq!(fill_pattern_id("url(other.svg#Hatch)"), Some("hatch".into()));
    }

    #[test]
    fn test_fill_pattern_id_non_ascii() {
        assert_eq!(fill_pattern_id("#ëëë"), None);
        assert_eq!(fill_pattern_id("ëë"), None);
        assert_eq!(fill_pattern_id("url(#ËX)"), Some("ëx".into()));
        let resolver = MappingResolver::with_defaults();
        assert!(resolver.pattern_for(&parse_declarations("fill: #ëëë")).is_none());
    }

    #[test]
    fn test_font_for() {
        let resolver = MappingResolver::with_defaults();
        let spec = resolver.font_for(Some("'Helvetica Neue', Helvetica, sans-serif"));
        assert_eq!(spec.name, "ARIAL");
        assert_eq!(spec.font.as_deref(), Some("arial.ttf"));
        let spec = resolver.font_for(Some("\"Open Sans\", Foo"));
        assert_eq!(spec.name, "Open_Sans");
        assert_eq!(spec.font.as_deref(), Some("Open Sans"));
        assert_eq!(resolver.font_for(None).name, DEFAULT_STYLE_NAME);
        assert_eq!(resolver.font_for(Some("  ")).name, DEFAULT_STYLE_NAME);
    }

    #[test]
    fn test_sanitize_names() {
        assert_eq!(sanitize_style_name(" My Font (bold)! "), "My_Font_bold");
        assert_eq!(sanitize_style_name("%%"), DEFAULT_STYLE_NAME);
        assert_eq!(sanitize_style_name(&"x".repeat(300)).len(), MAX_STYLE_NAME_LENGTH);
        assert_eq!(sanitize_layer_name("steel/beam"), "STEEL_BEAM");
        assert_eq!(sanitize_layer_name(""), "MATERIAL");
    }

    #[test]
    fn test_config_overlay_and_diff() {
        let mut resolver = MappingResolver::with_defaults();
        assert_eq!(resolver.to_config(), MappingConfig::default());

        let mut config = MappingConfig::default();
        config.materials.insert(
            "concrete".into(),
            MaterialEntry {
                layer: Some("S-CONC".into()),
                ..MaterialEntry::default()
            },
        );
        config.materials.insert("steel".into(), default_materials().get("steel").cloned().unwrap());
        resolver.apply_config(&config);
        assert_eq!(resolver.materials().get("concrete").unwrap().layer.as_deref(), Some("S-CONC"));
        assert_eq!(resolver.materials().len(), default_materials().len());

        let saved = resolver.to_config();
        assert_eq!(saved.materials.len(), 1);
        assert!(saved.materials.contains_key("concrete"));
        assert!(saved.rules.is_none());
    }
}

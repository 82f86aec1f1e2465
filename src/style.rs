//! Style property bags and the style-sheet cascade.

use std::collections::BTreeMap;
use std::iter::FromIterator;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::dom::Element;
use crate::units;

/// Presentation attributes that take part in the cascade.
const PRESENTATION_ATTRIBUTES: [&str; 8] = [
    "stroke",
    "stroke-width",
    "stroke-dasharray",
    "fill",
    "fill-rule",
    "font-family",
    "font-size",
    "text-anchor",
];

/// A resolved set of style properties (`stroke` → `#000000`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Style(BTreeMap<String, String>);

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.0.insert(name.to_string(), value.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Overlay `other` onto `self`, key by key.
    pub fn merge(&mut self, other: &Style) {
        for (name, value) in &other.0 {
            self.0.insert(name.clone(), value.clone());
        }
    }

    /// A copy of `self` with `other` overlaid.
    pub fn merged(&self, other: &Style) -> Style {
        let mut style = self.clone();
        style.merge(other);
        style
    }

    pub fn stroke(&self) -> Option<&str> {
        self.get("stroke").map(str::trim)
    }

    pub fn fill(&self) -> Option<&str> {
        self.get("fill").map(str::trim)
    }

    pub fn stroke_dasharray(&self) -> Option<&str> {
        self.get("stroke-dasharray").map(str::trim)
    }

    /// Numeric `stroke-width`, accepting values with a length unit.
    pub fn stroke_width(&self) -> Option<f64> {
        self.get("stroke-width").and_then(units::parse_stroke_width)
    }

    pub fn font_family(&self) -> Option<&str> {
        self.get("font-family")
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// `font-size` in millimeters.
    pub fn font_size(&self) -> Option<f64> {
        self.get("font-size").and_then(units::parse_length)
    }

    pub fn text_anchor(&self) -> Option<&str> {
        self.get("text-anchor").map(str::trim)
    }

    /// True when the stroke would not plot: missing, `none`, `transparent`,
    /// or a stroke width of at most `min_width`.
    pub fn has_negligible_stroke(&self, min_width: f64) -> bool {
        if is_no_paint(self.stroke()) {
            return true;
        }
        matches!(self.stroke_width(), Some(width) if width <= min_width)
    }
}

impl FromIterator<(String, String)> for Style {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Style(iter.into_iter().collect())
    }
}

/// `true` for a paint value that draws nothing.
pub fn is_no_paint(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None => true,
        Some(value) => {
            value.is_empty()
                || value.eq_ignore_ascii_case("none")
                || value.eq_ignore_ascii_case("transparent")
        }
    }
}

/// Parse `name: value; name: value` declarations. Parts without a colon are
/// ignored.
pub fn parse_declarations(text: &str) -> Style {
    text.split(';')
        .filter_map(|part| {
            let mut split = part.splitn(2, ':');
            let name = split.next()?.trim();
            let value = split.next()?.trim();
            if name.is_empty() {
                None
            } else {
                Some((name.to_ascii_lowercase(), value.to_string()))
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CssSelector {
    Universal,
    Tag(String),
    Class(String),
    Id(String),
}

impl CssSelector {
    fn parse(selector: &str) -> Self {
        if let Some(class) = selector.strip_prefix('.') {
            CssSelector::Class(class.to_string())
        } else if let Some(id) = selector.strip_prefix('#') {
            CssSelector::Id(id.to_string())
        } else if selector == "*" {
            CssSelector::Universal
        } else {
            CssSelector::Tag(selector.to_ascii_lowercase())
        }
    }

    fn matches(&self, tag: &str, classes: &[String], id: Option<&str>) -> bool {
        match self {
            CssSelector::Universal => true,
            CssSelector::Tag(name) => name == tag,
            CssSelector::Class(name) => classes.iter().any(|class| class == name),
            CssSelector::Id(name) => id == Some(name.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
struct CssRule {
    selector: CssSelector,
    declarations: Style,
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        rest = match rest[start + 2..].find("*/") {
            Some(end) => &rest[start + 2 + end + 2..],
            None => "",
        };
    }
    out.push_str(rest);

    // Line comments, only where they start a line or follow whitespace so
    // that `url(http://...)` survives.
    out.lines()
        .map(|line| {
            let mut cut = line.len();
            let bytes = line.as_bytes();
            for i in 0..bytes.len().saturating_sub(1) {
                if bytes[i] == b'/'
                    && bytes[i + 1] == b'/'
                    && (i == 0 || bytes[i - 1].is_ascii_whitespace())
                {
                    cut = i;
                    break;
                }
            }
            &line[..cut]
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Ordered style-sheet rules, lowest priority first.
#[derive(Debug, Clone, Default)]
pub struct StyleCascade {
    rules: Vec<CssRule>,
}

impl StyleCascade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Append the rules of a style sheet. Blocks nested inside at-rules are
    /// picked up as plain rules.
    pub fn add_stylesheet(&mut self, text: &str) {
        let clean = strip_comments(text);
        let mut boundary = 0;
        let mut search = 0;
        while let Some(offset) = clean[search..].find('{') {
            let open = search + offset;
            let selectors = clean[boundary..open].rsplit('}').next().unwrap_or("");
            let end = match clean[open + 1..].find(|c| c == '{' || c == '}') {
                Some(offset) => open + 1 + offset,
                None => break,
            };
            if clean.as_bytes()[end] == b'{' {
                // Nested block: its selector text starts after this brace.
                boundary = open + 1;
                search = open + 1;
                continue;
            }
            let declarations = parse_declarations(&clean[open + 1..end]);
            for selector in selectors.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                trace!("StyleCascade: rule {:?}", selector);
                self.rules.push(CssRule {
                    selector: CssSelector::parse(selector),
                    declarations: declarations.clone(),
                });
            }
            boundary = end + 1;
            search = end + 1;
        }
    }

    /// The element's own style: matching rules in order, then presentation
    /// attributes, then the inline `style` attribute, then `extra`.
    pub fn resolve(&self, element: &Element, extra: Option<&Style>) -> Style {
        let classes = element.classes();
        let id = element.id();
        let mut style = Style::new();
        for rule in &self.rules {
            if rule.selector.matches(&element.tag, &classes, id) {
                style.merge(&rule.declarations);
            }
        }
        for name in PRESENTATION_ATTRIBUTES.iter() {
            if let Some(value) = element.attr(name) {
                style.set(name, value);
            }
        }
        if let Some(inline) = element.attr("style") {
            style.merge(&parse_declarations(inline));
        }
        if let Some(extra) = extra {
            style.merge(extra);
        }
        style
    }
}

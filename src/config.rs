//! User mapping configuration, stored as JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::mapping::{FontEntry, MappingRule, MaterialEntry, PatternEntry};

/// Overrides for the built-in mapping tables.
///
/// Only entries that differ from the defaults need to be listed:
///
/// ```json
/// {
///   "materials": { "concrete": { "layer": "S-CONC", "lineweight": 0.5 } },
///   "patterns": { "concrete": { "pattern": "ANSI31", "scale": 2.0 } },
///   "fonts": { "frutiger": { "style": "FRUTIGER", "font": "frutiger.ttf" } },
///   "rules": [ { "selector": "class:IfcWall*", "layer": "S-WALL" } ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingConfig {
    #[serde(default)]
    pub materials: BTreeMap<String, MaterialEntry>,
    #[serde(default)]
    pub patterns: BTreeMap<String, PatternEntry>,
    #[serde(default)]
    pub fonts: BTreeMap<String, FontEntry>,
    /// Replaces the rule list when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<MappingRule>>,
}

impl MappingConfig {
    pub fn from_json(text: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn save_file(&self, path: &Path) -> Result<(), Error> {
        fs::write(path, self.to_json()?).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
            && self.patterns.is_empty()
            && self.fonts.is_empty()
            && self.rules.is_none()
    }
}

use serde::{Deserialize, Serialize};

use super::{extract_resolution, normalize_quality_name};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityDefinition {
    pub name: String,

    pub weight: i32,

    /// Vertical resolution in lines, 0 when the quality has no fixed resolution.
    pub resolution: u16,
}

impl QualityDefinition {
    #[must_use]
    pub fn new(name: &str, weight: i32, resolution: u16) -> Self {
        Self {
            name: name.to_string(),
            weight,
            resolution,
        }
    }
}

const DEFAULT_LADDER: &[(&str, i32, u16)] = &[
    ("WORKPRINT", 1, 0),
    ("CAM", 2, 0),
    ("TELESYNC", 3, 0),
    ("TELECINE", 4, 0),
    ("REGIONAL", 5, 0),
    ("DVDSCR", 6, 0),
    ("SDTV", 7, 480),
    ("DVD", 8, 480),
    ("WEB-480p", 9, 480),
    ("Bluray-480p", 10, 480),
    ("Bluray-576p", 11, 576),
    ("HDTV-720p", 12, 720),
    ("WEB-720p", 13, 720),
    ("Bluray-720p", 14, 720),
    ("HDTV-1080p", 15, 1080),
    ("WEB-1080p", 16, 1080),
    ("Bluray-1080p", 17, 1080),
    ("Remux-1080p", 18, 1080),
    ("HDTV-2160p", 19, 2160),
    ("WEB-2160p", 20, 2160),
    ("Bluray-2160p", 21, 2160),
    ("Remux-2160p", 22, 2160),
];

#[must_use]
pub fn default_definitions() -> Vec<QualityDefinition> {
    DEFAULT_LADDER
        .iter()
        .map(|(name, weight, resolution)| QualityDefinition::new(name, *weight, *resolution))
        .collect()
}

/// The ranked table of known qualities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityLadder {
    definitions: Vec<QualityDefinition>,
}

impl Default for QualityLadder {
    fn default() -> Self {
        Self::new(default_definitions())
    }
}

impl QualityLadder {
    #[must_use]
    pub const fn new(definitions: Vec<QualityDefinition>) -> Self {
        Self { definitions }
    }

    #[must_use]
    pub fn definitions(&self) -> &[QualityDefinition] {
        &self.definitions
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&QualityDefinition> {
        let name = name.trim();
        self.definitions
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    /// Resolves a free-form quality name to a weight.
    ///
    /// Lookup order: exact definition, then the normalized group, then the lowest
    /// weight among definitions sharing the name's resolution. Anything else is 0,
    /// so an unknown quality is never ranked above a known one.
    #[must_use]
    pub fn weight_of(&self, name: &str) -> i32 {
        if let Some(def) = self.find(name) {
            return def.weight;
        }

        let normalized = normalize_quality_name(name);
        if let Some(def) = self.find(&normalized) {
            return def.weight;
        }

        extract_resolution(name)
            .and_then(|resolution| {
                self.definitions
                    .iter()
                    .filter(|d| d.resolution == resolution)
                    .map(|d| d.weight)
                    .min()
            })
            .unwrap_or(0)
    }
}

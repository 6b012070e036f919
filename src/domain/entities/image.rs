//! Image records and population bounds.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Aspect ratio hint used by the grid layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    /// Wide landscape.
    #[default]
    #[serde(rename = "16:9")]
    Wide,
    /// Classic landscape.
    #[serde(rename = "4:3")]
    Landscape,
    /// Square.
    #[serde(rename = "1:1")]
    Square,
    /// Classic portrait.
    #[serde(rename = "3:4")]
    Portrait,
    /// Tall portrait.
    #[serde(rename = "2:3")]
    Tall,
}

impl AspectRatio {
    /// All ratios in layout order.
    pub const ALL: [Self; 5] = [
        Self::Wide,
        Self::Landscape,
        Self::Square,
        Self::Portrait,
        Self::Tall,
    ];

    /// Picks a stable ratio for a population index, so the same address
    /// always lays out the same way.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn for_index(index: u64) -> Self {
        Self::ALL[(index % Self::ALL.len() as u64) as usize]
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wide => write!(f, "16:9"),
            Self::Landscape => write!(f, "4:3"),
            Self::Square => write!(f, "1:1"),
            Self::Portrait => write!(f, "3:4"),
            Self::Tall => write!(f, "2:3"),
        }
    }
}

/// A single gallery image. `src` is the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    id: String,
    src: String,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    ratio: AspectRatio,
}

impl ImageRecord {
    /// Creates a new record.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        src: impl Into<String>,
        file_name: Option<String>,
        ratio: AspectRatio,
    ) -> Self {
        Self {
            id: id.into(),
            src: src.into(),
            file_name,
            ratio,
        }
    }

    /// Builds the record for a population address.
    #[must_use]
    pub fn for_population_index(index: u64, src: impl Into<String>) -> Self {
        let src = src.into();
        let file_name = last_segment(&src).map(str::to_string);
        Self::new(
            format!("image-{index}"),
            src,
            file_name,
            AspectRatio::for_index(index),
        )
    }

    /// Returns the record ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the canonical source address.
    #[must_use]
    pub fn src(&self) -> &str {
        &self.src
    }

    /// Returns the file name, if known.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Returns the aspect ratio hint.
    #[must_use]
    pub const fn ratio(&self) -> AspectRatio {
        self.ratio
    }

    /// Returns the population index this record addresses, derived from the
    /// trailing digits of its file name (or of the last `src` segment).
    #[must_use]
    pub fn population_index(&self) -> Option<u64> {
        let name = self.file_name().or_else(|| last_segment(&self.src))?;
        trailing_number(name)
    }
}

fn last_segment(src: &str) -> Option<&str> {
    let path = src.split(['?', '#']).next().unwrap_or(src);
    path.rsplit('/').find(|segment| !segment.is_empty())
}

fn trailing_number(name: &str) -> Option<u64> {
    static STEM_DIGITS: OnceLock<Regex> = OnceLock::new();
    let re = STEM_DIGITS.get_or_init(|| Regex::new(r"(\d+)$").expect("Invalid regex"));
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    re.captures(stem)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Upper bound of the dense, 1-based image population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRange {
    /// Highest addressable population index.
    pub max: u64,
}

impl ImageRange {
    /// Creates a range, rejecting an empty population.
    #[must_use]
    pub const fn new(max: u64) -> Option<Self> {
        if max >= 1 { Some(Self { max }) } else { None }
    }

    /// Returns true if `index` lies inside the population.
    #[must_use]
    pub const fn contains(&self, index: u64) -> bool {
        index >= 1 && index <= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("/images/42.jpg", None, Some(42) ; "plain_src")]
    #[test_case("https://cdn.example.com/g/7.webp?tr=w-400", None, Some(7) ; "query_string")]
    #[test_case("/images/cat.jpg", None, None ; "no_digits")]
    #[test_case("/images/x.jpg", Some("photo-0013.png"), Some(13) ; "file_name_wins")]
    #[test_case("/images/12/", None, Some(12) ; "trailing_slash")]
    fn test_population_index(src: &str, file_name: Option<&str>, expected: Option<u64>) {
        let record = ImageRecord::new(
            "id",
            src,
            file_name.map(str::to_string),
            AspectRatio::default(),
        );
        assert_eq!(record.population_index(), expected);
    }

    #[test]
    fn test_for_population_index_builds_file_name() {
        let record = ImageRecord::for_population_index(9, "https://host/images/9.jpg");
        assert_eq!(record.id(), "image-9");
        assert_eq!(record.file_name(), Some("9.jpg"));
        assert_eq!(record.population_index(), Some(9));
    }

    #[test]
    fn test_ratio_serializes_as_label() {
        let json = serde_json::to_string(&AspectRatio::Tall).unwrap();
        assert_eq!(json, "\"2:3\"");
        let back: AspectRatio = serde_json::from_str("\"16:9\"").unwrap();
        assert_eq!(back, AspectRatio::Wide);
    }

    #[test]
    fn test_range_rejects_zero() {
        assert!(ImageRange::new(0).is_none());
        let range = ImageRange::new(3).unwrap();
        assert!(range.contains(1));
        assert!(range.contains(3));
        assert!(!range.contains(4));
        assert!(!range.contains(0));
    }
}

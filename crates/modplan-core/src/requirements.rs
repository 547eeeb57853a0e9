//! Degree requirement categories and the provider that resolves them for a
//! programme.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::code::{base_code, normalize};

/// Errors from resolving a programme's requirement categories.
#[derive(Debug, thiserror::Error)]
pub enum RequirementError {
    #[error("no requirements known for degree '{degree}', major '{major}'")]
    UnknownProgramme { degree: String, major: String },

    #[error("major '{major}' requires a focus area; choose one of: {}", available.join(", "))]
    FocusAreaRequired {
        major: String,
        available: Vec<String>,
    },

    #[error("major '{major}' has no focus area matching '{focus}'")]
    UnknownFocusArea { major: String, focus: String },
}

// ---------------------------------------------------------------------------
// CategoryKind
// ---------------------------------------------------------------------------

/// The role a category plays in a degree. Declaration order is scheduling
/// priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    Foundation,
    Breadth,
    Elective,
    Unrestricted,
}

impl CategoryKind {
    /// Lower is scheduled first.
    pub fn priority(self) -> u8 {
        match self {
            Self::Foundation => 1,
            Self::Breadth => 2,
            Self::Elective => 3,
            Self::Unrestricted => 4,
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Foundation => "foundation",
            Self::Breadth => "breadth",
            Self::Elective => "elective",
            Self::Unrestricted => "unrestricted",
        };
        f.write_str(s)
    }
}

impl FromStr for CategoryKind {
    type Err = CategoryKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "foundation" => Ok(Self::Foundation),
            "breadth" => Ok(Self::Breadth),
            "elective" => Ok(Self::Elective),
            "unrestricted" => Ok(Self::Unrestricted),
            other => Err(CategoryKindParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`CategoryKind`] string.
#[derive(Debug, Clone)]
pub struct CategoryKindParseError(pub String);

impl fmt::Display for CategoryKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid category kind: {:?}", self.0)
    }
}

impl std::error::Error for CategoryKindParseError {}

// ---------------------------------------------------------------------------
// SlotPattern
// ---------------------------------------------------------------------------

/// What a requirement slot accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotPattern {
    /// A specific course, compared by base code.
    Exact(String),
    /// Any course whose code starts with the prefix (written `GEA%`).
    Prefix(String),
    /// Any course at all (written `*`).
    Any,
}

impl SlotPattern {
    pub fn parse(raw: &str) -> Self {
        let raw = normalize(raw);
        if raw == "*" {
            return Self::Any;
        }
        match raw.strip_suffix('%') {
            Some(prefix) => Self::Prefix(prefix.to_owned()),
            None => Self::Exact(raw),
        }
    }

    pub fn matches(&self, code: &str) -> bool {
        match self {
            Self::Exact(slot) => base_code(slot) == base_code(code),
            Self::Prefix(prefix) => normalize(code).starts_with(prefix.as_str()),
            Self::Any => true,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact(_))
    }
}

impl fmt::Display for SlotPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(code) => f.write_str(code),
            Self::Prefix(prefix) => write!(f, "{prefix}%"),
            Self::Any => f.write_str("*"),
        }
    }
}

impl FromStr for SlotPattern {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl Serialize for SlotPattern {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotPattern {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementSlot {
    pub pattern: SlotPattern,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RequirementSlot {
    pub fn new(pattern: SlotPattern) -> Self {
        Self {
            pattern,
            description: None,
        }
    }

    /// Text shown for the slot: its description, or the pattern itself.
    pub fn label(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| self.pattern.to_string())
    }
}

/// One block of a degree's requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementCategory {
    pub name: String,
    pub kind: CategoryKind,
    pub required_credits: Decimal,
    /// Courses generated for this category are interchangeable fillers.
    #[serde(default)]
    pub fluff: bool,
    #[serde(default)]
    pub slots: Vec<RequirementSlot>,
}

impl RequirementCategory {
    pub fn is_unrestricted(&self) -> bool {
        self.kind == CategoryKind::Unrestricted
    }

    /// The slots to match against. An unrestricted category without listed
    /// slots gets one `Any` slot per 4 required credits.
    pub fn effective_slots(&self) -> Vec<RequirementSlot> {
        if !self.slots.is_empty() || !self.is_unrestricted() {
            return self.slots.clone();
        }
        let count = (self.required_credits / Decimal::from(4))
            .floor()
            .to_usize()
            .unwrap_or(0);
        (1..=count)
            .map(|i| RequirementSlot {
                pattern: SlotPattern::Any,
                description: Some(format!("Unrestricted elective {i}")),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Source of requirement categories for a degree programme.
pub trait RequirementProvider: Send + Sync {
    fn categories(
        &self,
        degree: &str,
        major: &str,
        focus_area: Option<&str>,
    ) -> Result<Vec<RequirementCategory>, RequirementError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusArea {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub categories: Vec<RequirementCategory>,
}

impl FocusArea {
    /// Exact code match first, then case-insensitive name containment.
    fn matches_code(&self, wanted: &str) -> bool {
        self.code.eq_ignore_ascii_case(wanted.trim())
    }

    fn matches_name(&self, wanted: &str) -> bool {
        self.name
            .to_lowercase()
            .contains(&wanted.trim().to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Programme {
    pub degree: String,
    pub major: String,
    pub total_credits: Decimal,
    #[serde(default)]
    pub categories: Vec<RequirementCategory>,
    #[serde(default)]
    pub focus_areas: Vec<FocusArea>,
}

impl Programme {
    fn focus_area(&self, wanted: &str) -> Option<&FocusArea> {
        self.focus_areas
            .iter()
            .find(|f| f.matches_code(wanted))
            .or_else(|| self.focus_areas.iter().find(|f| f.matches_name(wanted)))
    }
}

/// Requirements for a set of programmes held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRequirements {
    programmes: Vec<Programme>,
}

impl InMemoryRequirements {
    pub fn new(programmes: Vec<Programme>) -> Self {
        Self { programmes }
    }

    pub fn programmes(&self) -> &[Programme] {
        &self.programmes
    }

    fn programme(&self, degree: &str, major: &str) -> Option<&Programme> {
        self.programmes.iter().find(|p| {
            p.degree.eq_ignore_ascii_case(degree.trim()) && p.major.eq_ignore_ascii_case(major.trim())
        })
    }
}

impl RequirementProvider for InMemoryRequirements {
    fn categories(
        &self,
        degree: &str,
        major: &str,
        focus_area: Option<&str>,
    ) -> Result<Vec<RequirementCategory>, RequirementError> {
        let programme =
            self.programme(degree, major)
                .ok_or_else(|| RequirementError::UnknownProgramme {
                    degree: degree.to_owned(),
                    major: major.to_owned(),
                })?;

        let mut categories = programme.categories.clone();

        if programme.focus_areas.is_empty() {
            if let Some(focus) = focus_area {
                tracing::debug!(major = %programme.major, focus, "programme has no focus areas, ignoring");
            }
            return Ok(categories);
        }

        let Some(wanted) = focus_area.filter(|f| !f.trim().is_empty()) else {
            return Err(RequirementError::FocusAreaRequired {
                major: programme.major.clone(),
                available: programme
                    .focus_areas
                    .iter()
                    .map(|f| f.name.clone())
                    .collect(),
            });
        };

        let focus = programme
            .focus_area(wanted)
            .ok_or_else(|| RequirementError::UnknownFocusArea {
                major: programme.major.clone(),
                focus: wanted.to_owned(),
            })?;

        // Focus categories slot in before the unrestricted block.
        let insert_at = categories
            .iter()
            .position(RequirementCategory::is_unrestricted)
            .unwrap_or(categories.len());
        categories.splice(insert_at..insert_at, focus.categories.iter().cloned());

        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(name: &str, kind: CategoryKind, credits: i64, slots: &[&str]) -> RequirementCategory {
        RequirementCategory {
            name: name.to_owned(),
            kind,
            required_credits: Decimal::from(credits),
            fluff: false,
            slots: slots
                .iter()
                .map(|s| RequirementSlot::new(SlotPattern::parse(s)))
                .collect(),
        }
    }

    fn provider() -> InMemoryRequirements {
        InMemoryRequirements::new(vec![
            Programme {
                degree: "computing".to_owned(),
                major: "Computer Science".to_owned(),
                total_credits: Decimal::from(160),
                categories: vec![
                    category("Foundation", CategoryKind::Foundation, 8, &["CS1101S", "CS1231S"]),
                    category("Unrestricted Electives", CategoryKind::Unrestricted, 40, &[]),
                ],
                focus_areas: vec![FocusArea {
                    code: "AI".to_owned(),
                    name: "Artificial Intelligence".to_owned(),
                    categories: vec![category("AI Focus", CategoryKind::Elective, 4, &["CS3243"])],
                }],
            },
            Programme {
                degree: "computing".to_owned(),
                major: "Information Security".to_owned(),
                total_credits: Decimal::from(160),
                categories: vec![category("Foundation", CategoryKind::Foundation, 4, &["CS2107"])],
                focus_areas: vec![],
            },
        ])
    }

    #[test]
    fn slot_pattern_parsing() {
        assert_eq!(SlotPattern::parse("cs2040s"), SlotPattern::Exact("CS2040S".to_owned()));
        assert_eq!(SlotPattern::parse("GEA%"), SlotPattern::Prefix("GEA".to_owned()));
        assert_eq!(SlotPattern::parse("*"), SlotPattern::Any);
        assert_eq!(SlotPattern::parse("GEA%").to_string(), "GEA%");
    }

    #[test]
    fn exact_slot_matches_on_base_code() {
        let slot = SlotPattern::parse("CS2040");
        assert!(slot.matches("CS2040S"));
        assert!(!slot.matches("CS2030S"));
    }

    #[test]
    fn prefix_slot_matches_prefix() {
        let slot = SlotPattern::parse("GEA%");
        assert!(slot.matches("GEA1000"));
        assert!(!slot.matches("GEC1001"));
    }

    #[test]
    fn unrestricted_without_slots_synthesizes_any_slots() {
        let ue = category("UE", CategoryKind::Unrestricted, 40, &[]);
        let slots = ue.effective_slots();
        assert_eq!(slots.len(), 10);
        assert!(slots.iter().all(|s| s.pattern == SlotPattern::Any));
    }

    #[test]
    fn focus_area_by_code_or_name() {
        let p = provider();
        let by_code = p.categories("computing", "computer science", Some("ai")).unwrap();
        let by_name = p
            .categories("Computing", "Computer Science", Some("intelligence"))
            .unwrap();
        assert_eq!(by_code, by_name);
        let names: Vec<_> = by_code.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Foundation", "AI Focus", "Unrestricted Electives"]);
    }

    #[test]
    fn missing_focus_area_is_an_error_when_programme_has_them() {
        let err = provider()
            .categories("computing", "Computer Science", None)
            .unwrap_err();
        assert!(matches!(err, RequirementError::FocusAreaRequired { .. }));
        assert!(err.to_string().contains("Artificial Intelligence"));
    }

    #[test]
    fn unknown_focus_area_is_an_error() {
        let err = provider()
            .categories("computing", "Computer Science", Some("Basket Weaving"))
            .unwrap_err();
        assert!(matches!(err, RequirementError::UnknownFocusArea { .. }));
    }

    #[test]
    fn focus_area_ignored_without_focus_areas() {
        let categories = provider()
            .categories("computing", "Information Security", Some("AI"))
            .unwrap();
        assert_eq!(categories.len(), 1);
    }

    #[test]
    fn unknown_programme() {
        let err = provider().categories("law", "Law", None).unwrap_err();
        assert!(matches!(err, RequirementError::UnknownProgramme { .. }));
    }
}

//! Ordered outline: section name to subsection names
//!
//! Serialized as a JSON object whose key order is the section order.
//! Deserialization keeps that order and rejects anything that is not a
//! non-empty mapping of unique, non-blank strings to lists of strings.

use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Reasons an outline is structurally invalid
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutlineError {
    #[error("outline has no sections")]
    Empty,

    #[error("duplicate section '{0}'")]
    DuplicateSection(String),

    #[error("section name must not be blank")]
    BlankSection,
}

/// One outline section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub subsections: Vec<String>,
}

impl Section {
    pub fn new(name: impl Into<String>, subsections: Vec<String>) -> Self {
        Self {
            name: name.into(),
            subsections,
        }
    }
}

/// Non-empty, order-significant list of uniquely named sections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outline {
    sections: Vec<Section>,
}

impl Outline {
    /// Build an outline, enforcing the structural invariants
    pub fn new(sections: Vec<Section>) -> Result<Self, OutlineError> {
        if sections.is_empty() {
            return Err(OutlineError::Empty);
        }
        for (idx, section) in sections.iter().enumerate() {
            if section.name.trim().is_empty() {
                return Err(OutlineError::BlankSection);
            }
            if sections[..idx].iter().any(|s| s.name == section.name) {
                return Err(OutlineError::DuplicateSection(section.name.clone()));
            }
        }
        Ok(Self { sections })
    }

    /// Build from static pairs; used for the built-in templates
    pub(crate) fn from_static(pairs: &[(&str, &[&str])]) -> Self {
        Self {
            sections: pairs
                .iter()
                .map(|(name, subs)| Section::new(*name, subs.iter().map(|s| s.to_string()).collect()))
                .collect(),
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Always false: outlines are never empty
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    pub fn first_section(&self) -> Option<&str> {
        self.sections.first().map(|s| s.name.as_str())
    }

    /// Section following `name` in outline order, None after the last one
    pub fn next_section(&self, name: &str) -> Option<&str> {
        let idx = self.position(name)?;
        self.sections.get(idx + 1).map(|s| s.name.as_str())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.name == name)
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Pretty JSON object, in section order
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Serialize for Outline {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for section in &self.sections {
            map.serialize_entry(&section.name, &section.subsections)?;
        }
        map.end()
    }
}

struct OutlineVisitor;

impl<'de> Visitor<'de> for OutlineVisitor {
    type Value = Outline;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object mapping section names to lists of subsection names")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Outline, A::Error> {
        let mut sections = Vec::with_capacity(access.size_hint().unwrap_or(4));
        while let Some((name, subsections)) = access.next_entry::<String, Vec<String>>()? {
            sections.push(Section { name, subsections });
        }
        Outline::new(sections).map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Outline {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OutlineVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Outline {
        Outline::from_static(&[
            ("Introduction", &["Context", "Main Points"]),
            ("Analysis", &["Key Findings"]),
            ("Conclusion", &[]),
        ])
    }

    #[test]
    fn test_order_preserved_through_json() {
        let json = r#"{"Zeta": ["a"], "Alpha": ["b", "c"], "Mid": []}"#;
        let outline: Outline = serde_json::from_str(json).unwrap();

        let names: Vec<_> = outline.section_names().collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);

        let back = serde_json::to_string(&outline).unwrap();
        assert_eq!(back, r#"{"Zeta":["a"],"Alpha":["b","c"],"Mid":[]}"#);
    }

    #[test]
    fn test_rejects_invalid_shapes() {
        assert!(serde_json::from_str::<Outline>("{}").is_err());
        assert!(serde_json::from_str::<Outline>(r#"{"A": "not a list"}"#).is_err());
        assert!(serde_json::from_str::<Outline>(r#"{"A": ["ok", 3]}"#).is_err());
        assert!(serde_json::from_str::<Outline>(r#"{"A": [["nested"]]}"#).is_err());
        assert!(serde_json::from_str::<Outline>(r#"["A", "B"]"#).is_err());
        assert!(serde_json::from_str::<Outline>(r#"{"": ["x"]}"#).is_err());
    }

    #[test]
    fn test_rejects_duplicate_sections() {
        let err = serde_json::from_str::<Outline>(r#"{"A": [], "A": ["x"]}"#).unwrap_err();
        assert!(err.to_string().contains("duplicate section 'A'"));
    }

    #[test]
    fn test_new_enforces_invariants() {
        assert_eq!(Outline::new(vec![]), Err(OutlineError::Empty));
        assert_eq!(
            Outline::new(vec![Section::new("  ", vec![])]),
            Err(OutlineError::BlankSection)
        );
        assert!(Outline::new(vec![Section::new("Only", vec![])]).is_ok());
    }

    #[test]
    fn test_navigation() {
        let outline = sample();
        assert_eq!(outline.first_section(), Some("Introduction"));
        assert_eq!(outline.next_section("Introduction"), Some("Analysis"));
        assert_eq!(outline.next_section("Analysis"), Some("Conclusion"));
        assert_eq!(outline.next_section("Conclusion"), None);
        assert_eq!(outline.next_section("Missing"), None);
        assert_eq!(outline.position("Analysis"), Some(1));
        assert!(outline.contains("Conclusion"));
        assert_eq!(outline.section("Introduction").unwrap().subsections.len(), 2);
    }

    #[test]
    fn test_to_json_pretty() {
        let pretty = sample().to_json_pretty();
        assert!(pretty.starts_with("{\n"));
        assert!(pretty.find("Introduction").unwrap() < pretty.find("Conclusion").unwrap());
    }
}

//! The editable website content document.
//!
//! A [`ContentDocument`] is a JSON object mapping named sections
//! (`personalInfo`, `about`, `services`, ...) to section-specific values. It is
//! kept as an order-preserving JSON map rather than a rigid struct so that a
//! snapshot read back from any backend is exactly the snapshot that was
//! written, including sections this version does not know about.
//!
//! Typed views of each section live in [`crate::model`].

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FolioError, Result};

/// Reserved portfolio category that can never be removed.
pub const ALL_CATEGORY: &str = "All";

/// Category that items fall back to when their category is removed.
pub const DEFAULT_CATEGORY: &str = "Others";

/// The named top-level sections of a content document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// Name, title, avatar, contact details and social links.
    PersonalInfo,
    /// The two "about me" paragraphs.
    About,
    /// Offered services.
    Services,
    /// Client logos.
    Clients,
    /// Work experience timeline.
    Experience,
    /// Education timeline.
    Education,
    /// Skills with a percentage.
    Skills,
    /// Portfolio categories and items.
    Portfolio,
    /// Contact map and recipient address.
    Contact,
    /// Site-wide settings.
    Settings,
}

impl Section {
    /// Every known section, in document order.
    pub const ALL: [Section; 10] = [
        Section::PersonalInfo,
        Section::About,
        Section::Services,
        Section::Clients,
        Section::Experience,
        Section::Education,
        Section::Skills,
        Section::Portfolio,
        Section::Contact,
        Section::Settings,
    ];

    /// The JSON key of this section.
    pub fn key(&self) -> &'static str {
        match self {
            Section::PersonalInfo => "personalInfo",
            Section::About => "about",
            Section::Services => "services",
            Section::Clients => "clients",
            Section::Experience => "experience",
            Section::Education => "education",
            Section::Skills => "skills",
            Section::Portfolio => "portfolio",
            Section::Contact => "contact",
            Section::Settings => "settings",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Section {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        Section::ALL
            .iter()
            .copied()
            .find(|section| section.key().to_lowercase() == normalized)
            .ok_or_else(|| FolioError::UnknownSection(s.to_string()))
    }
}

/// The ordered collections inside a document whose entries carry integer ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionPath {
    /// `services`
    Services,
    /// `clients`
    Clients,
    /// `experience`
    Experience,
    /// `education`
    Education,
    /// `skills`
    Skills,
    /// `portfolio.items`
    PortfolioItems,
}

impl CollectionPath {
    /// Every id-bearing collection.
    pub const ALL: [CollectionPath; 6] = [
        CollectionPath::Services,
        CollectionPath::Clients,
        CollectionPath::Experience,
        CollectionPath::Education,
        CollectionPath::Skills,
        CollectionPath::PortfolioItems,
    ];

    /// The section that holds this collection.
    pub fn section(&self) -> Section {
        match self {
            CollectionPath::Services => Section::Services,
            CollectionPath::Clients => Section::Clients,
            CollectionPath::Experience => Section::Experience,
            CollectionPath::Education => Section::Education,
            CollectionPath::Skills => Section::Skills,
            CollectionPath::PortfolioItems => Section::Portfolio,
        }
    }

    /// Dotted path used in messages and on the command line.
    pub fn label(&self) -> &'static str {
        match self {
            CollectionPath::PortfolioItems => "portfolio.items",
            other => other.section().key(),
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CollectionPath {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "services" | "service" => Ok(CollectionPath::Services),
            "clients" | "client" => Ok(CollectionPath::Clients),
            "experience" => Ok(CollectionPath::Experience),
            "education" => Ok(CollectionPath::Education),
            "skills" | "skill" => Ok(CollectionPath::Skills),
            "portfolio" | "portfolio.items" | "portfolio-items" | "portfolio_items" => {
                Ok(CollectionPath::PortfolioItems)
            }
            _ => Err(FolioError::UnknownCollection(s.to_string())),
        }
    }
}

/// The full editable website content payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDocument(Map<String, Value>);

impl ContentDocument {
    /// Create an empty document (which is not valid until its required
    /// sections are filled in).
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap a JSON value; anything other than an object is rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(FolioError::Validation(format!(
                "document must be a JSON object, found {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Parse a document from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Serialize as human-readable JSON (two-space indent), the persisted form.
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.0)?)
    }

    /// Serialize as compact JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    /// Borrow the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Convert into a plain JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Get a section's raw value.
    pub fn section(&self, section: Section) -> Option<&Value> {
        self.0.get(section.key())
    }

    /// Get a section's raw value mutably.
    pub fn section_mut(&mut self, section: Section) -> Option<&mut Value> {
        self.0.get_mut(section.key())
    }

    /// Replace a section's value, returning the previous one.
    pub fn set_section(&mut self, section: Section, value: Value) -> Option<Value> {
        self.0.insert(section.key().to_string(), value)
    }

    /// Deserialize a section into one of the typed models.
    ///
    /// Returns `Ok(None)` when the section is absent or null.
    pub fn section_as<T: DeserializeOwned>(&self, section: Section) -> Result<Option<T>> {
        match self.section(section) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        }
    }

    /// Borrow the entries of a collection, if the collection exists.
    pub fn collection(&self, path: CollectionPath) -> Option<&Vec<Value>> {
        match path {
            CollectionPath::PortfolioItems => self
                .section(Section::Portfolio)?
                .get("items")?
                .as_array(),
            other => self.section(other.section())?.as_array(),
        }
    }

    /// Borrow the entries of a collection mutably, creating the collection
    /// (and the `portfolio` container) when it is missing.
    pub fn collection_mut(&mut self, path: CollectionPath) -> Result<&mut Vec<Value>> {
        let slot = match path {
            CollectionPath::PortfolioItems => {
                let portfolio = self.portfolio_mut()?;
                portfolio
                    .entry("items")
                    .or_insert_with(|| Value::Array(Vec::new()))
            }
            other => self
                .0
                .entry(other.section().key())
                .or_insert_with(|| Value::Array(Vec::new())),
        };
        if slot.is_null() {
            *slot = Value::Array(Vec::new());
        }
        slot.as_array_mut()
            .ok_or_else(|| FolioError::Validation(format!("'{}' is not a list", path)))
    }

    /// Largest entry id in a collection, or 0 when empty.
    pub fn max_id(&self, path: CollectionPath) -> u64 {
        self.collection(path)
            .map(|entries| entries.iter().filter_map(entry_id).max().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Find an entry by id.
    pub fn find_entry(&self, path: CollectionPath, id: u64) -> Option<&Value> {
        self.collection(path)?
            .iter()
            .find(|entry| entry_id(entry) == Some(id))
    }

    /// The portfolio category list (empty when absent).
    pub fn categories(&self) -> Vec<String> {
        self.section(Section::Portfolio)
            .and_then(|p| p.get("categories"))
            .and_then(Value::as_array)
            .map(|cats| {
                cats.iter()
                    .filter_map(|c| c.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Borrow the category list mutably, creating it when missing.
    pub fn categories_mut(&mut self) -> Result<&mut Vec<Value>> {
        let portfolio = self.portfolio_mut()?;
        let slot = portfolio
            .entry("categories")
            .or_insert_with(|| Value::Array(Vec::new()));
        slot.as_array_mut()
            .ok_or_else(|| FolioError::Validation("'portfolio.categories' is not a list".into()))
    }

    /// Check the document is acceptable to a persistence backend.
    pub fn validate(&self) -> Result<()> {
        validate_document(self)
    }

    fn portfolio_mut(&mut self) -> Result<&mut Map<String, Value>> {
        let slot = self
            .0
            .entry(Section::Portfolio.key())
            .or_insert_with(|| Value::Object(Map::new()));
        if slot.is_null() {
            *slot = Value::Object(Map::new());
        }
        slot.as_object_mut()
            .ok_or_else(|| FolioError::Validation("'portfolio' is not an object".into()))
    }
}

/// Read the integer id of a collection entry.
pub fn entry_id(entry: &Value) -> Option<u64> {
    entry.get("id").and_then(Value::as_u64)
}

/// Validate the structure every backend requires before accepting a write:
/// `personalInfo` and `about` must be present and non-empty.
pub fn validate_document(doc: &ContentDocument) -> Result<()> {
    for section in [Section::PersonalInfo, Section::About] {
        match doc.section(section) {
            None => {
                return Err(FolioError::Validation(format!(
                    "missing required section '{}'",
                    section
                )));
            }
            Some(value) if is_empty_value(value) => {
                return Err(FolioError::Validation(format!(
                    "required section '{}' is empty",
                    section
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Number(_) => false,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> ContentDocument {
        ContentDocument::from_value(json!({
            "personalInfo": {"name": "Ada"},
            "about": {"text1": "Hello", "text2": "World"}
        }))
        .unwrap()
    }

    #[test]
    fn test_section_parsing() {
        assert_eq!("personalInfo".parse::<Section>().unwrap(), Section::PersonalInfo);
        assert_eq!("personal-info".parse::<Section>().unwrap(), Section::PersonalInfo);
        assert_eq!("SETTINGS".parse::<Section>().unwrap(), Section::Settings);
        assert!("blog".parse::<Section>().is_err());
    }

    #[test]
    fn test_collection_parsing() {
        assert_eq!(
            "portfolio.items".parse::<CollectionPath>().unwrap(),
            CollectionPath::PortfolioItems
        );
        assert_eq!(CollectionPath::PortfolioItems.label(), "portfolio.items");
        assert_eq!(CollectionPath::Skills.label(), "skills");
        assert!("contact".parse::<CollectionPath>().is_err());
    }

    #[test]
    fn test_non_object_rejected() {
        let err = ContentDocument::from_json_str("[1, 2]").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_validation_requires_personal_info_and_about() {
        assert!(minimal().validate().is_ok());

        let mut doc = minimal();
        doc.set_section(Section::About, Value::Null);
        assert!(doc.validate().unwrap_err().is_validation());

        let doc = ContentDocument::from_value(json!({"about": {"text1": "x"}})).unwrap();
        assert!(doc.validate().unwrap_err().is_validation());

        let doc =
            ContentDocument::from_value(json!({"personalInfo": {}, "about": {"text1": "x"}}))
                .unwrap();
        assert!(doc.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_collection_mut_creates_portfolio_items() {
        let mut doc = minimal();
        assert!(doc.collection(CollectionPath::PortfolioItems).is_none());
        doc.collection_mut(CollectionPath::PortfolioItems)
            .unwrap()
            .push(json!({"id": 4, "title": "Poster"}));
        assert_eq!(doc.max_id(CollectionPath::PortfolioItems), 4);
        assert!(doc.find_entry(CollectionPath::PortfolioItems, 4).is_some());
    }

    #[test]
    fn test_section_order_survives_round_trip() {
        let doc = minimal();
        let text = doc.to_pretty_json().unwrap();
        assert!(text.find("personalInfo").unwrap() < text.find("about").unwrap());
        assert_eq!(ContentDocument::from_json_str(&text).unwrap(), doc);
    }
}

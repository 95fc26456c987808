//! Typed models for each document section, the default document, and the
//! templates used when a new collection entry is added.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::document::{ALL_CATEGORY, CollectionPath, ContentDocument, DEFAULT_CATEGORY, Section};

/// `personalInfo`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    /// Display name
    pub name: String,
    /// Job title
    pub title: String,
    /// Avatar image reference
    pub image: String,
    /// Public email address
    pub email: String,
    /// Phone number as displayed
    pub phone: String,
    /// Location line
    pub location: String,
    /// Social profile links
    #[serde(default)]
    pub social_links: Vec<SocialLink>,
}

/// A social profile link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialLink {
    /// Platform name, e.g. "Instagram"
    pub platform: String,
    /// Profile URL
    pub url: String,
}

/// `about`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct About {
    /// First paragraph
    pub text1: String,
    /// Second paragraph
    pub text2: String,
}

/// An entry of `services`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// Id unique within `services`
    pub id: u64,
    /// Icon class
    pub icon: String,
    /// Service title
    pub title: String,
    /// Short description
    pub description: String,
}

/// An entry of `clients`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    /// Id unique within `clients`
    pub id: u64,
    /// Logo image reference
    pub image: String,
    /// Alt text
    pub alt: String,
}

/// An entry of `experience`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    /// Id unique within `experience`
    pub id: u64,
    /// Role title
    pub title: String,
    /// Period, e.g. "2020 - Present"
    pub period: String,
    /// Summary
    #[serde(default)]
    pub description: String,
    /// Bullet points; a "Label: text" bullet renders with a bold label
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

/// An entry of `education`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
    /// Id unique within `education`
    pub id: u64,
    /// Institution
    pub title: String,
    /// Period
    pub period: String,
    /// Summary
    pub description: String,
}

/// An entry of `skills`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    /// Id unique within `skills`
    pub id: u64,
    /// Skill name
    pub name: String,
    /// Proficiency, 0–100
    pub percentage: u8,
}

/// `portfolio`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    /// Filter categories; always includes "All"
    pub categories: Vec<String>,
    /// Portfolio items
    pub items: Vec<PortfolioItem>,
}

/// An entry of `portfolio.items`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioItem {
    /// Id unique within `portfolio.items`
    pub id: u64,
    /// Item title
    pub title: String,
    /// Category name
    pub category: String,
    /// Image reference (path, URL or data URL)
    pub image: String,
}

/// `contact`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Embedded map URL
    pub map_embed: String,
    /// Recipient address for the contact form
    pub email: String,
}

/// `settings`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Browser title
    pub site_title: String,
    /// Favicon reference
    pub favicon: String,
    /// Whether the contact form is shown
    pub enable_contact_form: bool,
}

/// The template used for a new entry of `path` (without an id).
pub fn entry_template(path: CollectionPath) -> Value {
    match path {
        CollectionPath::Services => json!({
            "icon": "fas fa-star",
            "title": "New Service",
            "description": "Service description here"
        }),
        CollectionPath::Clients => json!({
            "image": "./assets/images/logo-1.jpeg",
            "alt": "client logo"
        }),
        CollectionPath::Experience => json!({
            "title": "New Position",
            "period": "2024 - Present",
            "description": "Description here",
            "details": []
        }),
        CollectionPath::Education => json!({
            "title": "New Institution",
            "period": "2020 - 2024",
            "description": "Description here"
        }),
        CollectionPath::Skills => json!({
            "name": "New Skill",
            "percentage": 50
        }),
        CollectionPath::PortfolioItems => json!({
            "title": "New Portfolio Item",
            "category": DEFAULT_CATEGORY,
            "image": "./assets/images/port-1.jpeg"
        }),
    }
}

/// The document a freshly initialised site starts from.
pub fn default_document() -> ContentDocument {
    let personal = PersonalInfo {
        name: "Your Name".into(),
        title: "Freelance Designer".into(),
        image: "./assets/images/avatar.jpg".into(),
        email: "hello@example.com".into(),
        phone: "+1 555 0100".into(),
        location: "Somewhere, Earth".into(),
        social_links: vec![SocialLink {
            platform: "Instagram".into(),
            url: "https://www.instagram.com/".into(),
        }],
    };
    let about = About {
        text1: "A short introduction about who you are and what you do.".into(),
        text2: "How you approach your work and what clients can expect.".into(),
    };
    let services = vec![
        Service {
            id: 1,
            icon: "fas fa-palette".into(),
            title: "Branding & Identity".into(),
            description: "Logo design, brand style guides and corporate identity packages.".into(),
        },
        Service {
            id: 2,
            icon: "fas fa-bullhorn".into(),
            title: "Marketing & Advertising Design".into(),
            description: "Social media graphics, posters, flyers and banner ads.".into(),
        },
        Service {
            id: 3,
            icon: "fas fa-desktop".into(),
            title: "Digital Graphics".into(),
            description: "Graphics for websites, presentations and digital platforms.".into(),
        },
        Service {
            id: 4,
            icon: "fas fa-print".into(),
            title: "Print Design".into(),
            description: "Print-ready designs with consistency across all materials.".into(),
        },
    ];
    let clients: Vec<Client> = (1..=3)
        .map(|id| Client {
            id,
            image: format!("./assets/images/logo-{}.jpeg", id),
            alt: format!("client logo {}", id),
        })
        .collect();
    let experience = vec![Experience {
        id: 1,
        title: "Freelance Designer".into(),
        period: "2020 - Present".into(),
        description: "Design work for companies and individual clients.".into(),
        details: vec!["Branding & Identity: logos, style guides and stationery.".into()],
    }];
    let education = vec![Education {
        id: 1,
        title: "Institute of Design".into(),
        period: "2016 - 2020".into(),
        description: "Bachelor degree.".into(),
    }];
    let skills = vec![
        Skill {
            id: 1,
            name: "Graphic Design".into(),
            percentage: 90,
        },
        Skill {
            id: 2,
            name: "Illustration".into(),
            percentage: 80,
        },
    ];
    let categories: Vec<String> = [ALL_CATEGORY, "Logos", "Posters", "Social", DEFAULT_CATEGORY]
        .iter()
        .map(|c| c.to_string())
        .collect();
    let items = vec![
        PortfolioItem {
            id: 1,
            title: "Logo Design 1".into(),
            category: "Logos".into(),
            image: "./assets/images/port-1.jpeg".into(),
        },
        PortfolioItem {
            id: 2,
            title: "Poster Design 1".into(),
            category: "Posters".into(),
            image: "./assets/images/port-2.jpeg".into(),
        },
        PortfolioItem {
            id: 3,
            title: "Social Media 1".into(),
            category: "Social".into(),
            image: "./assets/images/port-3.jpeg".into(),
        },
    ];
    let contact = Contact {
        map_embed: "https://www.google.com/maps/embed".into(),
        email: "hello@example.com".into(),
    };
    let settings = Settings {
        site_title: "Your Name - Freelance Designer".into(),
        favicon: "./assets/images/favicon.svg".into(),
        enable_contact_form: true,
    };

    let mut doc = ContentDocument::new();
    doc.set_section(Section::PersonalInfo, json!(personal));
    doc.set_section(Section::About, json!(about));
    doc.set_section(Section::Services, json!(services));
    doc.set_section(Section::Clients, json!(clients));
    doc.set_section(Section::Experience, json!(experience));
    doc.set_section(Section::Education, json!(education));
    doc.set_section(Section::Skills, json!(skills));
    doc.set_section(Section::Portfolio, json!(Portfolio { categories, items }));
    doc.set_section(Section::Contact, json!(contact));
    doc.set_section(Section::Settings, json!(settings));
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_document_is_valid_and_typed() {
        let doc = default_document();
        assert!(doc.validate().is_ok());

        let info: PersonalInfo = doc.section_as(Section::PersonalInfo).unwrap().unwrap();
        assert_eq!(info.social_links.len(), 1);

        let portfolio: Portfolio = doc.section_as(Section::Portfolio).unwrap().unwrap();
        assert_eq!(portfolio.categories.first().map(String::as_str), Some(ALL_CATEGORY));
        assert!(portfolio.categories.iter().any(|c| c == DEFAULT_CATEGORY));

        let settings: Settings = doc.section_as(Section::Settings).unwrap().unwrap();
        assert!(settings.enable_contact_form);
    }

    #[test]
    fn test_default_sections_in_order() {
        let doc = default_document();
        let keys: Vec<&str> = doc.as_map().keys().map(String::as_str).collect();
        let expected: Vec<&str> = Section::ALL.iter().map(Section::key).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_templates_have_no_id() {
        for path in CollectionPath::ALL {
            assert!(entry_template(path).get("id").is_none(), "{}", path);
        }
    }

    #[test]
    fn test_skill_template_deserializes_with_id() {
        let mut template = entry_template(CollectionPath::Skills);
        template["id"] = json!(7);
        let skill: Skill = serde_json::from_value(template).unwrap();
        assert_eq!(skill.id, 7);
        assert_eq!(skill.percentage, 50);
    }
}

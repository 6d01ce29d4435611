use serde::{Deserialize, Serialize};

use super::mock;
use crate::db::models::AboutContent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub title: String,
    pub company: String,
    pub period: String,
    pub description: String,
    #[serde(default)]
    pub technologies: Vec<String>,
}

/// About page: raw sections plus the structured lists kept in their `data`.
#[derive(Debug, Clone, Serialize)]
pub struct AboutPage {
    pub sections: Vec<AboutContent>,
    pub experiences: Vec<Experience>,
    pub interests: Vec<String>,
}

/// Decode the `data` of `section`, if present and well-formed.
fn section_data<T: for<'de> Deserialize<'de>>(sections: &[AboutContent], section: &str) -> Option<T> {
    let data = sections
        .iter()
        .find(|s| s.section == section)?
        .data
        .clone()?;

    match serde_json::from_value(data) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Malformed {} data, using defaults: {}", section, e);
            None
        }
    }
}

impl AboutPage {
    /// Missing or malformed `experience` / `interests` data falls back to
    /// the built-in lists.
    pub fn from_sections(sections: Vec<AboutContent>) -> Self {
        let experiences = section_data(&sections, "experience").unwrap_or_else(mock::experiences);
        let interests = section_data(&sections, "interests").unwrap_or_else(mock::interests);
        Self {
            sections,
            experiences,
            interests,
        }
    }

    pub fn fallback() -> Self {
        Self::from_sections(mock::about_sections())
    }
}

//! Dashboard form bodies and the rows they become.
//!
//! Forms arrive flat, the way the dashboard edits them: technologies as a
//! comma-separated string, section `data` as JSON text. Validation happens
//! here, before anything touches the store.

use serde::Deserialize;
use serde_json::{json, Value};

use super::contact::ContactType;
use crate::error::AppError;

/// A form that validates into a writable row.
pub trait FormRow {
    fn into_row(self) -> Result<Value, AppError>;
}

fn required(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Empty or whitespace-only optional text becomes `null`.
fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse JSON text. Empty text is `null`; malformed text is rejected.
pub fn parse_json_text(text: Option<&str>) -> Result<Option<Value>, AppError> {
    match text.map(str::trim).filter(|t| !t.is_empty()) {
        None => Ok(None),
        Some(t) => serde_json::from_str(t)
            .map(Some)
            .map_err(|e| AppError::Validation(format!("Invalid JSON in data: {}", e))),
    }
}

// ============================================================================
// Projects
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub image: Option<String>,
    #[serde(default)]
    pub technologies: String,
    #[serde(default)]
    pub category: String,
    pub live_url: Option<String>,
    pub github_url: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub date: String,
    pub status: Option<String>,
}

impl FormRow for ProjectForm {
    fn into_row(self) -> Result<Value, AppError> {
        let title = required(&self.title, "Title")?;
        let description = required(&self.description, "Description")?;
        let category = required(&self.category, "Category")?;
        let technologies = split_list(&self.technologies);
        if technologies.is_empty() {
            return Err(AppError::Validation("Technologies are required".to_string()));
        }
        let date = required(&self.date, "Date")?;

        Ok(json!({
            "title": title,
            "description": description,
            "image": optional(self.image),
            "technologies": technologies,
            "category": category,
            "live_url": optional(self.live_url),
            "github_url": optional(self.github_url),
            "featured": self.featured,
            "date": date,
            "status": optional(self.status).unwrap_or_else(|| "Completed".to_string()),
        }))
    }
}

// ============================================================================
// Skills
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkillForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level: i32,
    #[serde(default)]
    pub category: String,
}

impl FormRow for SkillForm {
    fn into_row(self) -> Result<Value, AppError> {
        let name = required(&self.name, "Name")?;
        let category = required(&self.category, "Category")?;
        if !(0..=100).contains(&self.level) {
            return Err(AppError::Validation(
                "Level must be between 0 and 100".to_string(),
            ));
        }

        Ok(json!({
            "name": name,
            "level": self.level,
            "category": category,
        }))
    }
}

// ============================================================================
// About / home sections
// ============================================================================

/// Shared by about and home content.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionForm {
    #[serde(default)]
    pub section: String,
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    /// JSON text
    pub data: Option<String>,
}

impl FormRow for SectionForm {
    fn into_row(self) -> Result<Value, AppError> {
        let section = required(&self.section, "Section")?;
        let content = required(&self.content, "Content")?;
        let data = parse_json_text(self.data.as_deref())?;

        Ok(json!({
            "section": section,
            "title": optional(self.title),
            "content": content,
            "data": data,
        }))
    }
}

// ============================================================================
// Contact info
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactInfoForm {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub value: String,
    pub link: Option<String>,
    pub icon: Option<String>,
}

impl FormRow for ContactInfoForm {
    fn into_row(self) -> Result<Value, AppError> {
        let kind = required(&self.kind, "Type")?;
        let title = required(&self.title, "Title")?;
        let value = required(&self.value, "Value")?;

        let icon = optional(self.icon).unwrap_or_else(|| {
            ContactType::parse(&kind)
                .unwrap_or(ContactType::Other)
                .default_icon()
                .name()
                .to_string()
        });

        Ok(json!({
            "type": kind,
            "title": title,
            "value": value,
            "link": optional(self.link),
            "icon": icon,
        }))
    }
}

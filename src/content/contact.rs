use serde::{Deserialize, Serialize};

use crate::db::models::ContactInfo;

/// Icons the contact page knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactIcon {
    Mail,
    Phone,
    MapPin,
    Clock,
    Github,
    Linkedin,
    Twitter,
    Globe,
    Info,
}

impl ContactIcon {
    pub const ALL: [ContactIcon; 9] = [
        ContactIcon::Mail,
        ContactIcon::Phone,
        ContactIcon::MapPin,
        ContactIcon::Clock,
        ContactIcon::Github,
        ContactIcon::Linkedin,
        ContactIcon::Twitter,
        ContactIcon::Globe,
        ContactIcon::Info,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ContactIcon::Mail => "Mail",
            ContactIcon::Phone => "Phone",
            ContactIcon::MapPin => "MapPin",
            ContactIcon::Clock => "Clock",
            ContactIcon::Github => "Github",
            ContactIcon::Linkedin => "Linkedin",
            ContactIcon::Twitter => "Twitter",
            ContactIcon::Globe => "Globe",
            ContactIcon::Info => "Info",
        }
    }

    /// Look up an icon by name; unknown or missing names fall back to Mail.
    pub fn resolve(name: Option<&str>) -> Self {
        name.and_then(|n| Self::ALL.into_iter().find(|icon| icon.name() == n))
            .unwrap_or(ContactIcon::Mail)
    }
}

/// Contact types offered by the dashboard form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactType {
    Email,
    Phone,
    Location,
    ResponseTime,
    Github,
    Linkedin,
    Twitter,
    Website,
    Other,
}

impl ContactType {
    pub const ALL: [ContactType; 9] = [
        ContactType::Email,
        ContactType::Phone,
        ContactType::Location,
        ContactType::ResponseTime,
        ContactType::Github,
        ContactType::Linkedin,
        ContactType::Twitter,
        ContactType::Website,
        ContactType::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContactType::Email => "email",
            ContactType::Phone => "phone",
            ContactType::Location => "location",
            ContactType::ResponseTime => "response_time",
            ContactType::Github => "github",
            ContactType::Linkedin => "linkedin",
            ContactType::Twitter => "twitter",
            ContactType::Website => "website",
            ContactType::Other => "other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ContactType::Email => "Email",
            ContactType::Phone => "Phone",
            ContactType::Location => "Location",
            ContactType::ResponseTime => "Response Time",
            ContactType::Github => "GitHub",
            ContactType::Linkedin => "LinkedIn",
            ContactType::Twitter => "Twitter",
            ContactType::Website => "Website",
            ContactType::Other => "Other",
        }
    }

    pub fn default_icon(self) -> ContactIcon {
        match self {
            ContactType::Email => ContactIcon::Mail,
            ContactType::Phone => ContactIcon::Phone,
            ContactType::Location => ContactIcon::MapPin,
            ContactType::ResponseTime => ContactIcon::Clock,
            ContactType::Github => ContactIcon::Github,
            ContactType::Linkedin => ContactIcon::Linkedin,
            ContactType::Twitter => ContactIcon::Twitter,
            ContactType::Website => ContactIcon::Globe,
            ContactType::Other => ContactIcon::Info,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

/// Contact row with its icon resolved for display.
#[derive(Debug, Clone, Serialize)]
pub struct ContactCard {
    #[serde(flatten)]
    pub info: ContactInfo,
    pub resolved_icon: ContactIcon,
}

impl From<ContactInfo> for ContactCard {
    fn from(info: ContactInfo) -> Self {
        let resolved_icon = ContactIcon::resolve(info.icon.as_deref());
        Self {
            info,
            resolved_icon,
        }
    }
}

use serde::Serialize;

use crate::db::models::HomeContent;

/// A hero section the home page reads, with its built-in default.
#[derive(Debug, Clone, Copy)]
pub struct HeroSection {
    pub section: &'static str,
    pub label: &'static str,
    pub default_content: &'static str,
    /// Link target for call-to-action sections, read from `data.href`.
    pub default_href: Option<&'static str>,
}

pub const HERO_SECTIONS: [HeroSection; 9] = [
    HeroSection {
        section: "hero_greeting",
        label: "Hero Greeting",
        default_content: "console.log(\"Hello, World!\")",
        default_href: None,
    },
    HeroSection {
        section: "hero_name",
        label: "Developer Name",
        default_content: "LoNg",
        default_href: None,
    },
    HeroSection {
        section: "hero_title",
        label: "Main Title",
        default_content: "Full-Stack Developer",
        default_href: None,
    },
    HeroSection {
        section: "hero_subtitle",
        label: "Subtitle",
        default_content: "Building digital experiences with modern technologies",
        default_href: None,
    },
    HeroSection {
        section: "hero_cta_primary",
        label: "Primary CTA",
        default_content: "View My Work",
        default_href: Some("#projects"),
    },
    HeroSection {
        section: "hero_cta_secondary",
        label: "Secondary CTA",
        default_content: "Get In Touch",
        default_href: Some("/contact"),
    },
    HeroSection {
        section: "hero_social_github",
        label: "GitHub Link",
        default_content: "https://github.com",
        default_href: None,
    },
    HeroSection {
        section: "hero_social_linkedin",
        label: "LinkedIn Link",
        default_content: "https://linkedin.com",
        default_href: None,
    },
    HeroSection {
        section: "hero_social_email",
        label: "Email Link",
        default_content: "mailto:hello@example.com",
        default_href: None,
    },
];

fn hero_section(section: &str) -> Option<&'static HeroSection> {
    HERO_SECTIONS.iter().find(|s| s.section == section)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallToAction {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SocialLinks {
    pub github: String,
    pub linkedin: String,
    pub email: String,
}

/// Hero block with every section resolved to stored content or its default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hero {
    pub greeting: String,
    pub name: String,
    pub title: String,
    pub subtitle: String,
    pub cta_primary: CallToAction,
    pub cta_secondary: CallToAction,
    pub social: SocialLinks,
}

struct Resolver<'a> {
    sections: &'a [HomeContent],
}

impl Resolver<'_> {
    fn find(&self, section: &str) -> Option<&HomeContent> {
        self.sections.iter().find(|s| s.section == section)
    }

    fn content(&self, section: &str) -> String {
        match self.find(section) {
            Some(row) => row.content.clone(),
            None => hero_section(section)
                .map(|s| s.default_content.to_string())
                .unwrap_or_default(),
        }
    }

    fn href(&self, section: &str) -> String {
        self.find(section)
            .and_then(|row| row.data.as_ref())
            .and_then(|data| data.get("href"))
            .and_then(|href| href.as_str())
            .filter(|href| !href.is_empty())
            .map(str::to_string)
            .or_else(|| {
                hero_section(section)
                    .and_then(|s| s.default_href)
                    .map(str::to_string)
            })
            .unwrap_or_default()
    }

    fn cta(&self, section: &str) -> CallToAction {
        CallToAction {
            label: self.content(section),
            href: self.href(section),
        }
    }
}

impl Hero {
    pub fn resolve(sections: &[HomeContent]) -> Self {
        let r = Resolver { sections };
        Self {
            greeting: r.content("hero_greeting"),
            name: r.content("hero_name"),
            title: r.content("hero_title"),
            subtitle: r.content("hero_subtitle"),
            cta_primary: r.cta("hero_cta_primary"),
            cta_secondary: r.cta("hero_cta_secondary"),
            social: SocialLinks {
                github: r.content("hero_social_github"),
                linkedin: r.content("hero_social_linkedin"),
                email: r.content("hero_social_email"),
            },
        }
    }
}

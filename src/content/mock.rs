//! Built-in content served when the store cannot be read.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;

use super::about::Experience;
use super::home::HERO_SECTIONS;
use crate::db::models::{AboutContent, ContactInfo, HomeContent, Project, Skill};

fn seeded_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

fn mock_id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[allow(clippy::too_many_arguments)]
fn project(
    n: u128,
    title: &str,
    description: &str,
    image: &str,
    technologies: &[&str],
    category: &str,
    featured: bool,
    date: &str,
    status: &str,
) -> Project {
    Project {
        id: mock_id(n),
        title: title.to_string(),
        description: description.to_string(),
        image: Some(image.to_string()),
        technologies: strings(technologies),
        category: category.to_string(),
        live_url: Some("https://example.com".to_string()),
        github_url: Some("https://github.com".to_string()),
        featured,
        date: Some(date.to_string()),
        status: Some(status.to_string()),
        created_at: seeded_at(),
        updated_at: seeded_at(),
    }
}

/// Featured first, like the stored ordering.
pub fn projects() -> Vec<Project> {
    vec![
        project(
            1,
            "E-Commerce Platform",
            "A full-stack e-commerce solution built with Next.js, featuring user authentication, payment processing, and admin dashboard. Includes inventory management, order tracking, and analytics.",
            "https://images.unsplash.com/photo-1556742049-0cfed4f6a45d?w=600&q=80",
            &["Next.js", "TypeScript", "Stripe", "Supabase", "Tailwind CSS"],
            "Full-Stack",
            true,
            "2024",
            "Completed",
        ),
        project(
            2,
            "Task Management App",
            "A collaborative task management application with real-time updates, drag-and-drop functionality, and team collaboration features. Built with modern React patterns.",
            "https://images.unsplash.com/photo-1611224923853-80b023f02d71?w=600&q=80",
            &["React", "Node.js", "Socket.io", "MongoDB", "Express"],
            "Full-Stack",
            true,
            "2023",
            "Completed",
        ),
        project(
            3,
            "Weather Dashboard",
            "A responsive weather dashboard with location-based forecasts, interactive maps, and detailed weather analytics. Features beautiful data visualizations.",
            "https://images.unsplash.com/photo-1504608524841-42fe6f032b4b?w=600&q=80",
            &["Vue.js", "Chart.js", "OpenWeather API", "Tailwind CSS"],
            "Frontend",
            false,
            "2023",
            "Completed",
        ),
        project(
            4,
            "Portfolio Website",
            "A modern, responsive portfolio website built with Next.js and Framer Motion, featuring dark mode and smooth animations.",
            "https://images.unsplash.com/photo-1467232004584-a241de8bcf5d?w=600&q=80",
            &["Next.js", "Framer Motion", "Tailwind CSS", "MDX"],
            "Frontend",
            false,
            "2024",
            "Completed",
        ),
        project(
            5,
            "REST API Service",
            "A scalable REST API built with Node.js and Express, featuring JWT authentication, rate limiting, and comprehensive documentation.",
            "https://images.unsplash.com/photo-1558494949-ef010cbdcc31?w=600&q=80",
            &["Node.js", "Express", "PostgreSQL", "JWT", "Swagger"],
            "Backend",
            false,
            "2023",
            "Completed",
        ),
        project(
            6,
            "Mobile Chat App",
            "A real-time chat application built with React Native, featuring end-to-end encryption, file sharing, and push notifications.",
            "https://images.unsplash.com/photo-1611606063065-ee7946f0787a?w=600&q=80",
            &["React Native", "Firebase", "Socket.io", "Redux"],
            "Mobile",
            false,
            "2024",
            "In Progress",
        ),
    ]
}

/// Category ascending, then level descending.
pub fn skills() -> Vec<Skill> {
    let mut skills: Vec<Skill> = [
        ("React", 95, "Frontend"),
        ("TypeScript", 90, "Language"),
        ("Next.js", 88, "Framework"),
        ("Node.js", 85, "Backend"),
        ("Tailwind CSS", 92, "Styling"),
        ("PostgreSQL", 80, "Database"),
        ("Supabase", 85, "Backend"),
        ("Framer Motion", 78, "Animation"),
        ("Git", 88, "Tools"),
        ("Docker", 75, "DevOps"),
        ("AWS", 70, "Cloud"),
        ("Python", 82, "Language"),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (name, level, category))| Skill {
        id: mock_id(i as u128 + 1),
        name: name.to_string(),
        level,
        category: category.to_string(),
        created_at: seeded_at(),
        updated_at: seeded_at(),
    })
    .collect();

    skills.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then_with(|| b.level.cmp(&a.level))
    });
    skills
}

pub fn experiences() -> Vec<Experience> {
    vec![
        Experience {
            title: "Senior Full-Stack Developer".to_string(),
            company: "Tech Solutions Inc.".to_string(),
            period: "2022 - Present".to_string(),
            description: "Leading development of scalable web applications using React, Next.js, and Node.js. Mentoring junior developers and architecting cloud solutions.".to_string(),
            technologies: strings(&["React", "Next.js", "TypeScript", "AWS", "PostgreSQL"]),
        },
        Experience {
            title: "Frontend Developer".to_string(),
            company: "Digital Agency Co.".to_string(),
            period: "2020 - 2022".to_string(),
            description: "Developed responsive web applications and collaborated with design teams to create pixel-perfect user interfaces.".to_string(),
            technologies: strings(&["React", "Vue.js", "Sass", "JavaScript", "Figma"]),
        },
        Experience {
            title: "Junior Developer".to_string(),
            company: "StartUp Ventures".to_string(),
            period: "2019 - 2020".to_string(),
            description: "Built and maintained web applications while learning modern development practices and agile methodologies.".to_string(),
            technologies: strings(&["HTML", "CSS", "JavaScript", "PHP", "MySQL"]),
        },
    ]
}

pub fn interests() -> Vec<String> {
    strings(&[
        "Open Source Contributions",
        "Machine Learning",
        "Mobile Development",
        "Cloud Architecture",
        "UI/UX Design",
        "Photography",
    ])
}

pub fn about_sections() -> Vec<AboutContent> {
    let section = |n: u128, section: &str, title: &str, data: serde_json::Value| AboutContent {
        id: mock_id(n),
        section: section.to_string(),
        title: Some(title.to_string()),
        content: String::new(),
        data: Some(data),
        created_at: seeded_at(),
        updated_at: seeded_at(),
    };

    vec![
        section(1, "experience", "Experience", json!(experiences())),
        section(2, "interests", "Interests", json!(interests())),
    ]
}

pub fn contact_info() -> Vec<ContactInfo> {
    [
        ("email", "Mail", "Email", "hello@example.com", "mailto:hello@example.com"),
        ("location", "MapPin", "Location", "San Francisco, CA", "#"),
        ("phone", "Phone", "Phone", "+1 (555) 123-4567", "tel:+15551234567"),
        ("response_time", "Clock", "Response Time", "Within 24 hours", "#"),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (kind, icon, title, value, link))| ContactInfo {
        id: mock_id(i as u128 + 1),
        kind: kind.to_string(),
        title: title.to_string(),
        value: value.to_string(),
        link: Some(link.to_string()),
        icon: Some(icon.to_string()),
        created_at: seeded_at(),
        updated_at: seeded_at(),
    })
    .collect()
}

/// Hero sections populated with their defaults, section ascending.
pub fn home_sections() -> Vec<HomeContent> {
    let mut sections: Vec<HomeContent> = HERO_SECTIONS
        .iter()
        .enumerate()
        .map(|(i, s)| HomeContent {
            id: mock_id(i as u128 + 1),
            section: s.section.to_string(),
            title: Some(s.label.to_string()),
            content: s.default_content.to_string(),
            data: s.default_href.map(|href| json!({ "href": href })),
            created_at: seeded_at(),
            updated_at: seeded_at(),
        })
        .collect();
    sections.sort_by(|a, b| a.section.cmp(&b.section));
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_projects_put_featured_first() {
        let projects = projects();
        assert_eq!(projects.len(), 6);
        let first_unfeatured = projects.iter().position(|p| !p.featured).unwrap();
        assert!(projects[first_unfeatured..].iter().all(|p| !p.featured));
    }

    #[test]
    fn test_mock_skills_follow_table_ordering() {
        let skills = skills();
        assert_eq!(skills.len(), 12);
        assert_eq!(skills[0].category, "Animation");
        let backend: Vec<_> = skills.iter().filter(|s| s.category == "Backend").collect();
        assert_eq!(backend[0].level, 85);
        let language: Vec<_> = skills.iter().filter(|s| s.category == "Language").collect();
        assert_eq!(language[0].name, "TypeScript");
    }

    #[test]
    fn test_mock_contact_info_sorted_by_type() {
        let kinds: Vec<String> = contact_info().into_iter().map(|c| c.kind).collect();
        let mut sorted = kinds.clone();
        sorted.sort();
        assert_eq!(kinds, sorted);
    }

    #[test]
    fn test_mock_home_sections_cover_every_hero_section() {
        assert_eq!(home_sections().len(), HERO_SECTIONS.len());
    }
}

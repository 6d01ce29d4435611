use serde::Serialize;

use crate::db::models::Skill;

/// Display tier derived from a 0-100 skill level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkillTier {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl SkillTier {
    pub fn for_level(level: i32) -> Self {
        if level >= 90 {
            SkillTier::Expert
        } else if level >= 80 {
            SkillTier::Advanced
        } else if level >= 70 {
            SkillTier::Intermediate
        } else {
            SkillTier::Beginner
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SkillTier::Expert => "Expert",
            SkillTier::Advanced => "Advanced",
            SkillTier::Intermediate => "Intermediate",
            SkillTier::Beginner => "Beginner",
        }
    }

    /// Progress bar colour
    pub fn color(self) -> &'static str {
        match self {
            SkillTier::Expert => "green",
            SkillTier::Advanced => "blue",
            SkillTier::Intermediate => "yellow",
            SkillTier::Beginner => "red",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RatedSkill {
    #[serde(flatten)]
    pub skill: Skill,
    pub tier: SkillTier,
    pub color: &'static str,
}

impl From<Skill> for RatedSkill {
    fn from(skill: Skill) -> Self {
        let tier = SkillTier::for_level(skill.level);
        Self {
            skill,
            tier,
            color: tier.color(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillGroup {
    pub category: String,
    pub skills: Vec<RatedSkill>,
}

/// Group rated skills by category, keeping first-seen category order.
pub fn group_by_category(skills: &[RatedSkill]) -> Vec<SkillGroup> {
    let mut groups: Vec<SkillGroup> = Vec::new();
    for rated in skills {
        match groups
            .iter_mut()
            .find(|g| g.category == rated.skill.category)
        {
            Some(group) => group.skills.push(rated.clone()),
            None => groups.push(SkillGroup {
                category: rated.skill.category.clone(),
                skills: vec![rated.clone()],
            }),
        }
    }
    groups
}

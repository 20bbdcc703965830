use crate::bank::{self, Variant};
use crate::models::{AnswerRecord, ScoreSet, SkillScore};

/// Ordinal summary of a 0-100 skill score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Band {
    Lowest,
    Second,
    Third,
    Highest,
}

impl Band {
    pub fn classify(score: u8) -> Band {
        match score {
            0..=24 => Band::Lowest,
            25..=49 => Band::Second,
            50..=74 => Band::Third,
            _ => Band::Highest,
        }
    }

    pub fn label(&self, variant: Variant) -> &'static str {
        match (variant, self) {
            (Variant::SelfAssessment, Band::Lowest) => "Getting Started",
            (Variant::SelfAssessment, Band::Second) => "Developing",
            (Variant::SelfAssessment, Band::Third) => "Emerging",
            (Variant::SelfAssessment, Band::Highest) => "Strong",
            (Variant::Admin, Band::Lowest) => "Needs Attention",
            (Variant::Admin, Band::Second) => "Developing",
            (Variant::Admin, Band::Third) => "Supported",
            (Variant::Admin, Band::Highest) => "Secure",
        }
    }
}

/// Best-effort 0-100 score for one skill. Unanswered questions are ignored;
/// an unknown skill or one with no answers scores 0.
pub fn score(skill_id: &str, answers: &AnswerRecord, variant: Variant) -> u8 {
    let Some(skill) = bank::skill(skill_id) else {
        return 0;
    };

    let recorded: Vec<f64> = skill
        .questions
        .iter()
        .filter_map(|question| answers.get(question.id))
        .map(f64::from)
        .collect();

    if recorded.is_empty() {
        return 0;
    }

    let mean = recorded.iter().sum::<f64>() / recorded.len() as f64;
    let percentage = match variant {
        Variant::SelfAssessment => mean,
        Variant::Admin => (mean - 1.0) / 3.0 * 100.0,
    };
    clamp_percentage(percentage)
}

pub fn score_set(answers: &AnswerRecord, variant: Variant) -> ScoreSet {
    let skills: Vec<SkillScore> = bank::skills()
        .iter()
        .map(|skill| SkillScore {
            skill_id: skill.id.to_string(),
            score: score(skill.id, answers, variant),
        })
        .collect();

    let overall = if skills.is_empty() {
        0
    } else {
        let total: f64 = skills.iter().map(|entry| f64::from(entry.score)).sum();
        clamp_percentage(total / skills.len() as f64)
    };

    ScoreSet { skills, overall }
}

fn clamp_percentage(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bank::Variant;

/// Chosen score per question id for one assessment session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerRecord(HashMap<String, u8>);

impl AnswerRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, question_id: &str) -> Option<u8> {
        self.0.get(question_id).copied()
    }

    pub fn contains(&self, question_id: &str) -> bool {
        self.0.contains_key(question_id)
    }

    /// Callers validate `score` against the bank before recording it.
    pub(crate) fn insert(&mut self, question_id: &str, score: u8) {
        self.0.insert(question_id.to_string(), score);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> {
        self.0.iter().map(|(id, score)| (id.as_str(), *score))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillScore {
    pub skill_id: String,
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSet {
    pub skills: Vec<SkillScore>,
    pub overall: u8,
}

impl ScoreSet {
    pub fn get(&self, skill_id: &str) -> Option<u8> {
        self.skills
            .iter()
            .find(|entry| entry.skill_id == skill_id)
            .map(|entry| entry.score)
    }
}

#[derive(Debug, Clone)]
pub struct AssessmentResult {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub variant: Variant,
    pub scores: ScoreSet,
    pub raw_answers: AnswerRecord,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SkillTrend {
    pub title: String,
    pub first: u8,
    pub latest: u8,
}

impl SkillTrend {
    pub fn change(&self) -> i16 {
        i16::from(self.latest) - i16::from(self.first)
    }
}

#[derive(Debug, Clone)]
pub struct Child {
    pub id: Uuid,
    pub full_name: String,
}

/// A player's improvement goal for one skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub skill_id: String,
    pub goal: String,
    pub first_step: String,
    pub target_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct SavedGoal {
    pub goal: Goal,
    pub created_at: DateTime<Utc>,
}

use async_trait::async_trait;
use uuid::Uuid;

use crate::bank::{self, Skill, Variant};
use crate::error::CoachError;
use crate::models::{AnswerRecord, ScoreSet};
use crate::scoring;
use crate::store::Store;
use crate::wizard::Flow;

/// Core Skills Assessment in progress. One wizard step per skill.
#[derive(Debug, Clone)]
pub struct AssessmentSession {
    variant: Variant,
    answers: AnswerRecord,
}

impl AssessmentSession {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            answers: AnswerRecord::new(),
        }
    }

    /// Rebuild from saved answers, dropping any that no longer fit the bank.
    pub fn from_answers(variant: Variant, saved: &AnswerRecord) -> Self {
        let mut session = Self::new(variant);
        for (question_id, score) in saved.iter() {
            if bank::question(question_id).is_some() && variant.accepts(score) {
                session.answers.insert(question_id, score);
            }
        }
        session
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn answers(&self) -> &AnswerRecord {
        &self.answers
    }

    /// Record the option at `option` (0-based) for a question.
    pub fn answer(&mut self, question_id: &str, option: usize) -> Result<u8, CoachError> {
        let question = bank::question(question_id)
            .ok_or_else(|| CoachError::UnknownQuestion(question_id.to_string()))?;
        let chosen =
            question
                .option(self.variant, option)
                .ok_or_else(|| CoachError::OptionOutOfRange {
                    question: question_id.to_string(),
                    option,
                })?;
        self.answers.insert(question.id, chosen.score);
        Ok(chosen.score)
    }

    pub fn is_skill_complete(skill: &Skill, answers: &AnswerRecord) -> bool {
        skill
            .questions
            .iter()
            .all(|question| answers.contains(question.id))
    }

    pub fn is_complete(&self) -> bool {
        bank::skills()
            .iter()
            .all(|skill| Self::is_skill_complete(skill, &self.answers))
    }

    pub fn scores(&self) -> ScoreSet {
        scoring::score_set(&self.answers, self.variant)
    }
}

#[async_trait]
impl Flow for AssessmentSession {
    fn step_count(&self) -> usize {
        bank::skills().len()
    }

    fn is_step_complete(&self, step: usize) -> bool {
        bank::skills()
            .get(step)
            .is_some_and(|skill| Self::is_skill_complete(skill, &self.answers))
    }

    fn clear(&mut self) {
        self.answers.clear();
    }

    async fn persist(&self, store: &dyn Store, owner_id: Uuid) -> Result<Uuid, CoachError> {
        let scores = self.scores();
        store
            .save_assessment(owner_id, self.variant, &scores, &self.answers)
            .await
    }
}

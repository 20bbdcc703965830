use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::bank::{self, Skill};
use crate::error::CoachError;
use crate::models::{Goal, ScoreSet};
use crate::store::Store;
use crate::wizard::Flow;

/// Goal-setting wizard: skill, goal, first step, target date.
#[derive(Debug, Clone)]
pub struct GoalPlan {
    today: NaiveDate,
    skill: Option<&'static Skill>,
    pub goal: String,
    pub first_step: String,
    target_date: Option<NaiveDate>,
}

impl GoalPlan {
    pub const STEPS: usize = 4;

    /// `today` bounds the earliest accepted target date.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            skill: None,
            goal: String::new(),
            first_step: String::new(),
            target_date: None,
        }
    }

    /// Preselect the weakest skill of a previous assessment. Ties go to the
    /// skill listed first in the bank.
    pub fn suggest_from(&mut self, scores: &ScoreSet) -> Option<&'static Skill> {
        let weakest = bank::skills()
            .iter()
            .min_by_key(|skill| scores.get(skill.id).unwrap_or(0))?;
        self.skill = Some(weakest);
        Some(weakest)
    }

    pub fn choose_skill(&mut self, skill_id: &str) -> Result<(), CoachError> {
        let skill =
            bank::skill(skill_id).ok_or_else(|| CoachError::UnknownSkill(skill_id.to_string()))?;
        self.skill = Some(skill);
        Ok(())
    }

    pub fn skill(&self) -> Option<&'static Skill> {
        self.skill
    }

    pub fn set_target_date(&mut self, date: NaiveDate) -> Result<(), CoachError> {
        if date < self.today {
            return Err(CoachError::TargetDateInPast(date));
        }
        self.target_date = Some(date);
        Ok(())
    }

    pub fn target_date(&self) -> Option<NaiveDate> {
        self.target_date
    }

    pub fn to_goal(&self) -> Result<Goal, CoachError> {
        let (Some(skill), Some(target_date)) = (self.skill, self.target_date) else {
            return Err(CoachError::Incomplete);
        };
        if self.goal.trim().is_empty() || self.first_step.trim().is_empty() {
            return Err(CoachError::Incomplete);
        }
        Ok(Goal {
            skill_id: skill.id.to_string(),
            goal: self.goal.trim().to_string(),
            first_step: self.first_step.trim().to_string(),
            target_date,
        })
    }
}

#[async_trait]
impl Flow for GoalPlan {
    fn step_count(&self) -> usize {
        Self::STEPS
    }

    fn is_step_complete(&self, step: usize) -> bool {
        match step {
            0 => self.skill.is_some(),
            1 => !self.goal.trim().is_empty(),
            2 => !self.first_step.trim().is_empty(),
            3 => self.target_date.is_some(),
            _ => false,
        }
    }

    fn clear(&mut self) {
        *self = Self::new(self.today);
    }

    async fn persist(&self, store: &dyn Store, owner_id: Uuid) -> Result<Uuid, CoachError> {
        let goal = self.to_goal()?;
        store.save_goal(owner_id, &goal).await
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::CoachError;
use crate::store::Store;
use crate::wizard::Flow;

/// Average confidence below this opens the worry support flow.
pub const CONFIDENCE_THRESHOLD: f64 = 7.0;

pub const CONFIDENCE_AREAS: [&str; 4] = [
    "Before kick-off",
    "When I have the ball",
    "After I make a mistake",
    "Against a stronger team",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Worry {
    MakingMistakes,
    LettingTeamDown,
    BeingDropped,
    PeopleWatching,
    Opposition,
}

impl Worry {
    pub const ALL: [Worry; 5] = [
        Worry::MakingMistakes,
        Worry::LettingTeamDown,
        Worry::BeingDropped,
        Worry::PeopleWatching,
        Worry::Opposition,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Worry::MakingMistakes => "Making mistakes",
            Worry::LettingTeamDown => "Letting my team down",
            Worry::BeingDropped => "Being dropped or subbed off",
            Worry::PeopleWatching => "People watching me",
            Worry::Opposition => "The other team",
        }
    }

    /// Coaching lines walked through one at a time.
    pub fn script(&self) -> &'static [&'static str] {
        match self {
            Worry::MakingMistakes => &[
                "Every player you look up to makes mistakes in every game.",
                "A mistake is information, not a verdict on you.",
                "Pick a reset cue: clap, breathe out, say 'next ball'.",
                "Your job after a mistake is the next action, nothing else.",
            ],
            Worry::LettingTeamDown => &[
                "Your teammates want you to try, not to be perfect.",
                "Effort and communication are always in your control.",
                "Choose one thing you will do to help a teammate today.",
            ],
            Worry::BeingDropped => &[
                "Selection is the coach's job; your job is to be ready.",
                "Think of one strength you will show when you get your chance.",
                "Minutes on the bench are time to study the game.",
            ],
            Worry::PeopleWatching => &[
                "The people watching are there because they care about you.",
                "Bring your focus inside the lines: ball, teammates, space.",
                "Use your breathing to settle before the whistle.",
            ],
            Worry::Opposition => &[
                "You cannot control how good they are, only how you play.",
                "Strong opponents are the best way to get better.",
                "Set one small goal that has nothing to do with the score.",
            ],
        }
    }
}

/// Progress through the support dialogue for the chosen worry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorrySupport {
    pub reason: Worry,
    lines_seen: usize,
}

impl WorrySupport {
    fn new(reason: Worry) -> Self {
        Self {
            reason,
            lines_seen: 0,
        }
    }

    pub fn current_line(&self) -> Option<&'static str> {
        self.reason.script().get(self.lines_seen).copied()
    }

    /// Mark the current line as read. Returns false once the script is done.
    pub fn next_line(&mut self) -> bool {
        if self.is_complete() {
            return false;
        }
        self.lines_seen += 1;
        true
    }

    pub fn is_complete(&self) -> bool {
        self.lines_seen >= self.reason.script().len()
    }
}

/// Four 1-10 ratings plus the worry sub-flow they may require.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfidenceCheck {
    ratings: [Option<u8>; 4],
    support: Option<WorrySupport>,
}

impl ConfidenceCheck {
    /// Set one rating. If this lifts the average back to the threshold, any
    /// worry support already started is discarded and returned.
    pub fn rate(&mut self, area: usize, value: u8) -> Result<Option<WorrySupport>, CoachError> {
        if !(1..=10).contains(&value) {
            return Err(CoachError::RatingOutOfRange(value));
        }
        let slot = self
            .ratings
            .get_mut(area)
            .ok_or(CoachError::UnknownArea(area))?;
        *slot = Some(value);

        if !self.needs_support() {
            if let Some(discarded) = self.support.take() {
                info!(reason = ?discarded.reason, "confidence recovered, worry support dropped");
                return Ok(Some(discarded));
            }
        }
        Ok(None)
    }

    pub fn ratings(&self) -> [Option<u8>; 4] {
        self.ratings
    }

    /// Running average of the ratings given so far.
    pub fn average(&self) -> Option<f64> {
        let given: Vec<f64> = self.ratings.iter().flatten().map(|v| f64::from(*v)).collect();
        if given.is_empty() {
            None
        } else {
            Some(given.iter().sum::<f64>() / given.len() as f64)
        }
    }

    pub fn needs_support(&self) -> bool {
        self.average()
            .is_some_and(|average| average < CONFIDENCE_THRESHOLD)
    }

    /// Choose (or change) the worry. Changing it restarts the dialogue.
    pub fn select_worry(&mut self, reason: Worry) -> Result<&mut WorrySupport, CoachError> {
        if !self.needs_support() {
            return Err(CoachError::SupportNotNeeded);
        }
        let keep = self
            .support
            .as_ref()
            .is_some_and(|support| support.reason == reason);
        if !keep {
            self.support = Some(WorrySupport::new(reason));
        }
        self.support.as_mut().ok_or(CoachError::SupportNotNeeded)
    }

    pub fn support(&self) -> Option<&WorrySupport> {
        self.support.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        if self.ratings.iter().any(Option::is_none) {
            return false;
        }
        !self.needs_support() || self.support.as_ref().is_some_and(WorrySupport::is_complete)
    }
}

/// Persisted shape of a finished reflection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Reflection {
    Pre {
        activity_goal: String,
        confidence: Vec<u8>,
        average_confidence: f64,
        worry: Option<Worry>,
        focus_word: String,
    },
    Post {
        effort: u8,
        went_well: String,
        work_on: String,
    },
}

impl Reflection {
    pub fn phase(&self) -> &'static str {
        match self {
            Reflection::Pre { .. } => "pre",
            Reflection::Post { .. } => "post",
        }
    }
}

/// Before training or a match: goal, confidence, focus word.
#[derive(Debug, Clone, Default)]
pub struct PreActivity {
    pub activity_goal: String,
    pub confidence: ConfidenceCheck,
    pub focus_word: String,
}

impl PreActivity {
    pub const STEPS: usize = 3;

    pub fn to_reflection(&self) -> Result<Reflection, CoachError> {
        if !(0..Self::STEPS).all(|step| self.is_step_complete(step)) {
            return Err(CoachError::Incomplete);
        }
        let confidence: Vec<u8> = self.confidence.ratings().iter().flatten().copied().collect();
        Ok(Reflection::Pre {
            activity_goal: self.activity_goal.trim().to_string(),
            confidence,
            average_confidence: self.confidence.average().unwrap_or_default(),
            worry: self.confidence.support().map(|support| support.reason),
            focus_word: self.focus_word.trim().to_string(),
        })
    }
}

#[async_trait]
impl Flow for PreActivity {
    fn step_count(&self) -> usize {
        Self::STEPS
    }

    fn is_step_complete(&self, step: usize) -> bool {
        match step {
            0 => !self.activity_goal.trim().is_empty(),
            1 => self.confidence.is_complete(),
            2 => !self.focus_word.trim().is_empty(),
            _ => false,
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    async fn persist(&self, store: &dyn Store, owner_id: Uuid) -> Result<Uuid, CoachError> {
        let reflection = self.to_reflection()?;
        store.save_reflection(owner_id, &reflection).await
    }
}

/// After training or a match: effort, what went well, what to work on.
#[derive(Debug, Clone, Default)]
pub struct PostActivity {
    effort: Option<u8>,
    pub went_well: String,
    pub work_on: String,
}

impl PostActivity {
    pub const STEPS: usize = 3;

    pub fn set_effort(&mut self, value: u8) -> Result<(), CoachError> {
        if !(1..=10).contains(&value) {
            return Err(CoachError::RatingOutOfRange(value));
        }
        self.effort = Some(value);
        Ok(())
    }

    pub fn effort(&self) -> Option<u8> {
        self.effort
    }

    pub fn to_reflection(&self) -> Result<Reflection, CoachError> {
        let effort = self.effort.ok_or(CoachError::Incomplete)?;
        if self.went_well.trim().is_empty() || self.work_on.trim().is_empty() {
            return Err(CoachError::Incomplete);
        }
        Ok(Reflection::Post {
            effort,
            went_well: self.went_well.trim().to_string(),
            work_on: self.work_on.trim().to_string(),
        })
    }
}

#[async_trait]
impl Flow for PostActivity {
    fn step_count(&self) -> usize {
        Self::STEPS
    }

    fn is_step_complete(&self, step: usize) -> bool {
        match step {
            0 => self.effort.is_some(),
            1 => !self.went_well.trim().is_empty(),
            2 => !self.work_on.trim().is_empty(),
            _ => false,
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    async fn persist(&self, store: &dyn Store, owner_id: Uuid) -> Result<Uuid, CoachError> {
        let reflection = self.to_reflection()?;
        store.save_reflection(owner_id, &reflection).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::MemoryStore;
    use crate::wizard::{Wizard, WizardState};

    fn rate_all(check: &mut ConfidenceCheck, value: u8) {
        for area in 0..CONFIDENCE_AREAS.len() {
            check.rate(area, value).unwrap();
        }
    }

    fn finish_dialogue(support: &mut WorrySupport) {
        while support.next_line() {}
    }

    fn at_confidence_step() -> Wizard<PreActivity> {
        let mut wizard = Wizard::new(PreActivity::default());
        wizard.flow_mut().unwrap().activity_goal = "Win more headers".to_string();
        assert!(wizard.advance());
        assert_eq!(wizard.state(), WizardState::Answering(1));
        wizard
    }

    #[test]
    fn high_confidence_needs_no_support() {
        let mut wizard = at_confidence_step();
        rate_all(&mut wizard.flow_mut().unwrap().confidence, 8);
        assert!(!wizard.flow().confidence.needs_support());
        assert!(wizard.advance());
        assert_eq!(wizard.state(), WizardState::Answering(2));
    }

    #[test]
    fn low_confidence_blocks_until_dialogue_finished() {
        let mut wizard = at_confidence_step();
        rate_all(&mut wizard.flow_mut().unwrap().confidence, 4);
        assert!(wizard.flow().confidence.needs_support());
        assert!(!wizard.advance());

        let support = wizard
            .flow_mut()
            .unwrap()
            .confidence
            .select_worry(Worry::MakingMistakes)
            .unwrap();
        assert!(support.current_line().is_some());
        support.next_line();
        assert!(!wizard.advance());
        assert_eq!(wizard.state(), WizardState::Answering(1));

        let support = wizard
            .flow_mut()
            .unwrap()
            .confidence
            .select_worry(Worry::MakingMistakes)
            .unwrap();
        assert!(!support.is_complete());
        finish_dialogue(support);
        assert!(support.current_line().is_none());
        assert!(wizard.advance());
        assert_eq!(wizard.state(), WizardState::Answering(2));
    }

    #[test]
    fn raising_confidence_discards_worry_data() {
        let mut check = ConfidenceCheck::default();
        rate_all(&mut check, 5);
        check.select_worry(Worry::PeopleWatching).unwrap().next_line();

        assert_eq!(check.rate(0, 10).unwrap(), None);
        assert_eq!(check.rate(1, 7).unwrap(), None);
        let discarded = check.rate(2, 9).unwrap().expect("support discarded");
        assert_eq!(discarded.reason, Worry::PeopleWatching);
        assert!(check.support().is_none());
        assert!(check.is_complete());
    }

    #[test]
    fn running_average_uses_given_ratings() {
        let mut check = ConfidenceCheck::default();
        assert_eq!(check.average(), None);
        assert!(!check.needs_support());
        check.rate(0, 6).unwrap();
        assert_eq!(check.average(), Some(6.0));
        assert!(check.needs_support());
        assert!(!check.is_complete());
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut check = ConfidenceCheck::default();
        for (area, value) in [7, 7, 6, 8].into_iter().enumerate() {
            check.rate(area, value).unwrap();
        }
        assert_eq!(check.average(), Some(7.0));
        assert!(!check.needs_support());
        assert!(matches!(
            check.select_worry(Worry::Opposition),
            Err(CoachError::SupportNotNeeded)
        ));
    }

    #[test]
    fn changing_worry_restarts_dialogue() {
        let mut check = ConfidenceCheck::default();
        rate_all(&mut check, 3);
        finish_dialogue(check.select_worry(Worry::BeingDropped).unwrap());
        assert!(check.is_complete());

        let support = check.select_worry(Worry::Opposition).unwrap();
        assert!(!support.is_complete());
        assert!(!check.is_complete());
    }

    #[test]
    fn ratings_are_validated() {
        let mut check = ConfidenceCheck::default();
        assert!(matches!(check.rate(0, 0), Err(CoachError::RatingOutOfRange(0))));
        assert!(matches!(check.rate(0, 11), Err(CoachError::RatingOutOfRange(11))));
        assert!(matches!(check.rate(4, 5), Err(CoachError::UnknownArea(4))));
    }

    #[tokio::test]
    async fn pre_activity_reflection_is_saved() {
        let store = MemoryStore::default();
        let owner = Uuid::new_v4();
        let mut wizard = at_confidence_step();
        let flow = wizard.flow_mut().unwrap();
        rate_all(&mut flow.confidence, 4);
        finish_dialogue(flow.confidence.select_worry(Worry::LettingTeamDown).unwrap());
        assert!(wizard.advance());
        wizard.flow_mut().unwrap().focus_word = " calm ".to_string();
        assert!(wizard.advance());

        wizard.submit(&store, owner).await.unwrap();
        let saved = store.reflections();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, owner);
        assert_eq!(
            saved[0].1,
            Reflection::Pre {
                activity_goal: "Win more headers".to_string(),
                confidence: vec![4, 4, 4, 4],
                average_confidence: 4.0,
                worry: Some(Worry::LettingTeamDown),
                focus_word: "calm".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn post_activity_requires_every_page() {
        let mut flow = PostActivity::default();
        assert!(matches!(flow.set_effort(12), Err(CoachError::RatingOutOfRange(12))));
        flow.set_effort(8).unwrap();
        flow.went_well = "Scanned before receiving".to_string();
        assert!(matches!(flow.to_reflection(), Err(CoachError::Incomplete)));

        flow.work_on = "Weak foot".to_string();
        let mut wizard = Wizard::resume(flow);
        assert_eq!(wizard.state(), WizardState::Reviewing);

        let store = MemoryStore::default();
        wizard.submit(&store, Uuid::new_v4()).await.unwrap();
        assert_eq!(store.reflections()[0].1.phase(), "post");
    }

    #[test]
    fn reflection_payload_is_tagged_by_phase() {
        let payload = serde_json::to_value(Reflection::Post {
            effort: 6,
            went_well: "Pressing".to_string(),
            work_on: "Finishing".to_string(),
        })
        .unwrap();
        assert_eq!(payload["phase"], "post");
        assert_eq!(payload["effort"], 6);
    }
}

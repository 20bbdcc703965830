use async_trait::async_trait;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::CoachError;
use crate::store::Store;

/// A linear, multi-step form. The wizard owns navigation; the flow owns the
/// data and decides when a step is complete.
#[async_trait]
pub trait Flow: Send + Sync {
    fn step_count(&self) -> usize;

    fn is_step_complete(&self, step: usize) -> bool;

    /// Drop everything entered so far.
    fn clear(&mut self);

    /// Write the finished flow. Called once per submit attempt.
    async fn persist(&self, store: &dyn Store, owner_id: Uuid) -> Result<Uuid, CoachError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardState {
    Answering(usize),
    Reviewing,
    Submitted(Uuid),
}

#[derive(Debug)]
pub struct Wizard<F> {
    flow: F,
    state: WizardState,
}

impl<F: Flow> Wizard<F> {
    pub fn new(flow: F) -> Self {
        Self {
            flow,
            state: WizardState::Answering(0),
        }
    }

    /// Start at the first incomplete step, or at review when nothing is left.
    pub fn resume(flow: F) -> Self {
        let state = (0..flow.step_count())
            .find(|step| !flow.is_step_complete(*step))
            .map(WizardState::Answering)
            .unwrap_or(WizardState::Reviewing);
        Self { flow, state }
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn flow(&self) -> &F {
        &self.flow
    }

    /// Mutable access only while a step is being answered.
    pub fn flow_mut(&mut self) -> Option<&mut F> {
        match self.state {
            WizardState::Answering(_) => Some(&mut self.flow),
            WizardState::Reviewing | WizardState::Submitted(_) => None,
        }
    }

    pub fn advance(&mut self) -> bool {
        let WizardState::Answering(step) = self.state else {
            return false;
        };
        if !self.flow.is_step_complete(step) {
            debug!(step, "step incomplete, staying put");
            return false;
        }
        self.state = if step + 1 >= self.flow.step_count() {
            WizardState::Reviewing
        } else {
            WizardState::Answering(step + 1)
        };
        true
    }

    pub fn retreat(&mut self) -> bool {
        match self.state {
            WizardState::Answering(step) if step > 0 => {
                self.state = WizardState::Answering(step - 1);
                true
            }
            _ => false,
        }
    }

    /// Persist from review. A failure leaves the wizard in review with the
    /// entered data intact so the user can try again.
    pub async fn submit(
        &mut self,
        store: &dyn Store,
        owner_id: Uuid,
    ) -> Result<Uuid, CoachError> {
        if self.state != WizardState::Reviewing {
            return Err(CoachError::NotReviewing);
        }
        match self.flow.persist(store, owner_id).await {
            Ok(id) => {
                info!(%id, %owner_id, "submission saved");
                self.flow.clear();
                self.state = WizardState::Submitted(id);
                Ok(id)
            }
            Err(err) => {
                error!(%owner_id, error = %err, "submission failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::Reflection;
    use crate::store::testing::MemoryStore;

    #[derive(Debug, Default)]
    struct Pages {
        values: [Option<u8>; 3],
    }

    #[async_trait]
    impl Flow for Pages {
        fn step_count(&self) -> usize {
            self.values.len()
        }

        fn is_step_complete(&self, step: usize) -> bool {
            self.values.get(step).is_some_and(Option::is_some)
        }

        fn clear(&mut self) {
            self.values = [None; 3];
        }

        async fn persist(&self, store: &dyn Store, owner_id: Uuid) -> Result<Uuid, CoachError> {
            let reflection = Reflection::Post {
                effort: self.values[0].unwrap_or(0),
                went_well: "passing".to_string(),
                work_on: "heading".to_string(),
            };
            store.save_reflection(owner_id, &reflection).await
        }
    }

    #[test]
    fn incomplete_step_blocks_advance() {
        let mut wizard = Wizard::new(Pages::default());
        assert!(!wizard.advance());
        assert_eq!(wizard.state(), WizardState::Answering(0));
    }

    #[test]
    fn advance_past_last_step_enters_review() {
        let mut wizard = Wizard::new(Pages::default());
        for step in 0..3 {
            wizard.flow_mut().unwrap().values[step] = Some(5);
            assert!(wizard.advance());
        }
        assert_eq!(wizard.state(), WizardState::Reviewing);
        assert!(wizard.flow_mut().is_none());
        assert!(!wizard.advance());
        assert!(!wizard.retreat());
    }

    #[test]
    fn retreat_then_advance_keeps_answers() {
        let mut wizard = Wizard::new(Pages::default());
        wizard.flow_mut().unwrap().values[0] = Some(2);
        assert!(wizard.advance());
        wizard.flow_mut().unwrap().values[1] = Some(9);

        assert!(wizard.retreat());
        assert_eq!(wizard.state(), WizardState::Answering(0));
        assert!(wizard.advance());
        assert_eq!(wizard.state(), WizardState::Answering(1));
        assert_eq!(wizard.flow().values, [Some(2), Some(9), None]);
    }

    #[test]
    fn retreat_at_first_step_is_refused() {
        let mut wizard = Wizard::new(Pages::default());
        assert!(!wizard.retreat());
        assert_eq!(wizard.state(), WizardState::Answering(0));
    }

    #[test]
    fn resume_starts_at_first_gap() {
        let flow = Pages {
            values: [Some(1), None, Some(3)],
        };
        assert_eq!(Wizard::resume(flow).state(), WizardState::Answering(1));

        let done = Pages {
            values: [Some(1), Some(2), Some(3)],
        };
        assert_eq!(Wizard::resume(done).state(), WizardState::Reviewing);
    }

    #[tokio::test]
    async fn submit_outside_review_is_rejected() {
        let store = MemoryStore::default();
        let mut wizard = Wizard::new(Pages::default());
        let err = wizard.submit(&store, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CoachError::NotReviewing));
        assert_eq!(store.save_calls(), 0);
    }

    #[tokio::test]
    async fn successful_submit_clears_and_finishes() {
        let store = MemoryStore::default();
        let mut wizard = Wizard::resume(Pages {
            values: [Some(7), Some(7), Some(7)],
        });
        let id = wizard.submit(&store, Uuid::new_v4()).await.unwrap();
        assert_eq!(wizard.state(), WizardState::Submitted(id));
        assert_eq!(wizard.flow().values, [None; 3]);
        assert_eq!(store.reflections().len(), 1);
    }

    #[tokio::test]
    async fn failed_submit_stays_in_review() {
        let store = MemoryStore::failing();
        let mut wizard = Wizard::resume(Pages {
            values: [Some(7), Some(7), Some(7)],
        });
        let err = wizard.submit(&store, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CoachError::Database(_)));
        assert_eq!(wizard.state(), WizardState::Reviewing);
        assert_eq!(wizard.flow().values, [Some(7), Some(7), Some(7)]);
        assert_eq!(store.save_calls(), 1);
    }
}

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::bank::Variant;
use crate::error::CoachError;
use crate::models::{AnswerRecord, AssessmentResult, Goal, SavedGoal, ScoreSet};
use crate::reflection::Reflection;

pub const HISTORY_PAGE: i64 = 10;

/// Backend operations the flows depend on. Every call is a single request;
/// nothing here retries.
#[async_trait]
pub trait Store: Send + Sync {
    async fn save_assessment(
        &self,
        owner_id: Uuid,
        variant: Variant,
        scores: &ScoreSet,
        raw_answers: &AnswerRecord,
    ) -> Result<Uuid, CoachError>;

    async fn load_latest(&self, owner_id: Uuid) -> Result<Option<AssessmentResult>, CoachError>;

    /// Newest first, at most `limit` rows.
    async fn history(
        &self,
        owner_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AssessmentResult>, CoachError>;

    async fn save_reflection(
        &self,
        owner_id: Uuid,
        reflection: &Reflection,
    ) -> Result<Uuid, CoachError>;

    async fn save_goal(&self, owner_id: Uuid, goal: &Goal) -> Result<Uuid, CoachError>;

    /// Newest first, at most `limit` rows.
    async fn goals(&self, owner_id: Uuid, limit: i64) -> Result<Vec<SavedGoal>, CoachError>;

    async fn child_id_for_user(&self, user_id: Uuid) -> Result<Option<Uuid>, CoachError>;

    async fn is_admin(&self, user_id: Uuid) -> Result<bool, CoachError>;
}

/// Signed-in user plus the player a coach has picked, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerContext {
    pub user_id: Uuid,
    pub selected_child: Option<Uuid>,
}

impl OwnerContext {
    pub fn new(user_id: Uuid, selected_child: Option<Uuid>) -> Self {
        Self {
            user_id,
            selected_child,
        }
    }

    /// The player rows are written under. A selected child wins over the
    /// user's own child but requires admin rights.
    pub async fn effective_owner_id(&self, store: &dyn Store) -> Result<Uuid, CoachError> {
        match self.selected_child {
            Some(child_id) => {
                if store.is_admin(self.user_id).await? {
                    Ok(child_id)
                } else {
                    warn!(user_id = %self.user_id, %child_id, "non-admin selected a child");
                    Err(CoachError::NotAdmin(self.user_id))
                }
            }
            None => store
                .child_id_for_user(self.user_id)
                .await?
                .ok_or(CoachError::MissingChild(self.user_id)),
        }
    }

    /// Owner for a new assessment. Coach ratings need admin rights even
    /// when no child is selected.
    pub async fn assessment_owner(
        &self,
        store: &dyn Store,
        variant: Variant,
    ) -> Result<Uuid, CoachError> {
        if variant == Variant::Admin
            && self.selected_child.is_none()
            && !store.is_admin(self.user_id).await?
        {
            warn!(user_id = %self.user_id, "non-admin started a coach rating");
            return Err(CoachError::NotAdmin(self.user_id));
        }
        self.effective_owner_id(store).await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MemoryStore;
    use super::*;

    #[tokio::test]
    async fn own_child_is_resolved_through_backend() {
        let user = Uuid::new_v4();
        let child = Uuid::new_v4();
        let mut store = MemoryStore::default();
        store.children.insert(user, child);

        let owner = OwnerContext::new(user, None)
            .effective_owner_id(&store)
            .await
            .unwrap();
        assert_eq!(owner, child);
    }

    #[tokio::test]
    async fn missing_child_halts_the_flow() {
        let store = MemoryStore::default();
        let user = Uuid::new_v4();
        let err = OwnerContext::new(user, None)
            .effective_owner_id(&store)
            .await
            .unwrap_err();
        assert!(matches!(err, CoachError::MissingChild(id) if id == user));
    }

    #[tokio::test]
    async fn admin_selection_overrides_own_child() {
        let coach = Uuid::new_v4();
        let selected = Uuid::new_v4();
        let mut store = MemoryStore::default();
        store.children.insert(coach, Uuid::new_v4());
        store.admins.push(coach);

        let owner = OwnerContext::new(coach, Some(selected))
            .effective_owner_id(&store)
            .await
            .unwrap();
        assert_eq!(owner, selected);
    }

    #[tokio::test]
    async fn non_admin_cannot_select_a_child() {
        let parent = Uuid::new_v4();
        let store = MemoryStore::default();
        let err = OwnerContext::new(parent, Some(Uuid::new_v4()))
            .effective_owner_id(&store)
            .await
            .unwrap_err();
        assert!(matches!(err, CoachError::NotAdmin(_)));
    }

    #[tokio::test]
    async fn coach_rating_needs_a_coach() {
        let parent = Uuid::new_v4();
        let mut store = MemoryStore::default();
        store.children.insert(parent, Uuid::new_v4());

        let context = OwnerContext::new(parent, None);
        let err = context
            .assessment_owner(&store, Variant::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, CoachError::NotAdmin(id) if id == parent));
        assert!(context
            .assessment_owner(&store, Variant::SelfAssessment)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn coach_may_rate_a_selected_player() {
        let coach = Uuid::new_v4();
        let player = Uuid::new_v4();
        let mut store = MemoryStore::default();
        store.admins.push(coach);

        let owner = OwnerContext::new(coach, Some(player))
            .assessment_owner(&store, Variant::Admin)
            .await
            .unwrap();
        assert_eq!(owner, player);
    }
}

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CoachError {
    #[error("unknown question: {0}")]
    UnknownQuestion(String),

    #[error("option {option} is not offered for question '{question}'")]
    OptionOutOfRange { question: String, option: usize },

    #[error("unknown skill: {0}")]
    UnknownSkill(String),

    #[error("target date {0} is already in the past")]
    TargetDateInPast(chrono::NaiveDate),

    #[error("rating {0} must be between 1 and 10")]
    RatingOutOfRange(u8),

    #[error("there is no confidence area at position {0}")]
    UnknownArea(usize),

    #[error("worry support is only offered when average confidence is below 7")]
    SupportNotNeeded,

    #[error("reflection is not finished yet")]
    Incomplete,

    #[error("results can only be submitted from the review step")]
    NotReviewing,

    #[error("no player profile is linked to user {0}")]
    MissingChild(Uuid),

    #[error("user {0} is not a coach")]
    NotAdmin(Uuid),

    #[error("unknown assessment variant: {0}")]
    UnknownVariant(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("draft file error: {0}")]
    Draft(#[from] std::io::Error),
}

/// What a person sees when something goes wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Backend or local storage failure; retry is manual.
    Generic,
    /// A required record or permission is missing; the flow stops.
    MissingPrerequisite(String),
    /// The input itself was rejected.
    Invalid(String),
}

impl CoachError {
    pub fn notice(&self) -> Notice {
        match self {
            CoachError::MissingChild(_) => Notice::MissingPrerequisite(
                "No player profile was found for your account. Ask your coach to add one."
                    .to_string(),
            ),
            CoachError::NotAdmin(_) => Notice::MissingPrerequisite(
                "Only coaches can act for another player or fill in coach ratings.".to_string(),
            ),
            CoachError::Database(_) | CoachError::Serialization(_) | CoachError::Draft(_) => {
                Notice::Generic
            }
            other => Notice::Invalid(other.to_string()),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Generic => write!(f, "Something went wrong. Please try again."),
            Notice::MissingPrerequisite(message) | Notice::Invalid(message) => {
                write!(f, "{message}")
            }
        }
    }
}

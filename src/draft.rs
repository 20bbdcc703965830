use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::bank::Variant;
use crate::error::CoachError;
use crate::models::AnswerRecord;

/// Local copy of an unfinished assessment. The database stays the record;
/// this only lets a session pick up where it stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub owner_id: Uuid,
    pub variant: Variant,
    pub answers: AnswerRecord,
    pub saved_at: DateTime<Utc>,
}

impl Draft {
    pub fn new(owner_id: Uuid, variant: Variant, answers: &AnswerRecord) -> Self {
        Self {
            owner_id,
            variant,
            answers: answers.clone(),
            saved_at: Utc::now(),
        }
    }
}

/// One file per owner and variant so drafts never overwrite each other.
pub fn path_for(dir: &Path, owner_id: Uuid, variant: Variant) -> PathBuf {
    dir.join(format!("draft-{owner_id}-{}.json", variant.as_str()))
}

pub fn save(path: &Path, draft: &Draft) -> Result<(), CoachError> {
    let body = serde_json::to_string_pretty(draft)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, body)?;
    debug!(path = %path.display(), answers = draft.answers.len(), "draft saved");
    Ok(())
}

/// Draft for this owner and variant, if one exists. A corrupt file or one
/// belonging to someone else is ignored rather than failing the session.
pub fn load(path: &Path, owner_id: Uuid, variant: Variant) -> Result<Option<Draft>, CoachError> {
    let body = match fs::read_to_string(path) {
        Ok(body) => body,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let draft: Draft = match serde_json::from_str(&body) {
        Ok(draft) => draft,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable draft");
            return Ok(None);
        }
    };

    if draft.owner_id != owner_id || draft.variant != variant {
        return Ok(None);
    }
    Ok(Some(draft))
}

pub fn clear(path: &Path) -> Result<(), CoachError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assessment::AssessmentSession;
use crate::bank::{self, Variant};
use crate::error::CoachError;
use crate::models::{AnswerRecord, AssessmentResult, Child, Goal, SavedGoal, ScoreSet, SkillScore};
use crate::reflection::Reflection;
use crate::store::Store;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub const SEED_COACH_ID: &str = "6a1f3c52-7d0e-4b8a-9a55-0f2c8e1d4b10";

pub async fn seed(pool: &PgPool) -> anyhow::Result<Vec<Child>> {
    let coach_id = Uuid::parse_str(SEED_COACH_ID)?;
    sqlx::query(
        r#"
        INSERT INTO mindset_coach.admins (user_id)
        VALUES ($1)
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(coach_id)
    .execute(pool)
    .await?;

    let families = vec![
        (
            Uuid::parse_str("9b2d4e61-3f7a-4c1e-8d20-5a6b7c8d9e01")?,
            Uuid::parse_str("1c3e5a7b-9d2f-4b6a-8c0e-2f4a6b8c0d12")?,
            "Maya Okafor",
            Uuid::parse_str("0d7c2b9e-1a4f-4e3d-9b8a-7c6d5e4f3a21")?,
        ),
        (
            Uuid::parse_str("4e8a1c3d-5b7f-4a9e-8d2c-6b0a4e8c2d31")?,
            Uuid::parse_str("7f1b3d5e-9a2c-4e6b-8a0d-3c5e7a9b1d42")?,
            "Leo Brennan",
            Uuid::parse_str("e2a4c6b8-0d1f-4a3c-9e5b-7d9f1b3d5c51")?,
        ),
    ];

    let mut children = Vec::new();
    for (offset, (parent_id, child_id, name, result_id)) in families.into_iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO mindset_coach.children (id, parent_user_id, full_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET parent_user_id = EXCLUDED.parent_user_id, full_name = EXCLUDED.full_name
            "#,
        )
        .bind(child_id)
        .bind(parent_id)
        .bind(name)
        .execute(pool)
        .await?;

        let mut session = AssessmentSession::new(Variant::SelfAssessment);
        for (index, question) in bank::skills()
            .iter()
            .flat_map(|skill| skill.questions)
            .enumerate()
        {
            session.answer(question.id, (index + offset) % 4)?;
        }
        insert_assessment(
            pool,
            result_id,
            child_id,
            session.variant(),
            &session.scores(),
            session.answers(),
        )
        .await?;

        children.push(Child {
            id: child_id,
            full_name: name.to_string(),
        });
    }

    Ok(children)
}

fn skill_columns() -> String {
    bank::skills()
        .iter()
        .map(|skill| skill.id)
        .collect::<Vec<_>>()
        .join(", ")
}

async fn insert_assessment(
    pool: &PgPool,
    id: Uuid,
    owner_id: Uuid,
    variant: Variant,
    scores: &ScoreSet,
    raw_answers: &AnswerRecord,
) -> Result<(), sqlx::Error> {
    let placeholders = (0..bank::skills().len())
        .map(|offset| format!("${}", offset + 6))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO mindset_coach.assessment_results \
         (id, owner_id, variant, overall, raw_answers, {}) \
         VALUES ($1, $2, $3, $4, $5, {}) \
         ON CONFLICT (id) DO NOTHING",
        skill_columns(),
        placeholders
    );

    let mut query = sqlx::query(&sql)
        .bind(id)
        .bind(owner_id)
        .bind(variant.as_str())
        .bind(i16::from(scores.overall))
        .bind(Json(raw_answers));
    for skill in bank::skills() {
        query = query.bind(i16::from(scores.get(skill.id).unwrap_or(0)));
    }
    query.execute(pool).await?;
    Ok(())
}

fn result_from_row(row: &PgRow) -> Result<AssessmentResult, CoachError> {
    let variant: String = row.try_get("variant")?;
    let mut skills = Vec::new();
    for skill in bank::skills() {
        let value: i16 = row.try_get(skill.id)?;
        skills.push(SkillScore {
            skill_id: skill.id.to_string(),
            score: percentage(value),
        });
    }
    let overall: i16 = row.try_get("overall")?;
    let Json(raw_answers): Json<AnswerRecord> = row.try_get("raw_answers")?;

    Ok(AssessmentResult {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        variant: variant.parse()?,
        scores: ScoreSet {
            skills,
            overall: percentage(overall),
        },
        raw_answers,
        created_at: row.try_get("created_at")?,
    })
}

fn percentage(value: i16) -> u8 {
    value.clamp(0, 100) as u8
}

/// Postgres-backed store over the `mindset_coach` schema.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn save_assessment(
        &self,
        owner_id: Uuid,
        variant: Variant,
        scores: &ScoreSet,
        raw_answers: &AnswerRecord,
    ) -> Result<Uuid, CoachError> {
        let id = Uuid::new_v4();
        insert_assessment(&self.pool, id, owner_id, variant, scores, raw_answers).await?;
        debug!(%id, %owner_id, overall = scores.overall, "assessment inserted");
        Ok(id)
    }

    async fn load_latest(&self, owner_id: Uuid) -> Result<Option<AssessmentResult>, CoachError> {
        Ok(self.history(owner_id, 1).await?.into_iter().next())
    }

    async fn history(
        &self,
        owner_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AssessmentResult>, CoachError> {
        let sql = format!(
            "SELECT id, owner_id, variant, overall, raw_answers, created_at, {} \
             FROM mindset_coach.assessment_results \
             WHERE owner_id = $1 \
             ORDER BY created_at DESC \
             LIMIT $2",
            skill_columns()
        );
        let rows = sqlx::query(&sql)
            .bind(owner_id)
            .bind(limit.max(1))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(result_from_row).collect()
    }

    async fn save_reflection(
        &self,
        owner_id: Uuid,
        reflection: &Reflection,
    ) -> Result<Uuid, CoachError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO mindset_coach.activity_reflections (id, owner_id, phase, payload)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(reflection.phase())
        .bind(Json(reflection))
        .execute(&self.pool)
        .await?;
        debug!(%id, %owner_id, phase = reflection.phase(), "reflection inserted");
        Ok(id)
    }

    async fn save_goal(&self, owner_id: Uuid, goal: &Goal) -> Result<Uuid, CoachError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO mindset_coach.player_goals
                (id, owner_id, skill_id, goal, first_step, target_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(&goal.skill_id)
        .bind(&goal.goal)
        .bind(&goal.first_step)
        .bind(goal.target_date)
        .execute(&self.pool)
        .await?;
        debug!(%id, %owner_id, skill = %goal.skill_id, "goal inserted");
        Ok(id)
    }

    async fn goals(&self, owner_id: Uuid, limit: i64) -> Result<Vec<SavedGoal>, CoachError> {
        let rows = sqlx::query(
            r#"
            SELECT skill_id, goal, first_step, target_date, created_at
            FROM mindset_coach.player_goals
            WHERE owner_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(owner_id)
        .bind(limit.max(1))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<SavedGoal, CoachError> {
                Ok(SavedGoal {
                    goal: Goal {
                        skill_id: row.try_get("skill_id")?,
                        goal: row.try_get("goal")?,
                        first_step: row.try_get("first_step")?,
                        target_date: row.try_get("target_date")?,
                    },
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn child_id_for_user(&self, user_id: Uuid) -> Result<Option<Uuid>, CoachError> {
        let row = sqlx::query("SELECT mindset_coach.child_id_for_user($1) AS child_id")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("child_id")?)
    }

    async fn is_admin(&self, user_id: Uuid) -> Result<bool, CoachError> {
        let row = sqlx::query("SELECT mindset_coach.is_admin($1) AS is_admin")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("is_admin")?)
    }
}

/// Bulk-enter paper assessments: one CSV row per answer, `option` 1-4.
/// Only complete assessments are saved. The importing user must be a coach,
/// and the whole file is checked before anything is written.
pub async fn import_csv(store: &dyn Store, user_id: Uuid, csv_path: &Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        child_id: Uuid,
        variant: String,
        question_id: String,
        option: usize,
    }

    if !store.is_admin(user_id).await? {
        warn!(%user_id, "non-admin attempted an import");
        return Err(CoachError::NotAdmin(user_id).into());
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut sessions: BTreeMap<(Uuid, &'static str), AssessmentSession> = BTreeMap::new();
    let mut seen: HashSet<(Uuid, &'static str, String)> = HashSet::new();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let variant: Variant = row.variant.parse()?;
        if !seen.insert((row.child_id, variant.as_str(), row.question_id.clone())) {
            anyhow::bail!(
                "row {}: question '{}' answered twice for {} ({})",
                line + 1,
                row.question_id,
                row.child_id,
                variant
            );
        }
        let option = row
            .option
            .checked_sub(1)
            .with_context(|| format!("row {}: options are numbered from 1", line + 1))?;
        sessions
            .entry((row.child_id, variant.as_str()))
            .or_insert_with(|| AssessmentSession::new(variant))
            .answer(&row.question_id, option)
            .with_context(|| format!("row {}", line + 1))?;
    }

    let mut inserted = 0usize;
    for ((child_id, _), session) in sessions {
        if !session.is_complete() {
            warn!(%child_id, answered = session.answers().len(), "skipping incomplete assessment");
            continue;
        }
        store
            .save_assessment(child_id, session.variant(), &session.scores(), session.answers())
            .await?;
        inserted += 1;
    }

    info!(inserted, "import finished");
    Ok(inserted)
}

pub fn export_csv(results: &[AssessmentResult], out: &Path) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(out)
        .with_context(|| format!("failed to create {}", out.display()))?;

    let mut header = vec!["id", "owner_id", "created_at", "variant"];
    header.extend(bank::skills().iter().map(|skill| skill.id));
    header.push("overall");
    writer.write_record(&header)?;

    for result in results {
        let mut record = vec![
            result.id.to_string(),
            result.owner_id.to_string(),
            result.created_at.to_rfc3339(),
            result.variant.to_string(),
        ];
        record.extend(
            bank::skills()
                .iter()
                .map(|skill| result.scores.get(skill.id).unwrap_or(0).to_string()),
        );
        record.push(result.scores.overall.to_string());
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fmt::Write as _;

    use super::*;
    use crate::store::testing::MemoryStore;

    fn write_answers(csv: &mut String, child: Uuid, variant: &str, option: usize, skip: usize) {
        for question in bank::skills()
            .iter()
            .flat_map(|skill| skill.questions)
            .skip(skip)
        {
            let _ = writeln!(csv, "{child},{variant},{},{option}", question.id);
        }
    }

    #[tokio::test]
    async fn import_saves_only_complete_assessments() {
        let coach = Uuid::new_v4();
        let mut store = MemoryStore::default();
        store.admins.push(coach);

        let complete = Uuid::new_v4();
        let partial = Uuid::new_v4();
        let mut csv = String::from("child_id,variant,question_id,option\n");
        write_answers(&mut csv, complete, "admin", 3, 0);
        write_answers(&mut csv, partial, "self", 2, 5);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answers.csv");
        std::fs::write(&path, csv).unwrap();

        let inserted = import_csv(&store, coach, &path).await.unwrap();
        assert_eq!(inserted, 1);

        let results = store.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].owner_id, complete);
        assert_eq!(results[0].variant, Variant::Admin);
        assert_eq!(results[0].scores.overall, 67);
    }

    #[tokio::test]
    async fn import_requires_a_coach() {
        let store = MemoryStore::default();
        let mut csv = String::from("child_id,variant,question_id,option\n");
        write_answers(&mut csv, Uuid::new_v4(), "self", 4, 0);
        write_answers(&mut csv, Uuid::new_v4(), "admin", 2, 0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answers.csv");
        std::fs::write(&path, csv).unwrap();

        let err = import_csv(&store, Uuid::new_v4(), &path).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoachError>(),
            Some(CoachError::NotAdmin(_))
        ));
        assert!(store.results().is_empty());
    }

    #[tokio::test]
    async fn import_rejects_out_of_range_options() {
        let coach = Uuid::new_v4();
        let mut store = MemoryStore::default();
        store.admins.push(coach);
        let csv = format!(
            "child_id,variant,question_id,option\n{},self,co_ball,5\n",
            Uuid::new_v4()
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answers.csv");
        std::fs::write(&path, csv).unwrap();

        assert!(import_csv(&store, coach, &path).await.is_err());
    }

    #[tokio::test]
    async fn repeated_answers_abort_the_import() {
        let coach = Uuid::new_v4();
        let mut store = MemoryStore::default();
        store.admins.push(coach);

        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let mut csv = String::from("child_id,variant,question_id,option\n");
        write_answers(&mut csv, first, "self", 3, 0);
        write_answers(&mut csv, second, "self", 3, 0);
        let _ = writeln!(csv, "{second},self,fo_noise,1");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answers.csv");
        std::fs::write(&path, csv).unwrap();

        let err = import_csv(&store, coach, &path).await.unwrap_err();
        assert!(err.to_string().contains("fo_noise"));
        assert!(store.results().is_empty());
    }

    #[tokio::test]
    async fn export_writes_one_line_per_result() {
        let store = MemoryStore::default();
        let owner = Uuid::new_v4();
        let mut session = AssessmentSession::new(Variant::SelfAssessment);
        for question in bank::skills().iter().flat_map(|skill| skill.questions) {
            session.answer(question.id, 1).unwrap();
        }
        for _ in 0..2 {
            store
                .save_assessment(owner, session.variant(), &session.scores(), session.answers())
                .await
                .unwrap();
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        let history = store.history(owner, 10).await.unwrap();
        export_csv(&history, &path).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,owner_id,created_at,variant,self_worth"));
        assert!(lines[1].contains(&owner.to_string()));
        assert!(lines[1].ends_with(",50,50,50,50,50,50,50"));
    }
}

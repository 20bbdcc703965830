use std::fmt::Write;

use crate::bank::{self, Variant};
use crate::models::{AssessmentResult, SavedGoal, ScoreSet, SkillTrend};
use crate::scoring::Band;

/// Per-skill change from the oldest to the newest result. `results` is
/// newest first, as the store returns it.
pub fn skill_trends(results: &[AssessmentResult]) -> Vec<SkillTrend> {
    let (Some(latest), Some(first)) = (results.first(), results.last()) else {
        return Vec::new();
    };

    bank::skills()
        .iter()
        .map(|skill| SkillTrend {
            title: skill.title.to_string(),
            first: first.scores.get(skill.id).unwrap_or(0),
            latest: latest.scores.get(skill.id).unwrap_or(0),
        })
        .collect()
}

pub fn render_scores(scores: &ScoreSet, variant: Variant) -> String {
    let mut output = String::new();
    for skill in bank::skills() {
        let value = scores.get(skill.id).unwrap_or(0);
        let _ = writeln!(
            output,
            "- {}: {} ({})",
            skill.title,
            value,
            Band::classify(value).label(variant)
        );
    }
    let _ = writeln!(
        output,
        "- Overall: {} ({})",
        scores.overall,
        Band::classify(scores.overall).label(variant)
    );
    output
}

pub fn render_goal(saved: &SavedGoal) -> String {
    let title = bank::skill(&saved.goal.skill_id)
        .map(|skill| skill.title)
        .unwrap_or(saved.goal.skill_id.as_str());
    format!(
        "- {}: {} (first step: {}; by {})",
        title, saved.goal.goal, saved.goal.first_step, saved.goal.target_date
    )
}

pub fn build_report(
    owner_label: &str,
    results: &[AssessmentResult],
    goals: &[SavedGoal],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Core Skills Report");
    let _ = writeln!(
        output,
        "Generated for {} ({} assessments)",
        owner_label,
        results.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Goals");
    if goals.is_empty() {
        let _ = writeln!(output, "No goals set yet.");
    }
    for goal in goals {
        let _ = writeln!(output, "{}", render_goal(goal));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Latest Scores");

    match results.first() {
        None => {
            let _ = writeln!(output, "No assessments recorded yet.");
            return output;
        }
        Some(latest) => {
            let _ = writeln!(
                output,
                "Taken {} ({} assessment, {} answers)",
                latest.created_at.format("%Y-%m-%d"),
                latest.variant,
                latest.raw_answers.len()
            );
            output.push_str(&render_scores(&latest.scores, latest.variant));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Change Over Time");

    if results.len() < 2 {
        let _ = writeln!(output, "Only one assessment so far; retake to see progress.");
    } else {
        let mut trends = skill_trends(results);
        trends.sort_by_key(|trend| std::cmp::Reverse(trend.change()));
        for trend in trends.iter() {
            let _ = writeln!(
                output,
                "- {}: {} -> {} ({:+})",
                trend.title,
                trend.first,
                trend.latest,
                trend.change()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## History");

    for result in results.iter() {
        let _ = writeln!(
            output,
            "- {} {} overall {} ({})",
            result.created_at.format("%Y-%m-%d"),
            result.variant,
            result.scores.overall,
            Band::classify(result.scores.overall).label(result.variant)
        );
    }

    output
}

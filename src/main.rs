use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod assessment;
mod bank;
mod config;
mod console;
mod db;
mod draft;
mod error;
mod goals;
mod models;
mod reflection;
mod report;
mod scoring;
mod store;
mod wizard;

use assessment::AssessmentSession;
use bank::Variant;
use config::Config;
use console::{Console, Reply};
use db::PgStore;
use error::{CoachError, Notice};
use goals::GoalPlan;
use reflection::{PostActivity, PreActivity};
use store::{OwnerContext, Store, HISTORY_PAGE};
use wizard::Wizard;

#[derive(Parser)]
#[command(name = "mindset-coach")]
#[command(about = "Mental skills coaching for youth footballers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Actor {
    /// Signed-in user
    #[arg(long)]
    user: Uuid,
    /// Player to act for (coaches only)
    #[arg(long)]
    child: Option<Uuid>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Phase {
    Pre,
    Post,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo players and a coach
    Seed,
    /// Take the Core Skills Assessment
    Assess {
        #[command(flatten)]
        actor: Actor,
        #[arg(long, default_value = "self")]
        variant: Variant,
        /// Continue from the locally saved draft
        #[arg(long)]
        resume: bool,
    },
    /// Fill in a pre- or post-activity reflection
    Reflect {
        #[command(flatten)]
        actor: Actor,
        #[arg(long, value_enum)]
        phase: Phase,
    },
    /// Set an improvement goal for one skill
    Goal {
        #[command(flatten)]
        actor: Actor,
    },
    /// List recent goals
    Goals {
        #[command(flatten)]
        actor: Actor,
        #[arg(long, default_value_t = HISTORY_PAGE)]
        limit: i64,
    },
    /// Show the most recent assessment
    Latest {
        #[command(flatten)]
        actor: Actor,
    },
    /// List recent assessments
    History {
        #[command(flatten)]
        actor: Actor,
        #[arg(long, default_value_t = HISTORY_PAGE)]
        limit: i64,
    },
    /// Generate a markdown progress report
    Report {
        #[command(flatten)]
        actor: Actor,
        #[arg(long, default_value_t = HISTORY_PAGE)]
        limit: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Import paper assessments from a CSV file
    Import {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Export assessment history to a CSV file
    Export {
        #[command(flatten)]
        actor: Actor,
        #[arg(long, default_value_t = HISTORY_PAGE)]
        limit: i64,
        #[arg(long)]
        csv: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = PgStore::new(pool.clone());
    let mut out = io::stdout();

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let children = db::seed(&pool).await?;
            println!("Seed data inserted. Coach user: {}", db::SEED_COACH_ID);
            for child in children {
                println!("- {} ({})", child.full_name, child.id);
            }
        }
        Commands::Assess {
            actor,
            variant,
            resume,
        } => {
            let context = OwnerContext::new(actor.user, actor.child);
            let Some(owner_id) =
                reported(context.assessment_owner(&store, variant).await, &mut out)?
            else {
                return Ok(());
            };
            let mut console = Console::new(io::stdin().lock(), io::stdout());
            assess(
                &store,
                &mut console,
                owner_id,
                variant,
                resume,
                &config.draft_dir,
            )
            .await?;
        }
        Commands::Reflect { actor, phase } => {
            let Some(owner_id) = resolve_owner(&store, &actor, &mut out).await? else {
                return Ok(());
            };
            let mut console = Console::new(io::stdin().lock(), io::stdout());
            let saved = match phase {
                Phase::Pre => {
                    let mut wizard = Wizard::new(PreActivity::default());
                    console::run(&mut wizard, &mut console, &store, owner_id, |_| {}).await?
                }
                Phase::Post => {
                    let mut wizard = Wizard::new(PostActivity::default());
                    console::run(&mut wizard, &mut console, &store, owner_id, |_| {}).await?
                }
            };
            match saved {
                Some(id) => println!("Reflection saved ({id})."),
                None => println!("Reflection not saved."),
            }
        }
        Commands::Goal { actor } => {
            let Some(owner_id) = resolve_owner(&store, &actor, &mut out).await? else {
                return Ok(());
            };
            let mut plan = GoalPlan::new(Utc::now().date_naive());
            let latest = reported(store.load_latest(owner_id).await, &mut out)?.flatten();
            if let Some(skill) = latest.and_then(|latest| plan.suggest_from(&latest.scores)) {
                println!("Suggested from your latest assessment: {}", skill.title);
            }

            let mut console = Console::new(io::stdin().lock(), io::stdout());
            let mut wizard = Wizard::new(plan);
            match console::run(&mut wizard, &mut console, &store, owner_id, |_| {}).await? {
                Some(id) => println!("Goal saved ({id})."),
                None => println!("Goal not saved."),
            }
        }
        Commands::Goals { actor, limit } => {
            let Some(owner_id) = resolve_owner(&store, &actor, &mut out).await? else {
                return Ok(());
            };
            show_goals(&store, owner_id, limit, &mut out).await?;
        }
        Commands::Latest { actor } => {
            let Some(owner_id) = resolve_owner(&store, &actor, &mut out).await? else {
                return Ok(());
            };
            show_latest(&store, owner_id, &mut out).await?;
        }
        Commands::History { actor, limit } => {
            let Some(owner_id) = resolve_owner(&store, &actor, &mut out).await? else {
                return Ok(());
            };
            show_history(&store, owner_id, limit, &mut out).await?;
        }
        Commands::Report { actor, limit, out: path } => {
            let Some(owner_id) = resolve_owner(&store, &actor, &mut out).await? else {
                return Ok(());
            };
            let Some(results) = reported(store.history(owner_id, limit).await, &mut out)? else {
                return Ok(());
            };
            let Some(goals) = reported(store.goals(owner_id, limit).await, &mut out)? else {
                return Ok(());
            };
            let report = report::build_report(&owner_id.to_string(), &results, &goals);
            std::fs::write(&path, report)?;
            println!("Report written to {}.", path.display());
        }
        Commands::Import { user, csv } => match db::import_csv(&store, user, &csv).await {
            Ok(inserted) => println!("Inserted {inserted} assessments from {}.", csv.display()),
            Err(err) => match err.downcast::<CoachError>() {
                Ok(err) => {
                    reported::<()>(Err(err), &mut out)?;
                }
                Err(err) => return Err(err),
            },
        },
        Commands::Export { actor, limit, csv } => {
            let Some(owner_id) = resolve_owner(&store, &actor, &mut out).await? else {
                return Ok(());
            };
            let Some(results) = reported(store.history(owner_id, limit).await, &mut out)? else {
                return Ok(());
            };
            db::export_csv(&results, &csv)?;
            println!("Exported {} assessments to {}.", results.len(), csv.display());
        }
    }

    Ok(())
}

/// Log a failed request and show its notice instead of ending the command
/// with an error. `None` means the caller should stop.
fn reported<T>(result: Result<T, CoachError>, out: &mut impl Write) -> io::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            let notice = err.notice();
            match notice {
                Notice::Generic => error!(error = %err, "backend request failed"),
                _ => warn!(error = %err, "request refused"),
            }
            writeln!(out, "{notice}")?;
            Ok(None)
        }
    }
}

async fn resolve_owner(
    store: &dyn Store,
    actor: &Actor,
    out: &mut impl Write,
) -> io::Result<Option<Uuid>> {
    let context = OwnerContext::new(actor.user, actor.child);
    reported(context.effective_owner_id(store).await, out)
}

async fn show_latest(store: &dyn Store, owner_id: Uuid, out: &mut impl Write) -> io::Result<()> {
    let Some(latest) = reported(store.load_latest(owner_id).await, out)? else {
        return Ok(());
    };
    match latest {
        Some(latest) => {
            writeln!(
                out,
                "Assessment from {} ({}):",
                latest.created_at.format("%Y-%m-%d"),
                latest.variant
            )?;
            write!(out, "{}", report::render_scores(&latest.scores, latest.variant))
        }
        None => writeln!(out, "No assessments recorded yet."),
    }
}

async fn show_history(
    store: &dyn Store,
    owner_id: Uuid,
    limit: i64,
    out: &mut impl Write,
) -> io::Result<()> {
    let Some(results) = reported(store.history(owner_id, limit).await, out)? else {
        return Ok(());
    };
    if results.is_empty() {
        return writeln!(out, "No assessments recorded yet.");
    }
    for result in results.iter() {
        writeln!(
            out,
            "- {} {} overall {} ({})",
            result.created_at.format("%Y-%m-%d %H:%M"),
            result.variant,
            result.scores.overall,
            scoring::Band::classify(result.scores.overall).label(result.variant)
        )?;
    }
    Ok(())
}

async fn show_goals(
    store: &dyn Store,
    owner_id: Uuid,
    limit: i64,
    out: &mut impl Write,
) -> io::Result<()> {
    let Some(goals) = reported(store.goals(owner_id, limit).await, out)? else {
        return Ok(());
    };
    if goals.is_empty() {
        return writeln!(out, "No goals set yet.");
    }
    for goal in goals.iter() {
        writeln!(
            out,
            "{} (set {})",
            report::render_goal(goal),
            goal.created_at.format("%Y-%m-%d")
        )?;
    }
    Ok(())
}

/// Run the assessment wizard for `owner_id`. A failed read of the previous
/// result is reported and the player carries on with a fresh session.
async fn assess<R: BufRead, W: Write>(
    store: &dyn Store,
    console: &mut Console<R, W>,
    owner_id: Uuid,
    variant: Variant,
    resume: bool,
    draft_dir: &Path,
) -> anyhow::Result<Option<Uuid>> {
    let draft_path = draft::path_for(draft_dir, owner_id, variant);
    let saved_draft = match draft::load(&draft_path, owner_id, variant) {
        Ok(saved) => saved.filter(|saved| !saved.answers.is_empty()),
        Err(err) => {
            warn!(error = %err, path = %draft_path.display(), "could not read draft");
            None
        }
    };

    let session = match saved_draft {
        Some(saved) if resume => {
            console.say(format!(
                "Resuming draft from {} ({} of {} answered).",
                saved.saved_at.format("%Y-%m-%d %H:%M"),
                saved.answers.len(),
                bank::question_count()
            ))?;
            AssessmentSession::from_answers(variant, &saved.answers)
        }
        saved => {
            if saved.is_some() {
                console.say("A saved draft exists; run with --resume to continue it.")?;
            }
            let latest = match store.load_latest(owner_id).await {
                Ok(latest) => latest,
                Err(err) => {
                    error!(error = %err, %owner_id, "could not load latest assessment");
                    console.say(err.notice().to_string())?;
                    None
                }
            };
            if let Some(latest) = latest {
                console.say(format!(
                    "Latest assessment from {}:",
                    latest.created_at.format("%Y-%m-%d")
                ))?;
                console.say(report::render_scores(&latest.scores, latest.variant).trim_end())?;
                match console.ask("Retake the assessment? [y/N]")? {
                    Reply::Text(answer) if answer.eq_ignore_ascii_case("y") => {}
                    _ => return Ok(None),
                }
            }
            AssessmentSession::new(variant)
        }
    };

    let mut wizard = Wizard::resume(session);
    let saved = console::run(&mut wizard, console, store, owner_id, |session| {
        let snapshot = draft::Draft::new(owner_id, variant, session.answers());
        if let Err(err) = draft::save(&draft_path, &snapshot) {
            warn!(error = %err, "could not save draft");
        }
    })
    .await?;

    match saved {
        Some(id) => {
            if let Err(err) = draft::clear(&draft_path) {
                warn!(error = %err, "could not remove draft");
            }
            console.say(format!("Assessment saved ({id})."))?;
        }
        None => console.say("Assessment not submitted. Run with --resume to continue.")?,
    }
    Ok(saved)
}

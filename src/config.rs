use std::path::PathBuf;

use anyhow::Context;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_DRAFT_DIR: &str = ".mindset-drafts";

/// Settings read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub draft_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .context("DATABASE_URL must be set to the coaching Postgres instance")?;

        let max_connections = match lookup("MINDSET_MAX_CONNECTIONS") {
            Some(value) => value
                .parse()
                .with_context(|| format!("MINDSET_MAX_CONNECTIONS is not a number: {value}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let draft_dir = lookup("MINDSET_DRAFT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DRAFT_DIR));

        Ok(Self {
            database_url,
            max_connections,
            draft_dir,
        })
    }
}

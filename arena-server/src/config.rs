use std::env;
use std::str::FromStr;
use std::time::Duration;

use arena_persistence::DEFAULT_DATABASE_URL;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub questions_file: String,
    pub questions_per_match: usize,
    pub answer_timeout_seconds: u64,
    pub advance_delay_ms: u64,
    pub freshness_window_seconds: u64,
    pub candidate_limit: u64,
    pub waiting_match_ttl_minutes: u64,
    pub playing_match_ttl_minutes: u64,
    pub finished_match_ttl_hours: u64,
    pub connection_timeout_seconds: u64,
    pub online_window_minutes: u64,
    pub bible_api_base: String,
    pub auth_dev_mode: bool,
    pub firebase_project_id: String,
}

fn var_or(name: &'static str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = var_or(name, default);
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

fn positive(name: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        Err(ConfigError::Zero { name })
    } else {
        Ok(value)
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let questions_per_match: usize = parse_var("QUESTIONS_PER_MATCH", "10")?;
        positive("QUESTIONS_PER_MATCH", questions_per_match as u64)?;

        Ok(Self {
            host: var_or("HOST", "127.0.0.1"),
            port: parse_var("PORT", "8080")?,
            database_url: var_or("DATABASE_URL", DEFAULT_DATABASE_URL),
            questions_file: var_or("QUESTIONS_FILE", "./data/questions.json"),
            questions_per_match,
            answer_timeout_seconds: positive(
                "ANSWER_TIMEOUT_SECONDS",
                parse_var("ANSWER_TIMEOUT_SECONDS", "10")?,
            )?,
            advance_delay_ms: parse_var("ADVANCE_DELAY_MS", "2000")?,
            freshness_window_seconds: positive(
                "FRESHNESS_WINDOW_SECONDS",
                parse_var("FRESHNESS_WINDOW_SECONDS", "300")?,
            )?,
            candidate_limit: positive("CANDIDATE_LIMIT", parse_var("CANDIDATE_LIMIT", "20")?)?,
            waiting_match_ttl_minutes: parse_var("WAITING_MATCH_TTL_MINUTES", "30")?,
            playing_match_ttl_minutes: parse_var("PLAYING_MATCH_TTL_MINUTES", "120")?,
            finished_match_ttl_hours: parse_var("FINISHED_MATCH_TTL_HOURS", "24")?,
            connection_timeout_seconds: parse_var("CONNECTION_TIMEOUT_SECONDS", "300")?,
            online_window_minutes: parse_var("ONLINE_WINDOW_MINUTES", "5")?,
            bible_api_base: var_or("BIBLE_API_BASE", "https://bible-api.com"),
            auth_dev_mode: var_or("AUTH_DEV_MODE", "false") == "true",
            firebase_project_id: var_or("FIREBASE_PROJECT_ID", "bible-arena"),
        })
    }

    pub fn match_settings(&self) -> MatchSettings {
        MatchSettings {
            questions_per_match: self.questions_per_match,
            answer_timeout: Duration::from_secs(self.answer_timeout_seconds),
            advance_delay: Duration::from_millis(self.advance_delay_ms),
            freshness_window: chrono::Duration::seconds(self.freshness_window_seconds as i64),
            candidate_limit: self.candidate_limit,
        }
    }

    pub fn reaper(&self) -> arena_core::MatchReaper {
        arena_core::MatchReaper::new(
            chrono::Duration::minutes(self.waiting_match_ttl_minutes as i64),
            chrono::Duration::minutes(self.playing_match_ttl_minutes as i64),
            chrono::Duration::hours(self.finished_match_ttl_hours as i64),
        )
    }
}

/// Knobs for matchmaking and the live match loop
#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub questions_per_match: usize,
    pub answer_timeout: Duration,
    pub advance_delay: Duration,
    pub freshness_window: chrono::Duration,
    pub candidate_limit: u64,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            questions_per_match: 10,
            answer_timeout: Duration::from_secs(10),
            advance_delay: Duration::from_secs(2),
            freshness_window: chrono::Duration::minutes(5),
            candidate_limit: 20,
        }
    }
}

use anyhow::{Context, Result};
use arena_types::{LeaderboardEntry, UserProgress};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::{QuizSummary, ScoringEngine};

pub const PROGRESS_KEY: &str = "bible-quiz-progress";
pub const LEADERBOARD_KEY: &str = "bible-quiz-leaderboard";
pub const TUTORIAL_KEY: &str = "bible_quest_tutorial_seen";
pub const PLAYER_NAME_KEY: &str = "bible-quiz-name";

pub const LEADERBOARD_CAPACITY: usize = 100;

/// Device-local key/value storage for a player's solo progress.
///
/// Implementors only provide raw get/set; the typed accessors fall back to
/// defaults when an entry is missing or unreadable.
pub trait ProgressStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<Value>>;
    fn set_raw(&self, key: &str, value: Value) -> Result<()>;

    fn load_progress(&self) -> UserProgress {
        load_or_default(self, PROGRESS_KEY)
    }

    fn save_progress(&self, progress: &UserProgress) -> Result<()> {
        save(self, PROGRESS_KEY, progress)
    }

    fn load_leaderboard(&self) -> Vec<LeaderboardEntry> {
        load_or_default(self, LEADERBOARD_KEY)
    }

    /// Insert a new entry, keeping the board sorted by score and capped
    fn add_to_leaderboard(&self, name: &str, score: i32, accuracy: u32) -> Result<Vec<LeaderboardEntry>> {
        let mut board = self.load_leaderboard();
        board.push(LeaderboardEntry {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            score,
            date: chrono::Utc::now().to_rfc3339(),
            accuracy,
        });
        board.sort_by(|a, b| b.score.cmp(&a.score));
        board.truncate(LEADERBOARD_CAPACITY);

        save(self, LEADERBOARD_KEY, &board)?;
        Ok(board)
    }

    fn merge_quiz(&self, summary: &QuizSummary) -> Result<UserProgress> {
        let updated = ScoringEngine::update_progress(&self.load_progress(), summary);
        self.save_progress(&updated)?;
        Ok(updated)
    }

    fn tutorial_seen(&self) -> bool {
        load_or_default(self, TUTORIAL_KEY)
    }

    fn mark_tutorial_seen(&self) -> Result<()> {
        save(self, TUTORIAL_KEY, &true)
    }

    fn player_name(&self) -> Option<String> {
        load_or_default(self, PLAYER_NAME_KEY)
    }

    fn set_player_name(&self, name: &str) -> Result<()> {
        save(self, PLAYER_NAME_KEY, &name)
    }
}

fn load_or_default<T, S>(store: &S, key: &str) -> T
where
    T: DeserializeOwned + Default,
    S: ProgressStore + ?Sized,
{
    let raw = match store.get_raw(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(e) => {
            tracing::error!("Error loading {}: {}", key, e);
            return T::default();
        }
    };

    serde_json::from_value(raw).unwrap_or_else(|e| {
        tracing::error!("Discarding unreadable {}: {}", key, e);
        T::default()
    })
}

fn save<T, S>(store: &S, key: &str, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
    S: ProgressStore + ?Sized,
{
    let raw = serde_json::to_value(value).with_context(|| format!("Failed to encode {}", key))?;
    store.set_raw(key, raw)
}

/// All keys kept as one JSON object in a single file.
pub struct JsonFileProgressStore {
    path: PathBuf,
}

impl JsonFileProgressStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&raw).with_context(|| format!("Corrupt progress file {}", self.path.display()))
    }

    fn write_all(&self, entries: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Write beside the target then rename so a crash never leaves half a file
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

impl ProgressStore for JsonFileProgressStore {
    fn get_raw(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_all()?.get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: Value) -> Result<()> {
        // A corrupt file is replaced rather than blocking every future save
        let mut entries = self.read_all().unwrap_or_else(|e| {
            tracing::warn!("Resetting progress file: {}", e);
            Map::new()
        });
        entries.insert(key.to_string(), value);
        self.write_all(&entries)
    }
}

#[derive(Default)]
pub struct MemoryProgressStore {
    entries: Mutex<Map<String, Value>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressStore for MemoryProgressStore {
    fn get_raw(&self, key: &str) -> Result<Option<Value>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("progress store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("progress store lock poisoned"))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

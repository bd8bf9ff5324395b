use anyhow::{Context, Result, anyhow};
use arena_types::{Category, Difficulty, Filter, QuestionId, QuestionSnapshot};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::path::Path;

/// Content bank the quiz modes draw questions from.
pub struct QuestionBank {
    questions: Vec<QuestionSnapshot>,
}

impl QuestionBank {
    /// Build a bank, dropping malformed entries and duplicate ids
    pub fn new(questions: Vec<QuestionSnapshot>) -> Self {
        let mut seen = HashSet::new();
        let questions = questions
            .into_iter()
            .filter(|q| {
                if let Err(reason) = validate_question(q) {
                    tracing::warn!("Skipping question {}: {}", q.id, reason);
                    return false;
                }
                if !seen.insert(q.id.clone()) {
                    tracing::warn!("Skipping duplicate question id {}", q.id);
                    return false;
                }
                true
            })
            .collect();

        Self { questions }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let questions: Vec<QuestionSnapshot> =
            serde_json::from_str(json).context("Invalid question bank JSON")?;
        Ok(Self::new(questions))
    }

    /// Load a bank from a JSON file, or from every `.json` file in a directory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut questions = Vec::new();

        if path.is_dir() {
            let mut files: Vec<_> = std::fs::read_dir(path)
                .with_context(|| format!("Failed to read directory {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            files.sort();

            for file in files {
                questions.extend(read_question_file(&file)?);
            }
        } else {
            questions = read_question_file(path)?;
        }

        let bank = Self::new(questions);
        if bank.is_empty() {
            return Err(anyhow!("No questions found at {}", path.display()));
        }

        tracing::info!("Loaded {} questions from {}", bank.len(), path.display());
        Ok(bank)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&QuestionSnapshot> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn filtered(
        &self,
        category: Filter<Category>,
        difficulty: Filter<Difficulty>,
    ) -> Vec<&QuestionSnapshot> {
        self.questions
            .iter()
            .filter(|q| category.matches(&q.category) && difficulty.matches(&q.difficulty))
            .collect()
    }

    pub fn count_by_category(&self, category: Category) -> usize {
        self.filtered(Filter::Only(category), Filter::Any).len()
    }

    /// Random sample of up to `count` questions, skipping `exclude`
    pub fn random_questions(
        &self,
        count: usize,
        category: Filter<Category>,
        difficulty: Filter<Difficulty>,
        exclude: &HashSet<QuestionId>,
    ) -> Vec<QuestionSnapshot> {
        self.random_questions_with(&mut rand::thread_rng(), count, category, difficulty, exclude)
    }

    pub fn random_questions_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
        category: Filter<Category>,
        difficulty: Filter<Difficulty>,
        exclude: &HashSet<QuestionId>,
    ) -> Vec<QuestionSnapshot> {
        let mut pool: Vec<&QuestionSnapshot> = self
            .filtered(category, difficulty)
            .into_iter()
            .filter(|q| !exclude.contains(&q.id))
            .collect();

        pool.shuffle(rng);
        pool.into_iter().take(count).cloned().collect()
    }
}

/// Match modes are either `all` or a category slug
pub fn mode_filter(mode: &str) -> Filter<Category> {
    match Category::from_slug(mode) {
        Some(category) => Filter::Only(category),
        None => Filter::Any,
    }
}

/// Shuffle a question's options, returning them with the new index of the correct option
pub fn shuffle_options<R: Rng + ?Sized>(question: &QuestionSnapshot, rng: &mut R) -> (Vec<String>, u8) {
    let mut order: Vec<usize> = (0..question.options.len()).collect();
    order.shuffle(rng);

    let correct = order
        .iter()
        .position(|&original| original == question.correct_index as usize)
        .unwrap_or(0) as u8;
    let options = order
        .into_iter()
        .map(|original| question.options[original].clone())
        .collect();

    (options, correct)
}

fn read_question_file(path: &Path) -> Result<Vec<QuestionSnapshot>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid question JSON in {}", path.display()))
}

fn validate_question(question: &QuestionSnapshot) -> Result<(), &'static str> {
    if question.id.trim().is_empty() {
        return Err("empty id");
    }
    if question.prompt.trim().is_empty() {
        return Err("empty prompt");
    }
    if question.options.len() < 2 {
        return Err("fewer than two options");
    }
    if question.options.len() > u8::MAX as usize {
        return Err("too many options");
    }
    if question.correct_index as usize >= question.options.len() {
        return Err("correct index out of range");
    }
    Ok(())
}

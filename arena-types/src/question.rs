use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub type QuestionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum Category {
    OldTestament,
    NewTestament,
    JesusTeachings,
    BibleCharacters,
    Miracles,
    PsalmsProverbs,
    General,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::OldTestament,
        Category::NewTestament,
        Category::JesusTeachings,
        Category::BibleCharacters,
        Category::Miracles,
        Category::PsalmsProverbs,
        Category::General,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Category::OldTestament => "old-testament",
            Category::NewTestament => "new-testament",
            Category::JesusTeachings => "jesus-teachings",
            Category::BibleCharacters => "bible-characters",
            Category::Miracles => "miracles",
            Category::PsalmsProverbs => "psalms-proverbs",
            Category::General => "general",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::OldTestament => "Old Testament",
            Category::NewTestament => "New Testament",
            Category::JesusTeachings => "Jesus' Teachings",
            Category::BibleCharacters => "Bible Characters",
            Category::Miracles => "Miracles",
            Category::PsalmsProverbs => "Psalms & Proverbs",
            Category::General => "General Knowledge",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.slug() == slug)
    }
}

/// Selection filter used by quiz setup and match modes. `Any` matches everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum Filter<T> {
    #[default]
    Any,
    Only(T),
}

impl<T: PartialEq> Filter<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Filter::Any => true,
            Filter::Only(expected) => expected == value,
        }
    }
}

/// A question as stored in the content bank and copied into matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuestionSnapshot {
    pub id: QuestionId,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: u8,
    pub category: Category,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub reference: String,
}

impl QuestionSnapshot {
    pub fn correct_option(&self) -> Option<&str> {
        self.options
            .get(self.correct_index as usize)
            .map(String::as_str)
    }

    pub fn is_correct(&self, answer_index: u8) -> bool {
        answer_index == self.correct_index
    }
}

/// Question without its answer, safe to hand to players before they answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PublicQuestion {
    pub id: QuestionId,
    pub prompt: String,
    pub options: Vec<String>,
    pub category: Category,
    pub difficulty: Difficulty,
}

impl From<&QuestionSnapshot> for PublicQuestion {
    fn from(question: &QuestionSnapshot) -> Self {
        PublicQuestion {
            id: question.id.clone(),
            prompt: question.prompt.clone(),
            options: question.options.clone(),
            category: question.category,
            difficulty: question.difficulty,
        }
    }
}

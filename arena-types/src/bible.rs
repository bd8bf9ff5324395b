use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Testament {
    Old,
    New,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BibleVerse {
    pub book_id: String,
    pub book_name: String,
    pub chapter: u32,
    pub verse: u32,
    pub text: String,
}

/// One chapter as returned by the public reading API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BibleChapter {
    pub reference: String,
    pub verses: Vec<BibleVerse>,
    pub text: String,
    #[serde(default)]
    pub translation_id: String,
    #[serde(default)]
    pub translation_name: String,
    #[serde(default)]
    pub translation_note: String,
}

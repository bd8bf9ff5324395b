use std::time::Duration;

use arena_types::{BibleChapter, Testament};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

pub const DEFAULT_BIBLE_API_BASE: &str = "https://bible-api.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BookInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub testament: Testament,
    pub chapters: u32,
}

const fn book(id: &'static str, name: &'static str, testament: Testament, chapters: u32) -> BookInfo {
    BookInfo {
        id,
        name,
        testament,
        chapters,
    }
}

/// The 66 books of the Protestant canon, in order
pub const BOOKS: [BookInfo; 66] = [
    book("genesis", "Genesis", Testament::Old, 50),
    book("exodus", "Exodus", Testament::Old, 40),
    book("leviticus", "Leviticus", Testament::Old, 27),
    book("numbers", "Numbers", Testament::Old, 36),
    book("deuteronomy", "Deuteronomy", Testament::Old, 34),
    book("joshua", "Joshua", Testament::Old, 24),
    book("judges", "Judges", Testament::Old, 21),
    book("ruth", "Ruth", Testament::Old, 4),
    book("1samuel", "1 Samuel", Testament::Old, 31),
    book("2samuel", "2 Samuel", Testament::Old, 24),
    book("1kings", "1 Kings", Testament::Old, 22),
    book("2kings", "2 Kings", Testament::Old, 25),
    book("1chronicles", "1 Chronicles", Testament::Old, 29),
    book("2chronicles", "2 Chronicles", Testament::Old, 36),
    book("ezra", "Ezra", Testament::Old, 10),
    book("nehemiah", "Nehemiah", Testament::Old, 13),
    book("esther", "Esther", Testament::Old, 10),
    book("job", "Job", Testament::Old, 42),
    book("psalms", "Psalms", Testament::Old, 150),
    book("proverbs", "Proverbs", Testament::Old, 31),
    book("ecclesiastes", "Ecclesiastes", Testament::Old, 12),
    book("songofsolomon", "Song of Solomon", Testament::Old, 8),
    book("isaiah", "Isaiah", Testament::Old, 66),
    book("jeremiah", "Jeremiah", Testament::Old, 52),
    book("lamentations", "Lamentations", Testament::Old, 5),
    book("ezekiel", "Ezekiel", Testament::Old, 48),
    book("daniel", "Daniel", Testament::Old, 12),
    book("hosea", "Hosea", Testament::Old, 14),
    book("joel", "Joel", Testament::Old, 3),
    book("amos", "Amos", Testament::Old, 9),
    book("obadiah", "Obadiah", Testament::Old, 1),
    book("jonah", "Jonah", Testament::Old, 4),
    book("micah", "Micah", Testament::Old, 7),
    book("nahum", "Nahum", Testament::Old, 3),
    book("habakkuk", "Habakkuk", Testament::Old, 3),
    book("zephaniah", "Zephaniah", Testament::Old, 3),
    book("haggai", "Haggai", Testament::Old, 2),
    book("zechariah", "Zechariah", Testament::Old, 14),
    book("malachi", "Malachi", Testament::Old, 4),
    book("matthew", "Matthew", Testament::New, 28),
    book("mark", "Mark", Testament::New, 16),
    book("luke", "Luke", Testament::New, 24),
    book("john", "John", Testament::New, 21),
    book("acts", "Acts", Testament::New, 28),
    book("romans", "Romans", Testament::New, 16),
    book("1corinthians", "1 Corinthians", Testament::New, 16),
    book("2corinthians", "2 Corinthians", Testament::New, 13),
    book("galatians", "Galatians", Testament::New, 6),
    book("ephesians", "Ephesians", Testament::New, 6),
    book("philippians", "Philippians", Testament::New, 4),
    book("colossians", "Colossians", Testament::New, 4),
    book("1thessalonians", "1 Thessalonians", Testament::New, 5),
    book("2thessalonians", "2 Thessalonians", Testament::New, 3),
    book("1timothy", "1 Timothy", Testament::New, 6),
    book("2timothy", "2 Timothy", Testament::New, 4),
    book("titus", "Titus", Testament::New, 3),
    book("philemon", "Philemon", Testament::New, 1),
    book("hebrews", "Hebrews", Testament::New, 13),
    book("james", "James", Testament::New, 5),
    book("1peter", "1 Peter", Testament::New, 5),
    book("2peter", "2 Peter", Testament::New, 3),
    book("1john", "1 John", Testament::New, 5),
    book("2john", "2 John", Testament::New, 1),
    book("3john", "3 John", Testament::New, 1),
    book("jude", "Jude", Testament::New, 1),
    book("revelation", "Revelation", Testament::New, 22),
];

pub fn find_book(id: &str) -> Option<&'static BookInfo> {
    BOOKS.iter().find(|b| b.id.eq_ignore_ascii_case(id))
}

pub fn books_in(testament: Testament) -> impl Iterator<Item = &'static BookInfo> {
    BOOKS.iter().filter(move |b| b.testament == testament)
}

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("Unknown book: {0}")]
    UnknownBook(String),
    #[error("{book} has {chapters} chapters, not {requested}")]
    ChapterOutOfRange {
        book: &'static str,
        chapters: u32,
        requested: u32,
    },
    #[error("Bible service request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Bible service returned {0}")]
    Status(StatusCode),
}

impl ContentError {
    /// Failures of the remote service, as opposed to a bad reference
    pub fn is_retryable(&self) -> bool {
        matches!(self, ContentError::Request(_) | ContentError::Status(_))
    }
}

/// Validate a reference against the book table
pub fn resolve_chapter(book_id: &str, chapter: u32) -> Result<&'static BookInfo, ContentError> {
    let book = find_book(book_id).ok_or_else(|| ContentError::UnknownBook(book_id.to_string()))?;
    if chapter == 0 || chapter > book.chapters {
        return Err(ContentError::ChapterOutOfRange {
            book: book.name,
            chapters: book.chapters,
            requested: chapter,
        });
    }
    Ok(book)
}

/// Read-only client for the public chapter API.
#[derive(Clone)]
pub struct BibleClient {
    client: Client,
    base_url: String,
}

impl BibleClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn chapter_url(&self, book: &BookInfo, chapter: u32) -> String {
        format!(
            "{}/{}+{}",
            self.base_url,
            book.name.replace(' ', "%20"),
            chapter
        )
    }

    pub async fn fetch_chapter(&self, book_id: &str, chapter: u32) -> Result<BibleChapter, ContentError> {
        let book = resolve_chapter(book_id, chapter)?;
        let url = self.chapter_url(book, chapter);
        debug!("Fetching {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ContentError::Status(response.status()));
        }

        Ok(response.json::<BibleChapter>().await?)
    }
}

impl Default for BibleClient {
    fn default() -> Self {
        Self::new(DEFAULT_BIBLE_API_BASE)
    }
}

#![allow(dead_code)]

use arena_core::{MatchStateMachine, NewMatch, QuestionBank, new_waiting_match};
use arena_types::{Category, Difficulty, Match, PlayerSlot, QuestionSnapshot};

/// Creates a question whose correct option is always "Right"
pub fn create_test_question(id: &str, category: Category, difficulty: Difficulty) -> QuestionSnapshot {
    QuestionSnapshot {
        id: id.to_string(),
        prompt: format!("Test question {}?", id),
        options: vec![
            "Wrong A".to_string(),
            "Right".to_string(),
            "Wrong B".to_string(),
            "Wrong C".to_string(),
        ],
        correct_index: 1,
        category,
        difficulty,
        reference: String::new(),
    }
}

/// Creates a bank with one question per category/difficulty pair
pub fn create_test_bank() -> QuestionBank {
    let mut questions = Vec::new();
    for category in Category::ALL {
        for difficulty in Difficulty::ALL {
            let id = format!("{}-{}", category.slug(), difficulty.label().to_lowercase());
            questions.push(create_test_question(&id, category, difficulty));
        }
    }
    QuestionBank::new(questions)
}

pub fn create_test_player(name: &str) -> PlayerSlot {
    PlayerSlot::new(format!("uid-{}", name.to_lowercase()), name)
}

/// Creates a waiting match hosted by `host` with `count` questions of one tier
pub fn create_waiting_match(host: &str, count: usize, difficulty: Difficulty) -> Match {
    let questions = (0..count)
        .map(|i| create_test_question(&format!("q{}", i), Category::General, difficulty))
        .collect();

    new_waiting_match(
        uuid::Uuid::new_v4().to_string(),
        "TEST01".to_string(),
        NewMatch {
            host: create_test_player(host),
            questions,
            mode: "all".to_string(),
            region: "global".to_string(),
            private: false,
        },
        chrono::Utc::now(),
    )
}

/// Creates a match Alice hosts and Bob has joined
pub fn create_playing_match(count: usize, difficulty: Difficulty) -> Match {
    let mut game = create_waiting_match("Alice", count, difficulty);
    game.join(create_test_player("Bob")).unwrap();
    game
}

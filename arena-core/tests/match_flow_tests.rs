mod common;

use arena_core::{Advance, MatchStateMachine, ScoringEngine};
use arena_types::{AnswerChoice, Difficulty, MatchOutcome, MatchStatus, MatchView};
use common::*;

#[test]
fn test_fresh_match_first_question() {
    let mut game = create_playing_match(10, Difficulty::Medium);

    let alice = game
        .record_answer("uid-alice", 0, AnswerChoice::Picked(1))
        .unwrap();
    let bob = game
        .record_answer("uid-bob", 0, AnswerChoice::Picked(3))
        .unwrap();

    assert!(alice.is_correct);
    assert_eq!(alice.points, ScoringEngine::difficulty_points(Difficulty::Medium));
    assert!(!bob.is_correct);
    assert_eq!(bob.points, 0);

    assert_eq!(game.advance(0).unwrap(), Advance::Next(1));
    assert_eq!(game.current_question_index, 1);
    assert_eq!(game.player1.current_answer, None);
    assert_eq!(game.player2.as_ref().unwrap().current_answer, None);
    assert_eq!(game.player1.score, 20);
    assert_eq!(game.player2.as_ref().unwrap().score, 0);
}

#[test]
fn test_full_match_to_finish() {
    let mut game = create_playing_match(10, Difficulty::Easy);

    for index in 0..10 {
        let bob_pick = if index % 2 == 0 { 1 } else { 0 };
        game.record_answer("uid-alice", index, AnswerChoice::Picked(1))
            .unwrap();
        game.record_answer("uid-bob", index, AnswerChoice::Picked(bob_pick))
            .unwrap();
        game.advance(index).unwrap();
    }

    assert_eq!(game.status, MatchStatus::Finished);
    assert_eq!(game.player1.score, 100);
    assert_eq!(game.player2.as_ref().unwrap().score, 50);
    assert_eq!(game.outcome_for("uid-alice"), Some(MatchOutcome::Win));
    assert_eq!(game.outcome_for("uid-bob"), Some(MatchOutcome::Loss));

    let view = MatchView::from(&game);
    assert!(view.current_question.is_none());
    assert!(view.revealed_answer.is_none());
}

#[test]
fn test_view_hides_answer_until_both_answer() {
    let mut game = create_playing_match(3, Difficulty::Hard);

    let view = MatchView::from(&game);
    assert!(view.current_question.is_some());
    assert_eq!(view.revealed_answer, None);

    game.record_answer("uid-alice", 0, AnswerChoice::Picked(1))
        .unwrap();
    assert_eq!(MatchView::from(&game).revealed_answer, None);

    game.record_answer("uid-bob", 0, AnswerChoice::NoAnswer)
        .unwrap();
    assert_eq!(MatchView::from(&game).revealed_answer, Some(1));
}

#[test]
fn test_timeout_sentinel_lets_match_progress() {
    let mut game = create_playing_match(2, Difficulty::Easy);

    // Bob disconnected; only the deadline answers for him
    for index in 0..2 {
        game.record_answer("uid-alice", index, AnswerChoice::Picked(0))
            .unwrap();
        assert_eq!(game.advance(index).unwrap(), Advance::NotReady);
        game.fill_missing_answers(index);
        game.advance(index).unwrap();
    }

    assert_eq!(game.status, MatchStatus::Finished);
    assert_eq!(game.outcome_for("uid-alice"), Some(MatchOutcome::Draw));
}

#[test]
fn test_question_bank_draws_per_mode() {
    let bank = create_test_bank();
    assert_eq!(bank.len(), 21);

    let filter = arena_core::mode_filter("miracles");
    let questions = bank.random_questions(10, filter, Default::default(), &Default::default());
    assert_eq!(questions.len(), 3);
    assert!(
        questions
            .iter()
            .all(|q| q.category == arena_types::Category::Miracles)
    );
}

use arena_types::{MatchId, MatchResult, MatchView};

/// Change notifications fanned out to everyone watching a match.
#[derive(Debug, Clone)]
pub enum MatchEvent {
    /// Any persisted mutation short of the end of the match
    Updated { view: MatchView },
    Finished {
        view: MatchView,
        results: Vec<MatchResult>,
    },
    /// Host withdrew or the reaper removed the record
    Removed { match_id: MatchId, reason: String },
}

impl MatchEvent {
    pub fn match_id(&self) -> &str {
        match self {
            MatchEvent::Updated { view } => &view.id,
            MatchEvent::Finished { view, .. } => &view.id,
            MatchEvent::Removed { match_id, .. } => match_id,
        }
    }

    pub fn view(&self) -> Option<&MatchView> {
        match self {
            MatchEvent::Updated { view } | MatchEvent::Finished { view, .. } => Some(view),
            MatchEvent::Removed { .. } => None,
        }
    }

    pub fn result_for(&self, uid: &str) -> Option<&MatchResult> {
        match self {
            MatchEvent::Finished { results, .. } => results.iter().find(|r| r.uid == uid),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, MatchEvent::Updated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MatchStateMachine, NewMatch, new_waiting_match};
    use arena_types::{AnswerChoice, Category, Difficulty, PlayerSlot, QuestionSnapshot};

    #[test]
    fn test_finished_event_carries_both_results() {
        let mut game = new_waiting_match(
            "m9".to_string(),
            "ZZZ999".to_string(),
            NewMatch {
                host: PlayerSlot::new("a", "A"),
                questions: vec![QuestionSnapshot {
                    id: "q".to_string(),
                    prompt: "Who built the ark?".to_string(),
                    options: vec!["Noah".into(), "Moses".into()],
                    correct_index: 0,
                    category: Category::OldTestament,
                    difficulty: Difficulty::Easy,
                    reference: "Genesis 6:14".to_string(),
                }],
                mode: "all".to_string(),
                region: "global".to_string(),
                private: false,
            },
            chrono::Utc::now(),
        );
        game.join(PlayerSlot::new("b", "B")).unwrap();
        game.record_answer("a", 0, AnswerChoice::Picked(1)).unwrap();
        game.record_answer("b", 0, AnswerChoice::Picked(0)).unwrap();
        game.advance(0).unwrap();

        let results = ["a", "b"]
            .iter()
            .filter_map(|uid| game.result_for(uid))
            .collect();
        let event = MatchEvent::Finished {
            view: MatchView::from(&game),
            results,
        };

        assert_eq!(event.match_id(), "m9");
        assert!(event.is_terminal());
        assert_eq!(event.result_for("b").unwrap().your_score, 10);
        assert_eq!(event.result_for("a").unwrap().your_score, 0);
        assert!(event.view().unwrap().current_question.is_none());
    }

    #[test]
    fn test_removed_event() {
        let event = MatchEvent::Removed {
            match_id: "gone".to_string(),
            reason: "cancelled".to_string(),
        };
        assert_eq!(event.match_id(), "gone");
        assert!(event.view().is_none());
        assert!(event.is_terminal());
    }
}

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{MatchResult, MatchTicket, MatchView, User};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ClientMessage {
    Authenticate {
        token: String,
    },
    FindMatch {
        display_name: String,
        mode: Option<String>,
        region: Option<String>,
    },
    CreatePrivateMatch {
        display_name: String,
        mode: Option<String>,
    },
    JoinByCode {
        code: String,
        display_name: String,
    },
    CancelSearch,
    WatchMatch {
        match_id: String,
    },
    /// `answer_index: None` submits "no answer" for the question
    SubmitAnswer {
        question_index: u32,
        answer_index: Option<u8>,
    },
    LeaveMatch,
    Heartbeat,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ServerMessage {
    AuthenticationSuccess { user: User },
    AuthenticationFailed { reason: String },
    MatchFound { ticket: MatchTicket },
    SearchCancelled,
    MatchUpdate { state: MatchView },
    AnswerRecorded {
        question_index: u32,
        is_correct: bool,
        points: i32,
    },
    MatchOver { result: MatchResult },
    /// The match record is gone: host cancelled or it expired
    MatchClosed { match_id: String, reason: String },
    MatchLeft,
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_answer_wire_format() {
        let json = r#"{"SubmitAnswer":{"question_index":3,"answer_index":null}}"#;
        let message: ClientMessage = serde_json::from_str(json).unwrap();
        match message {
            ClientMessage::SubmitAnswer {
                question_index,
                answer_index,
            } => {
                assert_eq!(question_index, 3);
                assert_eq!(answer_index, None);
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_unit_variants_are_plain_strings() {
        let json = serde_json::to_string(&ClientMessage::Heartbeat).unwrap();
        assert_eq!(json, "\"Heartbeat\"");
        let json = serde_json::to_string(&ServerMessage::SearchCancelled).unwrap();
        assert_eq!(json, "\"SearchCancelled\"");
    }
}

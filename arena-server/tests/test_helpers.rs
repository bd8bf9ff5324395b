#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use arena_core::QuestionBank;
use arena_persistence::{DatabaseManager, connection::connect_to_memory_database};
use arena_server::{
    AppState, auth::AuthService, bible::BibleClient, config::MatchSettings, create_routes,
};
use arena_types::{
    Category, ClientMessage, Difficulty, MatchTicket, QuestionSnapshot, ServerMessage,
};
use migration::{Migrator, MigratorTrait};
use tokio::time::timeout;
use warp::test::WsClient;

const RECV_TIMEOUT: Duration = Duration::from_secs(3);

pub fn test_questions(count: usize) -> Vec<QuestionSnapshot> {
    (0..count)
        .map(|i| QuestionSnapshot {
            id: format!("q{}", i),
            prompt: format!("Question {}?", i),
            options: vec![
                "Moses".to_string(),
                "Aaron".to_string(),
                "Miriam".to_string(),
                "Joshua".to_string(),
            ],
            correct_index: 0,
            category: Category::OldTestament,
            difficulty: Difficulty::Easy,
            reference: format!("Exodus {}:1", i + 1),
        })
        .collect()
}

/// Short timers so whole matches run inside a test
pub fn fast_settings(questions: usize) -> MatchSettings {
    MatchSettings {
        questions_per_match: questions,
        answer_timeout: Duration::from_secs(5),
        advance_delay: Duration::from_millis(20),
        ..MatchSettings::default()
    }
}

/// A full server over an in-memory database, driven through `warp::test`.
pub struct TestServer {
    pub state: AppState,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::with_settings(fast_settings(3)).await
    }

    pub async fn with_settings(settings: MatchSettings) -> Self {
        let db = connect_to_memory_database().await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        let bank = Arc::new(QuestionBank::new(test_questions(10)));
        let state = AppState::new(
            &DatabaseManager::from_connection(db),
            bank,
            AuthService::new_dev_mode(),
            settings,
            BibleClient::new("http://127.0.0.1:9"),
        );
        Self { state }
    }

    pub async fn open_socket(&self) -> WsClient {
        warp::test::ws()
            .path("/ws")
            .handshake(create_routes(self.state.clone()))
            .await
            .expect("WebSocket handshake failed")
    }

    /// Open a socket and sign in with a dev token `uid:email:name`.
    pub async fn connect(&self, uid: &str, name: &str) -> WsClient {
        let mut ws = self.open_socket().await;
        send(
            &mut ws,
            &ClientMessage::Authenticate {
                token: format!("{}:{}@example.com:{}", uid, uid, name),
            },
        )
        .await;

        match recv(&mut ws).await {
            ServerMessage::AuthenticationSuccess { user } => assert_eq!(user.id, uid),
            other => panic!("Expected authentication success, got {:?}", other),
        }
        ws
    }
}

pub async fn send(ws: &mut WsClient, message: &ClientMessage) {
    ws.send_text(serde_json::to_string(message).unwrap()).await;
}

pub async fn recv(ws: &mut WsClient) -> ServerMessage {
    let msg = timeout(RECV_TIMEOUT, ws.recv())
        .await
        .expect("Timeout waiting for server message")
        .expect("WebSocket closed");
    serde_json::from_str(msg.to_str().unwrap()).unwrap()
}

/// Skip messages until one matches.
pub async fn recv_until<F>(ws: &mut WsClient, mut predicate: F) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    loop {
        let message = recv(ws).await;
        if predicate(&message) {
            return message;
        }
    }
}

pub async fn find_match(ws: &mut WsClient, name: &str) -> MatchTicket {
    send(
        ws,
        &ClientMessage::FindMatch {
            display_name: name.to_string(),
            mode: None,
            region: None,
        },
    )
    .await;

    match recv_until(ws, |m| {
        matches!(m, ServerMessage::MatchFound { .. } | ServerMessage::Error { .. })
    })
    .await
    {
        ServerMessage::MatchFound { ticket } => ticket,
        other => panic!("Expected a match, got {:?}", other),
    }
}

/// Poll until the match record is gone.
pub async fn wait_for_removal(state: &AppState, match_id: &str) {
    timeout(RECV_TIMEOUT, async {
        while state.match_manager.view(match_id).await.unwrap().is_some() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Match was never removed");
}

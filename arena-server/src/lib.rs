use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::Filter;
use warp::http::StatusCode;

use crate::auth::AuthService;
use crate::bible::{BOOKS, BibleClient, BookInfo, ContentError, books_in};
use crate::config::MatchSettings;
use crate::match_manager::MatchManager;
use crate::matchmaking::Matchmaker;
use crate::validation::{ValidationRequest, validate_display_name, validate_request};
use crate::websocket::ConnectionManager;
use arena_core::QuestionBank;
use arena_persistence::{DatabaseManager, UserRepository};
use arena_types::{Testament, User, UserProgress, UserStats};

pub mod auth;
pub mod bible;
pub mod config;
pub mod match_manager;
pub mod matchmaking;
pub mod validation;
pub mod websocket;

pub const DEFAULT_ONLINE_WINDOW_MINUTES: i64 = 5;

/// Everything a request or socket handler needs.
#[derive(Clone)]
pub struct AppState {
    pub connections: Arc<ConnectionManager>,
    pub matchmaker: Arc<Matchmaker>,
    pub match_manager: Arc<MatchManager>,
    pub auth: Arc<AuthService>,
    pub users: UserRepository,
    pub bible: BibleClient,
    pub online_window: chrono::Duration,
}

impl AppState {
    pub fn new(
        database: &DatabaseManager,
        bank: Arc<QuestionBank>,
        auth: AuthService,
        settings: MatchSettings,
        bible: BibleClient,
    ) -> Self {
        Self {
            connections: Arc::new(ConnectionManager::new()),
            matchmaker: Arc::new(Matchmaker::new(
                database.matches(),
                bank,
                settings.clone(),
            )),
            match_manager: Arc::new(MatchManager::new(
                database.matches(),
                database.users(),
                settings,
            )),
            auth: Arc::new(auth),
            users: database.users(),
            bible,
            online_window: chrono::Duration::minutes(DEFAULT_ONLINE_WINDOW_MINUTES),
        }
    }

    pub fn with_online_window(mut self, window: chrono::Duration) -> Self {
        self.online_window = window;
        self
    }
}

#[derive(Deserialize)]
struct LeaderboardQuery {
    limit: Option<u64>,
}

#[derive(Deserialize)]
struct BooksQuery {
    testament: Option<Testament>,
}

#[derive(Serialize)]
struct UserStatsResponse {
    user: UserStats,
    rank: Option<u32>,
}

/// Body of `POST /users/{uid}/solo`: progress already merged on the device.
#[derive(Debug, Deserialize)]
pub struct SoloSubmission {
    pub display_name: String,
    pub progress: UserProgress,
}

fn json_error(message: &str, status: StatusCode) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&serde_json::json!({ "error": message })),
        status,
    )
}

pub fn create_routes(
    state: AppState,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let state_filter = warp::any().map({
        let state = state.clone();
        move || state.clone()
    });

    let websocket = warp::path("ws")
        .and(warp::ws())
        .and(state_filter.clone())
        .map(|ws: warp::ws::Ws, state: AppState| {
            ws.on_upgrade(move |socket| websocket::handle_connection(socket, state))
        });

    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", StatusCode::OK));

    let match_view = warp::path!("matches" / String)
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(handle_match_view_request);

    let leaderboard = warp::path("leaderboard")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<LeaderboardQuery>())
        .and(state_filter.clone())
        .and_then(handle_leaderboard_request);

    let user_stats = warp::path!("users" / String / "stats")
        .and(warp::get())
        .and(warp::header::optional::<String>("authorization"))
        .and(state_filter.clone())
        .and_then(handle_user_stats_request);

    let solo_results = warp::path!("users" / String / "solo")
        .and(warp::post())
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::body::content_length_limit(16 * 1024))
        .and(warp::body::json())
        .and(state_filter.clone())
        .and_then(handle_solo_results_request);

    let online = warp::path("online")
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(handle_online_request);

    let bible_books = warp::path!("bible" / "books")
        .and(warp::get())
        .and(warp::query::<BooksQuery>())
        .map(|query: BooksQuery| {
            let books: Vec<BookInfo> = match query.testament {
                Some(testament) => books_in(testament).copied().collect(),
                None => BOOKS.to_vec(),
            };
            warp::reply::json(&books)
        });

    let bible_chapter = warp::path!("bible" / String / u32)
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(handle_bible_chapter_request);

    let validate = warp::path("validate")
        .and(warp::post())
        .and(warp::body::content_length_limit(4 * 1024))
        .and(warp::body::json())
        .map(|request: ValidationRequest| warp::reply::json(&validate_request(&request)));

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(vec!["GET", "POST"]);

    websocket
        .or(health)
        .or(match_view)
        .or(leaderboard)
        .or(user_stats)
        .or(solo_results)
        .or(online)
        .or(bible_books)
        .or(bible_chapter)
        .or(validate)
        .with(cors)
        .with(warp::log("bible_arena"))
}

/// Resolve the bearer token and require it to belong to `uid`.
async fn authorize_self(
    uid: &str,
    auth_header: Option<String>,
    auth: &AuthService,
) -> Result<User, warp::reply::WithStatus<warp::reply::Json>> {
    let Some(auth_header) = auth_header else {
        return Err(json_error("Authentication required", StatusCode::UNAUTHORIZED));
    };
    let token = auth_header.strip_prefix("Bearer ").unwrap_or(&auth_header);

    let user = auth.validate_token(token).await.map_err(|_| {
        json_error("Invalid authentication token", StatusCode::UNAUTHORIZED)
    })?;

    if user.id != uid {
        return Err(json_error(
            "Not authorized to access this user",
            StatusCode::FORBIDDEN,
        ));
    }
    Ok(user)
}

async fn handle_match_view_request(
    match_id: String,
    state: AppState,
) -> Result<impl warp::Reply, warp::Rejection> {
    match state.match_manager.view(&match_id).await {
        Ok(Some(view)) => Ok(warp::reply::with_status(
            warp::reply::json(&view),
            StatusCode::OK,
        )),
        Ok(None) => Ok(json_error("Match not found", StatusCode::NOT_FOUND)),
        Err(err) => {
            tracing::error!("Failed to load match {}: {}", match_id, err);
            Ok(json_error(
                "Failed to load match",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_leaderboard_request(
    query: LeaderboardQuery,
    state: AppState,
) -> Result<impl warp::Reply, warp::Rejection> {
    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    match state.users.get_leaderboard(limit).await {
        Ok(leaderboard) => Ok(warp::reply::with_status(
            warp::reply::json(&leaderboard),
            StatusCode::OK,
        )),
        Err(err) => {
            tracing::error!("Failed to fetch leaderboard: {:#}", err);
            Ok(json_error(
                "Failed to fetch leaderboard",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_user_stats_request(
    user_id: String,
    auth_header: Option<String>,
    state: AppState,
) -> Result<impl warp::Reply, warp::Rejection> {
    if let Err(rejection) = authorize_self(&user_id, auth_header, &state.auth).await {
        return Ok(rejection);
    }

    match state.users.find_by_id(&user_id).await {
        Ok(Some(user)) => {
            let rank = match state.users.get_user_rank(&user_id).await {
                Ok(rank) => rank,
                Err(err) => {
                    tracing::error!("Failed to get user rank: {:#}", err);
                    None
                }
            };

            Ok(warp::reply::with_status(
                warp::reply::json(&UserStatsResponse { user, rank }),
                StatusCode::OK,
            ))
        }
        Ok(None) => Ok(json_error("User not found", StatusCode::NOT_FOUND)),
        Err(err) => {
            tracing::error!("Failed to fetch user stats: {:#}", err);
            Ok(json_error(
                "Failed to fetch user stats",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_solo_results_request(
    user_id: String,
    auth_header: Option<String>,
    submission: SoloSubmission,
    state: AppState,
) -> Result<impl warp::Reply, warp::Rejection> {
    if let Err(rejection) = authorize_self(&user_id, auth_header, &state.auth).await {
        return Ok(rejection);
    }

    let display_name = match validate_display_name(&submission.display_name) {
        Ok(name) => name,
        Err(field) => return Ok(json_error(&field.message, StatusCode::BAD_REQUEST)),
    };

    match state
        .users
        .apply_solo_progress(&user_id, &display_name, &submission.progress)
        .await
    {
        Ok(stats) => Ok(warp::reply::with_status(
            warp::reply::json(&stats),
            StatusCode::OK,
        )),
        Err(err) => {
            tracing::error!("Failed to save solo results for {}: {:#}", user_id, err);
            Ok(json_error(
                "Failed to save results",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_online_request(state: AppState) -> Result<impl warp::Reply, warp::Rejection> {
    let since = chrono::Utc::now() - state.online_window;

    match state.users.count_online_since(since).await {
        Ok(online) => Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({ "online": online })),
            StatusCode::OK,
        )),
        Err(err) => {
            tracing::error!("Failed to count online users: {:#}", err);
            Ok(json_error(
                "Failed to count online users",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_bible_chapter_request(
    book_id: String,
    chapter: u32,
    state: AppState,
) -> Result<impl warp::Reply, warp::Rejection> {
    match state.bible.fetch_chapter(&book_id, chapter).await {
        Ok(content) => Ok(warp::reply::with_status(
            warp::reply::json(&content),
            StatusCode::OK,
        )),
        Err(err @ ContentError::UnknownBook(_)) => {
            Ok(json_error(&err.to_string(), StatusCode::NOT_FOUND))
        }
        Err(err @ ContentError::ChapterOutOfRange { .. }) => {
            Ok(json_error(&err.to_string(), StatusCode::BAD_REQUEST))
        }
        Err(err) => {
            tracing::warn!("Chapter fetch for {} {} failed: {}", book_id, chapter, err);
            Ok(warp::reply::with_status(
                warp::reply::json(&serde_json::json!({
                    "error": "Could not load this chapter",
                    "retryable": err.is_retryable(),
                })),
                StatusCode::BAD_GATEWAY,
            ))
        }
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use arena_persistence::connection::connect_to_memory_database;
    use arena_types::{Category, ClientMessage, Difficulty, QuestionSnapshot, ServerMessage};
    use migration::{Migrator, MigratorTrait};

    fn test_bank() -> Arc<QuestionBank> {
        let questions = (0..5)
            .map(|i| QuestionSnapshot {
                id: format!("q{}", i),
                prompt: format!("Question {}?", i),
                options: vec!["A".into(), "B".into(), "C".into()],
                correct_index: 1,
                category: Category::General,
                difficulty: Difficulty::Easy,
                reference: String::new(),
            })
            .collect();
        Arc::new(QuestionBank::new(questions))
    }

    async fn create_test_app()
    -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let db = connect_to_memory_database().await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        let state = AppState::new(
            &DatabaseManager::from_connection(db),
            test_bank(),
            AuthService::new_dev_mode(),
            MatchSettings::default(),
            // Unroutable; chapter tests only cover local validation
            BibleClient::new("http://127.0.0.1:9"),
        );
        create_routes(state)
    }

    fn progress(score: i32) -> UserProgress {
        UserProgress {
            total_score: score,
            total_questions: 10,
            correct_answers: 8,
            level: 2,
            level_name: "Disciple".to_string(),
            level_progress: 10.0,
            badges: vec!["first-quiz".to_string()],
            highest_streak: 5,
        }
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app().await;

        let response = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&app)
            .await;

        assert_eq!(response.status(), 200);
        assert_eq!(response.body(), "OK");
    }

    #[tokio::test]
    async fn test_leaderboard_empty() {
        let app = create_test_app().await;

        let response = warp::test::request()
            .method("GET")
            .path("/leaderboard?limit=500")
            .reply(&app)
            .await;

        assert_eq!(response.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_user_stats_requires_own_token() {
        let app = create_test_app().await;

        let anonymous = warp::test::request()
            .method("GET")
            .path("/users/u1/stats")
            .reply(&app)
            .await;
        assert_eq!(anonymous.status(), 401);

        let other = warp::test::request()
            .method("GET")
            .path("/users/u1/stats")
            .header("authorization", "Bearer u2:u2@example.com:Other")
            .reply(&app)
            .await;
        assert_eq!(other.status(), 403);

        let missing = warp::test::request()
            .method("GET")
            .path("/users/u1/stats")
            .header("authorization", "Bearer u1:u1@example.com:Ruth")
            .reply(&app)
            .await;
        assert_eq!(missing.status(), 404);
    }

    #[tokio::test]
    async fn test_solo_results_update_profile_and_leaderboard() {
        let app = create_test_app().await;

        let saved = warp::test::request()
            .method("POST")
            .path("/users/u1/solo")
            .header("authorization", "Bearer u1:u1@example.com:Ruth")
            .json(&serde_json::json!({
                "display_name": "Ruth",
                "progress": progress(150),
            }))
            .reply(&app)
            .await;
        assert_eq!(saved.status(), 200);

        let stats = warp::test::request()
            .method("GET")
            .path("/users/u1/stats")
            .header("authorization", "Bearer u1:u1@example.com:Ruth")
            .reply(&app)
            .await;
        assert_eq!(stats.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(stats.body()).unwrap();
        assert_eq!(body["user"]["total_score"], 150);
        assert_eq!(body["user"]["badges"], serde_json::json!(["first-quiz"]));
        assert_eq!(body["rank"], 1);

        let leaderboard = warp::test::request()
            .method("GET")
            .path("/leaderboard")
            .reply(&app)
            .await;
        let body: serde_json::Value = serde_json::from_slice(leaderboard.body()).unwrap();
        assert_eq!(body[0]["user"]["display_name"], "Ruth");
        assert_eq!(body[0]["rank"], 1);
    }

    #[tokio::test]
    async fn test_solo_results_reject_blank_name() {
        let app = create_test_app().await;

        let response = warp::test::request()
            .method("POST")
            .path("/users/u1/solo")
            .header("authorization", "Bearer u1:u1@example.com:Ruth")
            .json(&serde_json::json!({
                "display_name": "  ",
                "progress": progress(10),
            }))
            .reply(&app)
            .await;
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_unknown_match_is_404() {
        let app = create_test_app().await;

        let response = warp::test::request()
            .method("GET")
            .path("/matches/does-not-exist")
            .reply(&app)
            .await;
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_bible_routes() {
        let app = create_test_app().await;

        let books = warp::test::request()
            .method("GET")
            .path("/bible/books")
            .reply(&app)
            .await;
        assert_eq!(books.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(books.body()).unwrap();
        assert_eq!(body.as_array().unwrap().len(), 66);
        assert_eq!(body[0]["id"], "genesis");
        assert_eq!(body[0]["testament"], "old");

        let gospels_first = warp::test::request()
            .method("GET")
            .path("/bible/books?testament=new")
            .reply(&app)
            .await;
        let body: serde_json::Value = serde_json::from_slice(gospels_first.body()).unwrap();
        assert_eq!(body.as_array().unwrap().len(), 27);
        assert_eq!(body[0]["id"], "matthew");

        let unknown = warp::test::request()
            .method("GET")
            .path("/bible/tobit/1")
            .reply(&app)
            .await;
        assert_eq!(unknown.status(), 404);

        let out_of_range = warp::test::request()
            .method("GET")
            .path("/bible/jude/2")
            .reply(&app)
            .await;
        assert_eq!(out_of_range.status(), 400);
    }

    #[tokio::test]
    async fn test_unreachable_bible_service_is_retryable() {
        let app = create_test_app().await;

        let response = warp::test::request()
            .method("GET")
            .path("/bible/ruth/1")
            .reply(&app)
            .await;
        assert_eq!(response.status(), 502);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["retryable"], true);
    }

    #[tokio::test]
    async fn test_validate_endpoint() {
        let app = create_test_app().await;

        let response = warp::test::request()
            .method("POST")
            .path("/validate")
            .json(&serde_json::json!({
                "email": "ruth@moab.org",
                "phone": "+0123",
                "code": "abc123",
            }))
            .reply(&app)
            .await;
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["valid"], false);
        assert_eq!(body["errors"][0]["field"], "phone");
        assert_eq!(body["errors"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_websocket_invalid_message_gets_error() {
        let app = create_test_app().await;

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("WebSocket handshake should succeed");

        ws.send_text("invalid json").await;

        let msg = ws.recv().await.expect("Should receive response");
        let server_msg: ServerMessage = serde_json::from_str(msg.to_str().unwrap()).unwrap();
        match server_msg {
            ServerMessage::Error { message } => assert!(message.contains("Invalid JSON message")),
            other => panic!("Expected error message, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_websocket_find_match_requires_auth() {
        let app = create_test_app().await;

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("WebSocket handshake should succeed");

        let find = ClientMessage::FindMatch {
            display_name: "Ruth".to_string(),
            mode: None,
            region: None,
        };
        ws.send_text(serde_json::to_string(&find).unwrap()).await;

        let msg = ws.recv().await.expect("Should receive response");
        let server_msg: ServerMessage = serde_json::from_str(msg.to_str().unwrap()).unwrap();
        assert!(matches!(server_msg, ServerMessage::Error { .. }));
    }

    #[tokio::test]
    async fn test_authenticated_socket_counts_as_online() {
        let app = create_test_app().await;

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app.clone())
            .await
            .expect("WebSocket handshake should succeed");

        let auth = ClientMessage::Authenticate {
            token: "u1:u1@example.com:Ruth".to_string(),
        };
        ws.send_text(serde_json::to_string(&auth).unwrap()).await;
        let msg = ws.recv().await.expect("Should receive auth response");
        let server_msg: ServerMessage = serde_json::from_str(msg.to_str().unwrap()).unwrap();
        assert!(matches!(server_msg, ServerMessage::AuthenticationSuccess { .. }));

        let response = warp::test::request()
            .method("GET")
            .path("/online")
            .reply(&app)
            .await;
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["online"], 1);
    }
}

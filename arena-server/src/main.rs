use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{debug, error, info, warn};

use arena_core::QuestionBank;
use arena_persistence::DatabaseManager;
use arena_types::MatchStatus;
use arena_server::{AppState, auth::AuthService, bible::BibleClient, config::Config, create_routes};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    info!("Starting Bible Arena server...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Loading questions from {}", config.questions_file);
    let bank = match QuestionBank::load(&config.questions_file) {
        Ok(bank) => Arc::new(bank),
        Err(e) => {
            error!("Failed to load questions from '{}': {:#}", config.questions_file, e);
            error!("Set QUESTIONS_FILE to point to a JSON question bank.");
            std::process::exit(1);
        }
    };

    let database = match DatabaseManager::connect(&config.database_url).await {
        Ok(database) => database,
        Err(e) => {
            error!("Failed to connect to database and run migrations: {}", e);
            std::process::exit(1);
        }
    };

    let auth_service = if config.auth_dev_mode {
        info!("Starting in development authentication mode - token verification disabled");
        AuthService::new_dev_mode()
    } else {
        AuthService::new(config.firebase_project_id.clone())
    };

    let state = AppState::new(
        &database,
        bank,
        auth_service,
        config.match_settings(),
        BibleClient::new(config.bible_api_base.clone()),
    )
    .with_online_window(chrono::Duration::minutes(config.online_window_minutes as i64));

    let routes = create_routes(state.clone());

    let connection_timeout = Duration::from_secs(config.connection_timeout_seconds);
    let reaper = config.reaper();

    // Deadlines and advances from a previous run died with it
    if let Err(e) = state.match_manager.resume_playing(&reaper).await {
        warn!("Could not resume matches in play: {}", e);
    }
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;

            cleanup_state
                .connections
                .cleanup_inactive_connections(connection_timeout)
                .await;
            debug!(
                "{} open sockets, {} signed-in users",
                cleanup_state.connections.connection_count().await,
                cleanup_state.connections.user_connection_count().await
            );
            match (
                cleanup_state.matchmaker.count_by_status(MatchStatus::Waiting).await,
                cleanup_state.matchmaker.count_by_status(MatchStatus::Playing).await,
            ) {
                (Ok(waiting), Ok(playing)) => {
                    debug!("{} matches waiting, {} in play", waiting, playing)
                }
                (Err(e), _) | (_, Err(e)) => warn!("Could not count matches: {:#}", e),
            }
            match cleanup_state.match_manager.reap_stale(&reaper).await {
                Ok(0) => {}
                Ok(removed) => info!("Reaped {} stale matches", removed),
                Err(e) => warn!("Stale match sweep failed: {}", e),
            }
        }
    });

    let ip = match config.host.parse::<std::net::IpAddr>() {
        Ok(ip) => ip,
        Err(e) => {
            error!("Invalid HOST '{}': {}", config.host, e);
            std::process::exit(1);
        }
    };

    info!("Server starting on {}:{}", config.host, config.port);

    let (addr, server) =
        warp::serve(routes).bind_with_graceful_shutdown((ip, config.port), shutdown_signal());

    info!(
        "Server started successfully on {}. Press Ctrl+C to stop.",
        addr
    );
    server.await;
    info!("Server shutdown complete.");
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => {
                        info!("Received SIGINT, shutting down gracefully...");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down gracefully...");
                    }
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("Could not install signal handlers: {}", e);
            }
        }
    }

    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for ctrl+c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down gracefully...");
}

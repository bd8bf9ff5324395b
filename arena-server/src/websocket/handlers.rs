use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::AppState;
use crate::match_manager::MatchManager;
use crate::matchmaking::{Matched, MatchmakingError};
use crate::websocket::connection::ConnectionId;
use arena_core::MatchEvent;
use arena_types::{AnswerChoice, ClientMessage, MatchRole, ServerMessage, User};

#[derive(Clone)]
pub struct MessageHandler {
    connection_id: ConnectionId,
    state: AppState,
}

impl MessageHandler {
    pub fn new(connection_id: ConnectionId, state: AppState) -> Self {
        Self {
            connection_id,
            state,
        }
    }

    pub async fn handle_message(&self, message: ClientMessage) -> Result<(), String> {
        self.state
            .connections
            .update_activity(self.connection_id)
            .await;

        match message {
            ClientMessage::Authenticate { token } => self.handle_authenticate(token).await,
            ClientMessage::FindMatch {
                display_name,
                mode,
                region,
            } => {
                self.handle_find_match(display_name, mode, region)
                    .await
            }
            ClientMessage::CreatePrivateMatch { display_name, mode } => {
                self.handle_create_private_match(display_name, mode).await
            }
            ClientMessage::JoinByCode { code, display_name } => {
                self.handle_join_by_code(code, display_name).await
            }
            ClientMessage::CancelSearch => self.handle_cancel_search().await,
            ClientMessage::WatchMatch { match_id } => self.watch_match(&match_id).await,
            ClientMessage::SubmitAnswer {
                question_index,
                answer_index,
            } => self.handle_submit_answer(question_index, answer_index).await,
            ClientMessage::LeaveMatch => self.handle_leave_match().await,
            ClientMessage::Heartbeat => self.handle_heartbeat().await,
        }
    }

    pub async fn handle_disconnect(&self) {
        info!("Handling disconnect for connection {}", self.connection_id);

        // A host walking away from an unjoined match withdraws it
        if let Err(e) = self.withdraw_waiting_match().await {
            error!(
                "Failed to withdraw match for {}: {}",
                self.connection_id, e
            );
        }
    }

    async fn current_user(&self) -> Option<User> {
        self.state
            .connections
            .get_connection(self.connection_id)
            .await
            .and_then(|connection| connection.user)
    }

    async fn current_match(&self) -> Option<String> {
        self.state
            .connections
            .get_connection(self.connection_id)
            .await
            .and_then(|connection| connection.match_id)
    }

    async fn handle_authenticate(&self, token: String) -> Result<(), String> {
        info!("Authenticating connection {}", self.connection_id);

        match self.state.auth.validate_token(&token).await {
            Ok(user) => {
                let previous = self.state.connections.get_connection_by_user(&user.id).await;
                if let Some(previous) = previous.filter(|p| p.id != self.connection_id) {
                    info!(
                        "User {} already connected on {}, direct messages move to {}",
                        user.id, previous.id, self.connection_id
                    );
                }
                self.state
                    .connections
                    .set_connection_user(self.connection_id, user.clone())
                    .await?;
                self.touch_presence(&user).await;
                self.send_message(ServerMessage::AuthenticationSuccess { user })
                    .await
            }
            Err(e) => {
                warn!(
                    "Authentication failed for connection {}: {}",
                    self.connection_id, e
                );
                self.send_message(ServerMessage::AuthenticationFailed {
                    reason: e.to_string(),
                })
                .await
            }
        }
    }

    async fn touch_presence(&self, user: &User) {
        if let Err(e) = self
            .state
            .users
            .touch_presence(&user.id, &user.display_name)
            .await
        {
            error!("Failed to update presence for {}: {:#}", user.id, e);
        }
    }

    async fn handle_find_match(
        &self,
        display_name: String,
        mode: Option<String>,
        region: Option<String>,
    ) -> Result<(), String> {
        let Some(user) = self.current_user().await else {
            return self.send_error("Authentication required to find a match").await;
        };
        info!("Player {} searching for a match", user.id);

        let result = self
            .state
            .matchmaker
            .find_match(&user.id, &display_name, mode.as_deref(), region.as_deref())
            .await;
        self.enter_match(result).await
    }

    async fn handle_create_private_match(
        &self,
        display_name: String,
        mode: Option<String>,
    ) -> Result<(), String> {
        let Some(user) = self.current_user().await else {
            return self
                .send_error("Authentication required to create a match")
                .await;
        };

        let result = self
            .state
            .matchmaker
            .create_private_match(&user.id, &display_name, mode.as_deref())
            .await;
        self.enter_match(result).await
    }

    async fn handle_join_by_code(&self, code: String, display_name: String) -> Result<(), String> {
        let Some(user) = self.current_user().await else {
            return self.send_error("Authentication required to join a match").await;
        };

        let result = self
            .state
            .matchmaker
            .join_by_code(&user.id, &display_name, &code)
            .await;
        self.enter_match(result).await
    }

    /// Shared tail of every matchmaking request: hand out the ticket, start
    /// watching, and kick off the match when this player filled it.
    async fn enter_match(&self, result: Result<Matched, MatchmakingError>) -> Result<(), String> {
        let matched = match result {
            Ok(matched) => matched,
            Err(MatchmakingError::Backend(e)) => {
                error!("Matchmaking failed for {}: {:#}", self.connection_id, e);
                return self
                    .send_error("Matchmaking is unavailable, please try again")
                    .await;
            }
            Err(e) => return self.send_error(&e.to_string()).await,
        };

        // Leaving a previous waiting match behind would strand it
        if self.current_match().await.as_deref() != Some(matched.ticket.match_id.as_str()) {
            if let Err(e) = self.withdraw_waiting_match().await {
                warn!("Could not withdraw previous match: {}", e);
            }
        }

        self.send_message(ServerMessage::MatchFound {
            ticket: matched.ticket.clone(),
        })
        .await?;
        self.watch_match(&matched.ticket.match_id).await?;

        match matched.ticket.role {
            MatchRole::Joined => self.state.match_manager.match_started(&matched.game),
            MatchRole::Created => self.state.match_manager.match_created(&matched.game),
        }
        Ok(())
    }

    async fn handle_cancel_search(&self) -> Result<(), String> {
        let Some(user) = self.current_user().await else {
            return self.send_error("Authentication required").await;
        };
        let Some(match_id) = self.current_match().await else {
            return self.send_error("Not searching for a match").await;
        };

        match self.state.matchmaker.cancel_search(&user.id, &match_id).await {
            Ok(true) => {
                self.state.connections.clear_watch(self.connection_id).await;
                self.state
                    .match_manager
                    .match_removed(&match_id, "Cancelled by host");
                self.send_message(ServerMessage::SearchCancelled).await
            }
            Ok(false) => self.send_error("Match has already started").await,
            Err(e) => self.send_error(&format!("Failed to cancel: {}", e)).await,
        }
    }

    /// Cancel the match this connection hosts if nobody has joined it yet.
    async fn withdraw_waiting_match(&self) -> Result<(), String> {
        let Some(connection) = self
            .state
            .connections
            .get_connection(self.connection_id)
            .await
        else {
            return Ok(());
        };
        let (Some(user_id), Some(match_id)) = (connection.user_id(), connection.match_id.as_deref())
        else {
            return Ok(());
        };

        match self.state.matchmaker.cancel_search(user_id, match_id).await {
            Ok(true) => {
                self.state
                    .match_manager
                    .match_removed(match_id, "Host left before the match started");
                Ok(())
            }
            // Started, gone, or someone else's match
            Ok(false) | Err(MatchmakingError::Rules(_)) => Ok(()),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn watch_match(&self, match_id: &str) -> Result<(), String> {
        let (view, receiver) = match self.state.match_manager.watch(match_id).await {
            Ok(watched) => watched,
            Err(e) => return self.send_error(&e.to_string()).await,
        };

        let connection = self
            .state
            .connections
            .get_connection(self.connection_id)
            .await
            .ok_or("Connection not found")?;

        connection.send_message(ServerMessage::MatchUpdate { state: view })?;

        let forwarder = tokio::spawn(forward_events(
            receiver,
            connection.sender.clone(),
            connection.user_id().map(str::to_string),
            self.state.match_manager.clone(),
            match_id.to_string(),
        ));
        self.state
            .connections
            .set_watch(
                self.connection_id,
                match_id.to_string(),
                forwarder.abort_handle(),
            )
            .await;

        debug!("Connection {} watching {}", self.connection_id, match_id);
        Ok(())
    }

    async fn handle_submit_answer(
        &self,
        question_index: u32,
        answer_index: Option<u8>,
    ) -> Result<(), String> {
        let Some(user) = self.current_user().await else {
            return self.send_error("Authentication required to answer").await;
        };
        let Some(match_id) = self.current_match().await else {
            return self.send_error("Not in a match").await;
        };

        let answer = answer_index
            .map(AnswerChoice::Picked)
            .unwrap_or(AnswerChoice::NoAnswer);

        match self
            .state
            .match_manager
            .submit_answer(&match_id, &user.id, question_index, answer)
            .await
        {
            Ok(outcome) => {
                self.send_message(ServerMessage::AnswerRecorded {
                    question_index,
                    is_correct: outcome.is_correct,
                    points: outcome.points,
                })
                .await
            }
            Err(e) => {
                warn!("Answer from {} rejected: {}", user.id, e);
                self.send_error(&format!("Answer not recorded: {}", e))
                    .await
            }
        }
    }

    async fn handle_leave_match(&self) -> Result<(), String> {
        if self.current_match().await.is_none() {
            return self.send_error("Not in a match").await;
        }

        if let Err(e) = self.withdraw_waiting_match().await {
            warn!("Could not withdraw match on leave: {}", e);
        }
        self.state.connections.clear_watch(self.connection_id).await;
        self.send_message(ServerMessage::MatchLeft).await
    }

    async fn handle_heartbeat(&self) -> Result<(), String> {
        if let Some(user) = self.current_user().await {
            self.touch_presence(&user).await;
        }
        Ok(())
    }

    pub async fn reply(&self, message: ServerMessage) -> Result<(), String> {
        self.send_message(message).await
    }

    async fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.state
            .connections
            .send_to_connection(self.connection_id, message)
            .await
    }

    async fn send_error(&self, message: &str) -> Result<(), String> {
        self.send_message(ServerMessage::Error {
            message: message.to_string(),
        })
        .await
    }
}

/// Translate a match event into what one watcher should see.
pub fn event_messages(event: &MatchEvent, uid: Option<&str>) -> Vec<ServerMessage> {
    match event {
        MatchEvent::Updated { view } => vec![ServerMessage::MatchUpdate {
            state: view.clone(),
        }],
        MatchEvent::Finished { view, .. } => {
            let mut messages = vec![ServerMessage::MatchUpdate {
                state: view.clone(),
            }];
            if let Some(result) = uid.and_then(|uid| event.result_for(uid)) {
                messages.push(ServerMessage::MatchOver {
                    result: result.clone(),
                });
            }
            messages
        }
        MatchEvent::Removed { match_id, reason } => vec![ServerMessage::MatchClosed {
            match_id: match_id.clone(),
            reason: reason.clone(),
        }],
    }
}

async fn forward_events(
    mut receiver: broadcast::Receiver<MatchEvent>,
    sender: mpsc::UnboundedSender<ServerMessage>,
    uid: Option<String>,
    match_manager: Arc<MatchManager>,
    match_id: String,
) {
    loop {
        match receiver.recv().await {
            Ok(event) => {
                for message in event_messages(&event, uid.as_deref()) {
                    if sender.send(message).is_err() {
                        return;
                    }
                }
                if event.is_terminal() {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Watcher of {} skipped {} events, resyncing", match_id, skipped);
                match match_manager.view(&match_id).await {
                    Ok(Some(view)) => {
                        if sender.send(ServerMessage::MatchUpdate { state: view }).is_err() {
                            return;
                        }
                    }
                    Ok(None) => return,
                    Err(e) => error!("Failed to resync {}: {}", match_id, e),
                }
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

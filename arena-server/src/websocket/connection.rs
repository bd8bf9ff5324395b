use arena_types::{MatchId, ServerMessage, User};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, mpsc};
use tokio::task::AbortHandle;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub user: Option<User>,
    pub connected_at: Instant,
    pub last_activity: Instant,
    /// Match whose events are forwarded to this socket
    pub match_id: Option<MatchId>,
    watcher: Option<AbortHandle>,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    pub fn new(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let now = Instant::now();

        let connection = Self {
            id,
            user: None,
            connected_at: now,
            last_activity: now,
            match_id: None,
            watcher: None,
            sender,
        };

        (connection, receiver)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    pub fn update_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.sender
            .send(message)
            .map_err(|_| "Connection closed".to_string())
    }

    pub fn is_inactive(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }

    fn stop_watching(&mut self) -> Option<MatchId> {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        self.match_id.take()
    }
}

/// Live sockets, indexed by connection and by signed-in user.
pub struct ConnectionManager {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
    user_to_connection: RwLock<HashMap<String, ConnectionId>>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            user_to_connection: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create_connection(
        &self,
        id: ConnectionId,
    ) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (conn, receiver) = Connection::new(id);

        {
            let mut connections = self.connections.write().await;
            connections.insert(id, conn);
        }

        receiver
    }

    pub async fn remove_connection(&self, id: ConnectionId) {
        let removed = {
            let mut connections = self.connections.write().await;
            connections.remove(&id)
        };

        let Some(mut connection) = removed else {
            return;
        };
        connection.stop_watching();

        if let Some(user_id) = connection.user_id() {
            let mut user_to_connection = self.user_to_connection.write().await;
            // A newer socket for the same user keeps its entry
            if user_to_connection.get(user_id) == Some(&id) {
                user_to_connection.remove(user_id);
            }
        }
    }

    pub async fn get_connection(&self, id: ConnectionId) -> Option<Connection> {
        let connections = self.connections.read().await;
        connections.get(&id).cloned()
    }

    pub async fn get_connection_by_user(&self, user_id: &str) -> Option<Connection> {
        let user_to_connection = self.user_to_connection.read().await;
        if let Some(connection_id) = user_to_connection.get(user_id) {
            let connections = self.connections.read().await;
            connections.get(connection_id).cloned()
        } else {
            None
        }
    }

    /// Attach a signed-in user. A user may hold several sockets; the newest wins direct messages.
    pub async fn set_connection_user(&self, id: ConnectionId, user: User) -> Result<(), String> {
        let user_id = user.id.clone();

        {
            let mut connections = self.connections.write().await;
            let connection = connections
                .get_mut(&id)
                .ok_or_else(|| "Connection not found".to_string())?;
            connection.user = Some(user);
        }

        let mut user_to_connection = self.user_to_connection.write().await;
        user_to_connection.insert(user_id, id);
        Ok(())
    }

    pub async fn update_activity(&self, id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.get_mut(&id) {
            connection.update_activity();
        }
    }

    pub async fn send_to_connection(
        &self,
        id: ConnectionId,
        message: ServerMessage,
    ) -> Result<(), String> {
        let connections = self.connections.read().await;
        if let Some(connection) = connections.get(&id) {
            connection.send_message(message)
        } else {
            Err("Connection not found".to_string())
        }
    }

    /// Point the connection at a match, aborting the forwarder of any previous one.
    pub async fn set_watch(&self, id: ConnectionId, match_id: MatchId, watcher: AbortHandle) {
        let mut connections = self.connections.write().await;
        match connections.get_mut(&id) {
            Some(connection) => {
                connection.stop_watching();
                connection.match_id = Some(match_id);
                connection.watcher = Some(watcher);
            }
            None => watcher.abort(),
        }
    }

    /// Returns the match the connection was watching, if any
    pub async fn clear_watch(&self, id: ConnectionId) -> Option<MatchId> {
        let mut connections = self.connections.write().await;
        connections
            .get_mut(&id)
            .and_then(|connection| connection.stop_watching())
    }

    pub async fn cleanup_inactive_connections(&self, timeout: Duration) {
        let inactive_connections: Vec<ConnectionId> = {
            let connections = self.connections.read().await;
            connections
                .values()
                .filter(|conn| conn.is_inactive(timeout))
                .map(|conn| conn.id)
                .collect()
        };

        for connection_id in inactive_connections {
            tracing::info!("Removing inactive connection: {}", connection_id);
            self.remove_connection(connection_id).await;
        }
    }

    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }

    pub async fn user_connection_count(&self) -> usize {
        let user_connections = self.user_to_connection.read().await;
        user_connections.len()
    }
}

pub mod connection;
pub mod entities;
pub mod repositories;

pub use connection::*;
pub use repositories::{MatchRepository, UserRepository};

use sea_orm::{DatabaseConnection, DbErr};

/// Owns the connection and hands out repositories sharing it.
#[derive(Clone)]
pub struct DatabaseManager {
    connection: DatabaseConnection,
}

impl DatabaseManager {
    pub async fn connect(database_url: &str) -> Result<Self, DbErr> {
        let connection = connect_and_migrate(database_url).await?;
        Ok(Self { connection })
    }

    pub fn from_connection(connection: DatabaseConnection) -> Self {
        Self { connection }
    }

    pub fn get_connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    pub fn matches(&self) -> MatchRepository {
        MatchRepository::new(self.connection.clone())
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.connection.clone())
    }
}

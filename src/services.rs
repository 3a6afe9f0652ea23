use chrono::{Duration, Utc};
use rand::Rng;

use crate::config::Config;
use crate::constants::LATEST_SNIPPETS_LIMIT;
use crate::database::Database;
use crate::error::{AppError, Result};
use crate::models::{Snippet, User};

// Valid bcrypt hash verified when the email is unknown, so response timing
// does not reveal whether an account exists.
const DUMMY_HASH: &str = "$2a$12$R9h/cIPz0gi.URNNX3kh2OPST9/PgBkqquzi.Ss7KIUgO2t0jWMUW";

pub struct UserService {
    config: Config,
    db: Database,
}

impl UserService {
    pub fn new(config: Config, db: Database) -> Self {
        Self { config, db }
    }

    /// Registers a new user with a bcrypt-hashed password.
    pub async fn signup(&self, name: &str, email: &str, password: &str) -> Result<i64> {
        let hashed = bcrypt::hash(password, self.config.bcrypt_cost)?;
        let id = self.db.create_user(name, email, &hashed).await?;

        tracing::info!("Created user {}", id);
        Ok(id)
    }

    /// Checks the credentials and returns the user id on success.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<i64> {
        let user = self.db.get_user_by_email(email).await?;

        let (hashed, user_id) = match &user {
            Some(user) => (user.hashed_password.as_str(), Some(user.id)),
            None => (DUMMY_HASH, None),
        };

        let ok = bcrypt::verify(password, hashed).unwrap_or(false);

        // Random delay (0-10ms) to blur residual timing differences
        let delay_ms = rand::thread_rng().gen_range(0..10);
        tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;

        match (ok, user_id) {
            (true, Some(id)) => Ok(id),
            _ => Err(AppError::InvalidCredentials),
        }
    }

    pub async fn get(&self, id: i64) -> Result<Option<User>> {
        self.db.get_user(id).await
    }

    /// Replaces the password after verifying the current one.
    pub async fn change_password(&self, id: i64, current: &str, new: &str) -> Result<()> {
        let user = self
            .db
            .get_user(id)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !bcrypt::verify(current, &user.hashed_password).unwrap_or(false) {
            return Err(AppError::InvalidCredentials);
        }

        let hashed = bcrypt::hash(new, self.config.bcrypt_cost)?;
        self.db.set_user_password(id, &hashed).await?;

        tracing::info!("Updated password for user {}", id);
        Ok(())
    }
}

pub struct SnippetService {
    db: Database,
}

impl SnippetService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts a snippet expiring `expires_days` from now. The day count must
    /// already be validated against the permitted set.
    pub async fn insert(&self, title: &str, content: &str, expires_days: i64) -> Result<i64> {
        let expires = Utc::now() + Duration::days(expires_days);
        let id = self.db.insert_snippet(title, content, expires).await?;

        tracing::info!("Created snippet {} (expires {})", id, expires);
        Ok(id)
    }

    pub async fn get(&self, id: i64) -> Result<Snippet> {
        self.db.get_snippet(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn latest(&self) -> Result<Vec<Snippet>> {
        self.db.latest_snippets(LATEST_SNIPPETS_LIMIT).await
    }
}

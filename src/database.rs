use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::{AppError, Result};
use crate::models::{SessionRecord, Snippet, User};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// In-memory database for tests. A single pooled connection is required
    /// because every SQLite `:memory:` connection is its own database.
    pub async fn open_in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<std::time::Duration>)
            .max_lifetime(None::<std::time::Duration>)
            .connect("sqlite::memory:")
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // Snippets

    pub async fn insert_snippet(
        &self,
        title: &str,
        content: &str,
        expires: DateTime<Utc>,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO snippets (title, content, created, expires) VALUES (?, ?, ?, ?)",
        )
        .bind(title)
        .bind(content)
        .bind(Utc::now())
        .bind(expires)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_snippet(&self, id: i64) -> Result<Option<Snippet>> {
        let snippet = sqlx::query_as::<_, Snippet>(
            "SELECT id, title, content, created, expires
             FROM snippets
             WHERE id = ? AND expires > ?",
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(snippet)
    }

    pub async fn latest_snippets(&self, limit: i64) -> Result<Vec<Snippet>> {
        let snippets = sqlx::query_as::<_, Snippet>(
            "SELECT id, title, content, created, expires
             FROM snippets
             WHERE expires > ?
             ORDER BY id DESC
             LIMIT ?",
        )
        .bind(Utc::now())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(snippets)
    }

    pub async fn delete_expired_snippets(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM snippets WHERE expires <= ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // Users

    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        hashed_password: &str,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO users (name, email, hashed_password, created) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(email)
        .bind(hashed_password)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint failed: users.email") {
                AppError::DuplicateEmail
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, hashed_password, created FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, hashed_password, created FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn set_user_password(&self, id: i64, hashed_password: &str) -> Result<()> {
        sqlx::query("UPDATE users SET hashed_password = ? WHERE id = ?")
            .bind(hashed_password)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // Sessions

    pub async fn get_session(&self, token: &str) -> Result<Option<SessionRecord>> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT token, data, expires_at FROM sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    pub async fn upsert_session(
        &self,
        token: &str,
        data: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions (token, data, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(token) DO UPDATE SET data = excluded.data, expires_at = excluded.expires_at",
        )
        .bind(token)
        .bind(data)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete_session(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn delete_expired_sessions(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

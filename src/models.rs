use chrono::{DateTime, Utc};

/// A stored piece of text content with an expiry.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Snippet {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub hashed_password: String,
    pub created: DateTime<Utc>,
}

/// Raw session row; the `data` column holds JSON-encoded session state.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRecord {
    pub token: String,
    pub data: String,
    pub expires_at: DateTime<Utc>,
}

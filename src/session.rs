//! Database-backed sessions.
//!
//! A session is a random token stored in a cookie, pointing at a row in the
//! `sessions` table whose `data` column holds [`SessionData`] as JSON. The
//! load-and-save middleware in [`crate::middleware`] attaches a [`Session`]
//! handle to every request and persists it after the handler runs. Handlers
//! mutate the session through the shared handle; calling [`Session::renew`]
//! rotates the token on the way out (login and logout do this to prevent
//! session fixation).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash: Option<String>,
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_after_login: Option<String>,
}

fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

#[derive(Debug)]
struct SessionInner {
    token: String,
    rotated: bool,
    data: SessionData,
}

/// State written back to the store after the handler has run.
#[derive(Debug)]
pub struct Committed {
    pub token: String,
    /// Previous token to delete when the session was renewed.
    pub stale_token: Option<String>,
    pub data: String,
}

#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    /// Fresh session with a new token and CSRF token.
    pub fn start() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                token: new_token(),
                rotated: false,
                data: SessionData {
                    csrf_token: new_token(),
                    ..SessionData::default()
                },
            })),
        }
    }

    /// Session resumed from a stored record.
    pub fn resume(token: String, mut data: SessionData) -> Self {
        if data.csrf_token.is_empty() {
            data.csrf_token = new_token();
        }
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                token,
                rotated: false,
                data,
            })),
        }
    }

    pub async fn user_id(&self) -> Option<i64> {
        self.inner.lock().await.data.user_id
    }

    pub async fn put_user_id(&self, user_id: i64) {
        self.inner.lock().await.data.user_id = Some(user_id);
    }

    pub async fn remove_user_id(&self) {
        self.inner.lock().await.data.user_id = None;
    }

    /// Schedules a token rotation; the new token is minted at commit time.
    pub async fn renew(&self) {
        self.inner.lock().await.rotated = true;
    }

    pub async fn flash(&self, message: &str) {
        self.inner.lock().await.data.flash = Some(message.to_string());
    }

    /// One-time read: the flash is cleared as it is taken.
    pub async fn take_flash(&self) -> Option<String> {
        self.inner.lock().await.data.flash.take()
    }

    pub async fn remember_path(&self, path: &str) {
        self.inner.lock().await.data.redirect_after_login = Some(path.to_string());
    }

    pub async fn take_login_redirect(&self) -> Option<String> {
        self.inner.lock().await.data.redirect_after_login.take()
    }

    pub async fn csrf_token(&self) -> String {
        self.inner.lock().await.data.csrf_token.clone()
    }

    pub async fn verify_csrf(&self, submitted: &str) -> bool {
        let inner = self.inner.lock().await;
        submitted
            .as_bytes()
            .ct_eq(inner.data.csrf_token.as_bytes())
            .into()
    }

    /// Finalizes the session for persistence, performing any pending token
    /// rotation and serializing the data payload.
    pub async fn commit(&self) -> Result<Committed, serde_json::Error> {
        let mut inner = self.inner.lock().await;

        let stale_token = if inner.rotated {
            let old = std::mem::replace(&mut inner.token, new_token());
            inner.rotated = false;
            Some(old)
        } else {
            None
        };

        Ok(Committed {
            token: inner.token.clone(),
            stale_token,
            data: serde_json::to_string(&inner.data)?,
        })
    }
}

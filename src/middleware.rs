use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};

use crate::constants::SESSION_COOKIE;
use crate::error::{AppError, Result};
use crate::session::{Session, SessionData};
use crate::AppState;

/// Session load-and-save middleware.
///
/// Loads the session named by the request cookie (starting a fresh one when
/// the cookie is missing, unknown or expired), attaches it to the request
/// extensions, and persists it after the handler has run. The cookie is
/// reissued on every response so the lifetime slides.
pub async fn load_and_save(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let session = match jar.get(SESSION_COOKIE) {
        Some(cookie) => match state.db.get_session(cookie.value()).await? {
            Some(record) if record.expires_at > Utc::now() => {
                let data: SessionData = serde_json::from_str(&record.data).unwrap_or_default();
                Session::resume(cookie.value().to_string(), data)
            }
            _ => Session::start(),
        },
        None => Session::start(),
    };

    request.extensions_mut().insert(session.clone());
    let response = next.run(request).await;

    let committed = session.commit().await?;
    if let Some(stale) = &committed.stale_token {
        state.db.delete_session(stale).await?;
    }
    let expires_at = Utc::now() + Duration::hours(state.config.session_lifetime_hours);
    state
        .db
        .upsert_session(&committed.token, &committed.data, expires_at)
        .await?;

    let mut cookie = Cookie::new(SESSION_COOKIE, committed.token);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(state.config.secure_cookies);

    Ok((CookieJar::new().add(cookie), response).into_response())
}

/// Authentication gate for protected routes.
///
/// Unauthenticated requests are remembered in the session and redirected to
/// the login page; a stale user id (account deleted since login) is dropped.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let session = request
        .extensions()
        .get::<Session>()
        .cloned()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("session middleware not installed")))?;

    let Some(user_id) = session.user_id().await else {
        session.remember_path(request.uri().path()).await;
        return Ok(Redirect::to("/user/login").into_response());
    };

    if state.db.get_user(user_id).await?.is_none() {
        session.remove_user_id().await;
        return Ok(Redirect::to("/user/login").into_response());
    }

    let mut response = next.run(request).await;
    // Authenticated pages must not come from shared caches
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );

    Ok(response)
}

/// Security headers middleware
/// Adds essential security headers to all responses
pub async fn security_headers(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();

    // Prevent clickjacking
    headers.insert(
        header::HeaderName::from_static("x-frame-options"),
        header::HeaderValue::from_static("DENY"),
    );

    // Prevent MIME sniffing
    headers.insert(
        header::HeaderName::from_static("x-content-type-options"),
        header::HeaderValue::from_static("nosniff"),
    );

    // Content Security Policy
    headers.insert(
        header::HeaderName::from_static("content-security-policy"),
        header::HeaderValue::from_static(
            "default-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; \
             frame-ancestors 'none';",
        ),
    );

    // Referrer policy
    headers.insert(
        header::HeaderName::from_static("referrer-policy"),
        header::HeaderValue::from_static("origin-when-cross-origin"),
    );

    // Permissions policy
    headers.insert(
        header::HeaderName::from_static("permissions-policy"),
        header::HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );

    response
}

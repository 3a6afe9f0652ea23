use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::{handlers, middleware, AppState};

/// Builds the application router.
///
/// Session-aware routes sit under the load-and-save middleware; the protected
/// subset additionally passes the authentication gate. `/ping` and `/static`
/// bypass sessions entirely.
pub fn router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();

    let protected = Router::new()
        .route(
            "/snippet/create",
            get(handlers::snippet_create).post(handlers::snippet_create_post),
        )
        .route("/user/logout", post(handlers::user_logout))
        .route("/account/view", get(handlers::account_view))
        .route(
            "/account/password/update",
            get(handlers::password_update).post(handlers::password_update_post),
        )
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .route("/", get(handlers::home))
        .route("/about", get(handlers::about))
        .route("/snippet/view/:id", get(handlers::snippet_view))
        .route(
            "/user/signup",
            get(handlers::user_signup).post(handlers::user_signup_post),
        )
        .route(
            "/user/login",
            get(handlers::user_login).post(handlers::user_login_post),
        )
        .merge(protected)
        .fallback(handlers::not_found)
        .layer(from_fn_with_state(state.clone(), middleware::load_and_save))
        .route("/ping", get(handlers::ping))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(from_fn(middleware::security_headers))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

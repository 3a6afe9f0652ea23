use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};
use serde::Deserialize;

use crate::constants::{DEFAULT_EXPIRY_DAYS, MAX_TITLE_CHARS, MIN_PASSWORD_CHARS, PERMITTED_EXPIRY_DAYS};
use crate::error::{AppError, Result};
use crate::forms::{self, Validator};
use crate::pages::{self, PageContext};
use crate::services::{SnippetService, UserService};
use crate::session::Session;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SnippetCreateForm {
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub expires: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserSignupForm {
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserLoginForm {
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PasswordUpdateForm {
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutForm {
    #[serde(default)]
    pub csrf_token: String,
}

async fn page_context(session: &Session) -> PageContext {
    PageContext {
        authenticated: session.user_id().await.is_some(),
        flash: session.take_flash().await,
        csrf_token: session.csrf_token().await,
    }
}

async fn require_csrf(session: &Session, submitted: &str) -> Result<()> {
    if session.verify_csrf(submitted).await {
        Ok(())
    } else {
        Err(AppError::CsrfMismatch)
    }
}

pub async fn ping() -> &'static str {
    "OK"
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Html(pages::client_error(StatusCode::NOT_FOUND)),
    )
}

pub async fn home(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Html<String>> {
    let snippets = SnippetService::new(state.db.clone()).latest().await?;
    let ctx = page_context(&session).await;

    Ok(Html(pages::home(&ctx, &snippets)))
}

pub async fn about(Extension(session): Extension<Session>) -> Html<String> {
    let ctx = page_context(&session).await;
    Html(pages::about(&ctx))
}

pub async fn snippet_view(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Html<String>> {
    // Non-numeric and non-positive ids render as 404, not 400
    let id: i64 = id.parse().map_err(|_| AppError::NotFound)?;
    if id < 1 {
        return Err(AppError::NotFound);
    }

    let snippet = SnippetService::new(state.db.clone()).get(id).await?;
    let ctx = page_context(&session).await;

    Ok(Html(pages::snippet_view(&ctx, &snippet)))
}

pub async fn snippet_create(Extension(session): Extension<Session>) -> Html<String> {
    let form = SnippetCreateForm {
        expires: DEFAULT_EXPIRY_DAYS,
        ..SnippetCreateForm::default()
    };
    let ctx = page_context(&session).await;

    Html(pages::snippet_create(&ctx, &form, &Validator::default()))
}

pub async fn snippet_create_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Form(form): Form<SnippetCreateForm>,
) -> Result<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    let mut v = Validator::default();
    v.check_field(forms::not_blank(&form.title), "title", "This field cannot be blank");
    v.check_field(
        forms::max_chars(&form.title, MAX_TITLE_CHARS),
        "title",
        "This field cannot be more than 100 characters long",
    );
    v.check_field(forms::not_blank(&form.content), "content", "This field cannot be blank");
    v.check_field(
        forms::permitted(form.expires, &PERMITTED_EXPIRY_DAYS),
        "expires",
        "This field must equal 1, 7 or 365",
    );

    if !v.valid() {
        let ctx = page_context(&session).await;
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Html(pages::snippet_create(&ctx, &form, &v)),
        )
            .into_response());
    }

    let id = SnippetService::new(state.db.clone())
        .insert(&form.title, &form.content, form.expires)
        .await?;

    session.flash("Snippet created successfully!").await;
    Ok(Redirect::to(&format!("/snippet/view/{}", id)).into_response())
}

pub async fn user_signup(Extension(session): Extension<Session>) -> Html<String> {
    let ctx = page_context(&session).await;
    Html(pages::user_signup(&ctx, &UserSignupForm::default(), &Validator::default()))
}

pub async fn user_signup_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Form(form): Form<UserSignupForm>,
) -> Result<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    let mut v = Validator::default();
    v.check_field(forms::not_blank(&form.name), "name", "This field cannot be blank");
    v.check_field(forms::not_blank(&form.email), "email", "This field cannot be blank");
    v.check_field(
        forms::is_email(&form.email),
        "email",
        "This field must be a valid email address",
    );
    v.check_field(
        forms::not_blank(&form.password),
        "password",
        "This field cannot be blank",
    );
    v.check_field(
        forms::min_chars(&form.password, MIN_PASSWORD_CHARS),
        "password",
        "This field must be at least 8 characters long",
    );

    if !v.valid() {
        let ctx = page_context(&session).await;
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Html(pages::user_signup(&ctx, &form, &v)),
        )
            .into_response());
    }

    let users = UserService::new((*state.config).clone(), state.db.clone());
    match users.signup(&form.name, &form.email, &form.password).await {
        Ok(_) => {
            session
                .flash("Your signup was successful. Please log in.")
                .await;
            Ok(Redirect::to("/user/login").into_response())
        }
        Err(AppError::DuplicateEmail) => {
            v.add_field_error("email", "Email address is already in use");
            let ctx = page_context(&session).await;
            Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                Html(pages::user_signup(&ctx, &form, &v)),
            )
                .into_response())
        }
        Err(e) => Err(e),
    }
}

pub async fn user_login(Extension(session): Extension<Session>) -> Html<String> {
    let ctx = page_context(&session).await;
    Html(pages::user_login(&ctx, &UserLoginForm::default(), &Validator::default()))
}

pub async fn user_login_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Form(form): Form<UserLoginForm>,
) -> Result<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    let mut v = Validator::default();
    v.check_field(forms::not_blank(&form.email), "email", "This field cannot be blank");
    v.check_field(
        forms::is_email(&form.email),
        "email",
        "This field must be a valid email address",
    );
    v.check_field(
        forms::not_blank(&form.password),
        "password",
        "This field cannot be blank",
    );

    if !v.valid() {
        let ctx = page_context(&session).await;
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Html(pages::user_login(&ctx, &form, &v)),
        )
            .into_response());
    }

    let users = UserService::new((*state.config).clone(), state.db.clone());
    let user_id = match users.authenticate(&form.email, &form.password).await {
        Ok(id) => id,
        Err(AppError::InvalidCredentials) => {
            v.add_non_field_error("Email or password is incorrect");
            let ctx = page_context(&session).await;
            return Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                Html(pages::user_login(&ctx, &form, &v)),
            )
                .into_response());
        }
        Err(e) => return Err(e),
    };

    // Rotate the token on privilege change to prevent session fixation
    session.renew().await;
    session.put_user_id(user_id).await;

    let target = session
        .take_login_redirect()
        .await
        .unwrap_or_else(|| "/snippet/create".to_string());
    Ok(Redirect::to(&target).into_response())
}

pub async fn user_logout(
    Extension(session): Extension<Session>,
    Form(form): Form<LogoutForm>,
) -> Result<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    session.renew().await;
    session.remove_user_id().await;
    session.flash("You've been logged out successfully!").await;

    Ok(Redirect::to("/").into_response())
}

pub async fn account_view(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Response> {
    let Some(user_id) = session.user_id().await else {
        return Ok(Redirect::to("/user/login").into_response());
    };

    let users = UserService::new((*state.config).clone(), state.db.clone());
    let Some(user) = users.get(user_id).await? else {
        return Ok(Redirect::to("/user/login").into_response());
    };

    let ctx = page_context(&session).await;
    Ok(Html(pages::account(&ctx, &user)).into_response())
}

pub async fn password_update(Extension(session): Extension<Session>) -> Html<String> {
    let ctx = page_context(&session).await;
    Html(pages::password_update(&ctx, &Validator::default()))
}

pub async fn password_update_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Form(form): Form<PasswordUpdateForm>,
) -> Result<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    let mut v = Validator::default();
    v.check_field(
        forms::not_blank(&form.current_password),
        "currentPassword",
        "This field cannot be blank",
    );
    v.check_field(
        forms::not_blank(&form.new_password),
        "newPassword",
        "This field cannot be blank",
    );
    v.check_field(
        forms::min_chars(&form.new_password, MIN_PASSWORD_CHARS),
        "newPassword",
        "This field must be at least 8 characters long",
    );
    v.check_field(
        forms::not_blank(&form.confirm_password),
        "confirmPassword",
        "This field cannot be blank",
    );
    v.check_field(
        form.new_password == form.confirm_password,
        "confirmPassword",
        "New password does not match the confirmation",
    );

    if !v.valid() {
        let ctx = page_context(&session).await;
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Html(pages::password_update(&ctx, &v)),
        )
            .into_response());
    }

    let Some(user_id) = session.user_id().await else {
        return Ok(Redirect::to("/user/login").into_response());
    };

    let users = UserService::new((*state.config).clone(), state.db.clone());
    match users
        .change_password(user_id, &form.current_password, &form.new_password)
        .await
    {
        Ok(()) => {
            session.flash("Your password has been updated!").await;
            Ok(Redirect::to("/account/view").into_response())
        }
        Err(AppError::InvalidCredentials) => {
            v.add_field_error("currentPassword", "Current password is incorrect");
            let ctx = page_context(&session).await;
            Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                Html(pages::password_update(&ctx, &v)),
            )
                .into_response())
        }
        Err(e) => Err(e),
    }
}

//! End-to-end tests driving the router over an in-memory database: signup,
//! login, route protection, CSRF rejection and snippet lifecycle.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;

use snipbox::{routes, AppState, Config, Database};

struct TestApp {
    app: Router,
    db: Database,
    cookie: Option<String>,
}

struct TestResponse {
    status: StatusCode,
    location: Option<String>,
    body: String,
}

impl TestApp {
    async fn spawn() -> Self {
        let db = Database::open_in_memory().await.unwrap();
        db.migrate().await.unwrap();

        let config = Config {
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            static_dir: "./static".to_string(),
            session_lifetime_hours: 12,
            secure_cookies: false,
            // Minimum cost keeps bcrypt fast in tests
            bcrypt_cost: 4,
        };

        let state = AppState {
            config: Arc::new(config),
            db: db.clone(),
        };

        Self {
            app: routes::router(state),
            db,
            cookie: None,
        }
    }

    async fn request(&mut self, method: &str, path: &str, form: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(cookie) = self.cookie.as_deref() {
            builder = builder.header(header::COOKIE, cookie);
        }

        let request = match form {
            Some(form) => builder
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let raw = set_cookie.to_str().unwrap();
            self.cookie = Some(raw.split(';').next().unwrap().to_string());
        }

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();

        TestResponse {
            status,
            location,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    async fn get(&mut self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    async fn post(&mut self, path: &str, form: &str) -> TestResponse {
        self.request("POST", path, Some(form)).await
    }

    /// Fetches `path` and returns the CSRF token embedded in its form.
    async fn csrf_from(&mut self, path: &str) -> String {
        let response = self.get(path).await;
        assert_eq!(response.status, StatusCode::OK, "GET {} failed", path);
        extract_csrf(&response.body)
    }

    /// Registers and logs in a user, leaving the client authenticated.
    async fn log_in_as(&mut self, name: &str, email: &str, password: &str) {
        let csrf = self.csrf_from("/user/signup").await;
        let response = self
            .post(
                "/user/signup",
                &format!(
                    "csrf_token={}&name={}&email={}&password={}",
                    csrf, name, email, password
                ),
            )
            .await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);

        let csrf = self.csrf_from("/user/login").await;
        let response = self
            .post(
                "/user/login",
                &format!("csrf_token={}&email={}&password={}", csrf, email, password),
            )
            .await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);
    }
}

fn extract_csrf(body: &str) -> String {
    let marker = "name=\"csrf_token\" value=\"";
    let start = body.find(marker).expect("page contains a CSRF token") + marker.len();
    let end = body[start..].find('"').unwrap() + start;
    body[start..end].to_string()
}

#[tokio::test]
async fn ping_returns_ok() {
    let mut client = TestApp::spawn().await;

    let response = client.get("/ping").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "OK");
}

#[tokio::test]
async fn home_lists_only_unexpired_snippets() {
    let mut client = TestApp::spawn().await;

    client
        .db
        .insert_snippet("Visible snippet", "...", Utc::now() + Duration::days(1))
        .await
        .unwrap();
    client
        .db
        .insert_snippet("Expired snippet", "...", Utc::now() - Duration::days(1))
        .await
        .unwrap();

    let response = client.get("/").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Visible snippet"));
    assert!(!response.body.contains("Expired snippet"));
}

#[tokio::test]
async fn expired_and_unknown_snippets_are_not_served() {
    let mut client = TestApp::spawn().await;

    let id = client
        .db
        .insert_snippet("Expired", "...", Utc::now() - Duration::days(1))
        .await
        .unwrap();

    let response = client.get(&format!("/snippet/view/{}", id)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = client.get("/snippet/view/9999").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = client.get("/snippet/view/not-a-number").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn protected_routes_redirect_to_login() {
    let mut client = TestApp::spawn().await;

    for path in ["/snippet/create", "/account/view", "/account/password/update"] {
        let response = client.get(path).await;
        assert_eq!(response.status, StatusCode::SEE_OTHER, "GET {}", path);
        assert_eq!(response.location.as_deref(), Some("/user/login"));
    }
}

#[tokio::test]
async fn signup_creates_user_and_redirects_to_login() {
    let mut client = TestApp::spawn().await;

    let csrf = client.csrf_from("/user/signup").await;
    let response = client
        .post(
            "/user/signup",
            &format!(
                "csrf_token={}&name=Alice&email=alice@example.com&password=pa55word!",
                csrf
            ),
        )
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/user/login"));

    // The flash shows once on the next page load, then disappears
    let response = client.get("/user/login").await;
    assert!(response.body.contains("Your signup was successful"));
    let response = client.get("/user/login").await;
    assert!(!response.body.contains("Your signup was successful"));

    let user = client
        .db
        .get_user_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.name, "Alice");
    // Stored hashed, never in the clear
    assert_ne!(user.hashed_password, "pa55word!");
}

#[tokio::test]
async fn duplicate_email_is_a_field_error() {
    let mut client = TestApp::spawn().await;
    client
        .log_in_as("Alice", "alice@example.com", "pa55word!")
        .await;

    let mut other = TestApp { app: client.app.clone(), db: client.db.clone(), cookie: None };
    let csrf = other.csrf_from("/user/signup").await;
    let response = other
        .post(
            "/user/signup",
            &format!(
                "csrf_token={}&name=Alice2&email=alice@example.com&password=pa55word!",
                csrf
            ),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body.contains("Email address is already in use"));
}

#[tokio::test]
async fn signup_validates_fields() {
    let mut client = TestApp::spawn().await;

    let csrf = client.csrf_from("/user/signup").await;
    let response = client
        .post(
            "/user/signup",
            &format!("csrf_token={}&name=&email=not-an-email&password=short", csrf),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body.contains("This field cannot be blank"));
    assert!(response.body.contains("This field must be a valid email address"));
    assert!(response
        .body
        .contains("This field must be at least 8 characters long"));
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let mut client = TestApp::spawn().await;
    client
        .log_in_as("Alice", "alice@example.com", "pa55word!")
        .await;

    let mut other = TestApp { app: client.app.clone(), db: client.db.clone(), cookie: None };
    let csrf = other.csrf_from("/user/login").await;
    let response = other
        .post(
            "/user/login",
            &format!("csrf_token={}&email=alice@example.com&password=wrongwrong", csrf),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body.contains("Email or password is incorrect"));
}

#[tokio::test]
async fn login_returns_to_the_originally_requested_page() {
    let mut client = TestApp::spawn().await;
    client
        .log_in_as("Alice", "alice@example.com", "pa55word!")
        .await;

    // Log out, then try a protected page
    let csrf = client.csrf_from("/account/view").await;
    client
        .post("/user/logout", &format!("csrf_token={}", csrf))
        .await;

    let response = client.get("/account/view").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/user/login"));

    let csrf = client.csrf_from("/user/login").await;
    let response = client
        .post(
            "/user/login",
            &format!(
                "csrf_token={}&email=alice@example.com&password=pa55word!",
                csrf
            ),
        )
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/account/view"));
}

#[tokio::test]
async fn snippet_creation_flow() {
    let mut client = TestApp::spawn().await;
    client
        .log_in_as("Alice", "alice@example.com", "pa55word!")
        .await;

    // Invalid expiry is rejected with a field-level error
    let csrf = client.csrf_from("/snippet/create").await;
    let response = client
        .post(
            "/snippet/create",
            &format!("csrf_token={}&title=Haiku&content=A+frog+jumps+in&expires=3", csrf),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body.contains("This field must equal 1, 7 or 365"));
    // Submitted values are preserved in the re-rendered form
    assert!(response.body.contains("Haiku"));

    // Valid creation redirects to the new snippet with a flash
    let csrf = client.csrf_from("/snippet/create").await;
    let response = client
        .post(
            "/snippet/create",
            &format!("csrf_token={}&title=Haiku&content=A+frog+jumps+in&expires=7", csrf),
        )
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    let location = response.location.expect("redirect to the new snippet");
    assert!(location.starts_with("/snippet/view/"));

    let response = client.get(&location).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Haiku"));
    assert!(response.body.contains("A frog jumps in"));
    assert!(response.body.contains("Snippet created successfully!"));
}

#[tokio::test]
async fn post_without_valid_csrf_token_is_forbidden() {
    let mut client = TestApp::spawn().await;

    // Establish a session first, then submit a stale token
    client.csrf_from("/user/signup").await;
    let response = client
        .post(
            "/user/signup",
            "csrf_token=bogus&name=Eve&email=eve@example.com&password=pa55word!",
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    assert!(client
        .db
        .get_user_by_email("eve@example.com")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn logout_clears_authentication() {
    let mut client = TestApp::spawn().await;
    client
        .log_in_as("Alice", "alice@example.com", "pa55word!")
        .await;

    let response = client.get("/snippet/create").await;
    assert_eq!(response.status, StatusCode::OK);

    let csrf = client.csrf_from("/snippet/create").await;
    let response = client
        .post("/user/logout", &format!("csrf_token={}", csrf))
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/"));

    let response = client.get("/").await;
    assert!(response.body.contains("logged out successfully"));

    let response = client.get("/snippet/create").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/user/login"));
}

#[tokio::test]
async fn login_rotates_the_session_token() {
    let mut client = TestApp::spawn().await;

    let csrf = client.csrf_from("/user/signup").await;
    client
        .post(
            "/user/signup",
            &format!(
                "csrf_token={}&name=Alice&email=alice@example.com&password=pa55word!",
                csrf
            ),
        )
        .await;

    let before = client.cookie.clone().unwrap();
    let csrf = client.csrf_from("/user/login").await;
    client
        .post(
            "/user/login",
            &format!("csrf_token={}&email=alice@example.com&password=pa55word!", csrf),
        )
        .await;
    let after = client.cookie.clone().unwrap();

    assert_ne!(before, after);
}

#[tokio::test]
async fn account_page_shows_user_details() {
    let mut client = TestApp::spawn().await;
    client
        .log_in_as("Alice", "alice@example.com", "pa55word!")
        .await;

    let response = client.get("/account/view").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Alice"));
    assert!(response.body.contains("alice@example.com"));
    // Hashed password never leaks into the page
    assert!(!response.body.contains("$2"));
}

#[tokio::test]
async fn password_update_flow() {
    let mut client = TestApp::spawn().await;
    client
        .log_in_as("Alice", "alice@example.com", "pa55word!")
        .await;

    // Confirmation mismatch
    let csrf = client.csrf_from("/account/password/update").await;
    let response = client
        .post(
            "/account/password/update",
            &format!(
                "csrf_token={}&current_password=pa55word!&new_password=newpassword&confirm_password=different1",
                csrf
            ),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response
        .body
        .contains("New password does not match the confirmation"));

    // Wrong current password
    let csrf = client.csrf_from("/account/password/update").await;
    let response = client
        .post(
            "/account/password/update",
            &format!(
                "csrf_token={}&current_password=wrongwrong&new_password=newpassword&confirm_password=newpassword",
                csrf
            ),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body.contains("Current password is incorrect"));

    // Valid change, then the new password logs in
    let csrf = client.csrf_from("/account/password/update").await;
    let response = client
        .post(
            "/account/password/update",
            &format!(
                "csrf_token={}&current_password=pa55word!&new_password=newpassword&confirm_password=newpassword",
                csrf
            ),
        )
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/account/view"));

    let response = client.get("/account/view").await;
    assert!(response.body.contains("Your password has been updated!"));

    let csrf = client.csrf_from("/account/view").await;
    client
        .post("/user/logout", &format!("csrf_token={}", csrf))
        .await;

    let csrf = client.csrf_from("/user/login").await;
    let response = client
        .post(
            "/user/login",
            &format!("csrf_token={}&email=alice@example.com&password=newpassword", csrf),
        )
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn unknown_routes_render_404() {
    let mut client = TestApp::spawn().await;

    let response = client.get("/does/not/exist").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body.contains("Not Found"));
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let client = TestApp::spawn().await;

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = client.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(response.headers().contains_key("content-security-policy"));
}

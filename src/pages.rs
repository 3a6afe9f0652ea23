//! Server-rendered HTML pages. Plain string rendering with a shared layout;
//! every piece of user-supplied text goes through [`escape`].

use axum::http::StatusCode;

use crate::constants::PERMITTED_EXPIRY_DAYS;
use crate::forms::Validator;
use crate::handlers::{SnippetCreateForm, UserLoginForm, UserSignupForm};
use crate::models::{Snippet, User};

/// Per-request data the layout needs: nav state, the one-time flash message
/// and the session CSRF token for embedded forms.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub authenticated: bool,
    pub flash: Option<String>,
    pub csrf_token: String,
}

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn csrf_field(ctx: &PageContext) -> String {
    format!(
        r#"<input type="hidden" name="csrf_token" value="{}">"#,
        escape(&ctx.csrf_token)
    )
}

fn field_error(v: &Validator, field: &str) -> String {
    match v.field_error(field) {
        Some(message) => format!(r#"<label class="error">{}</label>"#, escape(message)),
        None => String::new(),
    }
}

fn non_field_errors(v: &Validator) -> String {
    v.non_field_errors()
        .iter()
        .map(|message| format!(r#"<div class="error">{}</div>"#, escape(message)))
        .collect()
}

fn layout(ctx: &PageContext, title: &str, main: &str) -> String {
    let flash = match &ctx.flash {
        Some(message) => format!(r#"<div class="flash">{}</div>"#, escape(message)),
        None => String::new(),
    };

    let account_nav = if ctx.authenticated {
        format!(
            r#"<a href="/snippet/create">Create snippet</a>
<a href="/account/view">Account</a>
<form action="/user/logout" method="POST">{}<button>Logout</button></form>"#,
            csrf_field(ctx)
        )
    } else {
        r#"<a href="/user/signup">Signup</a>
<a href="/user/login">Login</a>"#
            .to_string()
    };

    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} - Snipbox</title>
<link rel="stylesheet" href="/static/main.css">
</head>
<body>
<header><h1><a href="/">Snipbox</a></h1></header>
<nav>
<div><a href="/">Home</a> <a href="/about">About</a></div>
<div>{account_nav}</div>
</nav>
{flash}
<main>
{main}
</main>
<footer>Powered by Snipbox</footer>
</body>
</html>
"#,
        title = escape(title),
        account_nav = account_nav,
        flash = flash,
        main = main,
    )
}

fn format_time(time: &chrono::DateTime<chrono::Utc>) -> String {
    time.format("%d %b %Y at %H:%M").to_string()
}

pub fn home(ctx: &PageContext, snippets: &[Snippet]) -> String {
    let main = if snippets.is_empty() {
        "<h2>Latest Snippets</h2>\n<p>There's nothing to see here... yet!</p>".to_string()
    } else {
        let rows: String = snippets
            .iter()
            .map(|s| {
                format!(
                    r#"<tr><td><a href="/snippet/view/{id}">{title}</a></td><td>{created}</td><td>#{id}</td></tr>
"#,
                    id = s.id,
                    title = escape(&s.title),
                    created = format_time(&s.created),
                )
            })
            .collect();
        format!(
            "<h2>Latest Snippets</h2>\n<table>\n<tr><th>Title</th><th>Created</th><th>ID</th></tr>\n{}</table>",
            rows
        )
    };

    layout(ctx, "Home", &main)
}

pub fn about(ctx: &PageContext) -> String {
    let main = "<h2>About</h2>\n<p>Snipbox is a place to share short-lived text snippets. \
                Every snippet expires after a fixed number of days and is then gone for good.</p>";
    layout(ctx, "About", main)
}

pub fn snippet_view(ctx: &PageContext, snippet: &Snippet) -> String {
    let main = format!(
        r#"<div class="snippet">
<div class="metadata"><strong>{title}</strong> <span>#{id}</span></div>
<pre><code>{content}</code></pre>
<div class="metadata"><time>Created: {created}</time> <time>Expires: {expires}</time></div>
</div>"#,
        id = snippet.id,
        title = escape(&snippet.title),
        content = escape(&snippet.content),
        created = format_time(&snippet.created),
        expires = format_time(&snippet.expires),
    );

    layout(ctx, &snippet.title, &main)
}

pub fn snippet_create(ctx: &PageContext, form: &SnippetCreateForm, v: &Validator) -> String {
    let expiry_options: String = PERMITTED_EXPIRY_DAYS
        .iter()
        .map(|days| {
            let label = match days {
                1 => "One day".to_string(),
                7 => "One week".to_string(),
                365 => "One year".to_string(),
                n => format!("{} days", n),
            };
            let checked = if *days == form.expires { " checked" } else { "" };
            format!(
                r#"<label><input type="radio" name="expires" value="{days}"{checked}> {label}</label>
"#
            )
        })
        .collect();

    let main = format!(
        r#"<h2>Create a new snippet</h2>
<form action="/snippet/create" method="POST">
{csrf}
<div>
<label>Title:</label>
{title_error}
<input type="text" name="title" value="{title}">
</div>
<div>
<label>Content:</label>
{content_error}
<textarea name="content">{content}</textarea>
</div>
<div>
<label>Delete in:</label>
{expires_error}
{expiry_options}
</div>
<div><input type="submit" value="Publish snippet"></div>
</form>"#,
        csrf = csrf_field(ctx),
        title_error = field_error(v, "title"),
        title = escape(&form.title),
        content_error = field_error(v, "content"),
        content = escape(&form.content),
        expires_error = field_error(v, "expires"),
        expiry_options = expiry_options,
    );

    layout(ctx, "Create a New Snippet", &main)
}

pub fn user_signup(ctx: &PageContext, form: &UserSignupForm, v: &Validator) -> String {
    let main = format!(
        r#"<h2>Signup</h2>
<form action="/user/signup" method="POST" novalidate>
{csrf}
{non_field_errors}
<div>
<label>Name:</label>
{name_error}
<input type="text" name="name" value="{name}">
</div>
<div>
<label>Email:</label>
{email_error}
<input type="email" name="email" value="{email}">
</div>
<div>
<label>Password:</label>
{password_error}
<input type="password" name="password">
</div>
<div><input type="submit" value="Signup"></div>
</form>"#,
        csrf = csrf_field(ctx),
        non_field_errors = non_field_errors(v),
        name_error = field_error(v, "name"),
        name = escape(&form.name),
        email_error = field_error(v, "email"),
        email = escape(&form.email),
        password_error = field_error(v, "password"),
    );

    layout(ctx, "Signup", &main)
}

pub fn user_login(ctx: &PageContext, form: &UserLoginForm, v: &Validator) -> String {
    let main = format!(
        r#"<h2>Login</h2>
<form action="/user/login" method="POST" novalidate>
{csrf}
{non_field_errors}
<div>
<label>Email:</label>
{email_error}
<input type="email" name="email" value="{email}">
</div>
<div>
<label>Password:</label>
{password_error}
<input type="password" name="password">
</div>
<div><input type="submit" value="Login"></div>
</form>"#,
        csrf = csrf_field(ctx),
        non_field_errors = non_field_errors(v),
        email_error = field_error(v, "email"),
        email = escape(&form.email),
        password_error = field_error(v, "password"),
    );

    layout(ctx, "Login", &main)
}

pub fn account(ctx: &PageContext, user: &User) -> String {
    let main = format!(
        r#"<h2>Your Account</h2>
<table>
<tr><th>Name</th><td>{name}</td></tr>
<tr><th>Email</th><td>{email}</td></tr>
<tr><th>Joined</th><td>{created}</td></tr>
<tr><th>Password</th><td><a href="/account/password/update">Change password</a></td></tr>
</table>"#,
        name = escape(&user.name),
        email = escape(&user.email),
        created = format_time(&user.created),
    );

    layout(ctx, "Account", &main)
}

pub fn password_update(ctx: &PageContext, v: &Validator) -> String {
    let main = format!(
        r#"<h2>Change Password</h2>
<form action="/account/password/update" method="POST" novalidate>
{csrf}
<div>
<label>Current password:</label>
{current_error}
<input type="password" name="current_password">
</div>
<div>
<label>New password:</label>
{new_error}
<input type="password" name="new_password">
</div>
<div>
<label>Confirm new password:</label>
{confirm_error}
<input type="password" name="confirm_password">
</div>
<div><input type="submit" value="Change password"></div>
</form>"#,
        csrf = csrf_field(ctx),
        current_error = field_error(v, "currentPassword"),
        new_error = field_error(v, "newPassword"),
        confirm_error = field_error(v, "confirmPassword"),
    );

    layout(ctx, "Change Password", &main)
}

// Error pages stand alone: they can render before the session middleware has
// run, so no PageContext.

fn error_page(title: &str, message: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} - Snipbox</title>
<link rel="stylesheet" href="/static/main.css">
</head>
<body>
<header><h1><a href="/">Snipbox</a></h1></header>
<main>
<h2>{title}</h2>
<p>{message}</p>
</main>
</body>
</html>
"#,
        title = escape(title),
        message = escape(message),
    )
}

pub fn client_error(status: StatusCode) -> String {
    let title = status.canonical_reason().unwrap_or("Client Error");
    error_page(title, "The request could not be completed.")
}

pub fn server_error(detail: Option<&str>) -> String {
    error_page(
        "Internal Server Error",
        detail.unwrap_or("Sorry, something went wrong. Please try again later."),
    )
}

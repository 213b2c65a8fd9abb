//! Authentication route handlers.
//!
//! Login and signup proxy the marketplace API's session endpoints. The
//! backend session cookie returned on success is kept server-side in the
//! visitor's session and replayed on later authenticated calls.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use soko_safi_core::types::{Email, Role};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::market::{MarketError, NewAccount};
use crate::middleware::{OptionalUser, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::state::AppState;

/// Shortest password the backend accepts.
const MIN_PASSWORD_LENGTH: usize = 6;

// =============================================================================
// Form and Query Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    /// Path to return to after login, carried as a hidden field.
    pub next: Option<String>,
}

/// Signup form data.
#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub next: Option<String>,
}

/// Query parameters for the auth pages.
#[derive(Debug, Deserialize)]
pub struct AuthPageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
    pub next: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub user: Option<CurrentUser>,
    pub error: Option<String>,
    pub success: Option<String>,
    pub next: Option<String>,
    /// Refill value after a failed attempt.
    pub username: String,
}

/// Signup page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub user: Option<CurrentUser>,
    pub error: Option<String>,
    pub next: Option<String>,
    pub username: String,
    pub email: String,
    pub role: String,
}

// =============================================================================
// Helpers
// =============================================================================

/// Accept a post-login redirect target only if it is a local path.
///
/// Protocol-relative targets (`//evil.example`) are rejected along with
/// anything that does not start with `/`.
fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//"))
}

/// Validate login form fields before calling the backend.
fn validate_login(form: &LoginForm) -> Option<String> {
    if form.username.trim().is_empty() {
        return Some("Username is required".to_string());
    }
    if form.password.is_empty() {
        return Some("Password is required".to_string());
    }
    if form.password.len() < MIN_PASSWORD_LENGTH {
        return Some("Must be at least 6 characters".to_string());
    }
    None
}

/// Validate signup form fields before calling the backend.
fn validate_signup(form: &SignupForm) -> Option<String> {
    if form.username.trim().is_empty() {
        return Some("Username is required".to_string());
    }
    if Email::parse(&form.email).is_err() {
        return Some("Invalid email format".to_string());
    }
    if form.password.is_empty() {
        return Some("Password is required".to_string());
    }
    if form.password.len() < MIN_PASSWORD_LENGTH {
        return Some("Must be at least 6 characters".to_string());
    }
    None
}

/// Map a backend failure to the message shown on the auth forms.
fn auth_error_message(error: &MarketError) -> String {
    match error {
        MarketError::Unauthorized => "Invalid username or password".to_string(),
        MarketError::Rejected(message) | MarketError::Forbidden(message) => message.clone(),
        MarketError::Http(_) => "Network error. Please try again.".to_string(),
        _ => "Something went wrong. Please try again later.".to_string(),
    }
}

/// Store the authenticated user in the session and tag Sentry events.
async fn establish_session(session: &Session, current: &CurrentUser) -> Result<(), String> {
    if let Err(e) = set_current_user(session, current).await {
        tracing::error!("Failed to persist login in session: {e}");
        return Err("Something went wrong. Please try again later.".to_string());
    }

    set_sentry_user(&current.id, current.email.as_ref().map(Email::as_str));

    let user_id = current.id.to_string();
    add_breadcrumb(
        "auth",
        "Session established",
        Some(&[("user_id", user_id.as_str())]),
    );

    Ok(())
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(
    OptionalUser(user): OptionalUser,
    Query(query): Query<AuthPageQuery>,
) -> impl IntoResponse {
    LoginTemplate {
        user,
        error: query.error,
        success: query.success,
        next: safe_next(query.next.as_deref()).map(String::from),
        username: String::new(),
    }
}

/// Handle login form submission.
#[instrument(skip(state, session, form), fields(username = %form.username))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = safe_next(form.next.as_deref()).map(String::from);

    let render_error = |error: String| {
        LoginTemplate {
            user: None,
            error: Some(error),
            success: None,
            next: next.clone(),
            username: form.username.clone(),
        }
        .into_response()
    };

    if let Some(error) = validate_login(&form) {
        return render_error(error);
    }

    match state.market().login(&form.username, &form.password).await {
        Ok((user, token)) => {
            let current = CurrentUser::from_account(&user, token);
            if let Err(error) = establish_session(&session, &current).await {
                return render_error(error);
            }
            Redirect::to(next.as_deref().unwrap_or("/profile")).into_response()
        }
        Err(e) => {
            tracing::warn!("Login failed for {}: {e}", form.username);
            render_error(auth_error_message(&e))
        }
    }
}

// =============================================================================
// Signup Routes
// =============================================================================

/// Display the signup page.
pub async fn signup_page(
    OptionalUser(user): OptionalUser,
    Query(query): Query<AuthPageQuery>,
) -> impl IntoResponse {
    SignupTemplate {
        user,
        error: query.error,
        next: safe_next(query.next.as_deref()).map(String::from),
        username: String::new(),
        email: String::new(),
        role: "customer".to_string(),
    }
}

/// Handle signup form submission.
///
/// A successful signup logs the new account in straight away, matching the
/// backend's behavior of opening a session on account creation.
#[instrument(skip(state, session, form), fields(username = %form.username))]
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SignupForm>,
) -> Response {
    let next = safe_next(form.next.as_deref()).map(String::from);

    let render_error = |error: String| {
        SignupTemplate {
            user: None,
            error: Some(error),
            next: next.clone(),
            username: form.username.clone(),
            email: form.email.clone(),
            role: form.role.clone(),
        }
        .into_response()
    };

    if let Some(error) = validate_signup(&form) {
        return render_error(error);
    }

    let role = match form.role.parse::<Role>() {
        Ok(role) => role,
        Err(e) => return render_error(e.to_string()),
    };

    // Validated above, parse cannot fail here.
    let Ok(email) = Email::parse(&form.email) else {
        return render_error("Invalid email format".to_string());
    };

    let account = NewAccount {
        username: form.username.trim().to_string(),
        email,
        password: form.password.clone(),
        role,
    };

    match state.market().signup(&account).await {
        Ok((user, token)) => {
            let current = CurrentUser::from_account(&user, token);
            if let Err(error) = establish_session(&session, &current).await {
                return render_error(error);
            }
            Redirect::to(next.as_deref().unwrap_or("/profile")).into_response()
        }
        Err(e) => {
            tracing::warn!("Signup failed for {}: {e}", form.username);
            render_error(auth_error_message(&e))
        }
    }
}

// =============================================================================
// Logout Route
// =============================================================================

/// Handle logout.
///
/// Revokes the backend session first (best effort), then drops the local
/// session entirely.
#[instrument(skip(state, session, user))]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
) -> Response {
    if let Some(user) = user {
        if let Err(e) = state.market().logout(&user.api_token).await {
            tracing::warn!("Failed to revoke backend session: {e}");
        }
    }

    if let Err(e) = clear_current_user(&session).await {
        tracing::error!("Failed to clear session user: {e}");
    }

    if let Err(e) = session.flush().await {
        tracing::error!("Failed to flush session: {e}");
    }

    clear_sentry_user();

    Redirect::to("/").into_response()
}

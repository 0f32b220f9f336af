//! HTTP route handlers for the site.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page
//! GET  /health                 - Health check (main.rs)
//! GET  /fragments/{*path}      - Raw fragment
//! GET  /docs                   - Documentation index
//! GET  /docs/{*page}           - Documentation page (HTMX: content only)
//! GET  /{page}                 - Top-level site page
//!
//! # Search
//! GET  /search?q=              - Full results page
//! GET  /search/suggest?q=      - Debounced suggestions (HTMX)
//! GET  /search/select          - Keyboard selection (HTMX)
//!
//! # Account
//! GET  /account                - Login/sign-up forms or dashboard
//! GET  /account/section/{s}    - Dashboard section (HTMX)
//! POST /account/settings       - Save settings
//! POST /account/settings/reset - Show default settings
//! POST /account/password       - Change password
//! POST /account/2fa            - Confirm two-factor code
//! GET  /account/projects       - Project board; POST creates
//! POST /account/projects/{id}/archive
//!
//! # Auth
//! POST /auth/login, /auth/signup, /auth/logout
//! GET  /auth/oauth/{provider}  - Redirect to the OAuth provider
//! GET  /auth/callback          - OAuth code exchange
//!
//! # Admin (admin role)
//! GET  /admin/users, /admin/users/rows?offset=
//! POST /admin/users/{id}/roles
//! GET  /admin/requests
//! POST /admin/requests/{id}/approve
//!
//! # API
//! GET/POST /api/preferences
//! ```

pub mod account;
pub mod admin;
pub mod api;
pub mod auth;
pub mod pages;
pub mod projects;
pub mod search;
#[cfg(test)]
mod testing;

use axum::{
    Router,
    http::HeaderMap,
    routing::{get, post},
};

use crate::state::AppState;

/// Whether the request was issued by HTMX.
#[must_use]
pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("hx-request")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "true")
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/signup", post(auth::signup))
        .route("/logout", post(auth::logout))
        .route("/oauth/{provider}", get(auth::oauth))
        .route("/callback", get(auth::callback))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/section/{section}", get(account::section))
        .route("/settings", post(account::save_settings))
        .route("/settings/reset", post(account::reset_settings))
        .route("/password", post(account::change_password))
        .route("/2fa", post(account::enable_two_factor))
        .route("/projects", get(projects::list).post(projects::create))
        .route("/projects/{id}/archive", post(projects::archive))
}

/// Create the content page routes router.
pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::home))
        .route("/fragments/{*path}", get(pages::fragment))
        .route("/docs", get(pages::docs_index))
        .route("/docs/{*page}", get(pages::docs_page))
        .route("/{page}", get(pages::site_page))
}

/// Create all routes for the site.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(page_routes())
        .nest("/search", search::router())
        .nest("/account", account_routes())
        .nest("/auth", auth_routes())
        .nest("/admin", admin::router())
        .merge(api::router())
        .fallback(pages::not_found)
}

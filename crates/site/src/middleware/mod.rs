//! HTTP middleware stack for the site.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions, in-memory store, signed cookie)

pub mod auth;
pub mod session;

pub use auth::{
    AuthRejection, RequireAdmin, RequireAuth, clear_current_user, current_user,
    set_current_user, sign_out,
};
pub use session::create_session_layer;

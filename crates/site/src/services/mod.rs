//! Business logic for the site.
//!
//! # Services
//!
//! - `gate` - Session/profile gate (login forms vs dashboard)
//! - `admin` - Role-gated user table and role requests
//! - `roles` - Published role lists
//! - `projects` - Per-visitor sample project board
//! - `preferences` - Theme and language preferences
//! - `validation` - Form checks run before any provider call
//! - `ports` - Traits the services use to reach the hosted backend

pub mod admin;
pub mod gate;
pub mod ports;
pub mod preferences;
pub mod projects;
pub mod roles;
pub mod validation;

pub use admin::AdminPanel;
pub use gate::{Gate, GateError};
pub use ports::{IdentityProvider, ProfileStore};
pub use roles::RoleDirectory;

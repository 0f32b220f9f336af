//! Core types for Tyxar.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod page;
pub mod role;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use page::{DOCS_PREFIX, PageTarget};
pub use role::{Role, RoleFlags, RoleParseError};
pub use status::*;

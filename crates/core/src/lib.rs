//! Tyxar Core - Shared types library.
//!
//! This crate provides common types used across all Tyxar components:
//! - `site` - Documentation site and profile dashboard
//! - `cli` - Operator tools for role requests and users
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, role flags, statuses and page addresses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

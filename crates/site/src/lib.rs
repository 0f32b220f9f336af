//! Tyxar site library.
//!
//! Serves the documentation and marketing site, the profile dashboard and the
//! role-gated admin panel on top of a hosted auth/table backend. Exposed as a
//! library so the operator CLI and the tests share the same code.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod filters;
pub mod fragments;
pub mod middleware;
pub mod models;
pub mod navigation;
pub mod routes;
pub mod search;
pub mod services;
pub mod state;
pub mod supabase;

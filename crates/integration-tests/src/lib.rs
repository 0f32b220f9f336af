//! Integration tests for the Tyxar site.
//!
//! The tests talk to a running server over HTTP and are `#[ignore]`d by
//! default.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the site
//! cargo run -p tyxar-site
//!
//! # Run integration tests (SITE_BASE_URL defaults to http://localhost:3000)
//! cargo test -p tyxar-integration-tests -- --ignored
//! ```

use reqwest::{Client, redirect};

/// Base URL of the site under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("SITE_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:3000".to_string())
        .trim_end_matches('/')
        .to_string()
}

/// Absolute URL for a site path.
#[must_use]
pub fn url(path: &str) -> String {
    format!("{}{path}", base_url())
}

/// Client with a cookie jar that does not follow redirects, so tests can
/// assert on them.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// Request builder marked as an HTMX request.
#[must_use]
pub fn htmx_get(client: &Client, path: &str) -> reqwest::RequestBuilder {
    client.get(url(path)).header("HX-Request", "true")
}

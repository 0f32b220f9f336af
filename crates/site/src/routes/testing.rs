//! Router harness for handler tests: the full route table behind a real
//! session layer, backed by in-memory identity, store and fragments.

#![allow(clippy::unwrap_used)]

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, header};
use secrecy::SecretString;
use tower::ServiceExt;
use tyxar_core::{RoleFlags, UserId};

use crate::config::{FragmentOrigin, SiteConfig, SupabaseConfig};
use crate::fragments::fakes::MemorySource;
use crate::middleware::create_session_layer;
use crate::services::ports::ProfileStore;
use crate::services::ports::fakes::{FakeIdentity, FakeStore, user};
use crate::state::AppState;
use crate::supabase::ProfileRow;

pub const PASSWORD: &str = "correct-horse-battery";

pub fn config() -> SiteConfig {
    SiteConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        session_secret: SecretString::from("s".repeat(48)),
        fragments: FragmentOrigin::Directory(PathBuf::from("content")),
        supabase: SupabaseConfig {
            url: "https://project.supabase.co".to_string(),
            anon_key: SecretString::from("anon-key-value"),
            service_role_key: None,
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

pub struct TestApp {
    router: Router,
    pub store: Arc<FakeStore>,
}

impl TestApp {
    /// App with one account per `(email, flags)`; each also gets a profile row.
    pub fn new(accounts: &[(&str, RoleFlags)], store: FakeStore) -> Self {
        let mut identity = FakeIdentity::default();
        for (email, flags) in accounts {
            let id = UserId::new(uuid::Uuid::new_v4());
            identity = identity.with_account(user(id, email, Some("Ada Lovelace")), PASSWORD);
            store.profiles.lock().unwrap().push(ProfileRow {
                id,
                display_name: Some("Ada Lovelace".to_string()),
                roles: *flags,
                bio: None,
                website: None,
                created_at: None,
                updated_at: None,
            });
        }

        let config = config();
        let store = Arc::new(store);
        let state = AppState::from_parts(
            config.clone(),
            Arc::new(identity),
            Arc::clone(&store) as Arc<dyn ProfileStore>,
            Arc::new(MemorySource::default().with("partials/header.html", "<nav>Tyxar</nav>")),
        );
        let router = super::routes()
            .layer(create_session_layer(&config))
            .with_state(state);
        Self { router, store }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Submit the login form over HTMX; returns the response and its cookie.
    pub async fn log_in(&self, email: &str, password: &str) -> (Response<Body>, Option<String>) {
        let body = format!("email={}&password={password}", email.replace('@', "%40"));
        let response = self.send(post("/auth/login", None, &body)).await;
        let cookie = session_cookie(&response);
        (response, cookie)
    }

    /// Log in and return the session cookie, failing the test otherwise.
    pub async fn signed_in(&self, email: &str) -> String {
        let (_, cookie) = self.log_in(email, PASSWORD).await;
        cookie.unwrap()
    }
}

/// HTMX form post.
pub fn post(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("hx-request", "true");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str, cookie: Option<&str>, htmx: bool) -> Request<Body> {
    let mut builder = Request::get(uri);
    if htmx {
        builder = builder.header("hx-request", "true");
    }
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// `name=value` pair from the response's `Set-Cookie`, if any.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub async fn text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

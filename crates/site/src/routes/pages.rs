//! Site pages: full-page composition and HTMX content swaps.
//!
//! A full request composes header, footer, sidebar and content into the
//! shell. An HTMX request from a delegated `data-page` link gets only the new
//! content (plus the re-marked sidebar, swapped out of band), with headers
//! telling the client how to transition and where to scroll.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use tyxar_core::PageTarget;

use crate::error::{AppError, Result};
use crate::filters;
use crate::fragments::{Chrome, Document, containers, load_chrome, load_into};
use crate::navigation::{ContentRouter, Navigation, Swap};
use crate::services::preferences::Preferences;
use crate::state::AppState;

use super::is_htmx;

/// Full page shell.
#[derive(Template, WebTemplate)]
#[template(path = "pages/page.html")]
pub struct PageTemplate {
    pub title: String,
    pub body_class: &'static str,
    pub header: String,
    pub footer: String,
    pub sidebar: Option<String>,
    pub content: String,
}

impl PageTemplate {
    /// Shell around a composed document.
    #[must_use]
    pub fn from_document(title: &str, document: &Document, preferences: &Preferences) -> Self {
        Self {
            title: title.to_string(),
            body_class: preferences.theme.body_class(),
            header: document.markup(containers::HEADER).to_string(),
            footer: document.markup(containers::FOOTER).to_string(),
            sidebar: document.get(containers::SIDEBAR).map(str::to_string),
            content: document.markup(containers::CONTENT).to_string(),
        }
    }
}

/// `?anchor=` sent by delegated links that carry a `#fragment`.
#[derive(Debug, Default, Deserialize)]
pub struct AnchorQuery {
    pub anchor: Option<String>,
}

/// Document chrome and containers for a page.
fn shell(chrome: Chrome) -> Document {
    let mut ids = vec![containers::HEADER, containers::FOOTER, containers::CONTENT];
    if chrome.sidebar().is_some() {
        ids.push(containers::SIDEBAR);
    }
    Document::with_containers(&ids)
}

/// Page title from the target's last path segment.
fn title_for(target: &PageTarget) -> String {
    let name = target.page_name();
    let name = name.strip_suffix(".html").unwrap_or(name);
    if name.is_empty() || name == "index" {
        return "Tyxar".to_string();
    }
    let mut chars = name.chars();
    let first = chars.next().map(|c| c.to_uppercase().collect::<String>()).unwrap_or_default();
    format!("{first}{} - Tyxar", chars.as_str().replace('-', " "))
}

/// Response headers describing a completed swap.
fn swap_headers(swap: &Swap) -> Vec<(HeaderName, HeaderValue)> {
    [
        ("hx-reswap", swap.reswap()),
        ("hx-trigger-after-swap", swap.trigger()),
        ("hx-push-url", swap.push_url()),
    ]
    .into_iter()
    .filter_map(|(name, value)| {
        HeaderValue::from_str(&value)
            .ok()
            .map(|value| (HeaderName::from_static(name), value))
    })
    .collect()
}

/// Render `target` either as a content swap or as a full page.
#[instrument(skip(state, session, headers), fields(page = %target))]
pub async fn render(
    state: &AppState,
    session: &Session,
    headers: &HeaderMap,
    target: PageTarget,
    chrome: Chrome,
) -> Result<Response> {
    let router = ContentRouter::new(state.fragments());

    if is_htmx(headers) {
        let mut document = Document::with_containers(&[containers::CONTENT, containers::SIDEBAR]);
        if let Some((path, policy)) = chrome.sidebar() {
            let _ = load_into(state.fragments(), &mut document, path, containers::SIDEBAR, policy)
                .await;
        }

        return Ok(match router.navigate(&mut document, &target).await {
            Navigation::Swapped(swap) => {
                // The shell always has a sidebar slot; site pages empty it
                let body = format!(
                    r#"{}<nav id="{}" class="sidebar" hx-swap-oob="true">{}</nav>"#,
                    document.markup(containers::CONTENT),
                    containers::SIDEBAR,
                    document.markup(containers::SIDEBAR)
                );
                let mut response = Html(body).into_response();
                response.headers_mut().extend(swap_headers(&swap));
                response
            }
            Navigation::FullNavigation(url) => {
                let mut response = StatusCode::OK.into_response();
                if let Ok(value) = HeaderValue::from_str(&url) {
                    response.headers_mut().insert("hx-redirect", value);
                }
                response
            }
        });
    }

    let preferences = Preferences::load(session).await?;
    let mut document = shell(chrome);
    load_chrome(state.fragments(), &mut document, chrome).await;

    match router.navigate(&mut document, &target).await {
        Navigation::Swapped(swap) => {
            let status = if swap.found { StatusCode::OK } else { StatusCode::NOT_FOUND };
            let page = PageTemplate::from_document(&title_for(&target), &document, &preferences);
            Ok((status, page).into_response())
        }
        Navigation::FullNavigation(url) => Ok(Redirect::to(&url).into_response()),
    }
}

fn target(path: &str, anchor: Option<&str>) -> Result<PageTarget> {
    let value = match anchor.filter(|a| !a.is_empty()) {
        Some(anchor) => format!("{path}#{anchor}"),
        None => path.to_string(),
    };
    PageTarget::resolve(&value).ok_or_else(|| AppError::NotFound(path.to_string()))
}

/// Reject page names that could never be documents.
fn page_name(page: &str) -> Result<&str> {
    let page = page.trim_matches('/');
    let page = page.strip_suffix(".html").unwrap_or(page);
    if page.is_empty()
        || !page
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/'))
        || page.contains("//")
    {
        return Err(AppError::NotFound(page.to_string()));
    }
    Ok(page)
}

/// Home page.
#[instrument(skip(state, session, headers))]
pub async fn home(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Query(query): Query<AnchorQuery>,
) -> Result<Response> {
    let target = target("index.html", query.anchor.as_deref())?;
    render(&state, &session, &headers, target, Chrome::Site).await
}

/// Documentation index.
#[instrument(skip(state, session, headers))]
pub async fn docs_index(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Query(query): Query<AnchorQuery>,
) -> Result<Response> {
    let target = target("docs/index.html", query.anchor.as_deref())?;
    render(&state, &session, &headers, target, Chrome::Docs).await
}

/// A documentation page: `/docs/syntax` serves `docs/syntax.html`.
#[instrument(skip(state, session, headers))]
pub async fn docs_page(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Path(page): Path<String>,
    Query(query): Query<AnchorQuery>,
) -> Result<Response> {
    let page = page_name(&page)?;
    let target = target(page, query.anchor.as_deref())?;
    render(&state, &session, &headers, target, Chrome::Docs).await
}

/// A top-level site page: `/releases` serves `releases.html`.
#[instrument(skip(state, session, headers))]
pub async fn site_page(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Path(page): Path<String>,
    Query(query): Query<AnchorQuery>,
) -> Result<Response> {
    let page = page_name(&page)?;
    let target = target(&format!("{page}.html"), query.anchor.as_deref())?;
    render(&state, &session, &headers, target, Chrome::Site).await
}

/// Raw fragment, for clients that assemble pages themselves.
///
/// # Errors
///
/// Returns 404 when the fragment does not exist.
#[instrument(skip(state))]
pub async fn fragment(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse> {
    let html = state.fragments().fetch(&path).await?;
    Ok(Html(html))
}

/// Fallback for unknown routes.
pub async fn not_found(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
) -> Result<Response> {
    let preferences = Preferences::load(&session).await?;
    let mut document = shell(Chrome::Site);
    if !is_htmx(&headers) {
        load_chrome(state.fragments(), &mut document, Chrome::Site).await;
    }
    document.set(containers::CONTENT, crate::navigation::NOT_FOUND);
    Ok((
        StatusCode::NOT_FOUND,
        PageTemplate::from_document("Not found - Tyxar", &document, &preferences),
    )
        .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_page_names() {
        assert_eq!(page_name("get-started").unwrap(), "get-started");
        assert_eq!(page_name("syntax.html").unwrap(), "syntax");
        assert!(page_name("../secrets").is_err());
        assert!(page_name("").is_err());
    }

    #[test]
    fn test_targets() {
        let t = target("syntax", Some("loops")).unwrap();
        assert_eq!(t.path(), "docs/syntax");
        assert_eq!(t.fragment(), Some("loops"));

        let t = target("releases.html", Some("")).unwrap();
        assert_eq!(t.document_path(), "releases.html");
        assert_eq!(t.fragment(), None);
    }

    #[test]
    fn test_titles() {
        assert_eq!(title_for(&target("index.html", None).unwrap()), "Tyxar");
        assert_eq!(title_for(&target("get-started", None).unwrap()), "Get started - Tyxar");
    }
}

//! Search route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::fragments::{Chrome, Document, containers, load_chrome};
use crate::models::visitor_key;
use crate::search::{Debounced, Key, SearchResults, Selection, SelectionOutcome};
use crate::services::preferences::Preferences;
use crate::state::AppState;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Keyboard selection parameters.
#[derive(Debug, Deserialize)]
pub struct SelectQuery {
    #[serde(default)]
    pub q: String,
    pub key: Key,
    /// Currently selected index; absent means none.
    pub index: Option<usize>,
}

/// Suggestion list (HTMX fragment).
#[derive(Template, WebTemplate)]
#[template(path = "partials/search_results.html")]
pub struct SearchResultsTemplate {
    pub results: SearchResults,
    pub selected: Option<usize>,
}

impl SearchResultsTemplate {
    fn is_selected(&self, index: usize) -> bool {
        self.selected == Some(index)
    }
}

/// Full search page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/search.html")]
pub struct SearchPageTemplate {
    pub body_class: &'static str,
    pub header: String,
    pub footer: String,
    pub results: SearchResults,
}

/// Empty 204 that leaves the results box untouched.
fn no_swap() -> Response {
    (StatusCode::NO_CONTENT, [("HX-Reswap", "none")]).into_response()
}

/// Search suggestions endpoint (HTMX).
///
/// Every keystroke lands here; only the last request in a 300 ms idle window
/// runs the search.
#[instrument(skip(state, session))]
pub async fn suggest(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SearchQuery>,
) -> Result<Response> {
    let visitor = visitor_key(&session).await?;

    Ok(match state.suggest().settle(visitor, &query.q).await {
        Debounced::Superseded => no_swap(),
        Debounced::TooShort => SearchResultsTemplate {
            results: SearchResults::default(),
            selected: None,
        }
        .into_response(),
        Debounced::Ready(q) => SearchResultsTemplate {
            results: state.search().search(&q).await,
            selected: None,
        }
        .into_response(),
    })
}

/// Keyboard navigation within the suggestion list (HTMX).
///
/// Re-renders the list with the new selection, opens the selected result,
/// or hides the list.
#[instrument(skip(state))]
pub async fn select(
    State(state): State<AppState>,
    Query(query): Query<SelectQuery>,
) -> Response {
    // Pages are cached, so repeating the search is cheap.
    let results = state.search().search(&query.q).await;
    let mut selection = Selection::new(query.index, results.hits.len());

    match selection.press(query.key) {
        SelectionOutcome::Select(selected) => {
            SearchResultsTemplate { results, selected }.into_response()
        }
        SelectionOutcome::Open(index) => match results.hits.get(index) {
            Some(hit) => (StatusCode::OK, [("HX-Location", hit.url)]).into_response(),
            None => no_swap(),
        },
        SelectionOutcome::Hide => SearchResultsTemplate {
            results: SearchResults::default(),
            selected: None,
        }
        .into_response(),
        SelectionOutcome::Ignore => no_swap(),
    }
}

/// Full search results page.
#[instrument(skip(state, session))]
pub async fn search_page(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse> {
    let preferences = Preferences::load(&session).await?;
    let mut document = Document::with_containers(&[containers::HEADER, containers::FOOTER]);

    let (results, ()) = tokio::join!(
        state.search().search(&query.q),
        load_chrome(state.fragments(), &mut document, Chrome::Site)
    );

    Ok(SearchPageTemplate {
        body_class: preferences.theme.body_class(),
        header: document.markup(containers::HEADER).to_string(),
        footer: document.markup(containers::FOOTER).to_string(),
        results: SearchResults {
            query: query.q.trim().to_string(),
            ..results
        },
    })
}

/// Create the search routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(search_page))
        .route("/suggest", get(suggest))
        .route("/select", get(select))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::search::SearchHit;

    fn hit(url: &'static str, title: &'static str) -> SearchHit {
        SearchHit {
            url,
            title,
            title_html: title.to_string(),
            snippet: String::new(),
            relevance: 1,
        }
    }

    #[test]
    fn test_selected_hit_is_marked() {
        let results = SearchResults {
            query: "gate".into(),
            hits: vec![hit("/docs/login", "Login"), hit("/docs/gate", "Gate")],
        };
        let html = SearchResultsTemplate {
            results,
            selected: Some(1),
        }
        .render()
        .unwrap();
        assert!(html.contains(r#"data-selected="1""#));
        assert_eq!(html.matches("search-result selected").count(), 1);
        let marked = html.find("search-result selected").unwrap();
        assert!(html[marked..].contains("/docs/gate"));
        assert!(!html[marked..].contains("/docs/login"));
    }
}

//! In-page search over the site's known pages.
//!
//! Pages are fetched through the fragment source, stripped to text, and
//! scanned for the query as a case-insensitive substring. Results are ranked
//! by occurrence count. Fetched bodies are cached engine-wide by URL.

pub mod debounce;
pub mod text;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use moka::future::Cache;
use tracing::instrument;

use crate::fragments::{FragmentError, FragmentSource, escape_html};

pub use debounce::{Debounced, Key, MIN_QUERY_CHARS, Selection, SelectionOutcome, SuggestGate};

/// Maximum results returned.
pub const MAX_RESULTS: usize = 10;

/// A page the search scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchPage {
    /// Site URL the result links to.
    pub url: &'static str,
    pub title: &'static str,
    /// Content document fetched for the page body.
    pub document: &'static str,
}

/// Every searchable page.
pub const PAGES: [SearchPage; 13] = [
    SearchPage { url: "/", title: "Home", document: "index.html" },
    SearchPage { url: "/about", title: "About", document: "about.html" },
    SearchPage { url: "/blade", title: "BLADE", document: "blade.html" },
    SearchPage { url: "/docs", title: "Documentation", document: "docs/index.html" },
    SearchPage { url: "/docs/cli", title: "CLI", document: "docs/cli.html" },
    SearchPage { url: "/docs/blade", title: "Development", document: "docs/blade.html" },
    SearchPage { url: "/docs/faq", title: "FAQ", document: "docs/faq.html" },
    SearchPage {
        url: "/docs/get-started",
        title: "Getting Started",
        document: "docs/get-started.html",
    },
    SearchPage { url: "/docs/syntax", title: "Syntax", document: "docs/syntax.html" },
    SearchPage { url: "/download", title: "Download", document: "download.html" },
    SearchPage { url: "/menu", title: "Menu", document: "menu.html" },
    SearchPage { url: "/releases", title: "Releases", document: "releases.html" },
    SearchPage { url: "/account", title: "Sign In", document: "account.html" },
];

/// A matching page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: &'static str,
    pub title: &'static str,
    /// Escaped title with the query highlighted.
    pub title_html: String,
    /// Escaped excerpt with the query highlighted.
    pub snippet: String,
    /// Occurrence count.
    pub relevance: usize,
}

/// Results for one query.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub query: String,
    pub hits: Vec<SearchHit>,
}

impl SearchResults {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// `No results found for "<query>"`, escaped.
    #[must_use]
    pub fn empty_message(&self) -> String {
        format!("No results found for \"{}\"", escape_html(&self.query))
    }
}

/// Searches the fixed page list.
#[derive(Clone)]
pub struct SearchEngine {
    source: Arc<dyn FragmentSource>,
    pages: Cache<&'static str, Arc<str>>,
}

impl SearchEngine {
    #[must_use]
    pub fn new(source: Arc<dyn FragmentSource>) -> Self {
        Self {
            source,
            pages: Cache::builder()
                .max_capacity(PAGES.len() as u64)
                .time_to_live(Duration::from_secs(60 * 60))
                .build(),
        }
    }

    /// Search every page for `query`.
    ///
    /// Queries under two characters return nothing without fetching. Pages
    /// that fail to load are skipped.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> SearchResults {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return SearchResults::default();
        }

        let mut hits: Vec<SearchHit> = join_all(PAGES.iter().map(|page| self.search_page(page, query)))
            .await
            .into_iter()
            .flatten()
            .collect();

        // Stable sort keeps page order among equal scores.
        hits.sort_by(|a, b| b.relevance.cmp(&a.relevance));
        hits.truncate(MAX_RESULTS);

        tracing::debug!(hits = hits.len(), "Search complete");
        SearchResults { query: query.to_string(), hits }
    }

    async fn search_page(&self, page: &SearchPage, query: &str) -> Option<SearchHit> {
        let html = match self.body(page).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(url = page.url, error = %e, "Skipping page in search");
                return None;
            }
        };

        let text = text::extract_text(&html);
        let relevance = text::count_matches(&text, query);
        if relevance == 0 {
            return None;
        }

        Some(SearchHit {
            url: page.url,
            title: page.title,
            title_html: text::highlight(page.title, query),
            snippet: text::snippet(&text, query),
            relevance,
        })
    }

    async fn body(&self, page: &SearchPage) -> Result<Arc<str>, Arc<FragmentError>> {
        let source = Arc::clone(&self.source);
        self.pages
            .try_get_with(page.url, async move {
                source.fetch(page.document).await.map(Arc::from)
            })
            .await
    }

    /// Drop cached page bodies.
    pub fn invalidate(&self) {
        self.pages.invalidate_all();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::fragments::fakes::MemorySource;

    fn engine(source: MemorySource) -> (SearchEngine, Arc<MemorySource>) {
        let source = Arc::new(source);
        (SearchEngine::new(source.clone()), source)
    }

    #[tokio::test]
    async fn test_short_query_never_fetches() {
        let (engine, source) = engine(MemorySource::default());
        assert!(engine.search(" b ").await.is_empty());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ranked_by_match_count() {
        let (engine, _) = engine(
            MemorySource::default()
                .with("docs/faq.html", "<h1>FAQ</h1><p>Is BLADE free? Yes.</p>")
                .with("blade.html", "<h1>BLADE</h1><p>blade blade blade</p>")
                .with(
                    "docs/syntax.html",
                    "<nav>blade blade blade blade blade</nav><p>Nothing here</p>",
                ),
        );

        let results = engine.search("Blade").await;

        let urls: Vec<_> = results.hits.iter().map(|h| h.url).collect();
        assert_eq!(urls, ["/blade", "/docs/faq"]);
        assert_eq!(results.hits[0].relevance, 4);
        assert_eq!(results.hits[0].title_html, r#"<span class="highlight">BLADE</span>"#);
    }

    #[tokio::test]
    async fn test_missing_pages_are_skipped_and_bodies_cached() {
        let (engine, source) =
            engine(MemorySource::default().with("releases.html", "<p>Release 1.2 notes</p>"));

        let first = engine.search("notes").await;
        let fetched = source.fetches.load(Ordering::SeqCst);
        assert_eq!(first.hits.len(), 1);
        assert_eq!(fetched, PAGES.len());

        engine.search("release").await;
        // Only the failed pages are fetched again.
        assert_eq!(source.fetches.load(Ordering::SeqCst), fetched + PAGES.len() - 1);
    }

    #[tokio::test]
    async fn test_empty_message_escapes_query() {
        let (engine, _) = engine(MemorySource::default());
        let results = engine.search("<b>").await;
        assert!(results.is_empty());
        assert_eq!(results.empty_message(), "No results found for \"&lt;b&gt;\"");
    }
}

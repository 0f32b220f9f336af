//! Offline search over a content directory.

use std::path::PathBuf;
use std::sync::Arc;

use tyxar_site::fragments::DirectorySource;
use tyxar_site::search::SearchEngine;

/// Run the site search against local fragments.
pub async fn run(query: &str, content_dir: PathBuf) {
    let engine = SearchEngine::new(Arc::new(DirectorySource::new(content_dir)));
    let results = engine.search(query).await;

    if results.is_empty() {
        tracing::info!("No results found for \"{}\"", query.trim());
        return;
    }
    for hit in &results.hits {
        tracing::info!("{:>3}  {:<28} {}", hit.relevance, hit.title, hit.url);
    }
}

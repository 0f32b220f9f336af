//! Integration tests for in-page search.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use tyxar_integration_tests::{client, htmx_get, url};

#[tokio::test]
#[ignore = "Requires running site"]
async fn test_search_page_lists_hits() {
    let resp = client().get(url("/search?q=tyxar")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains(r#"class="highlight""#));
}

#[tokio::test]
#[ignore = "Requires running site"]
async fn test_short_query_returns_empty_list() {
    let resp = htmx_get(&client(), "/search/suggest?q=t").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!resp.text().await.unwrap().contains("<li"));
}

#[tokio::test]
#[ignore = "Requires running site"]
async fn test_superseded_suggestion_is_not_swapped() {
    let client = client();
    // Same cookie jar, so both requests belong to one visitor
    let first = htmx_get(&client, "/search/suggest?q=tyx").send();
    let second = htmx_get(&client, "/search/suggest?q=tyxar").send();
    let (first, second) = tokio::join!(first, second);

    let statuses = [first.unwrap().status(), second.unwrap().status()];
    assert!(statuses.contains(&StatusCode::OK));
}

#[tokio::test]
#[ignore = "Requires running site"]
async fn test_enter_opens_first_result() {
    let resp = htmx_get(&client(), "/search/select?q=tyxar&key=Enter&index=0")
        .send()
        .await
        .unwrap();
    assert!(resp.headers().contains_key("hx-location"));
}

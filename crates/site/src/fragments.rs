//! Shared HTML fragments and the containers they are loaded into.
//!
//! A page is a [`Document`]: named containers (`header`, `footer`,
//! `sidebar`, `content`) each holding markup. Fragments come from a
//! [`FragmentSource`], either the content directory on disk or a remote static
//! host. After every successful injection the document's `data-page` links are
//! wired for content swapping again.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::{Captures, Regex};
use thiserror::Error;
use tracing::instrument;

use tyxar_core::PageTarget;

/// Container ids.
pub mod containers {
    pub const HEADER: &str = "header";
    pub const FOOTER: &str = "footer";
    pub const SIDEBAR: &str = "sidebar";
    pub const CONTENT: &str = "content";
}

/// Fragment paths, relative to the content root.
pub const HEADER_PATH: &str = "header.html";
pub const FOOTER_PATH: &str = "footer.html";
pub const DOCS_SIDEBAR_PATH: &str = "docs/sidebar.html";
pub const PROFILE_SIDEBAR_PATH: &str = "profile/sidebar.html";

/// Shown in the docs sidebar when it cannot be fetched.
pub const SIDEBAR_FAILED: &str = "Sidebar failed to load";

/// Query parameter carrying the element to scroll to after a swap.
pub const ANCHOR_PARAM: &str = "anchor";

#[derive(Debug, Error)]
pub enum FragmentError {
    #[error("invalid fragment path: {0}")]
    InvalidPath(String),

    #[error("fragment not found: {0}")]
    NotFound(String),

    #[error("fragment {path} returned status {status}")]
    Status { path: String, status: u16 },

    #[error("failed to read fragment: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to fetch fragment: {0}")]
    Http(#[from] reqwest::Error),
}

/// Where fragments are fetched from.
#[async_trait]
pub trait FragmentSource: Send + Sync {
    /// Fetch a fragment as text. Non-OK responses are errors.
    async fn fetch(&self, path: &str) -> Result<String, FragmentError>;
}

/// Reject anything that could leave the content root.
fn relative_path(path: &str) -> Result<PathBuf, FragmentError> {
    let relative = Path::new(path.trim_start_matches('/'));
    if relative.as_os_str().is_empty()
        || relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(FragmentError::InvalidPath(path.to_string()));
    }
    Ok(relative.to_path_buf())
}

/// Fragments read from the content directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl FragmentSource for DirectorySource {
    async fn fetch(&self, path: &str) -> Result<String, FragmentError> {
        let full = self.root.join(relative_path(path)?);
        match tokio::fs::read_to_string(&full).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FragmentError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Fragments fetched from a remote static host.
#[derive(Debug, Clone)]
pub struct HttpSource {
    http: reqwest::Client,
    base: url::Url,
}

impl HttpSource {
    #[must_use]
    pub fn new(http: reqwest::Client, base: url::Url) -> Self {
        Self { http, base }
    }
}

#[async_trait]
impl FragmentSource for HttpSource {
    async fn fetch(&self, path: &str) -> Result<String, FragmentError> {
        let relative = relative_path(path)?;
        let url = self
            .base
            .join(&relative.to_string_lossy())
            .map_err(|_| FragmentError::InvalidPath(path.to_string()))?;

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FragmentError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(FragmentError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

/// What a container shows when its fragment fails to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Leave whatever the container held.
    KeepExisting,
    /// Replace the markup with this message.
    InlineError(&'static str),
}

/// Named containers and their markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    containers: BTreeMap<String, String>,
}

impl Document {
    /// Document with the given empty containers.
    #[must_use]
    pub fn with_containers(ids: &[&str]) -> Self {
        Self {
            containers: ids
                .iter()
                .map(|id| ((*id).to_string(), String::new()))
                .collect(),
        }
    }

    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.containers.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&str> {
        self.containers.get(id).map(String::as_str)
    }

    /// Markup of a container, or empty when the document lacks it.
    #[must_use]
    pub fn markup(&self, id: &str) -> &str {
        self.get(id).unwrap_or_default()
    }

    /// Replace a container's markup. Returns `false` if there is no such container.
    pub fn set(&mut self, id: &str, html: impl Into<String>) -> bool {
        match self.containers.get_mut(id) {
            Some(slot) => {
                *slot = html.into();
                true
            }
            None => false,
        }
    }

    /// Wire `data-page` links in every container.
    pub fn delegate_links(&mut self) {
        for html in self.containers.values_mut() {
            *html = delegate_links(html);
        }
    }

    /// Apply a fetch result to a container under the given policy.
    fn apply(
        &mut self,
        id: &str,
        path: &str,
        result: Result<String, FragmentError>,
        policy: FailurePolicy,
    ) -> Result<(), FragmentError> {
        match result {
            Ok(html) => {
                self.set(id, html);
                self.delegate_links();
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, path, container = id, "Failed to load fragment");
                if let FailurePolicy::InlineError(message) = policy {
                    self.set(id, message);
                }
                Err(e)
            }
        }
    }
}

/// Fetch `path` into container `id`.
///
/// # Errors
///
/// Returns the fetch error after applying `policy`; the container is never
/// left half-loaded.
#[instrument(skip(source, document))]
pub async fn load_into(
    source: &dyn FragmentSource,
    document: &mut Document,
    path: &str,
    id: &str,
    policy: FailurePolicy,
) -> Result<(), FragmentError> {
    let result = source.fetch(path).await;
    document.apply(id, path, result, policy)
}

/// Which sidebar a page carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chrome {
    /// Header and footer only.
    Site,
    /// Plus the docs sidebar.
    Docs,
    /// Plus the profile sidebar.
    Profile,
}

impl Chrome {
    #[must_use]
    pub const fn sidebar(self) -> Option<(&'static str, FailurePolicy)> {
        match self {
            Self::Site => None,
            Self::Docs => Some((DOCS_SIDEBAR_PATH, FailurePolicy::InlineError(SIDEBAR_FAILED))),
            Self::Profile => Some((PROFILE_SIDEBAR_PATH, FailurePolicy::KeepExisting)),
        }
    }
}

/// Load header, footer and (if any) sidebar concurrently.
///
/// Failures are logged and handled per container; the page still renders.
pub async fn load_chrome(source: &dyn FragmentSource, document: &mut Document, chrome: Chrome) {
    let sidebar = chrome.sidebar();
    let (header, footer, sidebar_html) = tokio::join!(
        source.fetch(HEADER_PATH),
        source.fetch(FOOTER_PATH),
        async {
            match sidebar {
                Some((path, _)) => Some(source.fetch(path).await),
                None => None,
            }
        }
    );

    let _ = document.apply(containers::HEADER, HEADER_PATH, header, FailurePolicy::KeepExisting);
    let _ = document.apply(containers::FOOTER, FOOTER_PATH, footer, FailurePolicy::KeepExisting);
    if let (Some((path, policy)), Some(result)) = (sidebar, sidebar_html) {
        let _ = document.apply(containers::SIDEBAR, path, result, policy);
    }
}

/// Site URL serving a page: leading slash, no `.html`, no trailing `index`.
#[must_use]
pub fn site_url(target: &PageTarget) -> String {
    let path = target.path().trim_start_matches('/');
    let path = path.strip_suffix(".html").unwrap_or(path);
    let path = if path == "index" {
        ""
    } else {
        path.strip_suffix("/index").unwrap_or(path)
    };
    format!("/{path}")
}

static ANCHOR_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a\b[^>]*>").expect("Invalid regex"));
static DATA_PAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bdata-page\s*=\s*"([^"]*)""#).expect("Invalid regex"));
static PRE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<pre\b([^>]*)>(.*?)</pre>").expect("Invalid regex"));
static BIND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)(<[a-zA-Z][a-zA-Z0-9]*\b[^>]*\bdata-bind="([\w-]+)"[^>]*>)[^<]*(</[a-zA-Z][a-zA-Z0-9]*>)"#)
        .expect("Invalid regex")
});
static CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bclass\s*=\s*"([^"]*)""#).expect("Invalid regex"));

/// Give every on-site `data-page` link HTMX swap attributes.
///
/// Links that already carry `hx-get`, and links to other sites, are left
/// alone, so running this again changes nothing.
#[must_use]
pub fn delegate_links(html: &str) -> String {
    ANCHOR_TAG_RE
        .replace_all(html, |caps: &Captures<'_>| {
            let tag = &caps[0];
            if tag.contains("hx-get") {
                return tag.to_string();
            }
            let Some(target) = DATA_PAGE_RE
                .captures(tag)
                .and_then(|c| c.get(1))
                .and_then(|value| PageTarget::resolve(value.as_str()))
            else {
                return tag.to_string();
            };
            if target.is_absolute() {
                return tag.to_string();
            }

            let url = site_url(&target);
            let get = target.fragment().map_or_else(
                || url.clone(),
                |anchor| format!("{url}?{ANCHOR_PARAM}={}", urlencoding::encode(anchor)),
            );
            let push = target
                .fragment()
                .map_or_else(|| url.clone(), |anchor| format!("{url}#{anchor}"));

            let body = tag.strip_suffix('>').unwrap_or(tag);
            format!(
                r##"{body} hx-get="{get}" hx-target="#{}" hx-push-url="{push}">"##,
                containers::CONTENT
            )
        })
        .into_owned()
}

/// Move the `active` class onto the link whose `data-page` resolves to `target`.
#[must_use]
pub fn mark_active(html: &str, target: &PageTarget) -> String {
    ANCHOR_TAG_RE
        .replace_all(html, |caps: &Captures<'_>| {
            let tag = &caps[0];
            let Some(page) = DATA_PAGE_RE.captures(tag).and_then(|c| c.get(1)) else {
                return tag.to_string();
            };
            let active = PageTarget::resolve(page.as_str())
                .is_some_and(|link| link.path() == target.path());
            set_class(tag, "active", active)
        })
        .into_owned()
}

fn set_class(tag: &str, class: &str, on: bool) -> String {
    if let Some(caps) = CLASS_RE.captures(tag) {
        let existing = caps.get(1).map_or("", |m| m.as_str());
        let mut classes: Vec<&str> = existing
            .split_whitespace()
            .filter(|c| *c != class)
            .collect();
        if on {
            classes.push(class);
        }
        let replacement = format!(r#"class="{}""#, classes.join(" "));
        CLASS_RE.replace(tag, replacement.as_str()).into_owned()
    } else if on {
        let body = tag.strip_suffix('>').unwrap_or(tag);
        format!(r#"{body} class="{class}">"#)
    } else {
        tag.to_string()
    }
}

/// Wrap each `<pre>` block once in a `pre-wrapper` with a copy button.
#[must_use]
pub fn add_copy_buttons(html: &str) -> String {
    PRE_RE
        .replace_all(html, |caps: &Captures<'_>| {
            let attrs = &caps[1];
            if attrs.contains("data-copy") {
                return caps[0].to_string();
            }
            format!(
                r#"<div class="pre-wrapper"><button type="button" class="copy-button" aria-label="Copy code">Copy</button><pre data-copy{attrs}>{}</pre></div>"#,
                &caps[2]
            )
        })
        .into_owned()
}

/// Fill `data-bind="name"` elements with escaped values.
#[must_use]
pub fn bind_text(html: &str, values: &[(&str, &str)]) -> String {
    BIND_RE
        .replace_all(html, |caps: &Captures<'_>| {
            let name = &caps[2];
            values.iter().find(|(key, _)| *key == name).map_or_else(
                || caps[0].to_string(),
                |(_, value)| format!("{}{}{}", &caps[1], escape_html(value), &caps[3]),
            )
        })
        .into_owned()
}

/// Escape text for inclusion in HTML.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

/// In-memory source for tests.
#[cfg(test)]
pub mod fakes {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    pub struct MemorySource {
        pages: Mutex<HashMap<String, String>>,
        pub fetches: AtomicUsize,
    }

    impl MemorySource {
        #[must_use]
        pub fn with(self, path: &str, html: &str) -> Self {
            self.pages
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(path.trim_start_matches('/').to_string(), html.to_string());
            self
        }
    }

    #[async_trait]
    impl FragmentSource for MemorySource {
        async fn fetch(&self, path: &str) -> Result<String, FragmentError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.pages
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .get(path.trim_start_matches('/'))
                .cloned()
                .ok_or_else(|| FragmentError::NotFound(path.to_string()))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::fakes::MemorySource;
    use super::*;

    #[test]
    fn test_delegate_links() {
        let html = r#"<nav><a href="/docs/cli" data-page="cli">CLI</a> <a data-page="https://github.com/tyxar">GitHub</a></nav>"#;
        let wired = delegate_links(html);
        assert!(wired.contains(
            r##"<a href="/docs/cli" data-page="cli" hx-get="/docs/cli" hx-target="#content" hx-push-url="/docs/cli">"##
        ));
        assert!(wired.contains(r#"<a data-page="https://github.com/tyxar">"#));
        assert_eq!(delegate_links(&wired), wired);
    }

    #[test]
    fn test_delegate_links_with_anchor() {
        let wired = delegate_links(r#"<a data-page="syntax#loops">Loops</a>"#);
        assert!(wired.contains(r#"hx-get="/docs/syntax?anchor=loops""#));
        assert!(wired.contains(r#"hx-push-url="/docs/syntax#loops""#));

        let wired = delegate_links(r#"<a data-page="releases.html">Releases</a>"#);
        assert!(wired.contains(r#"hx-get="/releases""#));

        let wired = delegate_links(r#"<a data-page="docs/index.html">Docs</a>"#);
        assert!(wired.contains(r#"hx-get="/docs""#));
        let wired = delegate_links(r#"<a data-page="/index.html">Home</a>"#);
        assert!(wired.contains(r#"hx-get="/""#));
    }

    #[test]
    fn test_mark_active_moves_class() {
        let html = r#"<a class="sidebar-link active" data-page="faq">FAQ</a><a data-page="cli">CLI</a>"#;
        let target = PageTarget::resolve("cli").unwrap();
        assert_eq!(
            mark_active(html, &target),
            r#"<a class="sidebar-link" data-page="faq">FAQ</a><a data-page="cli" class="active">CLI</a>"#
        );
    }

    #[test]
    fn test_copy_buttons_wrap_once() {
        let html = "<p>x</p><pre><code>tyxar run</code></pre>";
        let once = add_copy_buttons(html);
        assert_eq!(once.matches("pre-wrapper").count(), 1);
        assert!(once.contains("<code>tyxar run</code>"));
        assert_eq!(add_copy_buttons(&once), once);
    }

    #[test]
    fn test_bind_text_escapes() {
        let html = r#"<span data-bind="accountName">Loading</span> <b data-bind="other">-</b>"#;
        let bound = bind_text(html, &[("accountName", "Ada <3")]);
        assert_eq!(
            bound,
            r#"<span data-bind="accountName">Ada &lt;3</span> <b data-bind="other">-</b>"#
        );
    }

    #[test]
    fn test_relative_path_rejects_escapes() {
        assert!(relative_path("../secrets.txt").is_err());
        assert!(relative_path("docs/../../etc/passwd").is_err());
        assert!(relative_path("").is_err());
        assert_eq!(
            relative_path("/docs/faq.html").unwrap(),
            PathBuf::from("docs/faq.html")
        );
    }

    #[tokio::test]
    async fn test_failed_load_keeps_or_reports() {
        let source = MemorySource::default().with("header.html", "<header>Tyxar</header>");
        let mut doc = Document::with_containers(&[containers::HEADER, containers::SIDEBAR]);
        doc.set(containers::SIDEBAR, "<p>old</p>");

        assert!(
            load_into(&source, &mut doc, "nope.html", containers::SIDEBAR, FailurePolicy::KeepExisting)
                .await
                .is_err()
        );
        assert_eq!(doc.markup(containers::SIDEBAR), "<p>old</p>");

        let _ = load_into(
            &source,
            &mut doc,
            "nope.html",
            containers::SIDEBAR,
            FailurePolicy::InlineError(SIDEBAR_FAILED),
        )
        .await;
        assert_eq!(doc.markup(containers::SIDEBAR), SIDEBAR_FAILED);
    }

    #[tokio::test]
    async fn test_sidebar_links_wired_after_chrome_load() {
        let source = MemorySource::default()
            .with("header.html", r#"<a data-page="/about">About</a>"#)
            .with("footer.html", "<footer></footer>")
            .with("docs/sidebar.html", r#"<a data-page="faq">FAQ</a>"#);
        let mut doc = Document::with_containers(&[
            containers::HEADER,
            containers::FOOTER,
            containers::SIDEBAR,
            containers::CONTENT,
        ]);

        load_chrome(&source, &mut doc, Chrome::Docs).await;

        assert!(doc.markup(containers::SIDEBAR).contains(r#"hx-get="/docs/faq""#));
        assert!(doc.markup(containers::HEADER).contains(r#"hx-get="/about""#));
    }

    #[tokio::test]
    async fn test_missing_docs_sidebar_shows_message() {
        let source = MemorySource::default().with("header.html", "<header></header>");
        let mut doc = Document::with_containers(&[
            containers::HEADER,
            containers::FOOTER,
            containers::SIDEBAR,
        ]);
        doc.set(containers::FOOTER, "<footer>fallback</footer>");

        load_chrome(&source, &mut doc, Chrome::Docs).await;

        assert_eq!(doc.markup(containers::SIDEBAR), SIDEBAR_FAILED);
        assert_eq!(doc.markup(containers::FOOTER), "<footer>fallback</footer>");
    }

    #[tokio::test]
    async fn test_directory_source_reads_files() {
        let root = std::env::temp_dir().join(format!("tyxar-fragments-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(root.join("docs")).await.unwrap();
        tokio::fs::write(root.join("docs/faq.html"), "<h1>FAQ</h1>").await.unwrap();

        let source = DirectorySource::new(&root);
        assert_eq!(source.fetch("/docs/faq.html").await.unwrap(), "<h1>FAQ</h1>");
        assert!(matches!(
            source.fetch("docs/missing.html").await,
            Err(FragmentError::NotFound(_))
        ));

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}

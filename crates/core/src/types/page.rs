//! Page addressing for `data-page` links.
//!
//! A link's `data-page` value is one of:
//! - an absolute URL (`https://…`),
//! - a root-relative path (`/docs/cli`),
//! - a path already naming a document (`releases.html`),
//! - a bare page name (`syntax`), which lives under [`DOCS_PREFIX`].
//!
//! An optional `#fragment` names an element to scroll to after the swap.

use std::fmt;

/// Directory prefix applied to bare page names.
pub const DOCS_PREFIX: &str = "docs/";

/// Extension of fetchable documents.
const DOCUMENT_EXTENSION: &str = ".html";

/// A resolved `data-page` target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageTarget {
    path: String,
    fragment: Option<String>,
}

impl PageTarget {
    /// Resolve a `data-page` attribute value. Returns `None` for blank values.
    ///
    /// ```
    /// use tyxar_core::PageTarget;
    ///
    /// let target = PageTarget::resolve("syntax#loops").unwrap();
    /// assert_eq!(target.path(), "docs/syntax");
    /// assert_eq!(target.fragment(), Some("loops"));
    /// assert_eq!(target.document_path(), "docs/syntax.html");
    ///
    /// let rooted = PageTarget::resolve("/releases").unwrap();
    /// assert_eq!(rooted.path(), "/releases");
    /// ```
    #[must_use]
    pub fn resolve(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        let full = if value.starts_with("http")
            || value.starts_with('/')
            || value.contains(DOCUMENT_EXTENSION)
        {
            value.to_owned()
        } else {
            format!("{DOCS_PREFIX}{value}")
        };

        let (path, fragment) = match full.split_once('#') {
            Some((path, hash)) => (
                path.to_owned(),
                Some(hash.to_owned()).filter(|h| !h.is_empty()),
            ),
            None => (full, None),
        };

        Some(Self { path, fragment })
    }

    /// Path without the fragment.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Element id to scroll to after the content swap.
    #[must_use]
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Whether the target points off-site.
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.path.starts_with("http")
    }

    /// Path of the document to fetch, always ending in `.html`.
    #[must_use]
    pub fn document_path(&self) -> String {
        if self.path.ends_with(DOCUMENT_EXTENSION) {
            self.path.clone()
        } else {
            format!("{}{DOCUMENT_EXTENSION}", self.path)
        }
    }

    /// URL for full-page navigation, fragment included.
    #[must_use]
    pub fn url(&self) -> String {
        match &self.fragment {
            Some(hash) => format!("{}#{hash}", self.path),
            None => self.path.clone(),
        }
    }

    /// Page name recorded in history state: the path with the leading slash,
    /// docs prefix and document extension removed.
    #[must_use]
    pub fn page_name(&self) -> &str {
        let name = self.path.trim_start_matches('/');
        let name = name.strip_prefix(DOCS_PREFIX).unwrap_or(name);
        name.strip_suffix(DOCUMENT_EXTENSION).unwrap_or(name)
    }
}

impl fmt::Display for PageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_name_gets_docs_prefix() {
        let target = PageTarget::resolve("get-started").unwrap();
        assert_eq!(target.path(), "docs/get-started");
        assert_eq!(target.fragment(), None);
        assert_eq!(target.url(), "docs/get-started");
        assert_eq!(target.page_name(), "get-started");
    }

    #[test]
    fn test_absolute_and_rooted_untouched() {
        let abs = PageTarget::resolve("https://tyxar.dev/docs/faq").unwrap();
        assert!(abs.is_absolute());
        assert_eq!(abs.path(), "https://tyxar.dev/docs/faq");

        let rooted = PageTarget::resolve("/docs/faq#install").unwrap();
        assert_eq!(rooted.path(), "/docs/faq");
        assert_eq!(rooted.fragment(), Some("install"));
        assert_eq!(rooted.document_path(), "/docs/faq.html");
        assert_eq!(rooted.page_name(), "faq");
    }

    #[test]
    fn test_document_paths_keep_extension() {
        let target = PageTarget::resolve("releases.html#v1").unwrap();
        assert_eq!(target.path(), "releases.html");
        assert_eq!(target.document_path(), "releases.html");
        assert_eq!(target.url(), "releases.html#v1");
    }

    #[test]
    fn test_blank_and_empty_fragment() {
        assert!(PageTarget::resolve("   ").is_none());
        let target = PageTarget::resolve("syntax#").unwrap();
        assert_eq!(target.fragment(), None);
        assert_eq!(target.url(), "docs/syntax");
    }
}

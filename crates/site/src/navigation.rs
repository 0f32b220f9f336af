//! Content router: swaps documents into the content container.
//!
//! HTMX requests land here with the `data-page` target already resolved to a
//! site URL; full page loads go through the same path so a direct visit and a
//! swapped one render identical content.

use std::time::Duration;

use serde_json::json;
use tracing::instrument;

use tyxar_core::PageTarget;

use crate::fragments::{
    Document, FragmentSource, add_copy_buttons, containers, delegate_links, mark_active, site_url,
};

/// Placeholder while the document is fetched.
pub const LOADING: &str = r#"<div class="content-wrapper"><h1>Loading...</h1></div>"#;
/// Shown when the document cannot be fetched.
pub const NOT_FOUND: &str =
    r#"<div class="content-wrapper"><h1>Error</h1><p>Page not found.</p></div>"#;

/// Opacity transition around the swap.
pub const TRANSITION: Duration = Duration::from_millis(150);
/// Delay before scrolling to a fragment id.
pub const SCROLL_DELAY: Duration = Duration::from_millis(100);

/// Client event fired after a swap, carrying the scroll instruction.
pub const SWAPPED_EVENT: &str = "tyxar:swapped";

/// Where to scroll after the swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scroll {
    Top,
    Element(String),
}

/// A completed content swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Swap {
    pub target: PageTarget,
    pub scroll: Scroll,
    /// `false` when the error markup was swapped in.
    pub found: bool,
}

impl Swap {
    /// Value for `HX-Reswap`.
    #[must_use]
    pub fn reswap(&self) -> String {
        format!("innerHTML swap:{}ms", TRANSITION.as_millis())
    }

    /// Value for `HX-Trigger-After-Swap`.
    #[must_use]
    pub fn trigger(&self) -> String {
        let detail = match &self.scroll {
            Scroll::Top => json!({ "scroll": "top" }),
            Scroll::Element(id) => json!({
                "scroll": id,
                "delay": u64::try_from(SCROLL_DELAY.as_millis()).unwrap_or(100),
            }),
        };
        json!({ SWAPPED_EVENT: detail }).to_string()
    }

    /// URL pushed onto history.
    #[must_use]
    pub fn push_url(&self) -> String {
        let url = site_url(&self.target);
        match self.target.fragment() {
            Some(anchor) => format!("{url}#{anchor}"),
            None => url,
        }
    }
}

/// Outcome of activating a `data-page` link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Swapped(Swap),
    /// The page has no content container (or the target is off-site):
    /// the browser must load the URL itself.
    FullNavigation(String),
}

/// Routes `data-page` targets into a document's content container.
pub struct ContentRouter<'a> {
    source: &'a dyn FragmentSource,
}

impl<'a> ContentRouter<'a> {
    #[must_use]
    pub const fn new(source: &'a dyn FragmentSource) -> Self {
        Self { source }
    }

    /// Load `target` into the content container.
    #[instrument(skip(self, document), fields(page = %target))]
    pub async fn navigate(&self, document: &mut Document, target: &PageTarget) -> Navigation {
        if target.is_absolute() {
            return Navigation::FullNavigation(target.url());
        }
        if !document.has(containers::CONTENT) {
            tracing::debug!("No content container, falling back to full navigation");
            let url = site_url(target);
            return Navigation::FullNavigation(match target.fragment() {
                Some(anchor) => format!("{url}#{anchor}"),
                None => url,
            });
        }

        document.set(containers::CONTENT, LOADING);
        let found = match self.source.fetch(&target.document_path()).await {
            Ok(html) => {
                document.set(containers::CONTENT, delegate_links(&add_copy_buttons(&html)));
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load page");
                document.set(containers::CONTENT, NOT_FOUND);
                false
            }
        };

        if let Some(sidebar) = document.get(containers::SIDEBAR) {
            let marked = mark_active(sidebar, target);
            document.set(containers::SIDEBAR, marked);
        }

        Navigation::Swapped(Swap {
            target: target.clone(),
            scroll: target
                .fragment()
                .map_or(Scroll::Top, |id| Scroll::Element(id.to_string())),
            found,
        })
    }

    /// Load a static profile section into the content container.
    ///
    /// Returns `false` and shows the section error when the fragment is missing.
    #[instrument(skip(self, document))]
    pub async fn load_section(&self, document: &mut Document, section: ProfileSection) -> bool {
        match self.source.fetch(&section.document_path()).await {
            Ok(html) => {
                document.set(containers::CONTENT, delegate_links(&html));
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load profile section");
                document.set(containers::CONTENT, section_error(section.as_str()));
                false
            }
        }
    }
}

/// Markup shown when a profile section fails to load.
#[must_use]
pub fn section_error(page: &str) -> String {
    format!(
        r#"<div class="content-error"><h3>Error</h3><p>Could not load {} content.</p></div>"#,
        crate::fragments::escape_html(page)
    )
}

/// Dashboard sections reachable from the profile sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSection {
    Overview,
    Account,
    Settings,
    Activity,
    Security,
    Projects,
}

/// What a profile sidebar link does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionLink {
    Show(ProfileSection),
    Logout,
}

impl ProfileSection {
    pub const ALL: [Self; 6] = [
        Self::Overview,
        Self::Account,
        Self::Settings,
        Self::Activity,
        Self::Security,
        Self::Projects,
    ];

    /// Parse a sidebar link; unknown names show the overview.
    #[must_use]
    pub fn link(name: &str) -> SectionLink {
        if name == "logout" {
            return SectionLink::Logout;
        }
        SectionLink::Show(
            Self::ALL
                .into_iter()
                .find(|s| s.as_str() == name)
                .unwrap_or(Self::Overview),
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Account => "account",
            Self::Settings => "settings",
            Self::Activity => "activity",
            Self::Security => "security",
            Self::Projects => "projects",
        }
    }

    /// `profile/<section>.html`.
    #[must_use]
    pub fn document_path(self) -> String {
        format!("profile/{}.html", self.as_str())
    }

    /// Sections served as plain fragments; the rest are rendered from data.
    #[must_use]
    pub const fn is_static(self) -> bool {
        matches!(self, Self::Overview | Self::Account | Self::Activity)
    }
}

//! Text extraction, matching, and snippets.
//!
//! Matching is a case-insensitive substring test over characters; snippet
//! offsets are character offsets.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::fragments::escape_html;

/// Characters kept before the first match.
const SNIPPET_BEFORE: usize = 50;
/// Characters kept after the end of the first match.
const SNIPPET_AFTER: usize = 100;
/// Length of the fallback snippet when nothing matches.
const SNIPPET_FALLBACK: usize = 150;
const ELLIPSIS: &str = "...";

fn element_re(tag: &str) -> Regex {
    Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).expect("Invalid regex")
}

/// Elements whose text never counts toward a match.
static SKIPPED_ELEMENTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["script", "style", "nav", "header", "footer"]
        .into_iter()
        .map(element_re)
        .collect()
});
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("Invalid regex"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("Invalid regex"));
static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("Invalid regex")
});
static SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));

/// Visible text of a page: skipped elements removed, tags stripped, common
/// entities decoded, whitespace collapsed.
#[must_use]
pub fn extract_text(html: &str) -> String {
    let mut text = COMMENT_RE.replace_all(html, " ").into_owned();
    for re in SKIPPED_ELEMENTS.iter() {
        text = re.replace_all(&text, " ").into_owned();
    }
    let text = TAG_RE.replace_all(&text, " ");
    let text = ENTITY_RE.replace_all(&text, |caps: &Captures<'_>| {
        decode_entity(&caps[1]).map_or_else(|| caps[0].to_string(), String::from)
    });
    SPACE_RE.replace_all(&text, " ").trim().to_string()
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(dec) = name.strip_prefix('#') {
        return dec.parse::<u32>().ok().and_then(char::from_u32);
    }
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        "copy" => Some('©'),
        "mdash" => Some('—'),
        "ndash" => Some('–'),
        "hellip" => Some('…'),
        _ => None,
    }
}

/// One character, case-folded, so offsets stay aligned with the unfolded text.
fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn folded(text: &str) -> Vec<char> {
    text.chars().map(fold).collect()
}

/// Start offsets of non-overlapping matches.
fn match_starts(haystack: &[char], needle: &[char]) -> Vec<usize> {
    let mut starts = Vec::new();
    if needle.is_empty() || needle.len() > haystack.len() {
        return starts;
    }
    let mut i = 0;
    while i + needle.len() <= haystack.len() {
        if haystack.get(i..i + needle.len()) == Some(needle) {
            starts.push(i);
            i += needle.len();
        } else {
            i += 1;
        }
    }
    starts
}

/// Whether `text` contains `query`, ignoring case.
#[must_use]
pub fn contains(text: &str, query: &str) -> bool {
    count_matches(text, query) > 0
}

/// Case-insensitive occurrence count.
#[must_use]
pub fn count_matches(text: &str, query: &str) -> usize {
    match_starts(&folded(text), &folded(query)).len()
}

/// Escape `text` and wrap every match of `query` in `<span class="highlight">`.
#[must_use]
pub fn highlight(text: &str, query: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let needle = folded(query);
    let starts = match_starts(&folded(text), &needle);

    let mut out = String::with_capacity(text.len() + starts.len() * 32);
    let mut pos = 0;
    for start in starts {
        out.push_str(&escape_html(&collect(&chars, pos, start)));
        out.push_str(r#"<span class="highlight">"#);
        out.push_str(&escape_html(&collect(&chars, start, start + needle.len())));
        out.push_str("</span>");
        pos = start + needle.len();
    }
    out.push_str(&escape_html(&collect(&chars, pos, chars.len())));
    out
}

fn collect(chars: &[char], from: usize, to: usize) -> String {
    chars.get(from..to).map(|s| s.iter().collect()).unwrap_or_default()
}

/// Excerpt around the first match, highlighted, with `...` on cut sides.
///
/// Without a match, the first 150 characters followed by `...`.
#[must_use]
pub fn snippet(text: &str, query: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let needle = folded(query);
    let Some(&first) = match_starts(&folded(text), &needle).first() else {
        let head = collect(&chars, 0, SNIPPET_FALLBACK.min(chars.len()));
        return format!("{}{ELLIPSIS}", escape_html(&head));
    };

    let start = first.saturating_sub(SNIPPET_BEFORE);
    let end = (first + needle.len() + SNIPPET_AFTER).min(chars.len());
    let body = highlight(&collect(&chars, start, end), query);

    let mut out = String::with_capacity(body.len() + 2 * ELLIPSIS.len());
    if start > 0 {
        out.push_str(ELLIPSIS);
    }
    out.push_str(&body);
    if end < chars.len() {
        out.push_str(ELLIPSIS);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_drops_chrome_and_tags() {
        let html = r#"
            <header><a href="/">Tyxar</a></header>
            <nav>Docs FAQ</nav>
            <script>var secret = "quick";</script>
            <style>.x { color: red }</style>
            <main><h1>Get   started</h1><p>Install &amp; run <code>tyxar</code>&nbsp;now</p></main>
            <!-- hidden -->
            <footer>© Tyxar</footer>
        "#;
        assert_eq!(extract_text(html), "Get started Install & run tyxar now");
    }

    #[test]
    fn test_count_is_case_insensitive_and_non_overlapping() {
        assert_eq!(count_matches("Blade BLADE blade", "blade"), 3);
        assert_eq!(count_matches("aaaa", "aa"), 2);
        assert_eq!(count_matches("nothing here", "blade"), 0);
    }

    #[test]
    fn test_highlight_escapes_and_keeps_case() {
        assert_eq!(
            highlight("<Tyxar> and tyxar", "TYXAR"),
            r#"&lt;<span class="highlight">Tyxar</span>&gt; and <span class="highlight">tyxar</span>"#
        );
    }

    #[test]
    fn test_snippet_window() {
        let text = format!("{}the quick brown fox{}", "a".repeat(80), "z".repeat(200));
        let snip = snippet(&text, "brown");
        assert!(snip.starts_with("..."));
        assert!(snip.ends_with("..."));
        assert!(snip.contains(r#"<span class="highlight">brown</span>"#));

        let plain = snip
            .replace(r#"<span class="highlight">"#, "")
            .replace("</span>", "")
            .replace("...", "");
        assert_eq!(plain.chars().count(), 50 + "brown".len() + 100);
    }

    #[test]
    fn test_snippet_short_text_has_no_ellipsis() {
        assert_eq!(
            snippet("the quick brown fox", "brown"),
            r#"the quick <span class="highlight">brown</span> fox"#
        );
    }

    #[test]
    fn test_snippet_without_match() {
        let text = "x".repeat(200);
        let snip = snippet(&text, "brown");
        assert_eq!(snip.len(), 153);
        assert!(snip.ends_with("..."));
    }
}

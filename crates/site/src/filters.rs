//! Askama filters used by the page shell (`templates/pages/base.html`).

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

use chrono::Datelike;

/// Year for the footer copyright line: `{{ ""|current_year }}`.
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    Ok(chrono::Utc::now().year())
}

/// Cache-busting version of `static/css/main.css`, hashed by `build.rs`:
/// `main.css?v={{ ""|css_hash }}`.
#[askama::filter_fn]
pub fn css_hash(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(env!("CSS_HASH"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use askama::Template;

    use crate::filters;

    #[derive(Template)]
    #[template(source = r#"{{ ""|css_hash }} {{ ""|current_year }}"#, ext = "txt")]
    struct ShellFilters;

    #[test]
    fn test_shell_filters_render() {
        let rendered = ShellFilters.render().unwrap();
        let (hash, year) = rendered.split_once(' ').unwrap();
        assert_eq!(hash, env!("CSS_HASH"));
        assert!(year.parse::<i32>().unwrap() >= 2024);
    }
}

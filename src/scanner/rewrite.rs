//! Textual rewrites that make the vendor scan page embeddable.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static CSP_META: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*http-equiv\s*=\s*["']Content-Security-Policy["'][^>]*>"#).unwrap()
});

static BASE_HREF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<base[^>]*href\s*=").unwrap());

// `<head>` or `<head ...>`, never `<header>`.
static HEAD_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<head(\s[^>]*)?>").unwrap());

/// Remove every `<meta http-equiv="Content-Security-Policy">` tag.
pub fn strip_csp_meta(html: &str) -> Cow<'_, str> {
    CSP_META.replace_all(html, "")
}

/// Insert `<base href="{base}">` right after the first `<head>` unless the
/// document already declares a base href.
pub fn inject_base_href<'a>(html: &'a str, base: &str) -> Cow<'a, str> {
    if BASE_HREF.is_match(html) {
        return Cow::Borrowed(html);
    }
    HEAD_OPEN.replacen(html, 1, |caps: &Captures<'_>| {
        format!("{}<base href=\"{}\">", &caps[0], base)
    })
}

/// Both rewrites, in order.
pub fn rewrite_scan_page(html: &str, base: &str) -> String {
    let stripped = strip_csp_meta(html);
    inject_base_href(&stripped, base).into_owned()
}

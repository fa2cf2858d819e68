//! Vendor scan page URL construction and fetch.

use std::time::Duration;

use axum::http::header;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::scanner::ScannerError;

/// Characters left unescaped by JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Whether `org` stays one path segment once encoded.
///
/// `.` and `..` survive `encodeURIComponent` and are dot segments to URL
/// parsing, even in their `%2E` form, so they are refused outright.
pub fn is_single_segment(org: &str) -> bool {
    !matches!(org, "" | "." | "..")
}

/// `{origin}/en/{org}/scan?token={token}&system=metric`.
pub fn scan_page_url(origin: &Url, org: &str, token: &str) -> Result<Url, url::ParseError> {
    let raw = format!(
        "{}/en/{}/scan?token={}&system=metric",
        origin.as_str().trim_end_matches('/'),
        utf8_percent_encode(org, URI_COMPONENT),
        utf8_percent_encode(token, URI_COMPONENT),
    );
    Url::parse(&raw)
}

/// The `<base href>` value for pages served from `origin`.
pub fn base_href(origin: &Url) -> String {
    format!("{}/", origin.as_str().trim_end_matches('/'))
}

/// Fetches scan pages with a browser-like request.
#[derive(Debug, Clone)]
pub struct ScanPageClient {
    client: reqwest::Client,
}

impl ScanPageClient {
    pub fn new(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .no_proxy()
            .build()?;
        Ok(Self { client })
    }

    /// GET `url`, returning the body text of a successful response.
    pub async fn fetch(&self, url: Url, user_agent: &str) -> Result<String, ScannerError> {
        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, user_agent)
            .header(header::ACCEPT, ACCEPT_HTML)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScannerError::Upstream(status));
        }

        Ok(response.text().await?)
    }
}

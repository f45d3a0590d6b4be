//! Request view construction.
//!
//! # Responsibilities
//! - Split the raw URL into path and query arguments
//! - Flatten multi-valued headers into comma-joined strings
//! - Parse each `Cookie` header line into one name → value map
//!
//! # Design Decisions
//! - Query values are kept raw (no percent-decoding)
//! - Later duplicate cookies overwrite earlier ones
//! - The view is read-only once built and owned by a single dispatch

use std::collections::HashMap;

use axum::http::{header, HeaderMap, Method};

use crate::routing::PathParams;

/// Flat string map used for query arguments, headers and cookies.
pub type StringMap = HashMap<String, String>;

/// Normalized, read-only view of one incoming request.
#[derive(Debug, Clone)]
pub struct Request {
    /// The raw URL as received, including endpoint prefix and query.
    pub url: String,
    /// The path the route matched against, without endpoint or query.
    pub path: String,
    pub method: Method,
    pub path_parameters: PathParams,
    pub query_arguments: StringMap,
    /// Lowercase header names; repeated headers joined with `", "`.
    pub headers: StringMap,
    pub cookies: StringMap,
    pub body: String,
}

impl Request {
    /// Build the full view for a matched handler route.
    ///
    /// `scoped` is `url` with the endpoint prefix removed.
    pub fn build(
        method: Method,
        url: &str,
        scoped: &str,
        path_parameters: PathParams,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Self {
        let (path, query_arguments) = split_url(scoped);
        let path = if path.is_empty() { "/".to_string() } else { path };
        let cookies = cookies_from(headers);
        let headers = flatten_headers(headers);

        Self {
            url: url.to_string(),
            path,
            method,
            path_parameters,
            query_arguments,
            headers,
            cookies,
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }

    /// Build the reduced view used for static content.
    ///
    /// Carries no parameters, query arguments or body.
    pub fn for_static(method: Method, url: &str, headers: &HeaderMap) -> Self {
        let (path, _) = split_url(url);
        let cookies = cookies_from(headers);
        let headers = flatten_headers(headers);

        Self {
            url: url.to_string(),
            path,
            method,
            path_parameters: PathParams::new(),
            query_arguments: StringMap::new(),
            headers,
            cookies,
            body: String::new(),
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Split a URL on the first `?` into path and query arguments.
///
/// Everything after the first `?` is the query, so literal `?` inside
/// values survives. A key without `=` maps to an empty string.
pub fn split_url(url: &str) -> (String, StringMap) {
    match url.split_once('?') {
        Some((path, query)) => (path.to_string(), parse_query(query)),
        None => (url.to_string(), StringMap::new()),
    }
}

fn parse_query(query: &str) -> StringMap {
    query
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

/// Flatten headers to one string per name.
///
/// Values that are not valid UTF-8 are decoded lossily.
pub fn flatten_headers(headers: &HeaderMap) -> StringMap {
    let mut flat = StringMap::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        flat.insert(name.as_str().to_string(), joined);
    }
    flat
}

/// Collect cookies from every `Cookie` header line, in order.
///
/// Lines are parsed separately rather than through the comma-joined
/// header view; the last duplicate name wins.
pub fn cookies_from(headers: &HeaderMap) -> StringMap {
    let mut cookies = StringMap::new();
    for value in headers.get_all(header::COOKIE) {
        cookies.extend(parse_cookies(&String::from_utf8_lossy(value.as_bytes())));
    }
    cookies
}

/// Parse a `Cookie` header value. Tokens without a name are skipped.
pub fn parse_cookies(raw: &str) -> StringMap {
    let mut cookies = StringMap::new();
    for token in raw.split(';') {
        if let Some((key, value)) = token.split_once('=') {
            let key = key.trim();
            if !key.is_empty() {
                cookies.insert(key.to_string(), value.trim().to_string());
            }
        }
    }
    cookies
}

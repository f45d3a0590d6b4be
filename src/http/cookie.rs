//! `Set-Cookie` attribute options and formatting.

use chrono::{DateTime, Utc};

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Optional cookie attributes. All fields default to absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    pub expires: Option<DateTime<Utc>>,
    pub max_age: Option<i64>,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

/// Format one `Set-Cookie` header value.
///
/// Every attribute is followed by `;`, e.g. `a=b; Path=/; Secure;`.
pub fn format_set_cookie(key: &str, value: &str, options: &CookieOptions) -> String {
    let mut parts = vec![format!("{}={}", key, value)];

    if let Some(expires) = options.expires {
        parts.push(format!(
            "Expires={}",
            expires.format("%a, %d %b %Y %H:%M:%S GMT")
        ));
    }
    if let Some(max_age) = options.max_age {
        parts.push(format!("Max-Age={}", max_age));
    }
    if let Some(domain) = &options.domain {
        parts.push(format!("Domain={}", domain));
    }
    if let Some(path) = &options.path {
        parts.push(format!("Path={}", path));
    }
    if options.secure {
        parts.push("Secure".to_string());
    }
    if options.http_only {
        parts.push("HttpOnly".to_string());
    }
    if let Some(same_site) = options.same_site {
        if same_site == SameSite::None && !options.secure {
            tracing::warn!(
                cookie = %key,
                "SameSite=None requires the Secure attribute"
            );
        }
        parts.push(format!("SameSite={}", same_site.as_str()));
    }

    format!("{};", parts.join("; "))
}

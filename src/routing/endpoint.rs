//! Endpoint prefix under which handler routes live.

use crate::error::EndpointError;

/// Validated endpoint prefix. `/` means "no scoping".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(String);

impl Endpoint {
    /// Validate an endpoint: must start with `/` and, unless it is exactly
    /// `/`, must not end with `/`.
    pub fn parse(raw: &str) -> Result<Self, EndpointError> {
        if raw.is_empty() {
            return Err(EndpointError::Empty);
        }
        if !raw.starts_with('/') {
            return Err(EndpointError::MissingLeadingSlash(raw.to_string()));
        }
        if raw != "/" && raw.ends_with('/') {
            return Err(EndpointError::TrailingSlash(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Strip the endpoint from `url`, if `url` lies under it.
    ///
    /// Matching is by whole path segment, not by string prefix:
    /// `/api` scopes `/api`, `/api/x` and `/api?q` but not `/apiary`.
    pub fn strip<'a>(&self, url: &'a str) -> Option<&'a str> {
        if self.is_root() {
            return Some(url);
        }
        let rest = url.strip_prefix(self.0.as_str())?;
        (rest.is_empty() || rest.starts_with('/') || rest.starts_with('?')).then_some(rest)
    }

    /// Whether a static mount at `path` would shadow the endpoint.
    pub fn collides_with(&self, path: &str) -> bool {
        if self.is_root() {
            return false;
        }
        let endpoint = segments(&self.0);
        let candidate = segments(path);
        candidate.len() >= endpoint.len() && candidate[..endpoint.len()] == endpoint[..]
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::root()
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert!(Endpoint::parse("/").is_ok());
        assert!(Endpoint::parse("/api").is_ok());
        assert!(Endpoint::parse("/api/test").is_ok());
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(
            Endpoint::parse("api"),
            Err(EndpointError::MissingLeadingSlash("api".into()))
        );
        assert_eq!(
            Endpoint::parse("/api/"),
            Err(EndpointError::TrailingSlash("/api/".into()))
        );
        assert_eq!(Endpoint::parse(""), Err(EndpointError::Empty));
    }

    #[test]
    fn test_strip() {
        let endpoint = Endpoint::parse("/api").unwrap();
        assert_eq!(endpoint.strip("/api/users"), Some("/users"));
        assert_eq!(endpoint.strip("/api"), Some(""));
        assert_eq!(endpoint.strip("/api?x=1"), Some("?x=1"));
        assert_eq!(endpoint.strip("/apiary"), None);
        assert_eq!(endpoint.strip("/api-v2/users"), None);
        assert_eq!(endpoint.strip("/api/"), Some("/"));
        assert_eq!(endpoint.strip("/static/a"), None);

        assert_eq!(Endpoint::root().strip("/users"), Some("/users"));
    }

    #[test]
    fn test_collision_is_segment_based() {
        let endpoint = Endpoint::parse("/api").unwrap();
        assert!(endpoint.collides_with("/api"));
        assert!(endpoint.collides_with("/api/path"));
        assert!(endpoint.collides_with("api/path/"));
        assert!(!endpoint.collides_with("/apiary"));
        assert!(!endpoint.collides_with("/static"));
        assert!(!Endpoint::root().collides_with("/anything"));
    }
}

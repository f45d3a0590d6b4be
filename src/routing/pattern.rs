//! Path matching against route patterns.
//!
//! # Responsibilities
//! - Normalize request paths and patterns (leading `/`, no trailing `/`)
//! - Compile patterns into typed segments once, at registration
//! - Match a concrete path segment by segment and capture parameters
//!
//! # Segment Kinds
//! - `literal` must equal the request segment (case-sensitive)
//! - `:name` captures exactly one non-empty segment
//! - `*` as last segment matches exactly one trailing segment
//! - `**` as last segment matches one or more trailing segments
//!
//! # Design Decisions
//! - Pure: no knowledge of the route table or tie-breaking
//! - Duplicate parameter names are rejected at compile time, never at match time

use std::collections::HashMap;

use crate::error::RegistrationError;

/// Parameters captured from `:name` segments.
pub type PathParams = HashMap<String, String>;

/// A single compiled pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
    MultiWildcard,
}

impl Segment {
    fn classify(raw: &str) -> Self {
        match raw {
            "*" => Segment::Wildcard,
            "**" => Segment::MultiWildcard,
            _ => match raw.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(raw.to_string()),
            },
        }
    }
}

/// A route pattern compiled into segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Compile a pattern, rejecting repeated or empty parameter names.
    pub fn parse(pattern: &str) -> Result<Self, RegistrationError> {
        let source = normalize(pattern);
        let segments: Vec<Segment> = split(&source).map(Segment::classify).collect();

        let mut seen: Vec<&str> = Vec::new();
        for segment in &segments {
            if let Segment::Param(name) = segment {
                if name.is_empty() {
                    return Err(RegistrationError::EmptyParameterName {
                        pattern: pattern.to_string(),
                    });
                }
                if seen.contains(&name.as_str()) {
                    return Err(RegistrationError::DuplicateParameter {
                        pattern: pattern.to_string(),
                        name: name.clone(),
                    });
                }
                seen.push(name);
            }
        }

        Ok(Self { source, segments })
    }

    /// The normalized pattern text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Match a request path, returning captured parameters on success.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let normalized = normalize(path);
        let request: Vec<&str> = split(&normalized).collect();
        let mut params = PathParams::new();

        for (idx, segment) in self.segments.iter().enumerate() {
            let is_last = idx + 1 == self.segments.len();
            match segment {
                Segment::Wildcard => {
                    return (is_last && request.len() == idx + 1).then_some(params);
                }
                Segment::MultiWildcard => {
                    return (is_last && request.len() > idx).then_some(params);
                }
                Segment::Param(name) => match request.get(idx) {
                    Some(value) if !value.is_empty() => {
                        params.insert(name.clone(), (*value).to_string());
                    }
                    _ => return None,
                },
                Segment::Literal(literal) => {
                    if request.get(idx) != Some(&literal.as_str()) {
                        return None;
                    }
                }
            }
        }

        (request.len() == self.segments.len()).then_some(params)
    }
}

impl std::fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// Result of matching a path against an uncompiled pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMatch {
    pub matched: bool,
    pub parameters: PathParams,
}

/// Match `path` against the textual `pattern`.
///
/// Patterns that fail to compile never match.
pub fn match_path(path: &str, pattern: &str) -> PathMatch {
    match RoutePattern::parse(pattern).ok().and_then(|p| p.matches(path)) {
        Some(parameters) => PathMatch { matched: true, parameters },
        None => PathMatch::default(),
    }
}

/// Trim trailing slashes and force a leading one. All-slash or empty → `/`.
pub fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn split(normalized: &str) -> impl Iterator<Item = &str> {
    let rest = &normalized[1..];
    rest.split('/').filter(move |_| !rest.is_empty())
}

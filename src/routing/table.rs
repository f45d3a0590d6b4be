//! Route table.
//!
//! # Responsibilities
//! - Store handler, static-file and static-folder routes in insertion order
//! - Validate registrations (parameter names, endpoint collisions)
//! - Look up the first matching handler route, warning on ambiguity
//! - Look up the first matching static route
//!
//! # Design Decisions
//! - Append-only; built before traffic starts, read-only while serving
//! - Rejected registrations are logged and returned, never fatal
//! - First match wins; later matches are only reported

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::Method;

use crate::dispatch::middleware::{Handler, Middleware, MiddlewareChain};
use crate::error::RegistrationError;
use crate::routing::endpoint::Endpoint;
use crate::routing::pattern::{normalize, PathParams, RoutePattern};
use crate::static_files;

/// What a route serves and how it matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteKind {
    /// Endpoint-scoped route matched by pattern.
    Handler(RoutePattern),
    /// One file at an exact path.
    StaticFile { url: String, file: PathBuf },
    /// A folder below a path prefix.
    StaticFolder { prefix: String, folder: PathBuf },
}

/// A registered route. Immutable once added.
pub struct Route {
    pub method: Method,
    pub kind: RouteKind,
    pub middleware: MiddlewareChain,
    pub handler: Arc<dyn Handler>,
}

impl Route {
    /// The path or pattern this route was registered under.
    pub fn path(&self) -> &str {
        match &self.kind {
            RouteKind::Handler(pattern) => pattern.as_str(),
            RouteKind::StaticFile { url, .. } => url,
            RouteKind::StaticFolder { prefix, .. } => prefix,
        }
    }

    pub fn is_static(&self) -> bool {
        !matches!(self.kind, RouteKind::Handler(_))
    }

    fn matches_static(&self, path: &str) -> bool {
        match &self.kind {
            RouteKind::Handler(_) => false,
            RouteKind::StaticFile { url, .. } => normalize(path) == *url,
            RouteKind::StaticFolder { prefix, .. } => {
                let path = normalize(path);
                prefix == "/"
                    || path == *prefix
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("kind", &self.kind)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

/// Insertion-ordered route collection plus global middleware.
#[derive(Debug, Default)]
pub struct RouteTable {
    endpoint: Endpoint,
    routes: Vec<Route>,
    global_middleware: GlobalMiddleware,
}

#[derive(Default)]
struct GlobalMiddleware(MiddlewareChain);

impl std::fmt::Debug for GlobalMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} global middleware", self.0.len())
    }
}

impl RouteTable {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            routes: Vec::new(),
            global_middleware: GlobalMiddleware::default(),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn global_middleware(&self) -> &[Arc<dyn Middleware>] {
        &self.global_middleware.0
    }

    /// Append a middleware run before every handler route's own chain.
    pub fn add_global_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.global_middleware.0.push(middleware);
    }

    /// Register a handler route relative to the endpoint.
    pub fn add_route(
        &mut self,
        method: Method,
        pattern: &str,
        middleware: MiddlewareChain,
        handler: Arc<dyn Handler>,
    ) -> Result<(), RegistrationError> {
        let pattern = RoutePattern::parse(pattern).inspect_err(|e| {
            tracing::warn!(error = %e, "Route rejected");
        })?;

        tracing::debug!(method = %method, pattern = %pattern, "Route registered");
        self.routes.push(Route {
            method,
            kind: RouteKind::Handler(pattern),
            middleware,
            handler,
        });
        Ok(())
    }

    /// Serve `file` at exactly `url`, outside the endpoint.
    pub fn add_static_file(
        &mut self,
        url: &str,
        middleware: MiddlewareChain,
        file: impl Into<PathBuf>,
    ) -> Result<(), RegistrationError> {
        self.check_collision(url)?;
        let url = normalize(url);
        let file = file.into();

        tracing::debug!(url = %url, file = %file.display(), "Static file mounted");
        self.routes.push(Route {
            method: Method::GET,
            handler: static_files::file_handler(file.clone()),
            kind: RouteKind::StaticFile { url, file },
            middleware,
        });
        Ok(())
    }

    /// Serve the contents of `folder` below `prefix`, outside the endpoint.
    pub fn add_static_folder(
        &mut self,
        prefix: &str,
        middleware: MiddlewareChain,
        folder: impl Into<PathBuf>,
    ) -> Result<(), RegistrationError> {
        self.check_collision(prefix)?;
        let prefix = normalize(prefix);
        let folder = folder.into();

        tracing::debug!(prefix = %prefix, folder = %folder.display(), "Static folder mounted");
        self.routes.push(Route {
            method: Method::GET,
            handler: static_files::folder_handler(prefix.clone(), folder.clone()),
            kind: RouteKind::StaticFolder { prefix, folder },
            middleware,
        });
        Ok(())
    }

    fn check_collision(&self, path: &str) -> Result<(), RegistrationError> {
        if self.endpoint.collides_with(path) {
            let err = RegistrationError::EndpointCollision {
                path: path.to_string(),
                endpoint: self.endpoint.to_string(),
            };
            tracing::warn!(error = %err, "Static route rejected");
            return Err(err);
        }
        Ok(())
    }

    /// First handler route matching `method` and `path`.
    ///
    /// Every further match is logged as an ambiguity.
    pub fn find_handler_route(&self, method: &Method, path: &str) -> Option<(&Route, PathParams)> {
        let mut found: Option<(&Route, PathParams)> = None;

        for route in &self.routes {
            let RouteKind::Handler(pattern) = &route.kind else {
                continue;
            };
            if route.method != *method {
                continue;
            }
            let Some(params) = pattern.matches(path) else {
                continue;
            };

            match &found {
                Some((first, _)) => tracing::warn!(
                    path = %path,
                    matched = %first.path(),
                    also_matches = %pattern,
                    "Ambiguous route: path already matched, keeping first match"
                ),
                None => found = Some((route, params)),
            }
        }

        found
    }

    /// First static route serving `path`. Static routes answer GET and HEAD.
    pub fn find_static_route(&self, method: &Method, path: &str) -> Option<&Route> {
        if *method != Method::GET && *method != Method::HEAD {
            return None;
        }
        self.routes
            .iter()
            .filter(|route| route.is_static())
            .find(|route| route.matches_static(path))
    }
}

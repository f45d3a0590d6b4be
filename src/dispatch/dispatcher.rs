//! Request dispatcher.
//!
//! # Responsibilities
//! - Own the route table and expose the registration API
//! - Drive one request through endpoint check, routing, middleware and handler
//! - Guarantee exactly one response write per request
//!
//! # Data Flow
//! ```text
//! Incoming (method, url, headers, body)
//!     → ENDPOINT_CHECK (strip endpoint prefix)
//!     → ROUTING: first handler route (method + pattern)
//!         → read body, build Request view
//!         → global middleware → route middleware → handler
//!     → STATIC_ROUTING (unscoped urls, or endpoint `/`)
//!         → route middleware → static handler
//!     → nothing matched: 404
//! ```
//!
//! # Design Decisions
//! - Middleware runs strictly one at a time
//! - Failures and panics become 500; the client never sees a raw error
//! - A middleware that sends the response itself ends the chain silently

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::oneshot;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::HandlerConfig;
use crate::dispatch::data::Data;
use crate::dispatch::middleware::{
    handler_fn, middleware_fn, Handler, HandlerResult, Middleware, MiddlewareChain,
    MiddlewareResult, Next, Settlement,
};
use crate::error::{EndpointError, RegistrationError};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::transport::Transport;
use crate::routing::{normalize, Endpoint, Route, RouteTable};

/// Default cap on buffered request bodies (2 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Construction options for [`RequestHandler`].
#[derive(Debug, Clone)]
pub struct HandlerOptions {
    /// Prefix under which handler routes are matched.
    pub endpoint: String,
    pub max_body_bytes: usize,
    /// Upper bound on a single middleware step. `None` waits forever.
    pub middleware_timeout: Option<Duration>,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            endpoint: "/".to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            middleware_timeout: None,
        }
    }
}

impl From<&HandlerConfig> for HandlerOptions {
    fn from(config: &HandlerConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            max_body_bytes: config.max_body_bytes,
            middleware_timeout: config.middleware_timeout_ms.map(Duration::from_millis),
        }
    }
}

/// What the transport layer hands to the dispatcher.
///
/// `method` and `url` are optional so that malformed requests can be
/// represented; either one missing is answered with a 500.
#[derive(Debug, Default)]
pub struct Incoming {
    pub method: Option<Method>,
    pub url: Option<String>,
    pub headers: HeaderMap,
    pub body: Body,
}

impl Incoming {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method: Some(method),
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Take method, path-and-query, headers and body from an HTTP request.
    pub fn from_http(request: axum::http::Request<Body>) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: Some(parts.method),
            url: parts.uri.path_and_query().map(|pq| pq.as_str().to_string()),
            headers: parts.headers,
            body,
        }
    }
}

/// How a middleware step ended, from the dispatcher's point of view.
enum Step {
    Continue(Option<Data>),
    Stop,
}

/// Routes requests to registered handlers and static content.
#[derive(Debug)]
pub struct RequestHandler {
    table: RouteTable,
    max_body_bytes: usize,
    middleware_timeout: Option<Duration>,
}

impl RequestHandler {
    /// Create a handler. A malformed endpoint is fatal.
    pub fn new(options: HandlerOptions) -> Result<Self, EndpointError> {
        let endpoint = Endpoint::parse(&options.endpoint).inspect_err(|e| {
            tracing::error!(endpoint = %options.endpoint, error = %e, "Invalid endpoint");
        })?;

        tracing::info!(
            endpoint = %endpoint,
            max_body_bytes = options.max_body_bytes,
            middleware_timeout = ?options.middleware_timeout,
            "Request handler created"
        );

        Ok(Self {
            table: RouteTable::new(endpoint),
            max_body_bytes: options.max_body_bytes,
            middleware_timeout: options.middleware_timeout,
        })
    }

    pub fn from_config(config: &HandlerConfig) -> Result<Self, EndpointError> {
        Self::new(HandlerOptions::from(config))
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.table.endpoint()
    }

    pub fn routes(&self) -> &[Route] {
        self.table.routes()
    }

    /// Register an async closure for `method` and `pattern`.
    pub fn on<F, Fut>(
        &mut self,
        method: Method,
        pattern: &str,
        middleware: MiddlewareChain,
        handler: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(Arc<Request>, Response, Data) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.on_handler(method, pattern, middleware, handler_fn(handler))
    }

    pub fn on_handler(
        &mut self,
        method: Method,
        pattern: &str,
        middleware: MiddlewareChain,
        handler: Arc<dyn Handler>,
    ) -> Result<(), RegistrationError> {
        self.table.add_route(method, pattern, middleware, handler)
    }

    pub fn get<F, Fut>(&mut self, pattern: &str, middleware: MiddlewareChain, handler: F) -> Result<(), RegistrationError>
    where
        F: Fn(Arc<Request>, Response, Data) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.on(Method::GET, pattern, middleware, handler)
    }

    pub fn post<F, Fut>(&mut self, pattern: &str, middleware: MiddlewareChain, handler: F) -> Result<(), RegistrationError>
    where
        F: Fn(Arc<Request>, Response, Data) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.on(Method::POST, pattern, middleware, handler)
    }

    pub fn put<F, Fut>(&mut self, pattern: &str, middleware: MiddlewareChain, handler: F) -> Result<(), RegistrationError>
    where
        F: Fn(Arc<Request>, Response, Data) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.on(Method::PUT, pattern, middleware, handler)
    }

    pub fn delete<F, Fut>(&mut self, pattern: &str, middleware: MiddlewareChain, handler: F) -> Result<(), RegistrationError>
    where
        F: Fn(Arc<Request>, Response, Data) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.on(Method::DELETE, pattern, middleware, handler)
    }

    /// Serve one file at `url`. Rejected if `url` lies under the endpoint.
    pub fn mount_static_file(
        &mut self,
        url: &str,
        middleware: MiddlewareChain,
        file: impl Into<PathBuf>,
    ) -> Result<(), RegistrationError> {
        self.table.add_static_file(url, middleware, file)
    }

    /// Serve a folder below `prefix`. Rejected if `prefix` lies under the endpoint.
    pub fn mount_static_folder(
        &mut self,
        prefix: &str,
        middleware: MiddlewareChain,
        folder: impl Into<PathBuf>,
    ) -> Result<(), RegistrationError> {
        self.table.add_static_folder(prefix, middleware, folder)
    }

    /// Append an async closure to the global middleware chain.
    pub fn register_global_middleware<F, Fut>(&mut self, middleware: F)
    where
        F: Fn(Arc<Request>, Response, Data, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MiddlewareResult> + Send + 'static,
    {
        self.use_middleware(middleware_fn(middleware));
    }

    pub fn use_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.table.add_global_middleware(middleware);
    }

    /// Answer one request through `transport`.
    pub async fn dispatch(&self, incoming: Incoming, transport: impl Transport) {
        let response = Response::new(transport);

        let (Some(method), Some(url)) = (incoming.method, incoming.url) else {
            tracing::error!("Malformed request: missing method or url");
            response.error(500);
            return;
        };

        let span = tracing::info_span!(
            "dispatch",
            request_id = %Uuid::new_v4(),
            method = %method,
            url = %url,
        );
        self.route(method, url, incoming.headers, incoming.body, response)
            .instrument(span)
            .await;
    }

    async fn route(&self, method: Method, url: String, headers: HeaderMap, body: Body, response: Response) {
        tracing::debug!("Request received");
        let endpoint = self.table.endpoint();

        if let Some(scoped) = endpoint.strip(&url) {
            let path = scoped.split_once('?').map_or(scoped, |(path, _)| path);
            if let Some((route, params)) = self.table.find_handler_route(&method, &normalize(path)) {
                let body = match axum::body::to_bytes(body, self.max_body_bytes).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::error!(route = %route.path(), error = %e, "Failed to read request body");
                        response.error(500);
                        return;
                    }
                };
                let request = Arc::new(Request::build(method, &url, scoped, params, &headers, &body));
                self.run_route(route, self.table.global_middleware(), request, response).await;
                return;
            }
            if !endpoint.is_root() {
                tracing::debug!("No handler route matched");
                response.error(404);
                return;
            }
        }

        let path = url.split_once('?').map_or(url.as_str(), |(path, _)| path);
        match self.table.find_static_route(&method, path) {
            Some(route) => {
                let request = Arc::new(Request::for_static(method, &url, &headers));
                self.run_route(route, &[], request, response).await;
            }
            None => {
                tracing::debug!("No route matched");
                response.error(404);
            }
        }
    }

    /// Run `global`, then the route's own chain, then its handler.
    async fn run_route(
        &self,
        route: &Route,
        global: &[Arc<dyn Middleware>],
        request: Arc<Request>,
        response: Response,
    ) {
        let mut data = Data::new();

        for middleware in global.iter().chain(route.middleware.iter()) {
            match self.run_middleware(route, middleware, &request, &response, &data).await {
                Step::Continue(Some(partial)) => data.merge(partial),
                Step::Continue(None) => {}
                Step::Stop => return,
            }
        }

        run_handler(route, request, response, data).await;
    }

    async fn run_middleware(
        &self,
        route: &Route,
        middleware: &Arc<dyn Middleware>,
        request: &Arc<Request>,
        response: &Response,
        data: &Data,
    ) -> Step {
        let (next, settled) = Next::channel();
        response.set_send_observer(next.send_observer());

        let call = std::panic::catch_unwind(AssertUnwindSafe(|| {
            middleware.call(request.clone(), response.clone(), data.clone(), next)
        }));
        let outcome = match call {
            Ok(task) => {
                let waiting = wait_for_settlement(task, settled, response);
                match self.middleware_timeout {
                    Some(limit) => tokio::time::timeout(limit, waiting)
                        .await
                        .unwrap_or(Outcome::TimedOut),
                    None => waiting.await,
                }
            }
            Err(_) => Outcome::Failed("middleware panicked".to_string()),
        };
        response.clear_send_observer();

        match outcome {
            Outcome::Resolved(partial) => Step::Continue(partial),
            Outcome::Rejected(code) => {
                let code = code.unwrap_or(500);
                tracing::debug!(route = %route.path(), code, "Middleware rejected request");
                response.error(code);
                Step::Stop
            }
            Outcome::Sent => {
                tracing::debug!(route = %route.path(), "Middleware sent response, chain stopped");
                Step::Stop
            }
            Outcome::Failed(reason) => {
                tracing::error!(
                    route = %route.path(),
                    method = %route.method,
                    error = %reason,
                    "Middleware failed"
                );
                if !response.is_sent() {
                    response.error(500);
                }
                Step::Stop
            }
            Outcome::TimedOut => {
                tracing::error!(route = %route.path(), "Middleware timed out");
                if !response.is_sent() {
                    response.error(504);
                }
                Step::Stop
            }
        }
    }
}

enum Outcome {
    Resolved(Option<Data>),
    Rejected(Option<u16>),
    Sent,
    Failed(String),
    TimedOut,
}

type MiddlewareTask = futures_util::future::CatchUnwind<AssertUnwindSafe<BoxFuture<'static, MiddlewareResult>>>;

/// Wait until the middleware settles its `Next`, sends, or fails.
///
/// If the settlement arrives while the middleware body is still running,
/// the body keeps running in the background.
async fn wait_for_settlement(
    task: BoxFuture<'static, MiddlewareResult>,
    mut settled: oneshot::Receiver<Settlement>,
    response: &Response,
) -> Outcome {
    let mut task: MiddlewareTask = AssertUnwindSafe(task).catch_unwind();
    let mut task_done = false;

    loop {
        tokio::select! {
            biased;

            settlement = &mut settled => {
                let outcome = match settlement {
                    Ok(Settlement::Resolved(partial)) => Outcome::Resolved(partial),
                    Ok(Settlement::Rejected(code)) => Outcome::Rejected(code),
                    Ok(Settlement::Sent) => Outcome::Sent,
                    Ok(Settlement::Abandoned) | Err(_) => {
                        if !task_done {
                            if let Some(reason) = failure(task.await) {
                                return Outcome::Failed(reason);
                            }
                        }
                        return if response.is_sent() {
                            Outcome::Sent
                        } else {
                            Outcome::Failed("middleware dropped its continuation without settling".to_string())
                        };
                    }
                };
                if !task_done {
                    tokio::spawn(
                        async move {
                            if let Some(reason) = failure(task.await) {
                                tracing::warn!(error = %reason, "Middleware failed after settling");
                            }
                        }
                        .in_current_span(),
                    );
                }
                return outcome;
            }

            result = &mut task, if !task_done => {
                task_done = true;
                if let Some(reason) = failure(result) {
                    return Outcome::Failed(reason);
                }
            }
        }
    }
}

fn failure(result: Result<Result<(), crate::error::BoxError>, Box<dyn std::any::Any + Send>>) -> Option<String> {
    match result {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(panic) => Some(panic_message(&*panic)),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

async fn run_handler(route: &Route, request: Arc<Request>, response: Response, data: Data) {
    let call = std::panic::catch_unwind(AssertUnwindSafe(|| {
        route.handler.call(request, response.clone(), data)
    }));
    let result = match call {
        Ok(task) => failure(AssertUnwindSafe(task).catch_unwind().await),
        Err(panic) => Some(panic_message(&*panic)),
    };

    if let Some(reason) = result {
        tracing::error!(
            route = %route.path(),
            method = %route.method,
            error = %reason,
            "Handler failed"
        );
        if !response.is_sent() {
            response.error(500);
        }
    }
}

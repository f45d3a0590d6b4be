//! Middleware and handler contracts.
//!
//! # Middleware Protocol
//! ```text
//! dispatcher ──(request, response, data, next)──▶ middleware
//!     ◀── next.resolve() / next.resolve_with(data)   continue, merge data
//!     ◀── next.reject() / next.reject_with(code)     abort with error code
//!     ◀── response.send(..) / error(..) / redirect(..) abort, response done
//! ```
//!
//! # Design Decisions
//! - `Next` settles a single-shot channel; later settlements are no-ops
//! - `Next` may be cloned and moved into spawned tasks
//! - Dropping every clone without settling is reported to the dispatcher

use std::future::Future;
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use tokio::sync::oneshot;

use crate::dispatch::data::Data;
use crate::error::BoxError;
use crate::http::request::Request;
use crate::http::response::Response;

/// Result of a middleware or handler body.
pub type MiddlewareResult = Result<(), BoxError>;
pub type HandlerResult = Result<(), BoxError>;

/// How one middleware invocation ended.
#[derive(Debug)]
pub(crate) enum Settlement {
    Resolved(Option<Data>),
    Rejected(Option<u16>),
    Sent,
    Abandoned,
}

type Slot = Arc<Mutex<Option<oneshot::Sender<Settlement>>>>;

fn settle(slot: &Slot, settlement: Settlement) -> bool {
    let sender = slot.lock().expect("settlement mutex poisoned").take();
    match sender {
        Some(tx) => {
            let _ = tx.send(settlement);
            true
        }
        None => false,
    }
}

struct NextInner {
    slot: Slot,
}

impl Drop for NextInner {
    fn drop(&mut self) {
        settle(&self.slot, Settlement::Abandoned);
    }
}

/// Continuation handed to every middleware invocation.
#[derive(Clone)]
pub struct Next {
    inner: Arc<NextInner>,
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

impl Next {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Settlement>) {
        let (tx, rx) = oneshot::channel();
        let next = Self {
            inner: Arc::new(NextInner {
                slot: Arc::new(Mutex::new(Some(tx))),
            }),
        };
        (next, rx)
    }

    /// Continue with the next middleware.
    pub fn resolve(&self) {
        self.settle(Settlement::Resolved(None));
    }

    /// Continue, merging `data` into the accumulated data.
    pub fn resolve_with(&self, data: Data) {
        self.settle(Settlement::Resolved(Some(data)));
    }

    /// Abort the request with a 500.
    pub fn reject(&self) {
        self.settle(Settlement::Rejected(None));
    }

    /// Abort the request with `code`.
    pub fn reject_with(&self, code: u16) {
        self.settle(Settlement::Rejected(Some(code)));
    }

    fn settle(&self, settlement: Settlement) {
        if !settle(&self.inner.slot, settlement) {
            tracing::debug!("Middleware already settled, ignoring");
        }
    }

    /// Observer for the response: a terminal write settles as `Sent`.
    pub(crate) fn send_observer(&self) -> impl FnOnce() + Send + 'static {
        let slot = self.inner.slot.clone();
        move || {
            settle(&slot, Settlement::Sent);
        }
    }
}

/// A sequential pre-handler step.
pub trait Middleware: Send + Sync + 'static {
    fn call(
        &self,
        request: Arc<Request>,
        response: Response,
        data: Data,
        next: Next,
    ) -> BoxFuture<'static, MiddlewareResult>;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Arc<Request>, Response, Data, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MiddlewareResult> + Send + 'static,
{
    fn call(
        &self,
        request: Arc<Request>,
        response: Response,
        data: Data,
        next: Next,
    ) -> BoxFuture<'static, MiddlewareResult> {
        Box::pin(self(request, response, data, next))
    }
}

/// The terminal step of a route.
pub trait Handler: Send + Sync + 'static {
    fn call(
        &self,
        request: Arc<Request>,
        response: Response,
        data: Data,
    ) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Arc<Request>, Response, Data) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(
        &self,
        request: Arc<Request>,
        response: Response,
        data: Data,
    ) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(request, response, data))
    }
}

/// Ordered middleware list of a route.
pub type MiddlewareChain = Vec<Arc<dyn Middleware>>;

/// Wrap an async closure as a shareable middleware.
pub fn middleware_fn<F, Fut>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(Arc<Request>, Response, Data, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MiddlewareResult> + Send + 'static,
{
    Arc::new(f)
}

/// Wrap an async closure as a shareable handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(Arc<Request>, Response, Data) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(f)
}

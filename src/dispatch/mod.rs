//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → dispatcher.rs (endpoint check, route lookup)
//!     → middleware.rs (sequential steps settled through `Next`)
//!     → data.rs (partial data merged between steps)
//!     → handler → Response (exactly one write)
//! ```

pub mod data;
pub mod dispatcher;
pub mod middleware;

pub use data::Data;
pub use dispatcher::{HandlerOptions, Incoming, RequestHandler, DEFAULT_MAX_BODY_BYTES};
pub use middleware::{
    handler_fn, middleware_fn, Handler, HandlerResult, Middleware, MiddlewareChain,
    MiddlewareResult, Next,
};

//! Path-pattern request router with sequential async middleware.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod static_files;

pub use config::Config;
pub use dispatch::{Data, HandlerOptions, Incoming, Next, RequestHandler};
pub use error::{BoxError, EndpointError, RegistrationError};
pub use http::{HttpServer, Request, Response};
pub use lifecycle::Shutdown;

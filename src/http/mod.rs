//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, catch-all route)
//!     → dispatcher (routing, middleware, handler)
//!         → request.rs (read-only view: params, query, headers, cookies)
//!         → response.rs (headers, cookies, single terminal write)
//!     → transport.rs (buffered write handed back to Axum)
//!     → Send to client
//! ```

pub mod cookie;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;
pub mod transport;

pub use cookie::{CookieOptions, SameSite};
pub use request::Request;
pub use response::{HeaderField, Payload, Response, SendOptions};
pub use server::{https_redirect_router, HttpServer};
pub use transport::{BufferedTransport, Transport};

//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (before serving):
//!     pattern string
//!     → pattern.rs (parse into segments, reject bad parameter names)
//!     → table.rs (append in insertion order)
//!
//! Lookup (per request):
//!     url
//!     → endpoint.rs (strip endpoint prefix, if scoped)
//!     → table.rs (first handler route matching method and path)
//!     → otherwise first static route, otherwise NoMatch
//! ```
//!
//! # Design Decisions
//! - Routes are registered before traffic, immutable while serving
//! - No regex: patterns compile to literal, parameter and wildcard segments
//! - First match wins; overlapping patterns are reported at lookup

pub mod endpoint;
pub mod pattern;
pub mod table;

pub use endpoint::Endpoint;
pub use pattern::{match_path, normalize, PathMatch, PathParams, RoutePattern, Segment};
pub use table::{Route, RouteKind, RouteTable};

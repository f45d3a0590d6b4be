//! Ready-made middleware for the dispatch chain.

pub mod cors;

pub use cors::cors;

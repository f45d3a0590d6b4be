//! Transport collaborator.
//!
//! # Responsibilities
//! - Abstract the raw HTTP writer (`write_head` / `write` / `end`)
//! - Provide a buffered implementation that hands a finished
//!   `axum` response to whoever awaits it
//!
//! # Design Decisions
//! - The core never touches sockets; it only drives a `Transport`
//! - Dropping a `BufferedTransport` without `end()` closes the channel,
//!   which the server maps to a 500

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, StatusCode};
use tokio::sync::oneshot;

/// Raw response writer supplied by the HTTP layer.
pub trait Transport: Send + 'static {
    /// Write status line and headers. Called once, before any body chunk.
    fn write_head(&mut self, status: StatusCode, headers: HeaderMap);

    /// Append a body chunk.
    fn write(&mut self, chunk: Bytes);

    /// Finish the response.
    fn end(&mut self);
}

/// Collects a response in memory and delivers it on `end()`.
#[derive(Debug)]
pub struct BufferedTransport {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    done: Option<oneshot::Sender<axum::response::Response>>,
}

impl BufferedTransport {
    /// Create the transport and the receiver for the finished response.
    pub fn new() -> (Self, oneshot::Receiver<axum::response::Response>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: Vec::new(),
                done: Some(tx),
            },
            rx,
        )
    }
}

impl Transport for BufferedTransport {
    fn write_head(&mut self, status: StatusCode, headers: HeaderMap) {
        self.status = status;
        self.headers = headers;
    }

    fn write(&mut self, chunk: Bytes) {
        self.body.extend_from_slice(&chunk);
    }

    fn end(&mut self) {
        let Some(done) = self.done.take() else {
            return;
        };
        let mut response = axum::response::Response::new(Body::from(std::mem::take(&mut self.body)));
        *response.status_mut() = self.status;
        *response.headers_mut() = std::mem::take(&mut self.headers);
        let _ = done.send(response);
    }
}

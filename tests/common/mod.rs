//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use request_router::dispatch::{Incoming, RequestHandler};
use request_router::http::transport::Transport;
use request_router::http::HttpServer;
use request_router::lifecycle::Shutdown;
use tokio::net::TcpListener;

/// Everything a transport was asked to write.
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub heads: usize,
    pub ends: usize,
}

impl Recorded {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Transport that records writes instead of touching a socket.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport(pub Arc<Mutex<Recorded>>);

impl Transport for RecordingTransport {
    fn write_head(&mut self, status: StatusCode, headers: HeaderMap) {
        let mut recorded = self.0.lock().unwrap();
        recorded.status = Some(status);
        recorded.headers = headers;
        recorded.heads += 1;
    }

    fn write(&mut self, chunk: Bytes) {
        self.0.lock().unwrap().body.extend_from_slice(&chunk);
    }

    fn end(&mut self) {
        self.0.lock().unwrap().ends += 1;
    }
}

/// Dispatch `incoming` and return what was written.
pub async fn dispatch(handler: &RequestHandler, incoming: Incoming) -> Recorded {
    let transport = RecordingTransport::default();
    let record = transport.0.clone();
    handler.dispatch(incoming, transport).await;
    let recorded = record.lock().unwrap().clone();
    recorded
}

/// Run `handler` behind a real HTTP listener on a free local port.
pub async fn start_server(handler: RequestHandler) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = HttpServer::new(Arc::new(handler));
    let stop = shutdown.clone();
    tokio::spawn(async move {
        server.run(listener, stop).await.unwrap();
    });

    (addr, shutdown)
}

//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router that feeds every request to the dispatcher
//! - Bridge the dispatcher's `Transport` to an Axum response
//! - Serve plain HTTP or HTTPS (rustls), with graceful shutdown
//! - Optionally redirect a plain HTTP listener to HTTPS

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, uri::Authority, HeaderMap, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::config::TlsConfig;
use crate::dispatch::{Incoming, RequestHandler};
use crate::http::response::TEXT_PLAIN;
use crate::http::transport::BufferedTransport;
use crate::lifecycle::Shutdown;

/// How long in-flight TLS connections may drain after shutdown.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP server wrapping one [`RequestHandler`].
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a server dispatching every request to `handler`.
    pub fn new(handler: Arc<RequestHandler>) -> Self {
        Self {
            router: Self::build_router(handler),
        }
    }

    fn build_router(handler: Arc<RequestHandler>) -> Router {
        Router::new()
            .route("/", any(dispatch_request))
            .route("/{*path}", any(dispatch_request))
            .with_state(handler)
            .layer(TraceLayer::new_for_http())
    }

    /// The underlying Axum router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve plain HTTP on `listener` until `shutdown` triggers.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.signalled())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown` triggers.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: &TlsConfig,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let signalled = shutdown.signalled();
        let drain = handle.clone();
        tokio::spawn(async move {
            signalled.await;
            drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, std::io::Error> {
    for (what, path) in [("Certificate", cert_path), ("Private key", key_path)] {
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} file not found: {}", what, path.display()),
            ));
        }
    }
    RustlsConfig::from_pem_file(cert_path, key_path).await
}

/// Feed one request through the dispatcher and wait for its single write.
///
/// Dispatch runs on its own task so handlers that keep the response alive
/// in background work are not cancelled when this future is.
async fn dispatch_request(
    State(handler): State<Arc<RequestHandler>>,
    request: Request<Body>,
) -> Response {
    let (transport, written) = BufferedTransport::new();
    let incoming = Incoming::from_http(request);

    tokio::spawn(
        async move {
            handler.dispatch(incoming, transport).await;
        }
        .in_current_span(),
    );

    match written.await {
        Ok(response) => response,
        Err(_) => {
            tracing::error!("Request completed without a response");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, TEXT_PLAIN)],
                "Internal Server Error",
            )
                .into_response()
        }
    }
}

/// Router answering every request with a 301 to the HTTPS origin.
///
/// `https_port` is appended to the host unless it is 443.
pub fn https_redirect_router(https_port: u16) -> Router {
    Router::new().fallback(move |headers: HeaderMap, uri: Uri| async move {
        redirect_to_https(&headers, &uri, https_port)
    })
}

fn redirect_to_https(headers: &HeaderMap, uri: &Uri, https_port: u16) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.parse::<Authority>().ok());
    let Some(host) = host else {
        tracing::warn!(uri = %uri, "Cannot redirect without a Host header");
        return (StatusCode::BAD_REQUEST, "Missing Host header").into_response();
    };

    let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let location = if https_port == 443 {
        format!("https://{}{}", host.host(), path)
    } else {
        format!("https://{}:{}{}", host.host(), https_port, path)
    };

    tracing::debug!(location = %location, "Redirecting to HTTPS");
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
}

/// Serve the HTTPS redirect on `listener` until `shutdown` triggers.
pub async fn run_https_redirect(
    listener: TcpListener,
    https_port: u16,
    shutdown: Shutdown,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, https_port, "HTTPS redirect listener starting");

    axum::serve(listener, https_redirect_router(https_port))
        .with_graceful_shutdown(shutdown.signalled())
        .await
}

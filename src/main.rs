//! Request router demo server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (Axum, optional TLS)
//!                         │
//!                         ▼
//!                     dispatch::RequestHandler
//!                         │  endpoint check
//!                         ├──────────────▶ routing::table (handler routes)
//!                         │                    │
//!                         │                    ▼
//!                         │               global middleware → route middleware → handler
//!                         │
//!                         └──────────────▶ static routes → static_files
//!                                              │
//!     Client Response                          ▼
//!     ◀────────────── http::transport ◀── http::response (single write)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use request_router::config::{load_config, Config};
use request_router::dispatch::{middleware_fn, Data, RequestHandler};
use request_router::http::middleware::cors;
use request_router::http::server::run_https_redirect;
use request_router::http::HttpServer;
use request_router::lifecycle::{shutdown_on_signal, Shutdown};
use request_router::observability::init_logging;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "request-router", version, about = "Path-pattern HTTP request router")]
struct Args {
    /// Path to a TOML configuration file. Defaults are used when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    init_logging(&config.observability)?;
    tracing::info!("request-router v{} starting", env!("CARGO_PKG_VERSION"));

    let handler = Arc::new(build_handler(&config)?);
    tracing::info!(
        endpoint = %handler.endpoint(),
        routes = handler.routes().len(),
        bind_address = %config.listener.bind_address,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let server = HttpServer::new(handler);
    match &config.listener.tls {
        Some(tls) => {
            let addr: SocketAddr = config.listener.bind_address.parse()?;
            if let Some(redirect) = &config.listener.redirect_http_address {
                let listener = TcpListener::bind(redirect).await?;
                let redirect_shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(e) = run_https_redirect(listener, addr.port(), redirect_shutdown).await {
                        tracing::error!(error = %e, "HTTPS redirect listener failed");
                    }
                });
            }
            server.run_tls(addr, tls, shutdown).await?;
        }
        None => {
            let listener = TcpListener::bind(&config.listener.bind_address).await?;
            server.run(listener, shutdown).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Demo routes plus the static mounts from the configuration.
fn build_handler(config: &Config) -> Result<RequestHandler, Box<dyn std::error::Error>> {
    let mut handler = RequestHandler::from_config(&config.handler)?;

    handler.use_middleware(cors());
    handler.register_global_middleware(|request, _response, _data, next| async move {
        let user = request.cookies.get("user").cloned().unwrap_or_else(|| "anonymous".into());
        next.resolve_with(Data::new().with("user", user));
        Ok(())
    });

    handler.get("/health", vec![], |_request, response, _data| async move {
        response.ok();
        Ok(())
    })?;

    handler.get("/hello/:name", vec![], |request, response, data| async move {
        response.send(serde_json::json!({
            "greeting": format!("hello {}", request.path_parameters["name"]),
            "user": data.get("user"),
            "query": request.query_arguments,
        }));
        Ok(())
    })?;

    let require_token = middleware_fn(|request, _response, _data, next| async move {
        match request.header("x-token") {
            Some(token) if !token.is_empty() => next.resolve_with(Data::new().with("token", token)),
            _ => next.reject_with(401),
        }
        Ok(())
    });
    handler.post("/echo", vec![require_token], |request, response, _data| async move {
        response.send(request.body.clone());
        Ok(())
    })?;

    for mount in &config.static_files {
        handler.mount_static_file(&mount.url, vec![], &mount.path)?;
    }
    for mount in &config.static_folders {
        handler.mount_static_folder(&mount.url, vec![], &mount.path)?;
    }

    Ok(handler)
}

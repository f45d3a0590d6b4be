//! Static content collaborator.
//!
//! # Data Flow
//! ```text
//! static route matched
//!     → resolve file on disk (folder mounts: prefix stripped, index.html)
//!     → tokio::fs::read
//!     → mime.rs (extension → Content-Type)
//!     → Response::send_with(bytes, content type)
//! ```
//!
//! # Design Decisions
//! - Read failures answer 404
//! - `..` segments never escape the mounted folder

pub mod mime;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::dispatch::middleware::{handler_fn, Handler};
use crate::http::response::{Response, SendOptions};
use crate::routing::pattern::normalize;

/// Read `path` and send it with its guessed MIME type.
pub async fn serve_file(path: &Path, response: &Response) {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let content_type = mime::guess(path);
            tracing::debug!(file = %path.display(), content_type, "Serving static file");
            response.send_with(bytes, SendOptions::content_type(content_type));
        }
        Err(e) => {
            tracing::warn!(file = %path.display(), error = %e, "Static file could not be read");
            response.error(404);
        }
    }
}

/// Handler serving one fixed file.
pub fn file_handler(file: PathBuf) -> Arc<dyn Handler> {
    let file = Arc::new(file);
    handler_fn(move |_request, response, _data| {
        let file = file.clone();
        async move {
            serve_file(&file, &response).await;
            Ok(())
        }
    })
}

/// Handler serving files below `folder` for requests under `prefix`.
pub fn folder_handler(prefix: String, folder: PathBuf) -> Arc<dyn Handler> {
    let mount = Arc::new((prefix, folder));
    handler_fn(move |request, response, _data| {
        let mount = mount.clone();
        async move {
            let (prefix, folder) = mount.as_ref();
            match resolve_in_folder(folder, prefix, &request.path) {
                Some(path) => serve_file(&path, &response).await,
                None => {
                    tracing::warn!(path = %request.path, "Refusing static path outside mount");
                    response.error(404);
                }
            }
            Ok(())
        }
    })
}

/// Map a request path to a file inside `folder`.
///
/// An empty remainder maps to `index.html`. Returns `None` for paths
/// outside the prefix or containing `..`.
pub fn resolve_in_folder(folder: &Path, prefix: &str, request_path: &str) -> Option<PathBuf> {
    let prefix = normalize(prefix);
    let path = normalize(request_path);
    let remainder = if prefix == "/" {
        path.as_str()
    } else {
        path.strip_prefix(prefix.as_str())
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))?
    };

    let mut resolved = folder.to_path_buf();
    let mut any = false;
    for segment in remainder.split('/').filter(|s| !s.is_empty()) {
        if segment == ".." || segment == "." || segment.contains('\\') {
            return None;
        }
        resolved.push(segment);
        any = true;
    }

    if !any {
        resolved.push("index.html");
    }
    Some(resolved)
}

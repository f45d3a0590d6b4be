//! Per-request response state.
//!
//! # Responsibilities
//! - Accumulate headers and cookies until the terminal write
//! - Negotiate content type from the payload kind
//! - Guarantee that exactly one terminal write reaches the transport
//! - Notify the dispatcher when a middleware completes the response itself
//!
//! # Design Decisions
//! - `Response` is a cheap cloneable handle to state owned by one dispatch
//! - Header/cookie tokens containing `;` or `=` are rejected, not escaped
//! - Binary payloads without a content type degrade to a fixed 500
//! - A second terminal write is a logged no-op

use std::sync::{Arc, Mutex, MutexGuard};

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;

use crate::http::cookie::{format_set_cookie, CookieOptions};
use crate::http::transport::Transport;

pub const TEXT_PLAIN: &str = "text/plain; charset=UTF-8";
pub const APPLICATION_JSON: &str = "application/json; charset=UTF-8";
const BINARY_WITHOUT_TYPE_BODY: &str = "500 Internal Server Error";

/// A header value, either single or repeated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderField {
    Single(String),
    Multiple(Vec<String>),
}

impl HeaderField {
    fn values(&self) -> Vec<&str> {
        match self {
            HeaderField::Single(v) => vec![v.as_str()],
            HeaderField::Multiple(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for HeaderField {
    fn from(value: &str) -> Self {
        HeaderField::Single(value.to_string())
    }
}

impl From<String> for HeaderField {
    fn from(value: String) -> Self {
        HeaderField::Single(value)
    }
}

impl From<Vec<String>> for HeaderField {
    fn from(values: Vec<String>) -> Self {
        HeaderField::Multiple(values)
    }
}

impl From<Vec<&str>> for HeaderField {
    fn from(values: Vec<&str>) -> Self {
        HeaderField::Multiple(values.into_iter().map(str::to_string).collect())
    }
}

/// Data handed to [`Response::send`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Text(String),
    /// Already stringified number.
    Number(String),
    Bool(bool),
    Json(serde_json::Value),
    Binary(Bytes),
}

impl Payload {
    /// Serialize any value as a JSON payload.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Payload::Json)
    }
}

impl From<()> for Payload {
    fn from(_: ()) -> Self {
        Payload::Empty
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Payload::Bool(value)
    }
}

macro_rules! number_payload {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Payload {
                fn from(value: $ty) -> Self {
                    Payload::Number(value.to_string())
                }
            }
        )*
    };
}

number_payload!(i32, i64, u32, u64, usize, f32, f64);

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

impl From<Bytes> for Payload {
    fn from(value: Bytes) -> Self {
        Payload::Binary(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Payload::Binary(Bytes::from(value))
    }
}

/// Options for [`Response::send_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub content_type: Option<String>,
    pub status: Option<StatusCode>,
}

impl SendOptions {
    pub fn content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            status: None,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }
}

type SendObserver = Box<dyn FnOnce() + Send>;

struct ResponseState {
    sent: bool,
    headers: Vec<(HeaderName, Vec<HeaderValue>)>,
    cookies: Vec<HeaderValue>,
    on_send: Option<SendObserver>,
    transport: Option<Box<dyn Transport>>,
}

/// Handle to the single response of one request.
#[derive(Clone)]
pub struct Response {
    state: Arc<Mutex<ResponseState>>,
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Response")
            .field("sent", &state.sent)
            .field("pending_headers", &state.headers.len())
            .field("pending_cookies", &state.cookies.len())
            .finish()
    }
}

impl Response {
    /// Create a response writing to `transport`.
    pub fn new(transport: impl Transport) -> Self {
        Self {
            state: Arc::new(Mutex::new(ResponseState {
                sent: false,
                headers: Vec::new(),
                cookies: Vec::new(),
                on_send: None,
                transport: Some(Box::new(transport)),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ResponseState> {
        self.state.lock().expect("response mutex poisoned")
    }

    /// Whether a terminal write already happened.
    pub fn is_sent(&self) -> bool {
        self.lock().sent
    }

    /// Set a pending header, replacing an earlier value for the same name.
    pub fn set_header(&self, key: &str, value: impl Into<HeaderField>) {
        let field = value.into();
        let values = field.values();

        if !is_valid_token(key) || !values.iter().all(|v| is_valid_token(v)) {
            tracing::warn!(header = %key, value = ?field, "Invalid header key or value");
            return;
        }

        let name = match HeaderName::from_bytes(key.as_bytes()) {
            Ok(name) => name,
            Err(_) => {
                tracing::warn!(header = %key, "Invalid header name");
                return;
            }
        };
        let parsed: Result<Vec<HeaderValue>, _> =
            values.iter().map(|v| HeaderValue::from_str(v)).collect();
        let Ok(parsed) = parsed else {
            tracing::warn!(header = %key, value = ?field, "Invalid header value");
            return;
        };

        let mut state = self.lock();
        let existing = state.headers.iter().position(|(n, _)| *n == name);
        match existing {
            Some(idx) => state.headers[idx].1 = parsed,
            None => state.headers.push((name, parsed)),
        }
    }

    /// Queue a cookie without attributes.
    pub fn set_cookie(&self, key: &str, value: &str) {
        self.set_cookie_with(key, value, &CookieOptions::default());
    }

    /// Queue a cookie. Repeated keys produce repeated `Set-Cookie` entries.
    pub fn set_cookie_with(&self, key: &str, value: &str, options: &CookieOptions) {
        if !is_valid_token(key) || !is_valid_token(value) {
            tracing::warn!(cookie = %key, value = %value, "Invalid cookie key or value");
            return;
        }

        let formatted = format_set_cookie(key, value, options);
        match HeaderValue::from_str(&formatted) {
            Ok(header_value) => self.lock().cookies.push(header_value),
            Err(_) => tracing::warn!(cookie = %key, "Cookie attributes are not a valid header value"),
        }
    }

    /// Send a payload with a 200 status and a negotiated content type.
    pub fn send(&self, payload: impl Into<Payload>) -> bool {
        self.send_with(payload, SendOptions::default())
    }

    /// Send a payload with explicit options.
    ///
    /// Returns `false` if the response had already been sent.
    pub fn send_with(&self, payload: impl Into<Payload>, options: SendOptions) -> bool {
        if self.is_sent() {
            tracing::warn!("Response already sent");
            return false;
        }

        let status = options.status.unwrap_or(StatusCode::OK);
        let negotiated = match payload.into() {
            Payload::Empty => Ok((options.content_type.unwrap_or_else(|| TEXT_PLAIN.into()), Bytes::new())),
            Payload::Text(text) => Ok((
                options.content_type.unwrap_or_else(|| TEXT_PLAIN.into()),
                Bytes::from(text),
            )),
            Payload::Number(number) => Ok((TEXT_PLAIN.into(), Bytes::from(number))),
            Payload::Bool(flag) => Ok((TEXT_PLAIN.into(), Bytes::from(flag.to_string()))),
            Payload::Json(value) => serde_json::to_vec(&value)
                .map(|body| (APPLICATION_JSON.to_string(), Bytes::from(body)))
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to serialize JSON payload");
                }),
            Payload::Binary(bytes) => match options.content_type {
                Some(content_type) => Ok((content_type, bytes)),
                None => {
                    tracing::error!(
                        "When responding with binary data a MIME type (Content-Type) must be provided"
                    );
                    Err(())
                }
            },
        };

        let (status, content_type, body) = match negotiated {
            Ok((content_type, body)) => match HeaderValue::from_str(&content_type) {
                Ok(value) => (status, value, body),
                Err(_) => {
                    tracing::error!(content_type = %content_type, "Invalid content type");
                    internal_error()
                }
            },
            Err(()) => internal_error(),
        };

        self.commit(status, vec![(header::CONTENT_TYPE, content_type)], body)
    }

    /// Send an empty 200 response.
    pub fn ok(&self) -> bool {
        self.send(Payload::Empty)
    }

    /// Respond with an error status and a short reason body.
    pub fn error(&self, code: u16) -> bool {
        let status = StatusCode::from_u16(code).unwrap_or_else(|_| {
            tracing::warn!(code, "Invalid status code, using 500");
            StatusCode::INTERNAL_SERVER_ERROR
        });
        let body = match status {
            StatusCode::NOT_FOUND => "Not Found".to_string(),
            StatusCode::INTERNAL_SERVER_ERROR => "Internal Server Error".to_string(),
            other => other.as_u16().to_string(),
        };
        self.commit(
            status,
            vec![(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN))],
            Bytes::from(body),
        )
    }

    /// Redirect permanently (301) to `location`.
    pub fn redirect(&self, location: &str) -> bool {
        match HeaderValue::from_str(location) {
            Ok(value) => self.commit(
                StatusCode::MOVED_PERMANENTLY,
                vec![(header::LOCATION, value)],
                Bytes::new(),
            ),
            Err(_) => {
                tracing::error!(location = %location, "Invalid redirect location");
                self.error(500)
            }
        }
    }

    /// Register the observer fired by the next terminal write.
    pub(crate) fn set_send_observer(&self, observer: impl FnOnce() + Send + 'static) {
        self.lock().on_send = Some(Box::new(observer));
    }

    pub(crate) fn clear_send_observer(&self) {
        self.lock().on_send = None;
    }

    /// Flush pending headers and cookies, then write status and body once.
    fn commit(
        &self,
        status: StatusCode,
        extra: Vec<(HeaderName, HeaderValue)>,
        body: Bytes,
    ) -> bool {
        let observer = {
            let mut state = self.lock();
            if state.sent {
                tracing::warn!(status = %status, "Response already sent");
                return false;
            }
            state.sent = true;

            let mut headers = HeaderMap::new();
            for (name, values) in state.headers.drain(..) {
                for value in values {
                    headers.append(name.clone(), value);
                }
            }
            for cookie in state.cookies.drain(..) {
                headers.append(header::SET_COOKIE, cookie);
            }
            for (name, value) in extra {
                headers.insert(name, value);
            }
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));

            if let Some(mut transport) = state.transport.take() {
                transport.write_head(status, headers);
                if !body.is_empty() {
                    transport.write(body);
                }
                transport.end();
            }

            state.on_send.take()
        };

        if let Some(observer) = observer {
            observer();
        }
        true
    }
}

fn internal_error() -> (StatusCode, HeaderValue, Bytes) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        HeaderValue::from_static(TEXT_PLAIN),
        Bytes::from_static(BINARY_WITHOUT_TYPE_BODY.as_bytes()),
    )
}

/// Header and cookie tokens must not contain `;` or `=`.
pub fn is_valid_token(token: &str) -> bool {
    !token.contains(';') && !token.contains('=')
}

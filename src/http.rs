//! The HTTP transport used for signaling.
//!
//! We don't ship an HTTP client. The host provides one through [`HttpTransport`], which
//! only needs to support a single request/response exchange per connection.

use std::fmt;

use thiserror::Error;

/// HTTP method of a signaling exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Method {
    Post,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Post => write!(f, "POST"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

/// A signaling request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Header name/value pairs, in order.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Create a request without headers or body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        HttpRequest {
            method,
            url: url.into(),
            headers: vec![],
            body: None,
        }
    }

    /// Append a header.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Set the body.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// First header with the given name, case insensitive.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Result of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// The entire response body.
    pub body: Vec<u8>,
    /// The `Location` of the response, or the final URL after redirects.
    ///
    /// May be relative to the request URL.
    pub location: Option<String>,
}

impl HttpResponse {
    /// Tells if the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Errors from the HTTP transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection could not be allocated, i.e. a bad URL or unsupported scheme.
    #[error("http open {0}: {1}")]
    Open(String, String),

    /// Connecting or sending the request failed.
    #[error("http connect: {0}")]
    Connect(String),

    /// Reading the full response failed.
    #[error("http read: {0}")]
    Read(String),

    /// Closing the connection failed.
    #[error("http close: {0}")]
    Close(String),

    /// The server answered with a non success status.
    #[error("http status {0}")]
    Status(u16),
}

/// Factory of HTTP connections.
pub trait HttpTransport: Send + Sync {
    /// Allocate a connection for the given absolute URL.
    fn open(&self, url: &str) -> Result<Box<dyn HttpConnection>, TransportError>;
}

/// One HTTP exchange.
///
/// The caller always ends with [`HttpConnection::close()`], also after errors.
pub trait HttpConnection: Send {
    /// Send the request. Returns when the response head has arrived.
    ///
    /// Non 2xx responses are reported as [`TransportError::Status`].
    fn connect(&mut self, request: &HttpRequest) -> Result<(), TransportError>;

    /// Read the complete response.
    fn read_complete(&mut self) -> Result<HttpResponse, TransportError>;

    /// Release the connection.
    fn close(&mut self) -> Result<(), TransportError>;
}

//! The WHIP/WHEP offer/answer and teardown exchanges.

use std::sync::Arc;

use url::Url;

use crate::engine::{Engine, PeerId, SdpType};
use crate::http::{HttpConnection, HttpRequest, HttpResponse, HttpTransport, Method};
use crate::http::TransportError;
use crate::util::Pii;
use crate::WebRtcError;

/// Content type of offers and answers.
pub const SDP_CONTENT_TYPE: &str = "application/sdp";

/// Performs the HTTP side of a session.
///
/// Owns the resource location, which is only present after a successful
/// [`SignalingClient::create_resource()`] and until the following
/// [`SignalingClient::close_resource()`]. Both take `&mut self`, so there can never be
/// two exchanges in flight for the same client.
pub struct SignalingClient {
    base_url: String,
    bearer_token: Option<String>,
    resource_location: Option<String>,
    transport: Arc<dyn HttpTransport>,
}

impl SignalingClient {
    /// Create a client posting offers to `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        bearer_token: Option<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        SignalingClient {
            base_url: base_url.into(),
            bearer_token,
            resource_location: None,
            transport,
        }
    }

    /// The endpoint offers are posted to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The session resource created on the server, if any.
    pub fn resource_location(&self) -> Option<&str> {
        self.resource_location.as_deref()
    }

    /// Exchange offer and answer with the endpoint.
    ///
    /// The engine generates the offer, which is POSTed to the base URL. The response body
    /// is applied as the answer, and the resolved resource location is kept for
    /// [`SignalingClient::close_resource()`].
    pub fn create_resource(&mut self, engine: &dyn Engine, pc: PeerId) -> Result<(), WebRtcError> {
        if self.resource_location.is_some() {
            return Err(WebRtcError::Resource(
                "resource already created, close it first".into(),
            ));
        }

        engine
            .set_local_description(pc, SdpType::Offer)
            .map_err(|e| WebRtcError::Engine("set local description", e))?;

        let offer = engine
            .local_description(pc)
            .map_err(|e| WebRtcError::Engine("get local description", e))?;
        trace!("Offer SDP: {}", offer);

        let mut request = HttpRequest::new(Method::Post, &self.base_url)
            .header("Content-Type", SDP_CONTENT_TYPE);
        if let Some(token) = &self.bearer_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        let request = request.body(offer);

        debug!(
            "POST offer to {} (authorization: {})",
            Pii(&self.base_url),
            self.bearer_token.is_some()
        );

        let response = self.exchange(&request, true)?;
        let response = response.ok_or_else(|| WebRtcError::Protocol("no response".into()))?;

        let answer = String::from_utf8(response.body)
            .map_err(|_| WebRtcError::Protocol("answer is not UTF-8".into()))?;
        if answer.trim().is_empty() {
            return Err(WebRtcError::Protocol("empty SDP answer".into()));
        }
        trace!("Answer SDP: {}", answer);

        engine
            .set_remote_description(pc, &answer, SdpType::Answer)
            .map_err(|e| WebRtcError::Engine("set remote description", e))?;

        let location = match response.location {
            Some(v) => Some(self.resolve(&v)?),
            None => None,
        };

        if let Some(location) = &location {
            debug!("Resource location: {}", Pii(location));
        } else {
            warn!("No resource location in answer, teardown will be skipped");
        }

        self.resource_location = location;

        Ok(())
    }

    /// Delete the resource on the server.
    ///
    /// A no-op without a resource location. The location is cleared whatever the outcome,
    /// so a second call always succeeds without side effects. A completed response is
    /// success whatever its status.
    pub fn close_resource(&mut self) -> Result<(), WebRtcError> {
        let Some(location) = self.resource_location.take() else {
            return Ok(());
        };

        let mut request = HttpRequest::new(Method::Delete, location);
        if let Some(token) = &self.bearer_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        debug!("DELETE resource {}", Pii(&request.url));

        match self.exchange(&request, false) {
            Err(TransportError::Status(status)) => {
                debug!("DELETE resource answered with status {}", status);
                Ok(())
            }
            Err(e) => Err(e.into()),
            Ok(_) => Ok(()),
        }
    }

    /// Run one exchange, always closing the connection.
    fn exchange(
        &self,
        request: &HttpRequest,
        read: bool,
    ) -> Result<Option<HttpResponse>, TransportError> {
        let mut conn = self.transport.open(&request.url)?;

        let result = run_exchange(&mut *conn, request, read);
        let closed = conn.close();

        match (result, closed) {
            (Err(e), Err(c)) => {
                debug!("Close after failed exchange also failed: {}", c);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(_), Err(c)) => Err(c),
            (Ok(r), Ok(())) => Ok(r),
        }
    }

    fn resolve(&self, location: &str) -> Result<String, WebRtcError> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| WebRtcError::Protocol(format!("bad endpoint url: {}", e)))?;

        let url = base
            .join(location)
            .map_err(|e| WebRtcError::Protocol(format!("bad resource location: {}", e)))?;

        Ok(url.into())
    }
}

fn run_exchange(
    conn: &mut dyn HttpConnection,
    request: &HttpRequest,
    read: bool,
) -> Result<Option<HttpResponse>, TransportError> {
    conn.connect(request)?;

    if !read {
        return Ok(None);
    }

    let response = conn.read_complete()?;
    if !response.is_success() {
        return Err(TransportError::Status(response.status));
    }

    Ok(Some(response))
}

use crate::{
    common::{
        curl,
        data::{self, RelayRequest, RelayResponse},
        http::HttpClient,
    },
    server::{
        control::{self, ControlCommand},
        filter, journal,
        journal::{Exchange, ExchangeSink},
        state,
        state::{LocalMatch, StateManager},
        RequestMetadata,
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use http::{
    header::{HeaderName, HeaderValue, CONTENT_TYPE},
    Request, Response, StatusCode,
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The inbound request violated a structural precondition. Answered with
    /// 400 and, unlike all other errors, without CORS headers.
    #[error("{0}")]
    MalformedRequest(String),
    #[error("request metadata missing from request extensions")]
    MissingMetadata,
    #[error("cannot query local state: {0}")]
    StateError(#[from] state::Error),
    #[error("cannot answer control command: {0}")]
    ControlError(#[from] control::Error),
    #[error("cannot convert response: {0}")]
    ResponseConversionError(String),
}

/// The per-request entry point the ingress layer dispatches into. Infallible
/// by contract: every inbound request yields exactly one response.
#[async_trait]
pub trait Handler {
    async fn handle(&self, req: Request<Bytes>) -> Response<Bytes>;
}

/// The dispatch pipeline. For each request, in this order: offer it to the
/// local expectation state, then check the control commands, then relay it
/// upstream. The order is a correctness requirement (local expectations
/// override everything, including control commands on the same method/path)
/// and must not be changed.
pub struct RelayHandler<S>
where
    S: StateManager + Send + Sync + 'static,
{
    state: Arc<S>,
    http_client: Arc<dyn HttpClient + Send + Sync + 'static>,
    journal: Arc<dyn ExchangeSink + Send + Sync + 'static>,
}

#[async_trait]
impl<S> Handler for RelayHandler<S>
where
    S: StateManager + Send + Sync + 'static,
{
    async fn handle(&self, req: Request<Bytes>) -> Response<Bytes> {
        tracing::trace!("Dispatching incoming request: {:?}", req);

        let mut decoded: Option<RelayRequest> = None;
        match self.dispatch(req, &mut decoded).await {
            Ok(response) => response,
            Err(err) => {
                journal::trace_error(decoded.as_ref(), &err);
                match err {
                    Error::MalformedRequest(message) => error_response(&message, false),
                    err => error_response(&err.to_string(), true),
                }
            }
        }
    }
}

impl<S> RelayHandler<S>
where
    S: StateManager + Send + Sync + 'static,
{
    pub fn new(
        state: Arc<S>,
        http_client: Arc<dyn HttpClient + Send + Sync + 'static>,
        journal: Arc<dyn ExchangeSink + Send + Sync + 'static>,
    ) -> Self {
        Self {
            state,
            http_client,
            journal,
        }
    }

    async fn dispatch(
        &self,
        req: Request<Bytes>,
        decoded: &mut Option<RelayRequest>,
    ) -> Result<Response<Bytes>, Error> {
        let request = decode_request(&req)?;
        let request = &*decoded.insert(request);

        match self.state.try_serve(request)? {
            LocalMatch::Handled(response) => return to_http_response(response),
            LocalMatch::NotHandled => {}
        }

        if let Some(command) = ControlCommand::recognize(request) {
            return to_http_response(control::respond(command, request)?);
        }

        let outbound = filter::strip_hop_by_hop(request);
        let response = match self.forward(&outbound).await {
            Some(response) => response,
            None => RelayResponse::not_found(),
        };

        journal::trace_forward(&outbound, &response, &curl::to_curl(&outbound));
        self.journal.submit(Exchange::new(outbound, response.clone()));

        to_http_response(response)
    }

    /// Relays the filtered request upstream. Any transport-level failure maps
    /// to `None`; the distinction between failure subtypes stays with the
    /// transport collaborator.
    async fn forward(&self, request: &RelayRequest) -> Option<RelayResponse> {
        let outbound = match to_outbound_request(request) {
            Ok(req) => req,
            Err(err) => {
                tracing::debug!("cannot construct upstream request: {}", err);
                return None;
            }
        };

        match self.http_client.send(outbound).await {
            Ok(res) => match RelayResponse::try_from(res) {
                Ok(res) => Some(res),
                Err(err) => {
                    tracing::debug!("cannot convert upstream response: {}", err);
                    None
                }
            },
            Err(err) => {
                tracing::debug!("upstream transport failure: {}", err);
                None
            }
        }
    }
}

/// Turns the buffered hyper request into the pipeline's immutable request
/// value. Structural problems surface here as [`Error::MalformedRequest`].
fn decode_request(req: &Request<Bytes>) -> Result<RelayRequest, Error> {
    let meta = req
        .extensions()
        .get::<RequestMetadata>()
        .ok_or(Error::MissingMetadata)?;

    let headers = req
        .headers()
        .iter()
        .map(|(name, value)| {
            let value = value
                .to_str()
                .map_err(|_| Error::MalformedRequest(data::Error::InvalidHeaderValue.to_string()))?
                .to_string();
            Ok((name.as_str().to_string(), value))
        })
        .collect::<Result<Vec<(String, String)>, Error>>()?;

    // Host-less requests (legal in HTTP/1.0) stay decodable; the authority is
    // only required once forwarding actually needs an upstream target.
    let uri = req.uri();
    let authority = uri.authority().map(|a| a.to_string()).or_else(|| {
        req.headers()
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    });

    let scheme = uri.scheme_str().unwrap_or(meta.scheme).to_string();

    Ok(RelayRequest::new(
        scheme,
        authority,
        req.method().as_str().to_string(),
        uri.path().to_string(),
        uri.query().map(|q| q.to_string()),
        headers,
        format!("{:?}", req.version()),
        req.body().clone(),
        meta.local_port,
    ))
}

fn to_outbound_request(request: &RelayRequest) -> Result<Request<Bytes>, data::Error> {
    if request.authority().is_none() {
        return Err(data::Error::MissingAuthority);
    }

    let mut builder = Request::builder()
        .method(request.method())
        .uri(request.url());

    for (name, value) in request.headers() {
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder
        .body(request.body().clone())
        .map_err(|e| data::Error::ConversionError(e.to_string()))
}

fn to_http_response(response: RelayResponse) -> Result<Response<Bytes>, Error> {
    let status = StatusCode::from_u16(response.status)
        .map_err(|e| Error::ResponseConversionError(e.to_string()))?;

    let mut builder = Response::builder().status(status);
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder
        .body(response.body)
        .map_err(|e| Error::ResponseConversionError(e.to_string()))
}

/// Builds the 400 response written at the pipeline boundary. CORS headers are
/// attached for generic failures only; a malformed request goes out as plain
/// text without them.
fn error_response(message: &str, include_cors: bool) -> Response<Bytes> {
    let mut res = Response::new(Bytes::from(message.to_owned()));
    *res.status_mut() = StatusCode::BAD_REQUEST;

    if include_cors {
        for (name, value) in control::CORS_HEADERS {
            res.headers_mut()
                .insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }
    } else {
        res.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    }

    res
}

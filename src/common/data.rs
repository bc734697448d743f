use bytes::Bytes;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid header value")]
    InvalidHeaderValue,
    #[error("missing host header on origin-form request, cannot determine upstream")]
    MissingAuthority,
    #[error("cannot convert: {0}")]
    ConversionError(String),
}

/// The internal representation of one inbound HTTP request.
///
/// Constructed once by the ingress layer and treated as read-only afterwards.
/// Transformations such as hop-by-hop header filtering produce a new value
/// (see [`RelayRequest::with_headers`]) instead of mutating in place.
///
/// Headers are kept as an ordered list of name/value pairs. Name comparison
/// is case-insensitive, but the original spelling and order are preserved so
/// the request can be relayed upstream without reshuffling.
#[derive(Serialize, Debug, Clone)]
pub struct RelayRequest {
    scheme: String,
    authority: Option<String>,
    method: String,
    path: String,
    query: Option<String>,
    headers: Vec<(String, String)>,
    version: String,
    #[serde(serialize_with = "serialize_body")]
    body: Bytes,
    local_port: u16,
}

impl RelayRequest {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        scheme: String,
        authority: Option<String>,
        method: String,
        path: String,
        query: Option<String>,
        headers: Vec<(String, String)>,
        version: String,
        body: Bytes,
        local_port: u16,
    ) -> Self {
        Self {
            scheme,
            authority,
            method,
            path,
            query,
            headers,
            version,
            body,
            local_port,
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The upstream target in `host[:port]` form, taken from the absolute-form
    /// URI or the Host header at decode time. `None` when the request carried
    /// neither; such a request can still be served locally, only forwarding
    /// requires a target.
    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the first header value whose name matches case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The port of the local listener that accepted this request. Needed to
    /// answer the status control command.
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// The URL this request targets, e.g. `http://example.com/foo?q=1`.
    /// Falls back to the origin form when no authority is known.
    pub fn url(&self) -> String {
        let origin = match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        };
        match &self.authority {
            Some(authority) => format!("{}://{}{}", self.scheme, authority, origin),
            None => origin,
        }
    }

    /// Returns a copy of this request carrying the given header list instead
    /// of the original one. Everything else is preserved.
    pub fn with_headers(&self, headers: Vec<(String, String)>) -> Self {
        Self {
            headers,
            ..self.clone()
        }
    }
}

/// The internal representation of one outbound HTTP response, regardless of
/// whether it came from local state, the control plane, the upstream, or was
/// synthesized locally.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RelayResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    #[serde(serialize_with = "serialize_body")]
    pub body: Bytes,
}

impl RelayResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    /// The substitute response written when the upstream could not be
    /// reached. Forwarding failure is a normal outcome, not an error.
    pub fn not_found() -> Self {
        Self::new(404)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl TryFrom<http::Response<Bytes>> for RelayResponse {
    type Error = Error;

    fn try_from(res: http::Response<Bytes>) -> Result<Self, Self::Error> {
        let (parts, body) = res.into_parts();

        let headers = parts
            .headers
            .iter()
            .map(|(name, value)| {
                let value = value
                    .to_str()
                    .map_err(|_| Error::InvalidHeaderValue)?
                    .to_string();
                Ok((name.as_str().to_string(), value))
            })
            .collect::<Result<Vec<(String, String)>, Error>>()?;

        Ok(RelayResponse {
            status: parts.status.as_u16(),
            headers,
            body,
        })
    }
}

/// The payload returned by the status control command, e.g. `{"ports":[1080]}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PortBinding {
    pub ports: Vec<u16>,
}

impl PortBinding {
    pub fn new(port: u16) -> Self {
        Self { ports: vec![port] }
    }
}

fn serialize_body<S>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&String::from_utf8_lossy(body))
}

#[cfg(test)]
mod test {
    use super::*;

    fn request_with_headers(headers: Vec<(String, String)>) -> RelayRequest {
        RelayRequest::new(
            "http".to_string(),
            Some("localhost:5000".to_string()),
            "GET".to_string(),
            "/foo".to_string(),
            Some("q=1".to_string()),
            headers,
            "HTTP/1.1".to_string(),
            Bytes::new(),
            5000,
        )
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        // Arrange
        let req =
            request_with_headers(vec![("Content-Type".to_string(), "text/plain".to_string())]);

        // Act
        let value = req.header("content-type");

        // Assert
        assert_eq!(value, Some("text/plain"));
    }

    #[test]
    fn url_includes_query_when_present() {
        // Arrange
        let req = request_with_headers(vec![]);

        // Act
        let url = req.url();

        // Assert
        assert_eq!(url, "http://localhost:5000/foo?q=1");
    }

    #[test]
    fn url_is_origin_form_without_an_authority() {
        // Arrange
        let req = RelayRequest::new(
            "http".to_string(),
            None,
            "GET".to_string(),
            "/foo".to_string(),
            Some("q=1".to_string()),
            vec![],
            "HTTP/1.0".to_string(),
            Bytes::new(),
            5000,
        );

        // Act
        let url = req.url();

        // Assert
        assert_eq!(url, "/foo?q=1");
    }

    #[test]
    fn with_headers_preserves_all_other_fields() {
        // Arrange
        let req = request_with_headers(vec![("a".to_string(), "1".to_string())]);

        // Act
        let copy = req.with_headers(vec![]);

        // Assert
        assert!(copy.headers().is_empty());
        assert_eq!(copy.method(), req.method());
        assert_eq!(copy.path(), req.path());
        assert_eq!(copy.local_port(), req.local_port());
    }

    #[test]
    fn port_binding_serializes_to_ports_array() {
        // Arrange
        let binding = PortBinding::new(1080);

        // Act
        let json = serde_json::to_string(&binding).unwrap();

        // Assert
        assert_eq!(json, r#"{"ports":[1080]}"#);
    }
}

use crate::common::data::{PortBinding, RelayRequest, RelayResponse};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot serialize port binding: {0}")]
    PortBindingSerializeError(#[from] serde_json::Error),
}

/// The CORS headers attached to control-plane responses (and to generic error
/// responses). Malformed-request errors deliberately go out without them so
/// that a broken request is never mistaken for a trusted API call by a
/// browser client.
pub(crate) const CORS_HEADERS: [(&str, &str); 4] = [
    ("access-control-allow-origin", "*"),
    (
        "access-control-allow-methods",
        "CONNECT, DELETE, GET, HEAD, OPTIONS, POST, PUT, PATCH, TRACE",
    ),
    (
        "access-control-allow-headers",
        "Allow, Content-Encoding, Content-Length, Content-Type, ETag, Expires, Last-Modified, Location, Server, Vary, Authorization",
    ),
    ("access-control-max-age", "300"),
];

/// The closed set of proxy-management commands. Only these three exist; any
/// other (method, path) combination is regular proxy traffic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCommand {
    QueryStatus,
    Bind,
    Stop,
}

impl ControlCommand {
    /// Matches the request against the fixed (method, path) patterns.
    pub fn recognize(request: &RelayRequest) -> Option<ControlCommand> {
        if !request.method().eq_ignore_ascii_case("PUT") {
            return None;
        }

        match request.path() {
            "/status" => Some(ControlCommand::QueryStatus),
            "/bind" => Some(ControlCommand::Bind),
            "/stop" => Some(ControlCommand::Stop),
            _ => None,
        }
    }
}

/// Answers a recognized control command.
///
/// `bind` and `stop` are recognized but unsupported here and answer with
/// 501 Not Implemented. They stay separate enum variants so a later control
/// plane can pick them up without touching recognition.
pub fn respond(command: ControlCommand, request: &RelayRequest) -> Result<RelayResponse, Error> {
    let response = match command {
        ControlCommand::QueryStatus => {
            let body = serde_json::to_vec(&PortBinding::new(request.local_port()))?;
            with_cors_headers(
                RelayResponse::new(200)
                    .with_header("content-type", "application/json")
                    .with_body(body),
            )
        }
        ControlCommand::Bind | ControlCommand::Stop => with_cors_headers(RelayResponse::new(501)),
    };

    Ok(response)
}

pub(crate) fn with_cors_headers(mut response: RelayResponse) -> RelayResponse {
    for (name, value) in CORS_HEADERS {
        response = response.with_header(name, value);
    }
    response
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::Bytes;

    fn request(method: &str, path: &str, local_port: u16) -> RelayRequest {
        RelayRequest::new(
            "http".to_string(),
            Some(format!("localhost:{}", local_port)),
            method.to_string(),
            path.to_string(),
            None,
            vec![],
            "HTTP/1.1".to_string(),
            Bytes::new(),
            local_port,
        )
    }

    #[test]
    fn recognizes_the_three_control_commands() {
        // Arrange / Act / Assert
        assert_eq!(
            ControlCommand::recognize(&request("PUT", "/status", 1080)),
            Some(ControlCommand::QueryStatus)
        );
        assert_eq!(
            ControlCommand::recognize(&request("PUT", "/bind", 1080)),
            Some(ControlCommand::Bind)
        );
        assert_eq!(
            ControlCommand::recognize(&request("PUT", "/stop", 1080)),
            Some(ControlCommand::Stop)
        );
    }

    #[test]
    fn other_method_or_path_is_not_recognized() {
        // Arrange / Act / Assert
        assert_eq!(ControlCommand::recognize(&request("GET", "/status", 1080)), None);
        assert_eq!(ControlCommand::recognize(&request("PUT", "/other", 1080)), None);
        assert_eq!(ControlCommand::recognize(&request("POST", "/bind", 1080)), None);
    }

    #[test]
    fn status_returns_port_binding_as_json() {
        // Arrange
        let req = request("PUT", "/status", 1080);

        // Act
        let res = respond(ControlCommand::QueryStatus, &req).unwrap();

        // Assert
        assert_eq!(res.status, 200);
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));
        let binding: crate::common::data::PortBinding = serde_json::from_slice(&res.body).unwrap();
        assert_eq!(binding.ports, vec![1080]);
    }

    #[test]
    fn bind_and_stop_are_not_implemented() {
        // Arrange
        let req = request("PUT", "/bind", 1080);

        // Act
        let bind = respond(ControlCommand::Bind, &req).unwrap();
        let stop = respond(ControlCommand::Stop, &req).unwrap();

        // Assert
        assert_eq!(bind.status, 501);
        assert!(bind.body.is_empty());
        assert_eq!(stop.status, 501);
        assert!(stop.body.is_empty());
    }
}

use crate::common::data::{RelayRequest, RelayResponse};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("unknown error")]
    Unknown,
}

/// Outcome of offering a request to the local expectation state. An explicit
/// sum type instead of a boolean, so the precedence decision in the pipeline
/// stays visible and testable.
pub enum LocalMatch {
    Handled(RelayResponse),
    NotHandled,
}

/// The seam towards the expectation engine. Local expectations always win
/// over control commands and over forwarding, so the pipeline consults this
/// first for every request. Implementations must be internally synchronized.
pub trait StateManager {
    fn try_serve(&self, request: &RelayRequest) -> Result<LocalMatch, Error>;
}

/// One configured expectation for [`StaticStateManager`]: an exact
/// (method, path) match paired with a canned response.
#[derive(Debug, Clone)]
pub struct Expectation {
    pub method: String,
    pub path: String,
    pub response: RelayResponse,
}

impl Expectation {
    pub fn new(method: &str, path: &str, response: RelayResponse) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            response,
        }
    }

    fn matches(&self, request: &RelayRequest) -> bool {
        self.method.eq_ignore_ascii_case(request.method()) && self.path == request.path()
    }
}

/// A minimal expectation store with exact method/path matching. A richer
/// matching engine can be plugged in through the [`StateManager`] trait.
#[derive(Default)]
pub struct StaticStateManager {
    expectations: Mutex<Vec<Expectation>>,
}

impl StaticStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_expectation(&self, expectation: Expectation) {
        let mut expectations = self.expectations.lock().unwrap();
        expectations.push(expectation);
    }

    pub fn reset(&self) {
        let mut expectations = self.expectations.lock().unwrap();
        expectations.clear();
        tracing::trace!("Deleted all expectations");
    }
}

impl StateManager for StaticStateManager {
    fn try_serve(&self, request: &RelayRequest) -> Result<LocalMatch, Error> {
        let expectations = self.expectations.lock().unwrap();

        // First configured match wins.
        for expectation in expectations.iter() {
            if expectation.matches(request) {
                return Ok(LocalMatch::Handled(expectation.response.clone()));
            }
        }

        Ok(LocalMatch::NotHandled)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::Bytes;

    fn request(method: &str, path: &str) -> RelayRequest {
        RelayRequest::new(
            "http".to_string(),
            Some("localhost:7000".to_string()),
            method.to_string(),
            path.to_string(),
            None,
            vec![],
            "HTTP/1.1".to_string(),
            Bytes::new(),
            7000,
        )
    }

    #[test]
    fn serves_matching_expectation() {
        // Arrange
        let state = StaticStateManager::new();
        state.add_expectation(Expectation::new(
            "GET",
            "/hello",
            RelayResponse::new(200).with_body("world"),
        ));

        // Act
        let outcome = state.try_serve(&request("GET", "/hello")).unwrap();

        // Assert
        match outcome {
            LocalMatch::Handled(res) => {
                assert_eq!(res.status, 200);
                assert_eq!(res.body, Bytes::from("world"));
            }
            LocalMatch::NotHandled => panic!("expected a local match"),
        }
    }

    #[test]
    fn reports_not_handled_without_a_match() {
        // Arrange
        let state = StaticStateManager::new();
        state.add_expectation(Expectation::new("GET", "/hello", RelayResponse::new(200)));

        // Act
        let outcome = state.try_serve(&request("POST", "/hello")).unwrap();

        // Assert
        assert!(matches!(outcome, LocalMatch::NotHandled));
    }

    #[test]
    fn reset_removes_all_expectations() {
        // Arrange
        let state = StaticStateManager::new();
        state.add_expectation(Expectation::new("GET", "/hello", RelayResponse::new(200)));

        // Act
        state.reset();

        // Assert
        let outcome = state.try_serve(&request("GET", "/hello")).unwrap();
        assert!(matches!(outcome, LocalMatch::NotHandled));
    }
}

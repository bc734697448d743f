use crate::common::data::{RelayRequest, RelayResponse};
use serde::Serialize;
use std::sync::Mutex;

/// One completed forwarded request/response pair.
#[derive(Serialize, Debug, Clone)]
pub struct Exchange {
    pub request: RelayRequest,
    pub response: RelayResponse,
}

impl Exchange {
    pub fn new(request: RelayRequest, response: RelayResponse) -> Self {
        Self { request, response }
    }
}

/// Sink for completed exchanges. Submission is fire-and-forget: a sink must
/// never fail back into the dispatch pipeline.
pub trait ExchangeSink {
    fn submit(&self, exchange: Exchange);
}

/// Keeps the most recent exchanges in memory, dropping the oldest entry once
/// the configured capacity is reached.
pub struct InMemoryJournal {
    capacity: usize,
    entries: Mutex<Vec<Exchange>>,
}

impl InMemoryJournal {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn entries(&self) -> Vec<Exchange> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(_) => Vec::new(),
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
        tracing::trace!("Deleted exchange journal");
    }
}

impl ExchangeSink for InMemoryJournal {
    fn submit(&self, exchange: Exchange) {
        // Capacity 0 means "keep no history".
        if self.capacity == 0 {
            return;
        }

        // A poisoned lock only loses history, never a response.
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };

        if entries.len() >= self.capacity {
            entries.remove(0);
        }
        entries.push(exchange);
    }
}

/// Emits the informational trace line for a completed forward: the response,
/// the request as JSON, and a curl rendering for replaying it by hand.
pub(crate) fn trace_forward(request: &RelayRequest, response: &RelayResponse, curl: &str) {
    let request_json = serde_json::to_string(request)
        .unwrap_or_else(|_| format!("{:?}", request));

    tracing::info!(
        "returning response:\n{:?}\n for request as json:\n{}\n as curl:\n{}",
        response,
        request_json,
        curl
    );
}

/// Emits the error trace line at the pipeline boundary. The request may be
/// absent when decoding itself failed.
pub(crate) fn trace_error(request: Option<&RelayRequest>, err: &dyn std::fmt::Display) {
    match request {
        Some(request) => tracing::error!(
            "Exception processing {} {}: {}",
            request.method(),
            request.path(),
            err
        ),
        None => tracing::error!("Exception processing request: {}", err),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::Bytes;

    fn exchange(path: &str) -> Exchange {
        let request = RelayRequest::new(
            "http".to_string(),
            Some("localhost:6000".to_string()),
            "GET".to_string(),
            path.to_string(),
            None,
            vec![],
            "HTTP/1.1".to_string(),
            Bytes::new(),
            6000,
        );
        Exchange::new(request, RelayResponse::new(200))
    }

    #[test]
    fn submitted_exchanges_are_retained() {
        // Arrange
        let journal = InMemoryJournal::new(10);

        // Act
        journal.submit(exchange("/a"));
        journal.submit(exchange("/b"));

        // Assert
        let entries = journal.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].request.path(), "/a");
        assert_eq!(entries[1].request.path(), "/b");
    }

    #[test]
    fn oldest_entry_is_evicted_at_capacity() {
        // Arrange
        let journal = InMemoryJournal::new(2);

        // Act
        journal.submit(exchange("/a"));
        journal.submit(exchange("/b"));
        journal.submit(exchange("/c"));

        // Assert
        let entries = journal.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].request.path(), "/b");
        assert_eq!(entries[1].request.path(), "/c");
    }

    #[test]
    fn zero_capacity_discards_every_exchange() {
        // Arrange
        let journal = InMemoryJournal::new(0);

        // Act
        journal.submit(exchange("/a"));

        // Assert
        assert!(journal.entries().is_empty());
    }

    #[test]
    fn clear_empties_the_journal() {
        // Arrange
        let journal = InMemoryJournal::new(10);
        journal.submit(exchange("/a"));

        // Act
        journal.clear();

        // Assert
        assert!(journal.entries().is_empty());
    }
}

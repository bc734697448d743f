//! `httprelay` is an HTTP intercepting proxy library. For every inbound
//! request it produces exactly one response from one of three sources, in
//! this fixed order:
//!
//! 1. **Local expectations** — if the configured expectation state matches
//!    the request, its canned response is served and nothing is forwarded.
//! 2. **Control commands** — `PUT /status` answers with the local port
//!    binding as JSON; `PUT /bind` and `PUT /stop` are recognized but answer
//!    501 Not Implemented.
//! 3. **Forwarding** — everything else is relayed to the upstream implied by
//!    the request, with hop-by-hop headers stripped first. An unreachable
//!    upstream yields a synthesized 404 instead of an error. Every forwarded
//!    exchange is submitted to a journal and traced with a curl rendering
//!    for replaying by hand.
//!
//! The pipeline is its own error boundary: malformed requests are answered
//! with a plain-text 400 without CORS headers, any other failure with a 400
//! carrying the regular CORS header set. No request ever goes unanswered.
//!
//! # Example
//!
//! ```no_run
//! use httprelay::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = RelayServerBuilder::new().port(1080).build()?;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Logging
//!
//! `httprelay` logs through the `tracing` crate (with `log` compatibility).
//! Forwarded exchanges are traced at info level, pipeline failures at error
//! level.

pub mod common;
pub mod server;

pub mod prelude {
    pub use crate::{
        common::{
            data::{PortBinding, RelayRequest, RelayResponse},
            http::{HttpClient, HyperHttpClient},
        },
        server::{
            builder::RelayServerBuilder,
            journal::{Exchange, ExchangeSink, InMemoryJournal},
            state::{Expectation, StaticStateManager},
            RelayServer,
        },
    };
}

pub mod builder;
pub mod control;
pub mod filter;
pub mod handler;
pub mod journal;
pub mod server;
pub mod state;

/// Per-connection facts the ingress layer attaches to every request before it
/// enters the dispatch pipeline. The local port is what the status control
/// command reports back.
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    pub scheme: &'static str,
    pub local_port: u16,
}

impl RequestMetadata {
    pub fn new(scheme: &'static str, local_port: u16) -> Self {
        Self { scheme, local_port }
    }
}

/// The fully assembled proxy server with the default collaborators.
pub type RelayServer = server::ProxyServer<handler::RelayHandler<state::StaticStateManager>>;

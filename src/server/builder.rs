use crate::{
    common::http::{HttpClient, HyperHttpClient},
    server::{
        handler::RelayHandler,
        journal::{ExchangeSink, InMemoryJournal},
        server::{ProxyServer, ProxyServerConfig},
        state::{StateManager, StaticStateManager},
        RelayServer,
    },
};
use std::{error::Error, sync::Arc};

const DEFAULT_JOURNAL_CAPACITY: usize = 100;

/// Configures and assembles a proxy server, injecting default collaborators
/// for anything not set explicitly.
pub struct RelayServerBuilder {
    port: Option<u16>,
    expose: Option<bool>,
    print_access_log: Option<bool>,
    journal_capacity: Option<usize>,
    http_client: Option<Arc<dyn HttpClient + Send + Sync + 'static>>,
    journal: Option<Arc<dyn ExchangeSink + Send + Sync + 'static>>,
}

impl Default for RelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayServerBuilder {
    pub fn new() -> Self {
        RelayServerBuilder {
            port: None,
            expose: None,
            print_access_log: None,
            journal_capacity: None,
            http_client: None,
            journal: None,
        }
    }

    /// Sets the port to bind. A random free port is chosen when unset.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn port_option(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    /// Binds on all interfaces instead of loopback only.
    pub fn expose(mut self, expose: bool) -> Self {
        self.expose = Some(expose);
        self
    }

    pub fn expose_option(mut self, expose: Option<bool>) -> Self {
        self.expose = expose;
        self
    }

    /// Emits one access log line per inbound request.
    pub fn print_access_log(mut self, enabled: bool) -> Self {
        self.print_access_log = Some(enabled);
        self
    }

    pub fn print_access_log_option(mut self, enabled: Option<bool>) -> Self {
        self.print_access_log = enabled;
        self
    }

    /// Sets how many forwarded exchanges the in-memory journal retains.
    pub fn journal_capacity(mut self, capacity: usize) -> Self {
        self.journal_capacity = Some(capacity);
        self
    }

    /// Replaces the outbound HTTP transport.
    pub fn http_client(
        mut self,
        http_client: Arc<dyn HttpClient + Send + Sync + 'static>,
    ) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Replaces the exchange sink.
    pub fn journal(mut self, journal: Arc<dyn ExchangeSink + Send + Sync + 'static>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Builds a server with a [`StaticStateManager`] as the expectation state.
    pub fn build(self) -> Result<RelayServer, Box<dyn Error>> {
        self.build_with_state(Arc::new(StaticStateManager::default()))
    }

    /// Builds a server around the given expectation state.
    pub fn build_with_state<S>(
        self,
        state: Arc<S>,
    ) -> Result<ProxyServer<RelayHandler<S>>, Box<dyn Error>>
    where
        S: StateManager + Send + Sync + 'static,
    {
        let http_client = self
            .http_client
            .unwrap_or_else(|| Arc::new(HyperHttpClient::new()));

        let journal = self.journal.unwrap_or_else(|| {
            Arc::new(InMemoryJournal::new(
                self.journal_capacity.unwrap_or(DEFAULT_JOURNAL_CAPACITY),
            ))
        });

        let handler = RelayHandler::new(state, http_client, journal);

        Ok(ProxyServer::new(
            Box::new(handler),
            ProxyServerConfig {
                static_port: self.port,
                expose: self.expose.unwrap_or(false),
                print_access_log: self.print_access_log.unwrap_or(false),
            },
        )?)
    }
}

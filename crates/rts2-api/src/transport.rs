// Shared transport configuration for building reqwest::Client instances.
//
// Both the shared connection and explicit caller-owned connections are
// built through this module, so they carry identical settings.

use std::time::Duration;

use crate::endpoint::Endpoint;
use crate::error::Error;

/// Transport settings applied to every connection the client creates.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request timeout. `None` (the default) lets a request block
    /// indefinitely, which matches the daemon's long-poll style endpoints;
    /// a hung connection then blocks its caller until the socket drops.
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            user_agent: concat!("rts2-api/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl TransportConfig {
    /// Build one connection handle to the endpoint.
    ///
    /// The pool is capped at a single idle connection per host -- the
    /// client serializes shared-connection requests anyway, so one warm
    /// socket is all that is ever kept.
    pub fn build_connection(&self, endpoint: &Endpoint) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .pool_max_idle_per_host(1);

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        if endpoint.proxied {
            let proxy = reqwest::Proxy::http(format!("http://{}:{}", endpoint.host, endpoint.port))
                .map_err(|err| Error::MalformedEndpoint {
                    message: format!("invalid proxy target: {err}"),
                })?;
            builder = builder.proxy(proxy);
        } else {
            // Proxy routing is decided at endpoint resolution, not by the
            // HTTP layer's own environment sniffing.
            builder = builder.no_proxy();
        }

        builder.build().map_err(Error::Transport)
    }

    /// Set a per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

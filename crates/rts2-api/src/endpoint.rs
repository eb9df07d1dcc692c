// Endpoint and credential resolution
//
// Turns the caller's URL (plus an optional HTTP proxy target) into the
// connection target and request path prefix, and precomputes the static
// Basic-Auth header. No network access happens here.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Resolved connection target for an RTS2 JSON server.
///
/// When a proxy is in play, `host`/`port` point at the proxy and `prefix`
/// holds the absolute URL of the origin server; otherwise `prefix` is the
/// path segment of the caller's URL (often empty). Immutable after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub prefix: String,
    /// `true` when the physical connection target is an HTTP proxy and
    /// `prefix` is an absolute URL.
    pub proxied: bool,
}

impl Endpoint {
    /// Resolve a URL into an endpoint.
    ///
    /// An explicit `http_proxy` wins over the `http_proxy` environment
    /// variable; either rewrites the connection target to the proxy while
    /// the original URL becomes the request prefix.
    pub fn resolve(url: &str, http_proxy: Option<&str>) -> Result<Self, Error> {
        let ambient = std::env::var("http_proxy").ok();
        Self::resolve_with(url, http_proxy, ambient.as_deref())
    }

    pub(crate) fn resolve_with(
        url: &str,
        http_proxy: Option<&str>,
        ambient_proxy: Option<&str>,
    ) -> Result<Self, Error> {
        let proxy = http_proxy.or(ambient_proxy);

        let (target, mut prefix) = match proxy {
            Some(proxy_url) => {
                // The origin URL becomes the request prefix; proxied
                // requests need an absolute URI.
                let prefix = if url.starts_with("http://") {
                    url.to_owned()
                } else {
                    format!("http://{url}")
                };
                (proxy_url.to_owned(), prefix)
            }
            None => (url.to_owned(), String::new()),
        };

        let target = target
            .strip_prefix("http://")
            .map_or(target.clone(), str::to_owned);

        let (host_port, path) = match target.find('/') {
            Some(idx) => (&target[..idx], &target[idx..]),
            None => (target.as_str(), ""),
        };
        if proxy.is_none() && !path.is_empty() {
            prefix = path.to_owned();
        }

        let parts: Vec<&str> = host_port.split(':').collect();
        let (host, port) = match *parts.as_slice() {
            [host] => (host.to_owned(), 80),
            [host, port] => {
                let port = port.parse::<u16>().map_err(|_| Error::MalformedEndpoint {
                    message: format!("invalid port in {host_port:?}"),
                })?;
                (host.to_owned(), port)
            }
            _ => {
                return Err(Error::MalformedEndpoint {
                    message: format!("too many ':' separating host and port in {host_port:?}"),
                });
            }
        };

        Ok(Self {
            host,
            port,
            prefix,
            proxied: proxy.is_some(),
        })
    }

    /// The full request URL for an API path, before query arguments.
    pub(crate) fn request_url(&self, path: &str) -> String {
        if self.proxied {
            format!("{}{path}", self.prefix)
        } else {
            format!("http://{}:{}{}{path}", self.host, self.port, self.prefix)
        }
    }
}

/// Build the static `Authorization: Basic ...` header value.
///
/// Encoded exactly once at client construction; absent credentials
/// encode as empty strings.
pub(crate) fn basic_auth_header(username: Option<&str>, password: Option<&SecretString>) -> String {
    let username = username.unwrap_or_default();
    let password = password.map(ExposeSecret::expose_secret).unwrap_or_default();
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

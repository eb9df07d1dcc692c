// Connection-managed JSON client
//
// Wraps one shared, lock-guarded connection to the RTS2 daemon with
// transparent recovery from stale sockets, plus an escape hatch for
// callers that bring their own connection. All device operations
// (proxy.rs) are built on the request helpers here.

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::decode::{ReadMode, decode};
use crate::endpoint::{Endpoint, basic_auth_header};
use crate::error::{Error, is_stale_connection};
use crate::transport::TransportConfig;

/// Construction-time settings for [`JsonClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server URL: `[http://]host[:port][/prefix]`.
    pub url: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// Explicit proxy target. Falls back to the `http_proxy` environment
    /// variable when unset.
    pub http_proxy: Option<String>,
    pub transport: TransportConfig,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            http_proxy: None,
            transport: TransportConfig::default(),
        }
    }

    /// Set the Basic-Auth credentials sent with every request.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Route requests through an explicit HTTP proxy.
    pub fn with_http_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.http_proxy = Some(proxy.into());
        self
    }
}

/// Client for the RTS2 daemon's JSON-over-HTTP API.
///
/// Owns a single reusable connection behind a mutex: requests on the
/// shared path are fully serialized, and a stale socket (remote end
/// closed or reset while idle) is replaced transparently with exactly
/// one retry. Callers needing long-lived independent fetches can mint
/// their own connection with [`new_connection`](Self::new_connection)
/// and pass it to the `*_with` methods, bypassing the lock -- correctness
/// of such a connection (no reuse from two tasks at once) is then on
/// the caller.
pub struct JsonClient {
    endpoint: Endpoint,
    auth_header: HeaderValue,
    transport: TransportConfig,
    shared: Mutex<reqwest::Client>,
}

impl JsonClient {
    /// Resolve the endpoint, encode credentials, and open the shared
    /// connection. No request is issued.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let endpoint = Endpoint::resolve(&config.url, config.http_proxy.as_deref())?;
        let auth_header = HeaderValue::from_str(&basic_auth_header(
            config.username.as_deref(),
            config.password.as_ref(),
        ))
        .map_err(|err| Error::MalformedEndpoint {
            message: format!("credentials not encodable as a header: {err}"),
        })?;
        let shared = config.transport.build_connection(&endpoint)?;

        Ok(Self {
            endpoint,
            auth_header,
            transport: config.transport.clone(),
            shared: Mutex::new(shared),
        })
    }

    /// The resolved connection target.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Mint an independent connection with the client's transport
    /// settings, for use with the `*_with` request methods.
    pub fn new_connection(&self) -> Result<reqwest::Client, Error> {
        self.transport.build_connection(&self.endpoint)
    }

    /// Issue a GET request and return the response with the body not yet
    /// consumed.
    ///
    /// With `conn = None` the shared connection is used under its lock,
    /// held for the request and response head only; a stale-socket
    /// failure there replaces the shared connection and retries once.
    /// With an explicit `conn` the lock is skipped and transport errors
    /// surface immediately.
    ///
    /// A non-200 status is turned into [`Error::ServerRejected`] carrying
    /// the server's `error` field.
    pub async fn request<T>(
        &self,
        path: &str,
        args: &T,
        conn: Option<&reqwest::Client>,
    ) -> Result<reqwest::Response, Error>
    where
        T: Serialize + ?Sized,
    {
        let url = self.endpoint.request_url(path);
        trace!(%url, "GET");

        let resp = match conn {
            Some(conn) => self.send(conn, &url, args).await.map_err(Error::Transport)?,
            None => {
                let mut shared = self.shared.lock().await;
                let resp = match self.send(&shared, &url, args).await {
                    Ok(resp) => resp,
                    Err(err) if is_stale_connection(&err) => {
                        debug!(%url, error = %err, "stale shared connection, replacing and retrying");
                        *shared = self.transport.build_connection(&self.endpoint)?;
                        self.send(&shared, &url, args).await.map_err(Error::Transport)?
                    }
                    Err(err) => return Err(Error::Transport(err)),
                };
                // The lock covers the request and response head; the body
                // is read after it is released.
                drop(shared);
                resp
            }
        };

        check_status(resp).await
    }

    /// GET `path` on the shared connection and decode the JSON body.
    pub async fn fetch_json<T>(&self, path: &str, args: &T) -> Result<Value, Error>
    where
        T: Serialize + ?Sized,
    {
        let resp = self.request(path, args, None).await?;
        decode(resp, ReadMode::Direct).await
    }

    /// GET `path` on a caller-supplied connection and decode the JSON body.
    pub async fn fetch_json_with<T>(
        &self,
        conn: &reqwest::Client,
        path: &str,
        args: &T,
    ) -> Result<Value, Error>
    where
        T: Serialize + ?Sized,
    {
        let resp = self.request(path, args, Some(conn)).await?;
        decode(resp, ReadMode::Direct).await
    }

    /// GET `path` on the shared connection and return the raw body.
    ///
    /// For endpoints that do not answer with JSON (image and data
    /// downloads).
    pub async fn fetch_bytes<T>(&self, path: &str, args: &T) -> Result<Bytes, Error>
    where
        T: Serialize + ?Sized,
    {
        let resp = self.request(path, args, None).await?;
        resp.bytes().await.map_err(Error::Transport)
    }

    /// GET `path` on a caller-supplied connection and return the raw body.
    ///
    /// The usual pairing for long-lived background downloads that must
    /// not hold up the shared connection.
    pub async fn fetch_bytes_with<T>(
        &self,
        conn: &reqwest::Client,
        path: &str,
        args: &T,
    ) -> Result<Bytes, Error>
    where
        T: Serialize + ?Sized,
    {
        let resp = self.request(path, args, Some(conn)).await?;
        resp.bytes().await.map_err(Error::Transport)
    }

    async fn send<T>(
        &self,
        conn: &reqwest::Client,
        url: &str,
        args: &T,
    ) -> Result<reqwest::Response, reqwest::Error>
    where
        T: Serialize + ?Sized,
    {
        conn.get(url)
            .query(args)
            .header(AUTHORIZATION, self.auth_header.clone())
            .send()
            .await
    }
}

/// Pass a 200 response through untouched; anything else is read, parsed,
/// and surfaced as the server's `error` message.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status == StatusCode::OK {
        return Ok(resp);
    }

    let body = resp.text().await.map_err(Error::Transport)?;
    let parsed: Value = serde_json::from_str(&body).map_err(|err| Error::Decode {
        message: err.to_string(),
        body: body.clone(),
    })?;
    let message = parsed
        .get("error")
        .and_then(Value::as_str)
        .map_or_else(|| format!("HTTP {status}"), str::to_owned);

    Err(Error::ServerRejected { message })
}

//! Async client for the RTS2 observatory control daemon's JSON API.
//!
//! The daemon exposes its devices (mounts, cameras, domes, sensors, ...)
//! as named bags of untyped values over JSON-over-HTTP GET endpoints.
//! This crate provides:
//!
//! - **[`JsonClient`]** — the connection-managed transport: one shared,
//!   lock-guarded connection that transparently replaces a stale socket
//!   and retries the request exactly once, plus an escape hatch for
//!   caller-owned connections used by long-lived background fetches.
//!
//! - **[`DeviceProxy`]** — a caching layer on top of the client: device
//!   values are served from a local map, refreshed on demand, and
//!   overwritten automatically by command replies.
//!
//! - **[`decode`]** / **[`ReadMode`]** — per-call choice between reading
//!   a body whole or accumulating a chunked-transfer stream, always
//!   yielding one materialized JSON value.
//!
//! Authentication is static Basic-Auth, encoded once at construction.
//! All operations are pull (GET) requests; there is no push channel.
//!
//! ```no_run
//! use rts2_api::{ClientConfig, DeviceProxy};
//!
//! # async fn example() -> Result<(), rts2_api::Error> {
//! let config = ClientConfig::new("http://localhost:8889")
//!     .with_credentials("observer", "secret");
//! let proxy = DeviceProxy::new(&config)?;
//!
//! proxy.refresh(None).await?;
//! let exposure = proxy.get_value_f64("C0", "exposure", false).await?;
//! # let _ = exposure;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod decode;
pub mod device;
pub mod endpoint;
pub mod error;
pub mod proxy;
pub mod transport;

pub use client::{ClientConfig, JsonClient};
pub use decode::{ReadMode, decode};
pub use device::{Device, DeviceType};
pub use endpoint::Endpoint;
pub use error::Error;
pub use proxy::DeviceProxy;
pub use transport::TransportConfig;

// Response decoding
//
// Turns a still-open HTTP response into one fully materialized JSON
// value. The read strategy is an explicit parameter of the decode call;
// chunked mode accumulates the whole body before parsing and is never
// exposed as an incremental stream.

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Error;

/// How to read the response body before parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Read the entire body in one go.
    Direct,
    /// Accumulate an HTTP/1.1 chunked-transfer body frame by frame.
    Chunked,
}

/// Read the full body in the given mode and parse it as JSON.
///
/// A premature connection close mid-body surfaces as [`Error::Transport`];
/// malformed JSON as [`Error::Decode`].
pub async fn decode(resp: reqwest::Response, mode: ReadMode) -> Result<Value, Error> {
    let body = read_body(resp, mode).await?;
    serde_json::from_slice(&body).map_err(|err| Error::Decode {
        message: err.to_string(),
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn read_body(resp: reqwest::Response, mode: ReadMode) -> Result<Bytes, Error> {
    match mode {
        ReadMode::Direct => resp.bytes().await.map_err(Error::Transport),
        ReadMode::Chunked => {
            let mut resp = resp;
            let mut body = BytesMut::new();
            while let Some(chunk) = resp.chunk().await.map_err(Error::Transport)? {
                body.extend_from_slice(&chunk);
            }
            Ok(body.freeze())
        }
    }
}

/// Deserialize a typed reply envelope out of an already-parsed value,
/// keeping the rendered value in the error for debugging.
pub(crate) fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T, Error> {
    T::deserialize(value).map_err(|err| Error::Decode {
        message: err.to_string(),
        body: value.to_string(),
    })
}

//! Endpoint resolution.
//!
//! The console endpoint is `/ws` on the host that serves the console. A
//! secure origin gets `wss`, anything else `ws`. Without an origin that names
//! a network host the client falls back to the local development server.

use url::Url;

use crate::error::EndpointError;

pub const FALLBACK_HOST: &str = "localhost";
pub const FALLBACK_PORT: u16 = 8765;
pub const WS_PATH: &str = "/ws";

/// `ws://localhost:8765/ws`
pub fn fallback() -> String {
    format!("ws://{}:{}{}", FALLBACK_HOST, FALLBACK_PORT, WS_PATH)
}

/// Work out the WebSocket URL to connect to.
///
/// `explicit` wins when given and must already be a `ws`/`wss` URL.
/// Otherwise the URL is derived from `origin`.
pub fn resolve(explicit: Option<&str>, origin: Option<&str>) -> Result<Url, EndpointError> {
    if let Some(raw) = explicit {
        let url = parse(raw)?;
        return match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(EndpointError::UnsupportedScheme(other.to_string())),
        };
    }

    match origin {
        Some(raw) => from_origin(raw),
        None => parse(&fallback()),
    }
}

fn from_origin(raw: &str) -> Result<Url, EndpointError> {
    let origin = parse(raw)?;

    let scheme = match origin.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        // file://, about:, data: and friends have no server to talk to
        _ => return parse(&fallback()),
    };

    let Some(host) = origin.host_str().filter(|h| !h.is_empty()) else {
        return parse(&fallback());
    };

    let derived = match origin.port() {
        Some(port) => format!("{}://{}:{}{}", scheme, host, port, WS_PATH),
        None => format!("{}://{}{}", scheme, host, WS_PATH),
    };
    parse(&derived)
}

fn parse(input: &str) -> Result<Url, EndpointError> {
    Url::parse(input).map_err(|source| EndpointError::InvalidUrl {
        input: input.to_string(),
        source,
    })
}

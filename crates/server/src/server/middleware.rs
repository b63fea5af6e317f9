//! Request limits, client address resolution, and input sanitising.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use axum::http::HeaderMap;

/// Default per-request timeout applied to all routes.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum accepted request body (1 MiB).
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Strip angle brackets and surrounding whitespace from user-supplied text.
pub fn sanitize(input: &str) -> String {
    input.replace(|c: char| c == '<' || c == '>', "").trim().to_owned()
}

/// Resolve the address a request should be attributed to.
///
/// With `trust_forwarded_for`, exactly one reverse proxy is trusted: the
/// client is the last `X-Forwarded-For` entry, the one that proxy appended.
/// Otherwise, and when the header is missing or unparsable, the socket peer
/// is used. Requests with neither share the unspecified address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> IpAddr {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit(',').next())
            .and_then(|hop| hop.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip;
        }
    }
    peer.map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

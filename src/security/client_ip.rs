//! Client identity resolution.
//!
//! # Responsibilities
//! - Derive a best-effort real client address from proxy headers
//! - Fall back to the peer socket address
//! - Produce the normalized string used as rate-limit and audit key
//!
//! # Design Decisions
//! - Forwarded headers are only honored when explicitly trusted; a client
//!   can otherwise spoof its own rate-limit key
//! - Header values are length-bounded before parsing

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

const MAX_FORWARDED_HEADER_CHARS: usize = 512;
const MAX_FORWARDED_ENTRY_CHARS: usize = 64;
const UNKNOWN_CLIENT: &str = "unknown";

/// Where the resolved address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientIpSource {
    Peer,
    Forwarded,
}

impl ClientIpSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Peer => "peer",
            Self::Forwarded => "forwarded",
        }
    }
}

/// Resolved client identity for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp {
    ip: Option<IpAddr>,
    source: ClientIpSource,
}

impl ClientIp {
    /// Resolve the client address from headers and the peer socket.
    ///
    /// `X-Forwarded-For` (first parseable entry) wins over `X-Real-IP`,
    /// which wins over the peer address, but only when `trust_forwarded`
    /// is set.
    pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded: bool) -> Self {
        if trust_forwarded {
            if let Some(ip) = forwarded_for(headers) {
                return Self {
                    ip: Some(ip),
                    source: ClientIpSource::Forwarded,
                };
            }
            if let Some(ip) = real_ip(headers) {
                return Self {
                    ip: Some(ip),
                    source: ClientIpSource::Forwarded,
                };
            }
        }
        Self {
            ip: peer.map(|a| a.ip()),
            source: ClientIpSource::Peer,
        }
    }

    pub fn ip(self) -> Option<IpAddr> {
        self.ip
    }

    pub fn source(self) -> ClientIpSource {
        self.source
    }

    /// The string keyed on by the rate limiter and audit log.
    pub fn normalized(self) -> String {
        self.ip
            .map_or_else(|| String::from(UNKNOWN_CLIENT), |ip| ip.to_string())
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    let value = headers.get("x-forwarded-for")?.to_str().ok()?;
    if value.len() > MAX_FORWARDED_HEADER_CHARS {
        return None;
    }
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| entry.len() <= MAX_FORWARDED_ENTRY_CHARS)
        .find_map(|entry| entry.parse::<IpAddr>().ok())
}

fn real_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let value = headers.get("x-real-ip")?.to_str().ok()?;
    if value.len() > MAX_FORWARDED_ENTRY_CHARS {
        return None;
    }
    value.trim().parse::<IpAddr>().ok()
}

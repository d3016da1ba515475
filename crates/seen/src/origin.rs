//! Normalisation of client network origins.
//!
//! Origins arrive as the peer address of a connection, usually `ip:port`.
//! The port changes from one connection to the next, so only the IP is
//! kept. Anything that does not parse as a socket address or an IP is
//! compared verbatim after trimming.

use std::net::{IpAddr, SocketAddr};

pub fn normalize(address: &str) -> String {
    let trimmed = address.trim();

    if let Ok(socket) = trimmed.parse::<SocketAddr>() {
        return socket.ip().to_string();
    }
    if let Ok(ip) = trimmed.parse::<IpAddr>() {
        return ip.to_string();
    }

    trimmed.to_string()
}

//! Access control for incoming connections.

use std::net::{IpAddr, SocketAddr};

use crate::config::default_allow_from;

/// Decides whether a remote endpoint may open a session.
pub trait AccessRule: Send + Sync {
    /// Returns true if `remote` is allowed to connect.
    fn is_acceptable(&self, remote: &SocketAddr) -> bool;
}

/// Allows exactly the configured list of addresses.
///
/// A remote IPv4-mapped IPv6 address (`::ffff:a.b.c.d`) is compared as the
/// plain IPv4 address when matched against an allowed IPv4 entry, so a
/// dual-stack listener behaves like an IPv4 one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressListAccessRule {
    allowed: Vec<IpAddr>,
}

impl AddressListAccessRule {
    /// Creates a rule allowing `allowed`, in order. An empty list rejects everything.
    #[must_use]
    pub const fn new(allowed: Vec<IpAddr>) -> Self {
        Self { allowed }
    }

    /// Creates a rule allowing only the IPv4 and IPv6 loopback addresses.
    #[must_use]
    pub fn loopback() -> Self {
        Self::new(default_allow_from())
    }

    /// The allowed addresses.
    #[must_use]
    pub fn allowed(&self) -> &[IpAddr] {
        &self.allowed
    }
}

impl Default for AddressListAccessRule {
    fn default() -> Self {
        Self::loopback()
    }
}

impl AccessRule for AddressListAccessRule {
    fn is_acceptable(&self, remote: &SocketAddr) -> bool {
        let remote = remote.ip();
        let mapped = match remote {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4),
            IpAddr::V4(_) => None,
        };

        self.allowed.iter().any(|allowed| {
            let candidate = match (allowed, mapped) {
                (IpAddr::V4(_), Some(v4)) => v4,
                _ => remote,
            };
            *allowed == candidate
        })
    }
}

use std::cmp::Ordering;
use std::net::{IpAddr, SocketAddr};

/// A peer address, IPv4 or IPv6.
///
/// Ordering is lexicographic over the textual address and then the numeric
/// port, matching the comparison used by the reflector-side registries. This
/// is deliberately not [`SocketAddr`]'s own byte-wise ordering: it exists
/// only so `Endpoint` can key a `BTreeMap`/sorted `Vec` deterministically in
/// tests, not to express any network-meaningful order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint(SocketAddr);

impl Endpoint {
    pub fn new(addr: SocketAddr) -> Self {
        Endpoint(addr)
    }

    pub fn ip(&self) -> IpAddr {
        self.0.ip()
    }

    pub fn port(&self) -> u16 {
        self.0.port()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.0
    }

    pub fn is_ipv4(&self) -> bool {
        self.0.is_ipv4()
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Endpoint(addr)
    }
}

impl From<Endpoint> for SocketAddr {
    fn from(e: Endpoint) -> Self {
        e.0
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Endpoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Endpoint {
    fn cmp(&self, other: &Self) -> Ordering {
        let ip_cmp = self.0.ip().to_string().cmp(&other.0.ip().to_string());
        if ip_cmp != Ordering::Equal {
            return ip_cmp;
        }
        self.0.port().cmp(&other.0.port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_textual_ip_then_port() {
        let a: Endpoint = "10.0.0.1:100".parse::<SocketAddr>().unwrap().into();
        let b: Endpoint = "10.0.0.1:200".parse::<SocketAddr>().unwrap().into();
        let c: Endpoint = "9.0.0.1:999".parse::<SocketAddr>().unwrap().into();
        assert!(a < b);
        // "9..." sorts after "10..." lexicographically as text.
        assert!(c > a);
    }

    #[test]
    fn equality_ignores_nothing() {
        let a: Endpoint = "127.0.0.1:1".parse::<SocketAddr>().unwrap().into();
        let b: Endpoint = "127.0.0.1:1".parse::<SocketAddr>().unwrap().into();
        let c: Endpoint = "127.0.0.1:2".parse::<SocketAddr>().unwrap().into();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}

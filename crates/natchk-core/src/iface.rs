//! Local network interface enumeration.
//!
//! Used only to answer "is my observed address one of my own interface
//! addresses?" during classification. Built on `if-addrs`, the same crate
//! used for local interface discovery elsewhere in the retrieved corpus.

use std::net::{Ipv4Addr, Ipv6Addr};

/// One local interface's addresses, by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddress {
    pub name: String,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

/// Enumerate local network interfaces.
///
/// IPv6 addresses are collected only so an observed IPv6 address could, in
/// principle, be recognized as local; no IPv6 probing is ever performed.
pub fn enumerate_interfaces() -> crate::error::Result<Vec<InterfaceAddress>> {
    let raw = if_addrs::get_if_addrs()?;
    let mut by_name: std::collections::BTreeMap<String, InterfaceAddress> =
        std::collections::BTreeMap::new();

    for iface in raw {
        let entry = by_name
            .entry(iface.name.clone())
            .or_insert_with(|| InterfaceAddress {
                name: iface.name.clone(),
                ipv4: None,
                ipv6: None,
            });
        match iface.ip() {
            std::net::IpAddr::V4(v4) => entry.ipv4 = Some(v4),
            std::net::IpAddr::V6(v6) => entry.ipv6 = Some(v6),
        }
    }

    Ok(by_name.into_values().collect())
}

/// True if `ip` matches the IPv4 or IPv6 address of any local interface.
pub fn is_local_address(interfaces: &[InterfaceAddress], ip: std::net::IpAddr) -> bool {
    interfaces.iter().any(|i| match ip {
        std::net::IpAddr::V4(v4) => i.ipv4 == Some(v4),
        std::net::IpAddr::V6(v6) => i.ipv6 == Some(v6),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_matching_ipv4() {
        let ifaces = vec![InterfaceAddress {
            name: "eth0".into(),
            ipv4: Some(Ipv4Addr::new(192, 0, 2, 10)),
            ipv6: None,
        }];
        assert!(is_local_address(
            &ifaces,
            std::net::IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10))
        ));
        assert!(!is_local_address(
            &ifaces,
            std::net::IpAddr::V4(Ipv4Addr::new(192, 0, 2, 11))
        ));
    }
}

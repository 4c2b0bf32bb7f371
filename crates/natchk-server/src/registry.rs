//! The sibling registry: how co-hosted reflectors find each other.
//!
//! This is an explicitly constructed value shared by the reflectors that
//! are hosted in the same process, rather than process-wide static state —
//! it is built once at startup from the set of endpoints the process was
//! told to bind, and handed to every [`crate::reflector::Reflector`].

use natchk_core::endpoint::Endpoint;
use natchk_transport::Transport;

#[derive(Clone)]
struct Member {
    addr: Endpoint,
    transport: Transport,
}

/// Lets one co-hosted reflector ask another to emit a datagram on its
/// behalf, for the restricted-cone test (SPEC_FULL.md §4.3).
pub struct SiblingRegistry {
    members: Vec<Member>,
}

impl SiblingRegistry {
    pub fn new(members: Vec<(Endpoint, Transport)>) -> Self {
        SiblingRegistry {
            members: members
                .into_iter()
                .map(|(addr, transport)| Member { addr, transport })
                .collect(),
        }
    }

    /// Any bound member other than `self_addr`, if one exists.
    pub fn any_sibling_of(&self, self_addr: Endpoint) -> Option<Transport> {
        self.members
            .iter()
            .find(|m| m.addr != self_addr)
            .map(|m| m.transport.clone())
    }
}

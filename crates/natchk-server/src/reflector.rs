//! The stateless per-datagram reflector (SPEC_FULL.md §4.3).

use crate::registry::SiblingRegistry;
use natchk_core::codec::Message;
use natchk_core::endpoint::Endpoint;
use natchk_transport::{Subscriber, Transport};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Reflector {
    self_addr: Endpoint,
    transport: Transport,
    registry: Arc<SiblingRegistry>,
}

impl Reflector {
    pub fn new(self_addr: Endpoint, transport: Transport, registry: Arc<SiblingRegistry>) -> Self {
        Reflector {
            self_addr,
            transport,
            registry,
        }
    }
}

impl Subscriber for Reflector {
    fn on_datagram(&self, peer: SocketAddr, data: &[u8]) {
        let msg = match Message::decode(data) {
            Ok(m) => m,
            Err(e) => {
                warn!(%peer, error = %e, "dropping malformed datagram");
                return;
            }
        };

        match msg {
            Message::GetAddr => {
                debug!(%peer, "GETADDR");
                self.transport
                    .send(peer, Message::Addr(Endpoint::new(peer)).encode());
            }
            Message::ChkFullCone(alternate) => {
                debug!(%peer, %alternate, "CHKFULLCONE");
                let client = Endpoint::new(peer);
                self.transport
                    .send(alternate.socket_addr(), Message::SendFullCone(client).encode());
            }
            Message::SendFullCone(client) => {
                debug!(%peer, %client, "SENDFULLCONE");
                self.transport.send(client.socket_addr(), Message::FullCone.encode());
            }
            Message::ChkRestrictedCone => {
                debug!(%peer, "CHKRESTRICTEDCONE");
                match self.registry.any_sibling_of(self.self_addr) {
                    Some(sibling) => {
                        sibling.send(peer, Message::RestrictedCone.encode());
                    }
                    None => {
                        warn!("no sibling available to answer CHKRESTRICTEDCONE; client will fall back to PORT_RESTRICTED_CONE");
                    }
                }
            }
            Message::Addr(_) | Message::FullCone | Message::RestrictedCone => {
                // Client-bound messages received by a server are not part of
                // the reflector's protocol surface; ignore them.
                warn!(%peer, "ignoring client-bound message received by reflector");
            }
        }
    }
}

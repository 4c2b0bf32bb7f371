use crate::endpoint::Endpoint;
use crate::error::{Error, Result};

/// An ordered, non-empty list of cooperating reflector servers.
///
/// Order is significant: `server(0)` is the primary used for address
/// discovery and the port-restricted-cone probe; `server(1)`, when present,
/// is the alternate used for the full-cone test.
#[derive(Debug, Clone)]
pub struct ServerList {
    servers: Vec<Endpoint>,
}

impl ServerList {
    pub fn new(servers: Vec<Endpoint>) -> Result<Self> {
        if servers.is_empty() {
            return Err(Error::argument("server list must not be empty"));
        }
        Ok(ServerList { servers })
    }

    pub fn primary(&self) -> Endpoint {
        self.servers[0]
    }

    pub fn alternate(&self) -> Option<Endpoint> {
        self.servers.get(1).copied()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.servers.iter()
    }
}

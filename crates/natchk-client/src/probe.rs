//! The probe task family: `GetAddr`, `CheckFullCone`, `CheckRestrictedCone`.
//!
//! Each probe is a short-lived, periodic request/response exchange that
//! registers as a transport subscriber for its own lifetime and completes
//! exactly once, regardless of whether it succeeds, exhausts its retries,
//! or is dropped without ever firing (the `Drop` impls are a last-resort
//! safety net; the normal path always completes before the task is
//! released).

use natchk_core::codec::Message;
use natchk_core::endpoint::Endpoint;
use natchk_transport::{Subscriber, SubscriberId, Transport};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, trace};

/// Outcome of a `GetAddr` probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetAddrOutcome {
    Observed(Endpoint),
    Exhausted,
}

/// Outcome of a `CheckFullCone` probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullConeOutcome {
    Confirmed,
    Exhausted,
}

/// Outcome of a `CheckRestrictedCone` probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictedConeOutcome {
    Restricted,
    PortRestricted,
}

struct ProbeCore<O: Send + 'static> {
    transport: Transport,
    target: Endpoint,
    try_count: Mutex<u32>,
    completion: Mutex<Option<oneshot::Sender<O>>>,
    done: AtomicBool,
    sub_id: Mutex<Option<SubscriberId>>,
}

impl<O: Send + 'static> ProbeCore<O> {
    fn new(transport: Transport, target: Endpoint, tx: oneshot::Sender<O>) -> Self {
        ProbeCore {
            transport,
            target,
            try_count: Mutex::new(0),
            completion: Mutex::new(Some(tx)),
            done: AtomicBool::new(false),
            sub_id: Mutex::new(None),
        }
    }

    /// Complete exactly once: unregister, then send the outcome. Returns
    /// `true` the first time it is called for this probe, `false` on any
    /// later call (including from `Drop`).
    fn complete(&self, outcome: O) -> bool {
        if self.done.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Some(id) = self.sub_id.lock().unwrap().take() {
            self.transport.unsubscribe(id);
        }
        if let Some(tx) = self.completion.lock().unwrap().take() {
            let _ = tx.send(outcome);
        }
        true
    }
}

macro_rules! impl_drop_fallback {
    ($ty:ident, $fallback:expr) => {
        impl Drop for $ty {
            fn drop(&mut self) {
                self.core.complete($fallback);
            }
        }
    };
}

/// Discovers how the client's own address appears to a single server.
pub struct GetAddrProbe {
    core: ProbeCore<GetAddrOutcome>,
}

impl GetAddrProbe {
    const INTERVAL: Duration = Duration::from_millis(2000);
    const MAX_TRIES: u32 = 5;

    pub fn spawn(transport: Transport, target: Endpoint) -> oneshot::Receiver<GetAddrOutcome> {
        let (tx, rx) = oneshot::channel();
        let probe = Arc::new(GetAddrProbe {
            core: ProbeCore::new(transport.clone(), target, tx),
        });
        let id = transport.subscribe(probe.clone());
        *probe.core.sub_id.lock().unwrap() = Some(id);

        let timer_probe = probe.clone();
        transport.spawn_task(move || async move { timer_probe.run_timer().await });
        rx
    }

    async fn run_timer(self: Arc<Self>) {
        loop {
            if self.core.done.load(Ordering::SeqCst) {
                return;
            }
            let count = {
                let mut c = self.core.try_count.lock().unwrap();
                if *c >= Self::MAX_TRIES {
                    break;
                }
                *c += 1;
                *c
            };
            trace!(target = %self.core.target, attempt = count, "sending GETADDR");
            self.core
                .transport
                .send(self.core.target.socket_addr(), Message::GetAddr.encode());
            tokio::time::sleep(Self::INTERVAL).await;
        }
        self.core.complete(GetAddrOutcome::Exhausted);
    }
}

impl Subscriber for GetAddrProbe {
    fn on_datagram(&self, peer: SocketAddr, data: &[u8]) {
        if self.core.done.load(Ordering::SeqCst) || peer != self.core.target.socket_addr() {
            return;
        }
        if let Ok(Message::Addr(ep)) = Message::decode(data) {
            self.core.complete(GetAddrOutcome::Observed(ep));
        }
    }
}

impl_drop_fallback!(GetAddrProbe, GetAddrOutcome::Exhausted);

/// Asks `primary` to have `alternate` contact the client back, testing
/// whether the NAT is full-cone.
pub struct CheckFullConeProbe {
    core: ProbeCore<FullConeOutcome>,
    alternate: Endpoint,
}

impl CheckFullConeProbe {
    const INTERVAL: Duration = Duration::from_millis(2000);
    const MAX_TRIES: u32 = 10;

    pub fn spawn(
        transport: Transport,
        primary: Endpoint,
        alternate: Endpoint,
    ) -> oneshot::Receiver<FullConeOutcome> {
        let (tx, rx) = oneshot::channel();
        let probe = Arc::new(CheckFullConeProbe {
            core: ProbeCore::new(transport.clone(), primary, tx),
            alternate,
        });
        let id = transport.subscribe(probe.clone());
        *probe.core.sub_id.lock().unwrap() = Some(id);

        let timer_probe = probe.clone();
        transport.spawn_task(move || async move { timer_probe.run_timer().await });
        rx
    }

    async fn run_timer(self: Arc<Self>) {
        loop {
            if self.core.done.load(Ordering::SeqCst) {
                return;
            }
            let count = {
                let mut c = self.core.try_count.lock().unwrap();
                if *c >= Self::MAX_TRIES {
                    break;
                }
                *c += 1;
                *c
            };
            debug!(attempt = count, "sending CHKFULLCONE");
            self.core.transport.send(
                self.core.target.socket_addr(),
                Message::ChkFullCone(self.alternate).encode(),
            );
            tokio::time::sleep(Self::INTERVAL).await;
        }
        self.core.complete(FullConeOutcome::Exhausted);
    }
}

impl Subscriber for CheckFullConeProbe {
    fn on_datagram(&self, peer: SocketAddr, data: &[u8]) {
        if self.core.done.load(Ordering::SeqCst) || peer != self.alternate.socket_addr() {
            return;
        }
        if let Ok(Message::FullCone) = Message::decode(data) {
            self.core.complete(FullConeOutcome::Confirmed);
        }
    }
}

impl_drop_fallback!(CheckFullConeProbe, FullConeOutcome::Exhausted);

/// Asks the primary server to have a sibling reflect a datagram back,
/// distinguishing restricted-cone from port-restricted-cone.
///
/// The request is sent to `target` (= `server[0]`), but per §4.3 the
/// `RESTRICTEDCONE` reply is emitted by a sibling reflector, not the
/// primary itself — so, mirroring `CheckFullConeProbe`'s primary/alternate
/// split, the accept filter matches `alternate` (= `server[1]`), never
/// `target`.
pub struct CheckRestrictedConeProbe {
    core: ProbeCore<RestrictedConeOutcome>,
    alternate: Endpoint,
}

impl CheckRestrictedConeProbe {
    const INTERVAL: Duration = Duration::from_millis(2000);
    const MAX_TRIES: u32 = 5;

    pub fn spawn(
        transport: Transport,
        target: Endpoint,
        alternate: Endpoint,
    ) -> oneshot::Receiver<RestrictedConeOutcome> {
        let (tx, rx) = oneshot::channel();
        let probe = Arc::new(CheckRestrictedConeProbe {
            core: ProbeCore::new(transport.clone(), target, tx),
            alternate,
        });
        let id = transport.subscribe(probe.clone());
        *probe.core.sub_id.lock().unwrap() = Some(id);

        let timer_probe = probe.clone();
        transport.spawn_task(move || async move { timer_probe.run_timer().await });
        rx
    }

    async fn run_timer(self: Arc<Self>) {
        loop {
            if self.core.done.load(Ordering::SeqCst) {
                return;
            }
            let count = {
                let mut c = self.core.try_count.lock().unwrap();
                if *c >= Self::MAX_TRIES {
                    break;
                }
                *c += 1;
                *c
            };
            trace!(attempt = count, "sending CHKRESTRICTEDCONE");
            self.core.transport.send(
                self.core.target.socket_addr(),
                Message::ChkRestrictedCone.encode(),
            );
            tokio::time::sleep(Self::INTERVAL).await;
        }
        self.core.complete(RestrictedConeOutcome::PortRestricted);
    }
}

impl Subscriber for CheckRestrictedConeProbe {
    fn on_datagram(&self, peer: SocketAddr, data: &[u8]) {
        if self.core.done.load(Ordering::SeqCst) || peer != self.alternate.socket_addr() {
            return;
        }
        if let Ok(Message::RestrictedCone) = Message::decode(data) {
            self.core.complete(RestrictedConeOutcome::Restricted);
        }
    }
}

impl_drop_fallback!(CheckRestrictedConeProbe, RestrictedConeOutcome::PortRestricted);

#[cfg(test)]
mod tests {
    use super::*;
    use natchk_transport::Transport;

    fn ep(s: &str) -> Endpoint {
        Endpoint::new(s.parse().unwrap())
    }

    #[tokio::test]
    async fn get_addr_completes_on_matching_reply() {
        let client = Transport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let server = Transport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let server_ep = ep(&server.local_addr().to_string());

        struct Echo(Transport);
        impl Subscriber for Echo {
            fn on_datagram(&self, peer: SocketAddr, data: &[u8]) {
                if let Ok(Message::GetAddr) = Message::decode(data) {
                    self.0
                        .send(peer, Message::Addr(Endpoint::new(peer)).encode());
                }
            }
        }
        server.subscribe(Arc::new(Echo(server.clone())));

        let rx = GetAddrProbe::spawn(client.clone(), server_ep);
        let outcome = tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .expect("did not time out")
            .unwrap();
        match outcome {
            GetAddrOutcome::Observed(observed) => {
                assert_eq!(observed.socket_addr(), client.local_addr());
            }
            GetAddrOutcome::Exhausted => panic!("expected an observation"),
        }

        client.shutdown().await;
        server.shutdown().await;
    }

    #[tokio::test]
    async fn get_addr_exhausts_with_no_server() {
        let client = Transport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        // Bind and immediately release a port so nothing answers there.
        let placeholder = Transport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let dead = ep(&placeholder.local_addr().to_string());
        placeholder.shutdown().await;

        let rx = GetAddrProbe::spawn(client.clone(), dead);
        // MAX_TRIES(5) * INTERVAL(2s) would be slow; this test only checks
        // that a single non-matching datagram does not complete the probe.
        let result = tokio::time::timeout(Duration::from_millis(200), rx).await;
        assert!(result.is_err(), "probe should still be waiting");

        client.shutdown().await;
    }
}

//! End-to-end full-cone reflection chain: CHKFULLCONE -> SENDFULLCONE -> FULLCONE.

use natchk_core::codec::Message;
use natchk_core::endpoint::Endpoint;
use natchk_server::reflector::Reflector;
use natchk_server::registry::SiblingRegistry;
use natchk_transport::{Subscriber, Transport};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct Capture(Arc<AtomicBool>);

impl Subscriber for Capture {
    fn on_datagram(&self, _peer: SocketAddr, data: &[u8]) {
        if let Ok(Message::FullCone) = Message::decode(data) {
            self.0.store(true, Ordering::SeqCst);
        }
    }
}

#[tokio::test]
async fn full_cone_chain_delivers_fullcone_from_alternate() {
    let primary = Transport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let alternate = Transport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let client = Transport::bind("127.0.0.1:0".parse().unwrap()).unwrap();

    let primary_addr = Endpoint::new(primary.local_addr());
    let alternate_addr = Endpoint::new(alternate.local_addr());
    let registry = Arc::new(SiblingRegistry::new(vec![
        (primary_addr, primary.clone()),
        (alternate_addr, alternate.clone()),
    ]));

    primary.subscribe(Arc::new(Reflector::new(
        primary_addr,
        primary.clone(),
        registry.clone(),
    )));
    alternate.subscribe(Arc::new(Reflector::new(
        alternate_addr,
        alternate.clone(),
        registry,
    )));

    let got = Arc::new(AtomicBool::new(false));
    client.subscribe(Arc::new(Capture(got.clone())));

    client.send(
        primary.local_addr(),
        Message::ChkFullCone(alternate_addr).encode(),
    );
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;

    assert!(got.load(Ordering::SeqCst), "expected FULLCONE from alternate");

    client.shutdown().await;
    primary.shutdown().await;
    alternate.shutdown().await;
}

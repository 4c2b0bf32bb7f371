use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a registered [`Subscriber`] so it can later be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

impl SubscriberId {
    /// Allocate a fresh, process-wide unique id. Generation does not touch
    /// the event loop thread: any caller may mint an id before the
    /// corresponding `subscribe` job has actually run.
    pub fn next() -> Self {
        SubscriberId(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Receives every inbound datagram for as long as it stays registered.
///
/// Dispatch is synchronous and runs on the transport's single event thread;
/// a subscriber must not block. Long-running reactions (timers, further
/// sends) are expected to be scheduled via [`crate::Transport`] rather than
/// performed inline.
pub trait Subscriber: Send + Sync {
    fn on_datagram(&self, peer: SocketAddr, data: &[u8]);
}

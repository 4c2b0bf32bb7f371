#![forbid(unsafe_code)]

//! A UDP transport whose state lives on exactly one event thread.
//!
//! [`Transport`] is a cheap, `Clone`-able handle. All mutation of the
//! underlying socket and subscriber list happens inside [`EventLoopState`],
//! which only ever runs on a dedicated OS thread driving a
//! `current_thread` tokio runtime. Every other thread communicates with it
//! by posting [`Command`] closures over an unbounded channel; this is the
//! only permitted form of cross-thread synchronization, so no lock guards
//! the subscriber list itself.

pub mod subscriber;

pub use subscriber::{Subscriber, SubscriberId};

use natchk_core::error::{Error, Result};
use std::cell::Cell;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace, warn};

thread_local! {
    static ON_EVENT_THREAD: Cell<bool> = Cell::new(false);
}

/// Work posted onto the event thread.
pub enum Command {
    /// Run an arbitrary closure with exclusive access to the loop state.
    Job(Box<dyn FnOnce(&mut EventLoopState) + Send>),
    /// Stop the loop; the sender is notified once the socket is released.
    Shutdown(oneshot::Sender<()>),
}

/// State exclusively owned by the event thread. No field here is ever
/// touched from any other thread.
pub struct EventLoopState {
    socket: Arc<UdpSocket>,
    subscribers: Vec<(SubscriberId, Arc<dyn Subscriber>)>,
}

impl EventLoopState {
    fn dispatch(&self, peer: SocketAddr, data: &[u8]) {
        // Dispatch to a snapshot: a subscriber deregistered mid-dispatch by a
        // job queued concurrently only takes effect on the next Command, and
        // one registered during this dispatch does not see this datagram.
        let snapshot: Vec<Arc<dyn Subscriber>> =
            self.subscribers.iter().map(|(_, s)| s.clone()).collect();
        for sub in snapshot {
            sub.on_datagram(peer, data);
        }
    }

    pub fn subscribe(&mut self, id: SubscriberId, sub: Arc<dyn Subscriber>) {
        self.subscribers.push((id, sub));
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) {
        self.subscribers.retain(|(existing, _)| *existing != id);
    }

    pub fn send_to(&self, peer: SocketAddr, data: &[u8]) {
        match self.socket.try_send_to(data, peer) {
            Ok(_) => trace!(%peer, bytes = data.len(), "sent datagram"),
            Err(e) => error!(%peer, error = %e, "send failed"),
        }
    }
}

/// A cheap, shareable handle to a running transport.
#[derive(Clone)]
pub struct Transport {
    cmd_tx: mpsc::UnboundedSender<Command>,
    join: Arc<Mutex<Option<JoinHandle<()>>>>,
    shut_down: Arc<AtomicBool>,
    local_addr: SocketAddr,
}

impl Transport {
    /// Bind a UDP socket synchronously and start its event loop on a new
    /// dedicated OS thread.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        use socket2::{Domain, Protocol, Socket, Type};

        let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        let std_socket: std::net::UdpSocket = socket.into();
        let local_addr = std_socket.local_addr()?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();

        let join = std::thread::Builder::new()
            .name("natchk-event-loop".into())
            .spawn(move || run_event_loop(std_socket, cmd_rx))
            .map_err(Error::Io)?;

        Ok(Transport {
            cmd_tx,
            join: Arc::new(Mutex::new(Some(join))),
            shut_down: Arc::new(AtomicBool::new(false)),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run `job` on the event thread. Returns immediately; `job` may run
    /// after this call returns.
    pub fn post(&self, job: impl FnOnce(&mut EventLoopState) + Send + 'static) {
        if self.cmd_tx.send(Command::Job(Box::new(job))).is_err() {
            warn!("posted job after transport shutdown");
        }
    }

    /// Enqueue a datagram send. Completes asynchronously on the event
    /// thread; failures are logged there and not surfaced to the caller,
    /// per the "transient send failure" policy.
    pub fn send(&self, peer: SocketAddr, data: Vec<u8>) {
        self.post(move |state| state.send_to(peer, &data));
    }

    /// Register a subscriber, returning its id immediately. The id is valid
    /// to pass to [`Transport::unsubscribe`] even before the registration
    /// job has actually run on the event thread.
    pub fn subscribe(&self, sub: Arc<dyn Subscriber>) -> SubscriberId {
        let id = SubscriberId::next();
        self.post(move |state| state.subscribe(id, sub));
        id
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.post(move |state| state.unsubscribe(id));
    }

    /// Start an async task on the event thread's own runtime, so it and
    /// datagram dispatch are only ever cooperatively interleaved, never
    /// truly concurrent.
    pub fn spawn_task<F>(&self, make: impl FnOnce() -> F + Send + 'static)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.post(move |_state| {
            tokio::spawn(make());
        });
    }

    /// Stop the event loop and release the socket. Safe to call from any
    /// thread, including the event thread itself (unlike
    /// [`Transport::shutdown_sync`]).
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Block the calling thread until shutdown completes.
    ///
    /// # Panics
    ///
    /// Panics if called from the transport's own event thread, which would
    /// deadlock waiting on itself.
    pub fn shutdown_sync(&self) {
        let on_event_thread = ON_EVENT_THREAD.with(|c| c.get());
        assert!(
            !on_event_thread,
            "shutdown_sync() must not be called from the transport's event thread"
        );
        futures::executor::block_on(self.shutdown());
        if let Some(handle) = self.join.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

fn run_event_loop(std_socket: std::net::UdpSocket, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
    ON_EVENT_THREAD.with(|c| c.set(true));

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start event loop runtime");
            return;
        }
    };

    runtime.block_on(async move {
        let socket = match UdpSocket::from_std(std_socket) {
            Ok(s) => Arc::new(s),
            Err(e) => {
                error!(error = %e, "failed to adopt bound socket into runtime");
                return;
            }
        };
        let mut state = EventLoopState {
            socket: socket.clone(),
            subscribers: Vec::new(),
        };

        let mut buf = [0u8; 1500];
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Job(job)) => job(&mut state),
                        Some(Command::Shutdown(done)) => {
                            debug!("event loop shutting down");
                            let _ = done.send(());
                            break;
                        }
                        None => break,
                    }
                }
                recv = socket.recv_from(&mut buf) => {
                    match recv {
                        Ok((n, peer)) => state.dispatch(peer, &buf[..n]),
                        Err(e) => warn!(error = %e, "recv_from failed"),
                    }
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Recorder {
        count: AtomicUsize,
    }

    impl Subscriber for Recorder {
        fn on_datagram(&self, _peer: SocketAddr, _data: &[u8]) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn send_and_receive_loopback() {
        let a = Transport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let b = Transport::bind("127.0.0.1:0".parse().unwrap()).unwrap();

        let recorder = Arc::new(Recorder {
            count: AtomicUsize::new(0),
        });
        b.subscribe(recorder.clone());

        let b_addr = b.local_addr();
        a.send(b_addr, vec![1, 2, 3]);

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(recorder.count.load(Ordering::SeqCst), 1);

        a.shutdown().await;
        b.shutdown().await;
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let a = Transport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let b = Transport::bind("127.0.0.1:0".parse().unwrap()).unwrap();

        let recorder = Arc::new(Recorder {
            count: AtomicUsize::new(0),
        });
        let id = b.subscribe(recorder.clone());
        b.unsubscribe(id);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        a.send(b.local_addr(), vec![9]);
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        assert_eq!(recorder.count.load(Ordering::SeqCst), 0);

        a.shutdown().await;
        b.shutdown().await;
    }
}

//! In-process loopback transport.
//!
//! [`MemoryTransport`] is the client end, [`MemoryPeer`] the server end. Both
//! share one link behind a mutex. A peer can push datagrams, drop the
//! connection, refuse new connections, or install a responder that answers
//! each client datagram synchronously, which is what a blocking handshake
//! needs: nobody else gets to run while the client waits.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{ChannelId, Transport, TransportError, TransportEvent};

/// Answers one client datagram with zero or more events for the client.
type Responder =
    Box<dyn FnMut(ChannelId, &[u8]) -> Vec<TransportEvent> + Send>;

#[derive(Default)]
struct Link {
    refusing: bool,
    open: bool,
    open_count: u32,
    close_count: u32,
    last_address: Option<(String, u16)>,
    inbound: VecDeque<TransportEvent>,
    sent: Vec<(ChannelId, Vec<u8>)>,
    responder: Option<Responder>,
}

impl Link {
    fn deliver(&mut self, events: Vec<TransportEvent>) {
        for event in events {
            if matches!(event, TransportEvent::Disconnected { .. }) {
                self.open = false;
            }
            self.inbound.push_back(event);
        }
    }
}

fn lock(link: &Mutex<Link>) -> MutexGuard<'_, Link> {
    // A responder that panicked leaves the data intact; keep going.
    link.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Client end of an in-process connection.
pub struct MemoryTransport {
    link: Arc<Mutex<Link>>,
}

/// Server end of an in-process connection.
///
/// Cloning a peer yields another handle to the same link.
#[derive(Clone)]
pub struct MemoryPeer {
    link: Arc<Mutex<Link>>,
}

impl MemoryTransport {
    /// Creates a connected transport/peer pair. The transport starts closed.
    pub fn pair() -> (MemoryTransport, MemoryPeer) {
        let link = Arc::new(Mutex::new(Link::default()));
        (
            MemoryTransport {
                link: Arc::clone(&link),
            },
            MemoryPeer { link },
        )
    }
}

impl Transport for MemoryTransport {
    fn open(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        let mut link = lock(&self.link);
        if link.open {
            link.open = false;
            link.close_count += 1;
        }
        link.inbound.clear();
        link.last_address = Some((host.to_string(), port));

        if link.refusing {
            tracing::debug!(host, port, "memory peer refused connection");
            return Err(TransportError::ConnectionRefused {
                addr: format!("{host}:{port}"),
                reason: "peer is not accepting connections".into(),
            });
        }

        link.open = true;
        link.open_count += 1;
        tracing::debug!(host, port, "memory transport opened");
        Ok(())
    }

    fn close(&mut self) {
        let mut link = lock(&self.link);
        if link.open {
            link.open = false;
            link.close_count += 1;
        }
        link.inbound.clear();
    }

    fn send(&mut self, channel: ChannelId, data: &[u8]) {
        // The responder runs without the lock held so it may use a cloned
        // `MemoryPeer` of its own.
        let mut responder = {
            let mut link = lock(&self.link);
            if !link.open {
                tracing::warn!(%channel, "send on closed memory transport dropped");
                return;
            }
            link.sent.push((channel, data.to_vec()));
            link.responder.take()
        };

        if let Some(respond) = responder.as_mut() {
            let events = respond(channel, data);
            let mut link = lock(&self.link);
            link.deliver(events);
            if link.responder.is_none() {
                link.responder = responder;
            }
        }
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        lock(&self.link).inbound.drain(..).collect()
    }

    fn is_open(&self) -> bool {
        lock(&self.link).open
    }
}

impl MemoryPeer {
    /// Makes future `open` calls fail with `ConnectionRefused` (or succeed
    /// again when `false`).
    pub fn set_refusing(&self, refusing: bool) {
        lock(&self.link).refusing = refusing;
    }

    /// Installs a responder called for every datagram the client sends.
    /// Its returned events are delivered on the client's next poll.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(ChannelId, &[u8]) -> Vec<TransportEvent> + Send + 'static,
    {
        lock(&self.link).responder = Some(Box::new(responder));
    }

    /// Removes the responder; client datagrams are then only recorded.
    pub fn clear_responder(&self) {
        lock(&self.link).responder = None;
    }

    /// Queues a datagram for the client.
    pub fn push(&self, channel: ChannelId, data: impl Into<Vec<u8>>) {
        lock(&self.link).deliver(vec![TransportEvent::Received {
            channel,
            data: data.into(),
        }]);
    }

    /// Drops the connection from the server side.
    pub fn drop_connection(&self, reason: impl Into<String>) {
        let mut link = lock(&self.link);
        if link.open {
            link.deliver(vec![TransportEvent::Disconnected {
                reason: reason.into(),
            }]);
        }
    }

    /// Takes every datagram the client has sent so far.
    pub fn take_sent(&self) -> Vec<(ChannelId, Vec<u8>)> {
        std::mem::take(&mut lock(&self.link).sent)
    }

    /// Whether the client currently holds an open connection.
    pub fn is_open(&self) -> bool {
        lock(&self.link).open
    }

    /// How many `open` calls have succeeded.
    pub fn open_count(&self) -> u32 {
        lock(&self.link).open_count
    }

    /// How many open connections the client has closed.
    pub fn close_count(&self) -> u32 {
        lock(&self.link).close_count
    }

    /// Host and port of the most recent `open` attempt.
    pub fn last_address(&self) -> Option<(String, u16)> {
        lock(&self.link).last_address.clone()
    }
}

//! Packet hand-off between producers and the ingestion consumer.
//!
//! The queue is a message-passing channel: producers own a cloneable
//! [`PacketSender`], the single consumer owns the [`PacketReceiver`]. Neither
//! side ever blocks.
//!
//! The queue is **unbounded**. If the consumer stalls, memory grows without
//! limit; producers are never slowed down and nothing is dropped.

use tokio::sync::mpsc;
use tracing::trace;

use crate::types::RawPacket;

/// Create a connected sender/receiver pair
pub fn packet_queue() -> (PacketSender, PacketReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PacketSender { tx }, PacketReceiver { rx })
}

/// Producer side of the packet queue
#[derive(Debug, Clone)]
pub struct PacketSender {
    tx: mpsc::UnboundedSender<RawPacket>,
}

impl PacketSender {
    /// Append a payload. Never blocks and never fails.
    ///
    /// If the receiver has been dropped there is nobody left to deliver to and
    /// the payload is discarded.
    pub fn enqueue(&self, packet: impl Into<RawPacket>) {
        if let Err(rejected) = self.tx.send(packet.into()) {
            trace!("Queue receiver dropped, discarding {} byte packet", rejected.0.len());
        }
    }

    /// Whether the consumer side is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the packet queue
#[derive(Debug)]
pub struct PacketReceiver {
    rx: mpsc::UnboundedReceiver<RawPacket>,
}

impl PacketReceiver {
    /// Take the oldest unread payload, or `None` if nothing is queued
    pub fn try_dequeue(&mut self) -> Option<RawPacket> {
        self.rx.try_recv().ok()
    }

    /// Iterate over everything queued right now
    ///
    /// Packets enqueued while the iterator is being consumed are picked up as
    /// well; the iterator ends as soon as the queue is momentarily empty.
    pub fn drain(&mut self) -> Drain<'_> {
        Drain { receiver: self }
    }

    /// Wait for the next payload; `None` once every sender is gone and the
    /// queue is empty
    pub async fn recv(&mut self) -> Option<RawPacket> {
        self.rx.recv().await
    }

    /// Number of queued payloads
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Every sender is gone and nothing is left to read
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed() && self.rx.is_empty()
    }
}

/// Iterator returned by [`PacketReceiver::drain`]
pub struct Drain<'a> {
    receiver: &'a mut PacketReceiver,
}

impl Iterator for Drain<'_> {
    type Item = RawPacket;

    fn next(&mut self) -> Option<RawPacket> {
        self.receiver.try_dequeue()
    }
}

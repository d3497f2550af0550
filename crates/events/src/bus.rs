//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus distributes committed events; the event store stays the source of
//! truth. Delivery is at-least-once and fire-and-forget: a slow or dead
//! subscriber never fails the command that produced the event, so consumers
//! must be idempotent.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// A subscription to the bus. Each subscription receives a copy of every
/// message published after it was created.
///
/// Meant to be drained by one thread:
///
/// ```ignore
/// let sub = bus.subscribe();
/// std::thread::spawn(move || {
///     while let Ok(envelope) = sub.recv() {
///         projection.apply_envelope(&envelope);
///     }
/// });
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Pub/sub transport for committed events (broadcast semantics).
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}

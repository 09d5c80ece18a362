//! The in-flight FIFO between the Writer and the Reader.
//!
//! A line-oriented reference client in Go models this as its own
//! long-lived task holding a list, because Go has no unbounded-channel
//! primitive (Go channels are either unbuffered or fixed-capacity) and
//! has to simulate one with a goroutine plus `container/list`. `tokio`'s
//! unbounded mpsc channel already *is* a single-producer,
//! single-consumer, unbounded FIFO: offering never blocks the sender,
//! and taking blocks the receiver until an item is available. Wrapping
//! it in a dedicated task here would only add a hop with no behavioral
//! difference, so the Buffer is the channel itself — these two type
//! aliases are its entire surface.

use tokio::sync::mpsc;

use crate::op::Operation;

/// The Writer's handle to the buffer: push one transmitted operation at
/// a time, in transmission order. Never blocks.
pub(crate) type BufferTx = mpsc::UnboundedSender<Operation>;

/// The Reader's handle to the buffer: pop the oldest still-unresolved
/// operation. Blocks until one is available or the Writer has dropped
/// its sender and the buffer has drained.
pub(crate) type BufferRx = mpsc::UnboundedReceiver<Operation>;

pub(crate) fn new() -> (BufferTx, BufferRx) {
    mpsc::unbounded_channel()
}

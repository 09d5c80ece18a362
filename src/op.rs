//! The unit of pipelining.

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::error::ConnError;
use crate::types::{OpKind, Reply};

/// A single-delivery rendezvous carrying one operation's outcome back to
/// its caller. `tokio::sync::oneshot::Sender::send` never blocks (it
/// stores the value and returns immediately, regardless of whether the
/// receiver has been polled yet) — so, unlike the Go reference, which
/// spawns a goroutine per resolution to avoid blocking on an unbuffered
/// channel, resolving a `Promise` here needs no background task at all.
pub(crate) type Promise = oneshot::Sender<Result<Reply, ConnError>>;

/// One pipelined command: its pre-rendered wire bytes, what the Writer
/// needs to know to apply the `used`/`watched` rewrites, and the promise
/// through which its result will be delivered exactly once.
pub(crate) struct Operation {
    /// The exact bytes to send: already CR-LF terminated, with a body
    /// and trailing CR LF appended if applicable.
    pub cmd: Bytes,
    pub kind: OpKind,
    pub promise: Promise,
}

impl Operation {
    pub(crate) fn new(cmd: Bytes, kind: OpKind, promise: Promise) -> Self {
        Operation { cmd, kind, promise }
    }

    /// Resolve this operation's promise, discarding the result if the
    /// caller has already stopped listening.
    pub(crate) fn resolve(self, result: Result<Reply, ConnError>) {
        let _ = self.promise.send(result);
    }
}

/// An ordered, non-empty sequence of operations submitted atomically.
/// Batches preserve relative order among their members and among other
/// batches; the Writer may rewrite a batch by eliding or injecting
/// operations, never by reordering the callers' own operations.
pub(crate) type Batch = Vec<Operation>;

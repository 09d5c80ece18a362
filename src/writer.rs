//! The Writer task: submit batches in, bytes and buffered operations out.

use bytes::{Bytes, BytesMut};
use std::io;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};

use crate::buffer::BufferTx;
use crate::error::{ConnError, TransportError};
use crate::op::{Batch, Operation};
use crate::types::{OpKind, Reply, DEFAULT_TUBE};

/// Runs until the submit channel closes (every [`crate::Connection`] and
/// clone of it has been dropped), or a transport write fails.
pub(crate) async fn run<W>(
    conn_name: String,
    mut write_half: W,
    mut submit_rx: mpsc::UnboundedReceiver<Batch>,
    buffer_tx: BufferTx,
) where
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut used = DEFAULT_TUBE.to_string();
    let mut watched = vec![DEFAULT_TUBE.to_string()];

    while let Some(ops) = collect(&mut submit_rx).await {
        let ops = rewrite_used(&mut used, ops);
        let ops = rewrite_watched(&mut watched, ops);

        if ops.is_empty() {
            continue;
        }

        let wire = serialize(&ops);

        if let Err(err) = write_half.write_all(&wire).await {
            #[cfg(feature = "tracing")]
            tracing::warn!(conn = %conn_name, error = %err, "write failed, failing batch");

            let transport = TransportError::new(err);
            for op in ops {
                let cmd = String::from_utf8_lossy(&op.cmd).into_owned();
                let result = Err(ConnError::transport(&conn_name, &cmd, "", transport.clone()));
                op.resolve(result);
            }
            // A line-oriented reference client logs this and carries on,
            // leaving the affected operations dangling in the buffer
            // forever. Failing them immediately and stopping the Writer
            // avoids that.
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(conn = %conn_name, bytes = wire.len(), ops = ops.len(), "batch transmitted");

        let mut remaining = ops.into_iter();
        for op in remaining.by_ref() {
            // The buffer never applies backpressure; a send error here
            // means the Reader has already torn down (a prior read
            // failure). Fail this op and everything still queued behind
            // it in the same batch, then stop — there is no Reader left
            // to ever resolve them.
            if let Err(mpsc::error::SendError(op)) = buffer_tx.send(op) {
                let transport = TransportError::new(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "connection reader has stopped",
                ));
                fail(&conn_name, &transport, op);
                for op in remaining {
                    fail(&conn_name, &transport, op);
                }
                return;
            }
        }
    }
}

fn fail(conn_name: &str, transport: &TransportError, op: Operation) {
    let cmd = String::from_utf8_lossy(&op.cmd).into_owned();
    op.resolve(Err(ConnError::transport(conn_name, &cmd, "", transport.clone())));
}

/// Block for one batch, then greedily drain any further batches already
/// queued without blocking, concatenating everything in arrival order.
async fn collect(rx: &mut mpsc::UnboundedReceiver<Batch>) -> Option<Vec<Operation>> {
    let mut ops = rx.recv().await?;
    while let Ok(more) = rx.try_recv() {
        ops.extend(more);
    }
    Some(ops)
}

/// Walk `ops` left-to-right, eliding any `use T` that matches the tube
/// already selected. `used` is updated to the last `use` seen regardless
/// of whether anything was elided.
fn rewrite_used(used: &mut String, ops: Vec<Operation>) -> Vec<Operation> {
    let mut cur = used.clone();
    let mut kept = Vec::with_capacity(ops.len());

    for op in ops {
        match &op.kind {
            OpKind::Use(tube) if *tube == cur => {
                op.resolve(Ok(Reply::synthetic_ok()));
            }
            OpKind::Use(tube) => {
                cur = tube.clone();
                kept.push(op);
            }
            OpKind::Plain | OpKind::Reserve(_) => kept.push(op),
        }
    }

    *used = cur;
    kept
}

/// Walk `ops`; before each reserve-style operation, inject the minimum
/// `watch`/`ignore` delta needed to move the server-side watch set from
/// `watched` to the operation's declared set.
fn rewrite_watched(watched: &mut Vec<String>, ops: Vec<Operation>) -> Vec<Operation> {
    let mut out = Vec::with_capacity(ops.len());

    for op in ops {
        if let OpKind::Reserve(want) = &op.kind {
            for tube in want {
                if !watched.contains(tube) {
                    out.push(watch_op(tube));
                }
            }
            for tube in watched.iter() {
                if !want.contains(tube) {
                    out.push(ignore_op(tube));
                }
            }
            *watched = want.clone();
        }
        out.push(op);
    }

    out
}

/// An injected `watch T`. Its result is not surfaced to any caller; the
/// receiving half is simply dropped.
fn watch_op(tube: &str) -> Operation {
    let (tx, _rx) = oneshot::channel();
    let cmd = Bytes::from(format!("watch {tube}\r\n"));
    Operation::new(cmd, OpKind::Plain, tx)
}

/// An injected `ignore T`. Its result is not surfaced to any caller.
fn ignore_op(tube: &str) -> Operation {
    let (tx, _rx) = oneshot::channel();
    let cmd = Bytes::from(format!("ignore {tube}\r\n"));
    Operation::new(cmd, OpKind::Plain, tx)
}

/// Concatenate every surviving operation's command payload in order.
fn serialize(ops: &[Operation]) -> Bytes {
    let total: usize = ops.iter().map(|op| op.cmd.len()).sum();
    let mut buf = BytesMut::with_capacity(total);
    for op in ops {
        buf.extend_from_slice(&op.cmd);
    }
    buf.freeze()
}

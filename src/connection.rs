//! The public handle: spawns the three background tasks and exposes the
//! representative request methods.

use bytes::{Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};

use crate::buffer;
use crate::error::{ConnError, NegativeOutcome, TransportError};
use crate::op::{Batch, Operation};
use crate::reader;
use crate::tube::{Tube, Tubes};
use crate::types::{Job, OpKind, Reply};
use crate::writer;

/// A handle to one beanstalkd connection.
///
/// Cheap to clone — every clone shares the same submit channel, so
/// operations from different callers are still serialized onto one
/// connection without interleaving within a batch.
#[derive(Clone)]
pub struct Connection {
    submit_tx: mpsc::UnboundedSender<Batch>,
    /// Descriptive name for this connection, usually its peer address.
    /// Carried into every error.
    name: String,
}

impl Connection {
    /// Spawn the Writer and Reader tasks over an already-established
    /// duplex byte stream, split into its read and write halves.
    ///
    /// `name` should be descriptive — typically the remote address of
    /// the connection — since it's included in every error this
    /// connection produces.
    pub fn spawn<R, W>(name: impl Into<String>, read_half: R, write_half: W) -> Connection
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let name = name.into();
        let (submit_tx, submit_rx) = mpsc::unbounded_channel();
        let (buffer_tx, buffer_rx) = buffer::new();

        tokio::spawn(writer::run(name.clone(), write_half, submit_rx, buffer_tx));
        tokio::spawn(reader::run(name.clone(), read_half, buffer_rx));

        Connection { submit_tx, name }
    }

    /// This connection's descriptive name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A convenience handle bound to one destination tube.
    pub fn tube(&self, name: impl Into<String>) -> Tube {
        Tube::new(self.clone(), name.into())
    }

    /// A convenience handle bound to a declared set of tubes to reserve
    /// from.
    pub fn tubes(&self, names: impl IntoIterator<Item = impl Into<String>>) -> Tubes {
        Tubes::new(self.clone(), names.into_iter().map(Into::into).collect())
    }

    /// Put a job onto `tube`.
    pub async fn put(
        &self,
        tube: &str,
        body: impl Into<Bytes>,
        pri: u32,
        delay: u32,
        ttr: u32,
    ) -> Result<u64, ConnError> {
        let body = body.into();

        let use_cmd = Bytes::from(format!("use {tube}\r\n"));
        let (use_tx, use_rx) = oneshot::channel();
        let use_op = Operation::new(use_cmd.clone(), OpKind::Use(tube.to_string()), use_tx);

        let mut put_cmd = BytesMut::with_capacity(32 + body.len());
        put_cmd.extend_from_slice(format!("put {pri} {delay} {ttr} {}\r\n", body.len()).as_bytes());
        put_cmd.extend_from_slice(&body);
        put_cmd.extend_from_slice(b"\r\n");
        let put_cmd = put_cmd.freeze();
        let (put_tx, put_rx) = oneshot::channel();
        let put_op = Operation::new(put_cmd.clone(), OpKind::Plain, put_tx);

        self.submit_ops(vec![use_op, put_op]);

        let use_cmd_str = String::from_utf8_lossy(&use_cmd).into_owned();
        let use_reply = recv(&self.name, &use_cmd_str, use_rx).await?;
        if let Some(err) = ConnError::from_server_reply(&self.name, &use_cmd_str, &use_reply.line, &use_reply.name) {
            return Err(err);
        }

        let put_cmd_str = String::from_utf8_lossy(&put_cmd).into_owned();
        let put_reply = recv(&self.name, &put_cmd_str, put_rx).await?;
        if let Some(kind) = NegativeOutcome::from_reply_name(&put_reply.name) {
            return Err(ConnError::not_applicable(&self.name, &put_cmd_str, &put_reply.line, kind));
        }
        if let Some(err) = ConnError::from_server_reply(&self.name, &put_cmd_str, &put_reply.line, &put_reply.name) {
            return Err(err);
        }
        if put_reply.name != "INSERTED" || put_reply.args.len() != 1 {
            return Err(ConnError::bad_reply(&self.name, &put_cmd_str, &put_reply.line));
        }
        put_reply.args[0]
            .parse::<u64>()
            .map_err(|_| ConnError::bad_reply(&self.name, &put_cmd_str, &put_reply.line))
    }

    /// Look up a job by id, regardless of its state.
    pub async fn peek(&self, id: u64) -> Result<Job, ConnError> {
        let cmd = format!("peek {id}\r\n");
        self.peek_named(&cmd).await
    }

    /// Look up the next ready job on the currently used tube.
    pub(crate) async fn peek_ready(&self) -> Result<Job, ConnError> {
        self.peek_named("peek-ready\r\n").await
    }

    /// Look up the next delayed job on the currently used tube.
    pub(crate) async fn peek_delayed(&self) -> Result<Job, ConnError> {
        self.peek_named("peek-delayed\r\n").await
    }

    /// Look up the next buried job on the currently used tube.
    pub(crate) async fn peek_buried(&self) -> Result<Job, ConnError> {
        self.peek_named("peek-buried\r\n").await
    }

    async fn peek_named(&self, cmd: &str) -> Result<Job, ConnError> {
        let (tx, rx) = oneshot::channel();
        let op = Operation::new(Bytes::from(cmd.to_string()), OpKind::Plain, tx);
        self.submit_ops(vec![op]);
        let reply = recv(&self.name, cmd, rx).await?;
        self.validate_job(cmd, reply, "FOUND")
    }

    /// Reserve a job from any of `tubes`, waiting up to `timeout_secs`.
    pub async fn reserve_with_timeout(&self, tubes: &[&str], timeout_secs: u64) -> Result<Job, ConnError> {
        let cmd = format!("reserve-with-timeout {timeout_secs}\r\n");
        let watch_set = tubes.iter().map(|t| t.to_string()).collect();
        let (tx, rx) = oneshot::channel();
        let op = Operation::new(Bytes::from(cmd.clone()), OpKind::Reserve(watch_set), tx);
        self.submit_ops(vec![op]);
        let reply = recv(&self.name, &cmd, rx).await?;
        self.validate_job(&cmd, reply, "RESERVED")
    }

    /// Delete a job by id.
    pub async fn delete(&self, id: u64) -> Result<(), ConnError> {
        let cmd = format!("delete {id}\r\n");
        let (tx, rx) = oneshot::channel();
        let op = Operation::new(Bytes::from(cmd.clone()), OpKind::Plain, tx);
        self.submit_ops(vec![op]);
        let reply = recv(&self.name, &cmd, rx).await?;

        if let Some(kind) = NegativeOutcome::from_reply_name(&reply.name) {
            return Err(ConnError::not_applicable(&self.name, &cmd, &reply.line, kind));
        }
        if let Some(err) = ConnError::from_server_reply(&self.name, &cmd, &reply.line, &reply.name) {
            return Err(err);
        }
        if reply.name != "DELETED" {
            return Err(ConnError::bad_reply(&self.name, &cmd, &reply.line));
        }
        Ok(())
    }

    /// Validate a body-bearing reply shaped like `NAME id len\r\n<body>\r\n`.
    fn validate_job(&self, cmd: &str, reply: Reply, expect_name: &str) -> Result<Job, ConnError> {
        if let Some(kind) = NegativeOutcome::from_reply_name(&reply.name) {
            return Err(ConnError::not_applicable(&self.name, cmd, &reply.line, kind));
        }
        if let Some(err) = ConnError::from_server_reply(&self.name, cmd, &reply.line, &reply.name) {
            return Err(err);
        }
        if reply.name != expect_name || reply.args.len() != 2 {
            return Err(ConnError::bad_reply(&self.name, cmd, &reply.line));
        }
        let id = reply.args[0]
            .parse::<u64>()
            .map_err(|_| ConnError::bad_reply(&self.name, cmd, &reply.line))?;
        let declared_len = reply.args[1].parse::<usize>().ok();
        let body = reply.body.ok_or_else(|| ConnError::bad_reply(&self.name, cmd, &reply.line))?;
        if let Some(len) = declared_len {
            if body.len() != len {
                return Err(ConnError::bad_reply(&self.name, cmd, &reply.line));
            }
        }
        Ok(Job { id, body })
    }

    /// Submit operations as one atomic batch. Operations already carry
    /// their own promise; nothing is returned here, callers await the
    /// receivers they kept.
    fn submit_ops(&self, ops: Vec<Operation>) {
        if let Err(mpsc::error::SendError(ops)) = self.submit_tx.send(ops) {
            // The Writer task has already stopped (e.g. after a fatal
            // write error). It will never pick these operations up, so
            // resolve them here instead of letting their promises drop
            // silently.
            let transport = TransportError::new(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection writer has stopped",
            ));
            for op in ops {
                let cmd = String::from_utf8_lossy(&op.cmd).into_owned();
                op.resolve(Err(ConnError::transport(&self.name, &cmd, "", transport.clone())));
            }
        }
    }
}

/// Await one operation's promise. Every `Operation` is resolved exactly
/// once by whichever of the Writer, the Reader, or `submit_ops` last held
/// it — except when the Writer exits early (a write failure, or the
/// Reader having already stopped) with a batch still sitting unread in
/// the submit channel: dropping `submit_rx` at that point drops those
/// `Operation`s, and their senders, without ever resolving them. Treat
/// that the same as any other transport failure instead of panicking.
async fn recv(conn_name: &str, cmd: &str, rx: oneshot::Receiver<Result<Reply, ConnError>>) -> Result<Reply, ConnError> {
    rx.await.unwrap_or_else(|_| {
        let transport = TransportError::new(io::Error::new(
            io::ErrorKind::NotConnected,
            "connection writer stopped before this operation was sent",
        ));
        Err(ConnError::transport(conn_name, cmd, "", transport))
    })
}

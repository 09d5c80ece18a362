//! Error types for the beanstalkd client.
//!
//! Every error carries the connection's descriptive name, the exact
//! command bytes that were sent (or intended), and the raw reply line
//! (or empty if none).

use std::io;
use std::sync::Arc;
use thiserror::Error;

/// A cloneable wrapper around [`std::io::Error`].
///
/// When the Reader aborts it must fail every operation still waiting in
/// the buffer with *the same* error, which means the underlying I/O
/// error has to be shared rather than consumed once. `std::io::Error`
/// isn't `Clone`, so we keep one behind an `Arc`.
#[derive(Debug, Clone)]
pub struct TransportError(pub(crate) Arc<io::Error>);

impl TransportError {
    pub(crate) fn new(err: io::Error) -> Self {
        TransportError(Arc::new(err))
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&**self.0)
    }
}

/// A recognized server-level error reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ServerErrorKind {
    #[error("internal error")]
    InternalError,
    #[error("out of memory")]
    OutOfMemory,
}

impl ServerErrorKind {
    pub(crate) fn from_reply_name(name: &str) -> Option<Self> {
        match name {
            "INTERNAL_ERROR" => Some(ServerErrorKind::InternalError),
            "OUT_OF_MEMORY" => Some(ServerErrorKind::OutOfMemory),
            _ => None,
        }
    }
}

/// A well-defined non-success reply for a given command — an error from
/// the caller's perspective, but not a protocol violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NegativeOutcome {
    #[error("not found")]
    NotFound,
    #[error("buried")]
    Buried,
    #[error("draining")]
    Draining,
    #[error("deadline soon")]
    DeadlineSoon,
    #[error("timed out")]
    TimedOut,
    #[error("not ignored")]
    NotIgnored,
    #[error("expected CR LF")]
    ExpectedCrlf,
    #[error("job too big")]
    JobTooBig,
    #[error("bad format")]
    BadFormat,
    #[error("unknown command")]
    UnknownCommand,
}

impl NegativeOutcome {
    pub(crate) fn from_reply_name(name: &str) -> Option<Self> {
        match name {
            "NOT_FOUND" => Some(NegativeOutcome::NotFound),
            "BURIED" => Some(NegativeOutcome::Buried),
            "DRAINING" => Some(NegativeOutcome::Draining),
            "DEADLINE_SOON" => Some(NegativeOutcome::DeadlineSoon),
            "TIMED_OUT" => Some(NegativeOutcome::TimedOut),
            "NOT_IGNORED" => Some(NegativeOutcome::NotIgnored),
            "EXPECTED_CRLF" => Some(NegativeOutcome::ExpectedCrlf),
            "JOB_TOO_BIG" => Some(NegativeOutcome::JobTooBig),
            "BAD_FORMAT" => Some(NegativeOutcome::BadFormat),
            "UNKNOWN_COMMAND" => Some(NegativeOutcome::UnknownCommand),
            _ => None,
        }
    }
}

/// The error type returned by every [`crate::Connection`] method.
#[derive(Debug, Clone, Error)]
pub enum ConnError {
    /// A read or write failure on the byte stream, including EOF mid-reply.
    #[error("{conn}: {cmd:?} -> {reply:?}: {source}")]
    Transport {
        conn: String,
        cmd: String,
        reply: String,
        #[source]
        source: TransportError,
    },

    /// The reply's name is unknown for the command, or its shape (arg
    /// count, numeric parse) is wrong.
    #[error("{conn}: {cmd:?} -> {reply:?}: bad reply")]
    BadReply {
        conn: String,
        cmd: String,
        reply: String,
    },

    /// A recognized server-level error (`INTERNAL_ERROR`, `OUT_OF_MEMORY`).
    #[error("{conn}: {cmd:?} -> {reply:?}: {kind}")]
    Server {
        conn: String,
        cmd: String,
        reply: String,
        kind: ServerErrorKind,
    },

    /// A well-defined non-success reply (`NOT_FOUND`, `BURIED`, ...).
    #[error("{conn}: {cmd:?} -> {reply:?}: {kind}")]
    NotApplicable {
        conn: String,
        cmd: String,
        reply: String,
        kind: NegativeOutcome,
    },
}

impl ConnError {
    pub(crate) fn transport(conn: &str, cmd: &str, reply: &str, source: TransportError) -> Self {
        ConnError::Transport {
            conn: conn.to_string(),
            cmd: cmd.to_string(),
            reply: reply.to_string(),
            source,
        }
    }

    pub(crate) fn bad_reply(conn: &str, cmd: &str, reply: &str) -> Self {
        ConnError::BadReply {
            conn: conn.to_string(),
            cmd: cmd.to_string(),
            reply: reply.to_string(),
        }
    }

    pub(crate) fn server(conn: &str, cmd: &str, reply: &str, kind: ServerErrorKind) -> Self {
        ConnError::Server {
            conn: conn.to_string(),
            cmd: cmd.to_string(),
            reply: reply.to_string(),
            kind,
        }
    }

    pub(crate) fn not_applicable(
        conn: &str,
        cmd: &str,
        reply: &str,
        kind: NegativeOutcome,
    ) -> Self {
        ConnError::NotApplicable {
            conn: conn.to_string(),
            cmd: cmd.to_string(),
            reply: reply.to_string(),
            kind,
        }
    }

    /// If `name` is a recognized server-level error, build that variant.
    pub(crate) fn from_server_reply(conn: &str, cmd: &str, reply: &str, name: &str) -> Option<Self> {
        ServerErrorKind::from_reply_name(name).map(|kind| ConnError::server(conn, cmd, reply, kind))
    }
}

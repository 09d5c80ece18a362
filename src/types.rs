//! Core types shared by the protocol engine and the public API.

use bytes::Bytes;

/// A job fetched from the server by `peek`/`reserve`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    /// Server-assigned job id.
    pub id: u64,
    /// The opaque job body.
    pub body: Bytes,
}

/// A decoded server reply.
///
/// Exactly one of this or a [`crate::ConnError`] is produced per
/// operation; see [`crate::op::Promise`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    /// The raw reply line, terminator included (e.g. `"DELETED\r\n"`).
    pub line: String,
    /// The first whitespace-separated word of the line.
    pub name: String,
    /// The remaining whitespace-separated words.
    pub args: Vec<String>,
    /// The reply body, if this was a body-bearing reply (`FOUND`/`RESERVED`).
    pub body: Option<Bytes>,
}

impl Reply {
    /// A synthetic success used to resolve an elided operation (see
    /// `writer::rewrite_used`) without a server round-trip.
    pub(crate) fn synthetic_ok() -> Self {
        Reply {
            line: String::new(),
            name: String::new(),
            args: Vec::new(),
            body: None,
        }
    }
}

/// What the Writer needs to know about an operation beyond its raw bytes,
/// in order to apply the `used`/`watched` state-sync rewrites. A
/// line-oriented reference implementation re-parses the command string
/// (`cmd[0:4] == "use "`); carrying this as typed metadata instead means
/// the rewrite never has to guess at wire syntax.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum OpKind {
    /// An operation with no bearing on `used`/`watched` state.
    Plain,
    /// A `use T` command; the tube it selects.
    Use(String),
    /// A reserve-style command; the watch-set it depends on.
    Reserve(Vec<String>),
}

/// The tube a brand-new connection is implicitly using and watching.
pub(crate) const DEFAULT_TUBE: &str = "default";

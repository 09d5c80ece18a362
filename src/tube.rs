//! Convenience handles bound to a tube name or watch set, mirroring the
//! reference client's `Tube`/`Tubes` split.

use bytes::Bytes;

use crate::connection::Connection;
use crate::error::ConnError;
use crate::types::Job;

/// A handle bound to one destination tube, for repeated `put`s without
/// repeating the tube name at every call site.
pub struct Tube {
    conn: Connection,
    name: String,
}

impl Tube {
    pub(crate) fn new(conn: Connection, name: String) -> Tube {
        Tube { conn, name }
    }

    /// This tube's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Put a job onto this tube.
    pub async fn put(&self, body: impl Into<Bytes>, pri: u32, delay: u32, ttr: u32) -> Result<u64, ConnError> {
        self.conn.put(&self.name, body, pri, delay, ttr).await
    }

    /// Peek at the next ready job on whichever tube the connection
    /// currently has selected — *not* necessarily `self.name`. This
    /// mirrors the reference client, which never implicitly selects a
    /// tube before a state-dependent peek; callers who need peeking
    /// scoped to a specific tube must `put`/`use` it there first.
    pub async fn peek_ready(&self) -> Result<Job, ConnError> {
        self.conn.peek_ready().await
    }

    /// Peek at the next delayed job on the currently selected tube.
    pub async fn peek_delayed(&self) -> Result<Job, ConnError> {
        self.conn.peek_delayed().await
    }

    /// Peek at the next buried job on the currently selected tube.
    pub async fn peek_buried(&self) -> Result<Job, ConnError> {
        self.conn.peek_buried().await
    }
}

/// A handle bound to a declared set of tubes to reserve jobs from.
pub struct Tubes {
    conn: Connection,
    names: Vec<String>,
}

impl Tubes {
    pub(crate) fn new(conn: Connection, names: Vec<String>) -> Tubes {
        Tubes { conn, names }
    }

    /// The tube names this handle reserves from.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Reserve the next job available from any of these tubes, waiting
    /// up to `timeout_secs`.
    pub async fn reserve(&self, timeout_secs: u64) -> Result<Job, ConnError> {
        let refs: Vec<&str> = self.names.iter().map(String::as_str).collect();
        self.conn.reserve_with_timeout(&refs, timeout_secs).await
    }
}

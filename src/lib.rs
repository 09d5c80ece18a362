//! A pipelined, promise-based client for a line-oriented work-queue
//! protocol.
//!
//! The core is a connection split across three cooperating background
//! tasks — a Writer that serializes and optimizes outgoing commands, an
//! unbounded in-flight buffer, and a Reader that matches replies back to
//! their callers in strict FIFO order. Callers never see any of that;
//! they hold a cheaply-cloneable [`Connection`] and call request methods
//! on it.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use beanstalkd_client::Connection;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let socket = tokio::net::TcpStream::connect("127.0.0.1:11300").await?;
//!     let (read_half, write_half) = socket.into_split();
//!     let conn = Connection::spawn("127.0.0.1:11300", read_half, write_half);
//!
//!     let id = conn.put("default", &b"hello"[..], 0, 0, 120).await?;
//!     println!("queued job {id}");
//!
//!     let job = conn.reserve_with_timeout(&["default"], 5).await?;
//!     println!("reserved job {} ({} bytes)", job.id, job.body.len());
//!     conn.delete(job.id).await?;
//!
//!     Ok(())
//! }
//! ```

mod buffer;
mod connection;
mod error;
mod op;
mod reader;
mod tube;
mod types;
mod writer;

pub use connection::Connection;
pub use error::{ConnError, NegativeOutcome, ServerErrorKind};
pub use tube::{Tube, Tubes};
pub use types::{Job, Reply};

//! The Reader task: one reply in, one buffered operation resolved.

use bytes::Bytes;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncRead, BufReader};

use crate::buffer::BufferRx;
use crate::error::{ConnError, TransportError};
use crate::op::Operation;
use crate::types::Reply;

/// Runs until a transport read fails or the buffer closes with nothing
/// left to read for.
pub(crate) async fn run<R>(conn_name: String, read_half: R, mut buffer_rx: BufferRx)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(read_half);

    loop {
        match read_reply(&mut reader).await {
            Ok((line, name, args, body)) => {
                let Some(op) = buffer_rx.recv().await else {
                    return;
                };
                op.resolve(Ok(Reply { line, name, args, body }));
            }
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(conn = %conn_name, error = %err, "read failed, draining buffer");

                let transport = TransportError::new(err);
                fail_all(&conn_name, &transport, &mut buffer_rx).await;
                return;
            }
        }
    }
}

/// Fail the operation currently awaiting this reply, then every operation
/// still queued behind it, with the same transport error. A line-oriented
/// reference client only fails the first; all later operations were left
/// to dangle forever.
async fn fail_all(conn_name: &str, transport: &TransportError, buffer_rx: &mut BufferRx) {
    if let Some(op) = buffer_rx.recv().await {
        fail_one(conn_name, transport, op);
    }
    while let Ok(op) = buffer_rx.try_recv() {
        fail_one(conn_name, transport, op);
    }
}

fn fail_one(conn_name: &str, transport: &TransportError, op: Operation) {
    let cmd = String::from_utf8_lossy(&op.cmd).into_owned();
    op.resolve(Err(ConnError::transport(conn_name, &cmd, "", transport.clone())));
}

/// Read one reply: its raw line (terminator included), decoded name/args
/// (tokenized from the terminator-stripped line), and body if the reply
/// is body-bearing (`FOUND`/`RESERVED` with exactly two args).
async fn read_reply<R>(reader: &mut BufReader<R>) -> io::Result<(String, String, Vec<String>, Option<Bytes>)>
where
    R: AsyncRead + Unpin,
{
    let mut raw = Vec::new();
    reader.read_until(b'\n', &mut raw).await?;
    if !raw.ends_with(b"\n") {
        // Either nothing was read (clean EOF) or the stream closed
        // mid-line (a partial reply with no terminator) — both are a
        // transport failure, not a reply to parse.
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"));
    }

    let line = String::from_utf8_lossy(&raw).into_owned();

    let mut trimmed = line.as_str();
    if let Some(rest) = trimmed.strip_suffix('\n') {
        trimmed = rest;
    }
    if let Some(rest) = trimmed.strip_suffix('\r') {
        trimmed = rest;
    }

    let (name, args) = tokenize(trimmed);
    let body = match body_len(&name, &args) {
        0 => None,
        len => {
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf).await?;
            let mut trailer = [0u8; 2];
            reader.read_exact(&mut trailer).await?;
            Some(Bytes::from(buf))
        }
    };

    Ok((line, name, args, body))
}

/// Split on runs of spaces, trimming each token (including the name) of
/// any remaining whitespace. A line-oriented reference client trims every
/// split token, name included — reproduced here rather than "fixed",
/// since callers rely on it.
fn tokenize(line: &str) -> (String, Vec<String>) {
    let tokens: Vec<String> = line
        .split(' ')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    let name = tokens.first().cloned().unwrap_or_default();
    let args = if tokens.len() > 1 {
        tokens[1..].to_vec()
    } else {
        Vec::new()
    };
    (name, args)
}

/// The declared body length for body-bearing replies, or 0 if the reply
/// isn't one or its length can't be parsed — in which case no body is
/// consumed, and the caller-side validator rejects the reply.
fn body_len(name: &str, args: &[String]) -> usize {
    match name {
        "FOUND" | "RESERVED" if args.len() == 2 => args[1].parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn parses_simple_status_reply() {
        let mut reader = BufReader::new(Cursor::new(b"DELETED\r\n".to_vec()));
        let (line, name, args, body) = read_reply(&mut reader).await.unwrap();
        assert_eq!(line, "DELETED\r\n");
        assert_eq!(name, "DELETED");
        assert!(args.is_empty());
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn parses_body_bearing_reply() {
        let mut reader = BufReader::new(Cursor::new(b"FOUND 1 3\r\nabc\r\n".to_vec()));
        let (_, name, args, body) = read_reply(&mut reader).await.unwrap();
        assert_eq!(name, "FOUND");
        assert_eq!(args, vec!["1".to_string(), "3".to_string()]);
        assert_eq!(body.unwrap(), Bytes::from_static(b"abc"));
    }

    #[tokio::test]
    async fn bare_lf_is_accepted() {
        let mut reader = BufReader::new(Cursor::new(b"INSERTED 1\n".to_vec()));
        let (line, name, args, _) = read_reply(&mut reader).await.unwrap();
        assert_eq!(line, "INSERTED 1\n");
        assert_eq!(name, "INSERTED");
        assert_eq!(args, vec!["1".to_string()]);
    }

    #[tokio::test]
    async fn tab_terminated_reply_still_parses() {
        let mut reader = BufReader::new(Cursor::new(b"INSERTED 1\t\n".to_vec()));
        let (_, name, args, _) = read_reply(&mut reader).await.unwrap();
        assert_eq!(name, "INSERTED");
        assert_eq!(args, vec!["1".to_string()]);
    }

    #[tokio::test]
    async fn leading_whitespace_on_name_is_trimmed() {
        let mut reader = BufReader::new(Cursor::new(b" INSERTED 1\n".to_vec()));
        let (_, name, _, _) = read_reply(&mut reader).await.unwrap();
        assert_eq!(name, "INSERTED");
    }

    #[tokio::test]
    async fn unparseable_body_length_consumes_no_body() {
        let mut reader = BufReader::new(Cursor::new(b"FOUND 1 x\r\n".to_vec()));
        let (_, name, args, body) = read_reply(&mut reader).await.unwrap();
        assert_eq!(name, "FOUND");
        assert_eq!(args, vec!["1".to_string(), "x".to_string()]);
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn truncated_reply_is_an_io_error() {
        let mut reader = BufReader::new(Cursor::new(b"INSERTED 1".to_vec()));
        let err = read_reply(&mut reader).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}

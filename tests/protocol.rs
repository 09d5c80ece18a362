//! End-to-end scenarios driving a whole `Connection` against an
//! in-memory duplex stream standing in for the server side of the wire.

use beanstalkd_client::{ConnError, Connection, NegativeOutcome, ServerErrorKind};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

fn new_pair() -> (Connection, DuplexStream) {
    let (client_side, server_side) = tokio::io::duplex(4096);
    let (read_half, write_half) = tokio::io::split(client_side);
    let conn = Connection::spawn("test-server", read_half, write_half);
    (conn, server_side)
}

async fn expect_then_reply(server: &mut DuplexStream, expect: &[u8], reply: &[u8]) {
    let mut buf = vec![0u8; expect.len()];
    server.read_exact(&mut buf).await.expect("expected bytes never arrived");
    assert_eq!(buf, expect, "wire bytes did not match");
    server.write_all(reply).await.unwrap();
}

#[tokio::test]
async fn put_on_default_tube() {
    let (conn, mut server) = new_pair();

    let server_task = tokio::spawn(async move {
        expect_then_reply(&mut server, b"put 0 0 0 1\r\na\r\n", b"INSERTED 1\n").await;
        server
    });

    let id = conn.put("default", &b"a"[..], 0, 0, 0).await.unwrap();
    assert_eq!(id, 1);

    server_task.await.unwrap();
}

#[tokio::test]
async fn put_on_named_tube_prefixes_use() {
    let (conn, mut server) = new_pair();

    let server_task = tokio::spawn(async move {
        expect_then_reply(&mut server, b"use foo\r\nput 0 0 0 1\r\na\r\n", b"USING foo\nINSERTED 1\n").await;
        server
    });

    let id = conn.put("foo", &b"a"[..], 0, 0, 0).await.unwrap();
    assert_eq!(id, 1);

    server_task.await.unwrap();
}

#[tokio::test]
async fn put_fails_against_use_command_on_server_error() {
    let (conn, mut server) = new_pair();

    let server_task = tokio::spawn(async move {
        expect_then_reply(&mut server, b"use foo\r\nput 0 0 0 1\r\na\r\n", b"INTERNAL_ERROR\nINSERTED 1\n").await;
        server
    });

    let err = conn.put("foo", &b"a"[..], 0, 0, 0).await.unwrap_err();
    match err {
        ConnError::Server { cmd, reply, kind, .. } => {
            assert_eq!(cmd, "use foo\r\n");
            assert_eq!(reply, "INTERNAL_ERROR\n");
            assert_eq!(kind, ServerErrorKind::InternalError);
        }
        other => panic!("expected Server error, got {other:?}"),
    }

    server_task.await.unwrap();
}

#[tokio::test]
async fn put_with_unrecognized_reply_is_bad_reply() {
    let (conn, mut server) = new_pair();

    let server_task = tokio::spawn(async move {
        expect_then_reply(&mut server, b"put 0 0 0 1\r\na\r\n", b"FOO 1\n").await;
        server
    });

    let err = conn.put("default", &b"a"[..], 0, 0, 0).await.unwrap_err();
    match err {
        ConnError::BadReply { reply, .. } => assert_eq!(reply, "FOO 1\n"),
        other => panic!("expected BadReply error, got {other:?}"),
    }

    server_task.await.unwrap();
}

#[tokio::test]
async fn truncated_reply_surfaces_as_transport_error() {
    let (conn, mut server) = new_pair();

    let server_task = tokio::spawn(async move {
        let mut buf = vec![0u8; b"put 0 0 0 1\r\na\r\n".len()];
        server.read_exact(&mut buf).await.unwrap();
        server.write_all(b"INSERTED 1").await.unwrap();
        drop(server); // close without a trailing LF
    });

    let err = conn.put("default", &b"a"[..], 0, 0, 0).await.unwrap_err();
    assert!(matches!(err, ConnError::Transport { .. }), "expected Transport error, got {err:?}");

    server_task.await.unwrap();
}

#[tokio::test]
async fn delete_succeeds() {
    let (conn, mut server) = new_pair();

    let server_task = tokio::spawn(async move {
        expect_then_reply(&mut server, b"delete 1\r\n", b"DELETED\n").await;
        server
    });

    conn.delete(1).await.unwrap();

    server_task.await.unwrap();
}

#[tokio::test]
async fn delete_not_found() {
    let (conn, mut server) = new_pair();

    let server_task = tokio::spawn(async move {
        expect_then_reply(&mut server, b"delete 1\r\n", b"NOT_FOUND\n").await;
        server
    });

    let err = conn.delete(1).await.unwrap_err();
    match err {
        ConnError::NotApplicable { kind, .. } => assert_eq!(kind, NegativeOutcome::NotFound),
        other => panic!("expected NotApplicable error, got {other:?}"),
    }

    server_task.await.unwrap();
}

#[tokio::test]
async fn reserve_injects_watch_before_first_use() {
    let (conn, mut server) = new_pair();

    let server_task = tokio::spawn(async move {
        expect_then_reply(
            &mut server,
            b"watch foo\r\nignore default\r\nreserve-with-timeout 5\r\n",
            b"WATCHING 2\nWATCHING 1\nRESERVED 9 3\r\nxyz\r\n",
        )
        .await;
        server
    });

    let job = conn.reserve_with_timeout(&["foo"], 5).await.unwrap();
    assert_eq!(job.id, 9);
    assert_eq!(&job.body[..], b"xyz");

    server_task.await.unwrap();
}

#[tokio::test]
async fn peek_by_id_returns_job() {
    let (conn, mut server) = new_pair();

    let server_task = tokio::spawn(async move {
        expect_then_reply(&mut server, b"peek 42\r\n", b"FOUND 42 5\r\nhello\r\n").await;
        server
    });

    let job = conn.peek(42).await.unwrap();
    assert_eq!(job.id, 42);
    assert_eq!(&job.body[..], b"hello");

    server_task.await.unwrap();
}

#[tokio::test]
async fn repeated_puts_on_same_tube_only_use_once() {
    let (conn, mut server) = new_pair();

    let server_task = tokio::spawn(async move {
        expect_then_reply(&mut server, b"use foo\r\nput 0 0 0 1\r\na\r\n", b"USING foo\nINSERTED 1\n").await;
        expect_then_reply(&mut server, b"put 0 0 0 1\r\nb\r\n", b"INSERTED 2\n").await;
        server
    });

    assert_eq!(conn.put("foo", &b"a"[..], 0, 0, 0).await.unwrap(), 1);
    assert_eq!(conn.put("foo", &b"b"[..], 0, 0, 0).await.unwrap(), 2);

    server_task.await.unwrap();
}

#[tokio::test]
async fn tube_and_tubes_handles_delegate_to_connection() {
    let (conn, mut server) = new_pair();

    let server_task = tokio::spawn(async move {
        expect_then_reply(&mut server, b"use jobs\r\nput 1 0 60 3\r\nabc\r\n", b"USING jobs\nINSERTED 7\n").await;
        server
    });

    let tube = conn.tube("jobs");
    assert_eq!(tube.name(), "jobs");
    let id = tube.put(&b"abc"[..], 1, 0, 60).await.unwrap();
    assert_eq!(id, 7);

    server_task.await.unwrap();
}

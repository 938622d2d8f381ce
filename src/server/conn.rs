//! Per-connection read limits
//!
//! `axum::serve` has no connection timeouts of its own. The listener wraps
//! each stream in two timers:
//! - idle: pushed back on every byte read or written
//! - head: runs from the first byte of a request until the blank line that
//!   ends its head, and is not pushed back by traffic
//!
//! A read that stays pending past either deadline fails with `TimedOut`,
//! which makes hyper close the connection.

use axum::serve::Listener;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Instant, Sleep};

/// `\r\n\r\n` as the last four bytes seen
const HEAD_END: u32 = u32::from_be_bytes(*b"\r\n\r\n");

pub struct TimeoutListener {
    inner: TcpListener,
    head: Duration,
    idle: Duration,
}

impl TimeoutListener {
    pub fn new(inner: TcpListener, head: Duration, idle: Duration) -> Self {
        Self { inner, head, idle }
    }
}

impl Listener for TimeoutListener {
    type Io = TimeoutStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        let (stream, addr) = Listener::accept(&mut self.inner).await;
        (TimeoutStream::new(stream, self.head, self.idle), addr)
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}

pub struct TimeoutStream<S> {
    inner: S,
    idle: Duration,
    idle_deadline: Pin<Box<Sleep>>,
    head: Duration,
    // None between requests; armed by the first byte of the next one
    head_deadline: Option<Pin<Box<Sleep>>>,
    in_head: bool,
    tail: u32,
}

impl<S> TimeoutStream<S> {
    /// The first head is timed from accept
    pub fn new(inner: S, head: Duration, idle: Duration) -> Self {
        Self {
            inner,
            idle,
            idle_deadline: Box::pin(tokio::time::sleep(idle)),
            head,
            head_deadline: Some(Box::pin(tokio::time::sleep(head))),
            in_head: true,
            tail: 0,
        }
    }

    fn touch(&mut self) {
        let next = Instant::now() + self.idle;
        self.idle_deadline.as_mut().reset(next);
    }

    fn on_read(&mut self, bytes: &[u8]) {
        self.touch();
        if !self.in_head {
            return;
        }
        if self.head_deadline.is_none() {
            self.head_deadline = Some(Box::pin(tokio::time::sleep(self.head)));
        }
        for &byte in bytes {
            self.tail = (self.tail << 8) | u32::from(byte);
            if self.tail == HEAD_END {
                self.in_head = false;
                self.head_deadline = None;
                self.tail = 0;
                return;
            }
        }
    }

    fn on_write(&mut self) {
        self.touch();
        // Response under way: whatever arrives next starts a new head
        if !self.in_head {
            self.in_head = true;
            self.tail = 0;
        }
    }

    fn expired(&mut self, cx: &mut Context<'_>) -> Option<&'static str> {
        if self.idle_deadline.as_mut().poll(cx).is_ready() {
            return Some("connection idle timeout");
        }
        if let Some(deadline) = self.head_deadline.as_mut() {
            if deadline.as_mut().poll(cx).is_ready() {
                return Some("request head read timeout");
            }
        }
        None
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for TimeoutStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();

        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                if buf.filled().len() > before {
                    this.on_read(&buf.filled()[before..]);
                }
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => match this.expired(cx) {
                Some(reason) => Poll::Ready(Err(io::Error::new(io::ErrorKind::TimedOut, reason))),
                None => Poll::Pending,
            },
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for TimeoutStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let result = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(written)) = result {
            if written > 0 {
                this.on_write();
            }
        }
        result
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let result = Pin::new(&mut this.inner).poll_write_vectored(cx, bufs);
        if let Poll::Ready(Ok(written)) = result {
            if written > 0 {
                this.on_write();
            }
        }
        result
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    const HEAD: Duration = Duration::from_secs(15);
    const IDLE: Duration = Duration::from_secs(60);

    fn stream() -> (TimeoutStream<DuplexStream>, DuplexStream) {
        let (client, server) = tokio::io::duplex(256);
        (TimeoutStream::new(client, HEAD, IDLE), server)
    }

    /// Timer wheel rounds to the millisecond
    fn assert_fired_at(start: Instant, expected: Duration) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(10),
            "fired after {:?}, expected {:?}",
            elapsed,
            expected
        );
    }

    async fn feed(stream: &mut TimeoutStream<DuplexStream>, peer: &mut DuplexStream, bytes: &[u8]) {
        peer.write_all(bytes).await.unwrap();
        let mut buf = vec![0u8; bytes.len()];
        stream.read_exact(&mut buf).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_connection_hits_head_deadline() {
        let (mut stream, _peer) = stream();
        let start = Instant::now();

        let mut buf = [0u8; 8];
        let err = stream.read(&mut buf).await.unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert_eq!(err.to_string(), "request head read timeout");
        assert_fired_at(start, HEAD);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_limit_applies_between_requests() {
        let (mut stream, mut peer) = stream();
        let start = Instant::now();

        feed(&mut stream, &mut peer, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await;
        let mut buf = [0u8; 8];
        let err = stream.read(&mut buf).await.unwrap_err();

        assert_eq!(err.to_string(), "connection idle timeout");
        assert_fired_at(start, IDLE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_traffic_pushes_idle_deadline_back() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut stream = TimeoutStream::new(client, Duration::from_secs(3600), IDLE);

        tokio::time::advance(Duration::from_secs(50)).await;
        server.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        // 50s after the last read, still inside the window
        tokio::time::advance(Duration::from_secs(50)).await;
        server.write_all(b"pong").await.unwrap();
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test(start_paused = true)]
    async fn test_trickled_head_is_cut_off() {
        let (mut stream, mut peer) = stream();
        let start = Instant::now();

        feed(&mut stream, &mut peer, b"GET /fast HTTP/1.1\r\n").await;
        tokio::time::advance(Duration::from_secs(10)).await;
        feed(&mut stream, &mut peer, b"Host: x\r\n").await;

        // Traffic kept the idle timer fresh; the head limit still applies
        let mut buf = [0u8; 8];
        let err = stream.read(&mut buf).await.unwrap_err();
        assert_eq!(err.to_string(), "request head read timeout");
        assert_fired_at(start, HEAD);
    }

    #[tokio::test(start_paused = true)]
    async fn test_head_end_split_across_reads() {
        let (mut stream, mut peer) = stream();

        feed(&mut stream, &mut peer, b"GET / HTTP/1.1\r\nHost: x\r\n\r").await;
        feed(&mut stream, &mut peer, b"\n").await;

        let mut buf = [0u8; 8];
        let err = stream.read(&mut buf).await.unwrap_err();
        assert_eq!(err.to_string(), "connection idle timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_request_rearms_head_deadline() {
        let (client, mut peer) = tokio::io::duplex(256);
        let mut stream = TimeoutStream::new(client, HEAD, Duration::from_secs(600));

        feed(&mut stream, &mut peer, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await;
        stream.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await.unwrap();

        // Waiting for the next request is governed by idle only
        let mut buf = [0u8; 8];
        let waiting = tokio::time::timeout(Duration::from_secs(100), stream.read(&mut buf)).await;
        assert!(waiting.is_err(), "no head deadline between requests");

        let start = Instant::now();
        feed(&mut stream, &mut peer, b"GET /next").await;
        let err = stream.read(&mut buf).await.unwrap_err();
        assert_eq!(err.to_string(), "request head read timeout");
        assert_fired_at(start, HEAD);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eof_is_not_an_error() {
        let (mut stream, peer) = stream();
        drop(peer);

        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).await.unwrap(), 0);
    }
}

// Copyright (c) 2023 mysql-aio contributors
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Frame layer: MySql packets (u24 length + u8 sequence number) over an
//! erased byte stream.

use std::future::Future;
use std::io;
use std::pin::Pin;

use byteorder::{ByteOrder, LittleEndian as LE};
use bytes::{Bytes, BytesMut};
use log::trace;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::consts::MAX_PAYLOAD_LEN;
use crate::error::{DriverError, Result};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A full-duplex byte stream the protocol runs over.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

pub type BoxStream = Box<dyn AsyncStream>;

/// Wraps a plain stream into a TLS stream, in place, at most once per
/// connection.
pub trait TlsUpgrade: Send + Sync {
    fn upgrade(&self, plain: BoxStream, domain: &str) -> BoxFuture<'_, io::Result<BoxStream>>;
}

/// Produces the byte stream a connection runs over.
///
/// The default connector dials TCP using the address in [`crate::Opts`];
/// callers may install their own to connect over UNIX sockets or in-memory
/// pipes.
pub trait Connector: Send + Sync {
    fn connect(&self) -> BoxFuture<'_, io::Result<BoxStream>>;
}

/// Reads and writes logical packets, hiding the 16 MiB - 1 frame splitting
/// and owning the per-command sequence counter.
pub struct PacketStream {
    stream: Option<BoxStream>,
    seq_id: u8,
    read_buf: BytesMut,
}

impl PacketStream {
    pub fn new(stream: BoxStream) -> PacketStream {
        PacketStream {
            stream: Some(stream),
            seq_id: 0,
            read_buf: BytesMut::new(),
        }
    }

    /// Starts a new command: the next frame sent or expected is number 0.
    pub fn reset_seq(&mut self) {
        self.seq_id = 0;
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Drops the transport without the closing exchange.
    pub fn close(&mut self) {
        self.stream = None;
    }

    /// Reads one logical packet, joining `0xffffff` frames.
    pub async fn read_packet(&mut self) -> Result<Bytes> {
        let PacketStream {
            stream,
            seq_id,
            read_buf,
        } = self;
        let stream = stream.as_mut().ok_or(DriverError::ConnectionClosed)?;

        read_buf.clear();
        let mut header = [0u8; 4];
        loop {
            stream.read_exact(&mut header).await?;
            let payload_len = LE::read_u24(&header[..3]) as usize;
            if header[3] != *seq_id {
                return Err(DriverError::PacketOutOfSync.into());
            }
            *seq_id = seq_id.wrapping_add(1);

            let start = read_buf.len();
            read_buf.resize(start + payload_len, 0);
            stream.read_exact(&mut read_buf[start..]).await?;

            if payload_len < MAX_PAYLOAD_LEN {
                break;
            }
        }

        trace!("read packet of {} bytes", read_buf.len());
        Ok(read_buf.split().freeze())
    }

    /// Writes one logical packet, splitting bodies of `0xffffff` bytes and
    /// more across frames.
    pub async fn write_packet(&mut self, body: &[u8]) -> Result<()> {
        let PacketStream { stream, seq_id, .. } = self;
        let stream = stream.as_mut().ok_or(DriverError::ConnectionClosed)?;

        trace!("writing packet of {} bytes", body.len());
        let mut header = [0u8; 4];
        if body.is_empty() {
            header[3] = *seq_id;
            *seq_id = seq_id.wrapping_add(1);
            stream.write_all(&header).await?;
        } else {
            let mut last_was_max = false;
            for chunk in body.chunks(MAX_PAYLOAD_LEN) {
                last_was_max = chunk.len() == MAX_PAYLOAD_LEN;
                LE::write_u24(&mut header[..3], chunk.len() as u32);
                header[3] = *seq_id;
                *seq_id = seq_id.wrapping_add(1);
                stream.write_all(&header).await?;
                stream.write_all(chunk).await?;
            }
            if last_was_max {
                // terminating empty frame
                header = [0, 0, 0, *seq_id];
                *seq_id = seq_id.wrapping_add(1);
                stream.write_all(&header).await?;
            }
        }
        stream.flush().await?;
        Ok(())
    }

    /// Swaps the transport for its TLS-wrapped form. The sequence counter
    /// carries over; a failed upgrade leaves the stream closed.
    pub async fn upgrade_tls(&mut self, upgrader: &dyn TlsUpgrade, domain: &str) -> Result<()> {
        let plain = self
            .stream
            .take()
            .ok_or(DriverError::ConnectionClosed)?;
        let tls = upgrader.upgrade(plain, domain).await?;
        self.stream = Some(tls);
        Ok(())
    }

    /// Shuts the transport down, ignoring shutdown errors.
    pub async fn shutdown(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;

    fn pair() -> (PacketStream, PacketStream) {
        let (a, b) = tokio::io::duplex(1024 * 1024);
        (
            PacketStream::new(Box::new(a)),
            PacketStream::new(Box::new(b)),
        )
    }

    #[tokio::test]
    async fn should_round_trip_small_packets() {
        let (mut client, mut server) = pair();
        let (w, r) = tokio::join!(client.write_packet(b"\x03DO 1"), server.read_packet());
        w.unwrap();
        assert_eq!(&r.unwrap()[..], b"\x03DO 1");

        // zero-length body is a single empty frame
        let (w, r) = tokio::join!(client.write_packet(b""), server.read_packet());
        w.unwrap();
        assert_eq!(&r.unwrap()[..], b"");
    }

    #[tokio::test]
    async fn should_split_and_join_at_frame_boundary() {
        let (mut client, mut server) = pair();

        let body = vec![0x42u8; MAX_PAYLOAD_LEN - 1];
        let (w, r) = tokio::join!(client.write_packet(&body), server.read_packet());
        w.unwrap();
        assert_eq!(r.unwrap().len(), MAX_PAYLOAD_LEN - 1);

        // exactly one max frame plus a terminating empty frame
        let body = vec![0x42u8; MAX_PAYLOAD_LEN];
        let (w, r) = tokio::join!(client.write_packet(&body), server.read_packet());
        w.unwrap();
        assert_eq!(r.unwrap().len(), MAX_PAYLOAD_LEN);
        // frames consumed on both sides must agree
        let (w, r) = tokio::join!(client.write_packet(b"after"), server.read_packet());
        w.unwrap();
        assert_eq!(&r.unwrap()[..], b"after");
    }

    #[tokio::test]
    async fn should_join_two_max_frames_plus_one() {
        let (mut client, mut server) = pair();
        let body = vec![0x24u8; MAX_PAYLOAD_LEN * 2 + 1];
        let (w, r) = tokio::join!(client.write_packet(&body), server.read_packet());
        w.unwrap();
        let read = r.unwrap();
        assert_eq!(read.len(), MAX_PAYLOAD_LEN * 2 + 1);
        assert_eq!(&read[..], &body[..]);
    }

    #[tokio::test]
    async fn should_wrap_sequence_counter() {
        let (mut client, mut server) = pair();
        for i in 0..300u32 {
            let body = i.to_le_bytes();
            let (w, r) = tokio::join!(client.write_packet(&body), server.read_packet());
            w.unwrap();
            assert_eq!(&r.unwrap()[..], &body[..]);
        }
    }

    #[tokio::test]
    async fn should_fail_on_sequence_mismatch() {
        let (raw, other) = tokio::io::duplex(1024);
        let mut reader = PacketStream::new(Box::new(other));
        let mut raw = raw;

        // frame carries sequence number 2 while 0 is expected
        raw.write_all(b"\x01\x00\x00\x02x").await.unwrap();
        match reader.read_packet().await.unwrap_err() {
            Error::DriverError(DriverError::PacketOutOfSync) => (),
            other => panic!("expected packet out of sync, got {}", other),
        }
    }

    #[tokio::test]
    async fn should_report_closed_stream() {
        let (mut client, _server) = pair();
        client.close();
        assert!(client.is_closed());
        match client.read_packet().await.unwrap_err() {
            Error::DriverError(DriverError::ConnectionClosed) => (),
            other => panic!("expected connection closed, got {}", other),
        }
    }
}

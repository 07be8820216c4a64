// Copyright (c) 2026 MCU-Debug Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! One session per accepted target connection.
//!
//! A session owns its socket and its framer. The receive side is a single
//! task that reads, frames, decodes and dispatches strictly in order; the send
//! side is a separate writer task fed through a channel, so outbound writes
//! never touch receive state.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::framer::PacketFramer;
use crate::protocol::{decode_packet, Command, OutboundCommand, Packet};
use crate::wire::DecodeError;

pub type SessionId = u64;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("malformed packet: {0}")]
    Decode(#[from] DecodeError),
    #[error("connection closed mid-packet ({received} of {expected} bytes)")]
    Truncated { received: usize, expected: usize },
    #[error("session is closed")]
    Closed,
}

/// Consumer of decoded packets.
///
/// Callbacks run on the session's receive task and must return quickly; hand
/// anything slow off to another task (see [`ChannelHandler`]).
pub trait PacketHandler: Send + Sync + 'static {
    fn on_open(&self, _session: &SessionHandle) {}

    fn on_packet(&self, session: &SessionHandle, packet: Packet);

    /// `Ok(())` means the target closed the connection between packets.
    fn on_closed(&self, _session: &SessionHandle, _result: Result<(), SessionError>) {}
}

/// Cloneable reference to a live session, used to send data to the target.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    peer: SocketAddr,
    tx: UnboundedSender<Vec<u8>>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Queue a raw buffer for writing. Fire and forget: a failed write is
    /// logged by the writer task and never retried.
    pub fn send(&self, bytes: Vec<u8>) -> Result<(), SessionError> {
        self.tx.send(bytes).map_err(|_| SessionError::Closed)
    }

    pub fn send_command(
        &self,
        command: OutboundCommand,
        request_id: u16,
    ) -> Result<(), SessionError> {
        self.send(command.encode(request_id)?)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Drive one accepted connection until it closes or fails.
pub async fn run_session<H>(stream: TcpStream, id: SessionId, peer: SocketAddr, handler: Arc<H>)
where
    H: PacketHandler + ?Sized,
{
    let (reader, writer) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = SessionHandle { id, peer, tx };
    let writer_task = tokio::spawn(write_loop(id, writer, rx));

    handler.on_open(&handle);
    let result = read_loop(reader, &handle, handler.as_ref()).await;
    writer_task.abort();

    match &result {
        Ok(()) => info!("Session {} ({}) closed by target", id, peer),
        Err(e) => warn!("Session {} ({}) torn down: {}", id, peer, e),
    }
    handler.on_closed(&handle, result);
}

/// Receive loop: at most one read in flight, packets dispatched in arrival order.
pub(crate) async fn read_loop<R, H>(
    mut reader: R,
    handle: &SessionHandle,
    handler: &H,
) -> Result<(), SessionError>
where
    R: AsyncRead + Unpin,
    H: PacketHandler + ?Sized,
{
    let mut framer = PacketFramer::new();
    loop {
        let n = reader.read(framer.unfilled()).await?;
        if n == 0 {
            if framer.is_idle() {
                return Ok(());
            }
            return Err(SessionError::Truncated {
                received: framer.received(),
                expected: framer.expected(),
            });
        }

        let Some(buf) = framer.advance(n)? else {
            continue;
        };
        let packet = decode_packet(&buf)?;
        match packet.command() {
            Some(Command::PreLaunch) => debug!(
                "Session {}: pre-launch packet, request {}",
                handle.id, packet.header.request_id
            ),
            Some(cmd) => debug!(
                "Session {}: unhandled {:?} packet, {} payload bytes",
                handle.id,
                cmd,
                packet.header.payload_len()
            ),
            None => debug!(
                "Session {}: unknown command {}, {} payload bytes",
                handle.id,
                packet.header.command,
                packet.header.payload_len()
            ),
        }
        handler.on_packet(handle, packet);
    }
}

async fn write_loop(
    id: SessionId,
    mut writer: OwnedWriteHalf,
    mut rx: UnboundedReceiver<Vec<u8>>,
) {
    while let Some(buf) = rx.recv().await {
        if let Err(e) = writer.write_all(&buf).await {
            warn!("Session {}: write of {} bytes failed: {}", id, buf.len(), e);
        }
    }
}

/// Events produced by [`ChannelHandler`].
#[derive(Debug)]
pub enum SessionEvent {
    Opened(SessionHandle),
    Packet(SessionHandle, Packet),
    Closed(SessionHandle, Result<(), SessionError>),
}

/// Forwards every session callback into an unbounded channel, so consumers
/// (a UI, a test) can process events on their own task.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: UnboundedSender<SessionEvent>,
}

impl ChannelHandler {
    pub fn new() -> (Self, UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            debug!("Session event dropped, no receiver");
        }
    }
}

impl PacketHandler for ChannelHandler {
    fn on_open(&self, session: &SessionHandle) {
        self.forward(SessionEvent::Opened(session.clone()));
    }

    fn on_packet(&self, session: &SessionHandle, packet: Packet) {
        self.forward(SessionEvent::Packet(session.clone(), packet));
    }

    fn on_closed(&self, session: &SessionHandle, result: Result<(), SessionError>) {
        self.forward(SessionEvent::Closed(session.clone(), result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_packet, DecodedPacket};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect {
        packets: Mutex<Vec<Packet>>,
    }

    impl PacketHandler for Collect {
        fn on_packet(&self, _session: &SessionHandle, packet: Packet) {
            self.packets.lock().unwrap().push(packet);
        }
    }

    fn test_handle() -> (SessionHandle, UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SessionHandle {
            id: 1,
            peer: "127.0.0.1:1".parse().unwrap(),
            tx,
        };
        (handle, rx)
    }

    #[tokio::test]
    async fn read_loop_resumes_partial_reads() {
        let first = encode_packet(4, 1, &[]).unwrap();
        let second = encode_packet(0x42, 2, &[1, 2, 3, 4]).unwrap();
        let mut stream = first.clone();
        stream.extend_from_slice(&second);

        // Mock reader hands out the bytes in uneven slices.
        let mut reader = chunked_reader(&stream, &[3, 4, 1, 6]);
        let (handle, _rx) = test_handle();
        let collect = Collect::default();
        read_loop(&mut reader, &handle, &collect).await.unwrap();

        let packets = collect.packets.lock().unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].header.command, 4);
        assert_eq!(
            packets[1].body,
            DecodedPacket::Raw(crate::protocol::RawPayload {
                command: 0x42,
                bytes: vec![1, 2, 3, 4]
            })
        );
    }

    #[tokio::test]
    async fn eof_inside_header_is_truncation() {
        let data = [0x1A, 0x00, 0x01, 0x00, 0x05];
        let (handle, _rx) = test_handle();
        let collect = Collect::default();
        let err = read_loop(&data[..], &handle, &collect).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Truncated {
                received: 5,
                expected: 6
            }
        ));
    }

    #[tokio::test]
    async fn eof_inside_payload_reports_declared_size() {
        // Header declares 10 bytes, only 2 of the 4 payload bytes arrive.
        let data = [0x0A, 0x00, 0x04, 0x00, 0x01, 0x00, 0xAA, 0xBB];
        let (handle, _rx) = test_handle();
        let collect = Collect::default();
        let err = read_loop(&data[..], &handle, &collect).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Truncated {
                received: 8,
                expected: 10
            }
        ));
        assert!(collect.packets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_after_close_reports_closed() {
        let (handle, rx) = test_handle();
        drop(rx);
        assert!(handle.is_closed());
        assert!(matches!(
            handle.send_command(OutboundCommand::Pause, 1),
            Err(SessionError::Closed)
        ));
    }

    /// In-memory reader returning the data in the given slice sizes, then the rest.
    fn chunked_reader(data: &[u8], sizes: &[usize]) -> ChunkedReader {
        let mut chunks = Vec::new();
        let mut rest = data;
        for &size in sizes {
            let n = size.min(rest.len());
            chunks.push(rest[..n].to_vec());
            rest = &rest[n..];
        }
        if !rest.is_empty() {
            chunks.push(rest.to_vec());
        }
        chunks.reverse();
        ChunkedReader { chunks }
    }

    struct ChunkedReader {
        chunks: Vec<Vec<u8>>,
    }

    impl AsyncRead for ChunkedReader {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<io::Result<()>> {
            if let Some(mut chunk) = self.chunks.pop() {
                let n = chunk.len().min(buf.remaining());
                buf.put_slice(&chunk[..n]);
                if n < chunk.len() {
                    self.chunks.push(chunk.split_off(n));
                }
            }
            std::task::Poll::Ready(Ok(()))
        }
    }
}

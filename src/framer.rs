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

//! Rebuilds whole packets from a byte stream that arrives in arbitrary pieces.
//!
//! The framer has two phases per packet. In the header phase it waits for the
//! 6 header bytes, then reads the declared total size. In the payload phase it
//! waits for the rest of the packet. The socket loop reads straight into
//! [`PacketFramer::unfilled`] and reports how much arrived with
//! [`PacketFramer::advance`], so a partial read always resumes at the offset
//! where the previous one stopped.

use std::mem;

use crate::protocol::HEADER_SIZE;
use crate::wire::DecodeError;

#[derive(Debug)]
pub struct PacketFramer {
    buf: Vec<u8>,
    /// Bytes of `buf` filled so far.
    received: usize,
    /// Declared total size, 0 while the header is still incomplete.
    size: usize,
}

impl Default for PacketFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketFramer {
    pub fn new() -> Self {
        Self {
            buf: vec![0; HEADER_SIZE],
            received: 0,
            size: 0,
        }
    }

    fn reset(&mut self) {
        self.buf = vec![0; HEADER_SIZE];
        self.received = 0;
        self.size = 0;
    }

    /// The part of the current buffer still waiting for bytes. Never empty.
    pub fn unfilled(&mut self) -> &mut [u8] {
        &mut self.buf[self.received..]
    }

    /// True when no byte of the next packet has arrived yet.
    pub fn is_idle(&self) -> bool {
        self.received == 0 && self.size == 0
    }

    pub fn received(&self) -> usize {
        self.received
    }

    /// Total bytes the current phase is waiting for: the header length, or the
    /// declared packet size once the header is in.
    pub fn expected(&self) -> usize {
        if self.size == 0 {
            HEADER_SIZE
        } else {
            self.size
        }
    }

    /// Record that `n` bytes were written into [`Self::unfilled`].
    ///
    /// Returns the complete packet buffer (header included) once the last byte
    /// of a packet arrives. A header declaring fewer than 6 bytes is an error;
    /// the framer is reset, but the stream should be considered unusable.
    pub fn advance(&mut self, n: usize) -> Result<Option<Vec<u8>>, DecodeError> {
        debug_assert!(n <= self.buf.len() - self.received);
        self.received += n;
        if self.received < self.buf.len() {
            return Ok(None);
        }

        if self.size == 0 {
            let size = u16::from_le_bytes([self.buf[0], self.buf[1]]);
            if (size as usize) < HEADER_SIZE {
                self.reset();
                return Err(DecodeError::InvalidSize(size));
            }
            if size as usize == HEADER_SIZE {
                let packet = mem::replace(&mut self.buf, vec![0; HEADER_SIZE]);
                self.reset();
                return Ok(Some(packet));
            }
            // Grow in place; the header bytes stay at the front.
            self.buf.resize(size as usize, 0);
            self.size = size as usize;
            return Ok(None);
        }

        let packet = mem::take(&mut self.buf);
        self.reset();
        Ok(Some(packet))
    }

    /// Push an arbitrary chunk through the state machine and collect every
    /// packet it completes, in arrival order.
    pub fn feed(&mut self, mut chunk: &[u8]) -> Result<Vec<Vec<u8>>, DecodeError> {
        let mut packets = Vec::new();
        while !chunk.is_empty() {
            let dst = self.unfilled();
            let n = dst.len().min(chunk.len());
            dst[..n].copy_from_slice(&chunk[..n]);
            chunk = &chunk[n..];
            if let Some(packet) = self.advance(n)? {
                packets.push(packet);
            }
        }
        Ok(packets)
    }
}

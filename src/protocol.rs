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

//! Packet header, command set and the packet level codec for the target ↔ host link.

use serde::Serialize;

use crate::debug_state::PreLaunchPacket;
use crate::wire::{DecodeError, WireReader, WireWriter};

/// Size of the fixed packet header in bytes.
pub const HEADER_SIZE: usize = 6;

/// Default TCP port the host listens on.
pub const DEFAULT_PORT: u16 = 11234;

/// Command opcodes. Discriminants are the wire values.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Command {
    PreLaunch = 1,
    BreakpointHit = 2,
    Pause = 3,
    Resume = 4,
    AddBreakpoint = 5,
    RemoveBreakpoint = 6,
}

impl Command {
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            1 => Some(Self::PreLaunch),
            2 => Some(Self::BreakpointHit),
            3 => Some(Self::Pause),
            4 => Some(Self::Resume),
            5 => Some(Self::AddBreakpoint),
            6 => Some(Self::RemoveBreakpoint),
            _ => None,
        }
    }
}

/// Fixed 6 byte little-endian header: total size, command, request id.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Total packet length including the header.
    pub size: u16,
    pub command: u16,
    pub request_id: u16,
}

impl PacketHeader {
    pub fn read(rdr: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        let size = rdr.read_u16("header size")?;
        let command = rdr.read_u16("header command")?;
        let request_id = rdr.read_u16("header request id")?;
        if (size as usize) < HEADER_SIZE {
            return Err(DecodeError::InvalidSize(size));
        }
        Ok(Self {
            size,
            command,
            request_id,
        })
    }

    pub fn write(&self, w: &mut WireWriter) {
        w.put_u16(self.size);
        w.put_u16(self.command);
        w.put_u16(self.request_id);
    }

    pub fn payload_len(&self) -> usize {
        (self.size as usize).saturating_sub(HEADER_SIZE)
    }
}

/// Payload of a command we do not decode; the bytes are handed over untouched.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    pub command: u16,
    pub bytes: Vec<u8>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DecodedPacket {
    PreLaunch(PreLaunchPacket),
    Raw(RawPayload),
}

/// A fully decoded packet together with the header it arrived with.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    pub body: DecodedPacket,
}

impl Packet {
    pub fn command(&self) -> Option<Command> {
        Command::from_u16(self.header.command)
    }
}

/// Decode one complete packet buffer, as produced by the framer.
///
/// Only `PreLaunch` payloads are interpreted. Every other command, known or not,
/// comes back as a [`RawPayload`]; that is not an error.
pub fn decode_packet(buf: &[u8]) -> Result<Packet, DecodeError> {
    let mut rdr = WireReader::new(buf);
    let header = PacketHeader::read(&mut rdr)?;
    let payload = rdr.take(header.payload_len(), "payload")?;
    let mut rdr = WireReader::new(payload);

    let body = match Command::from_u16(header.command) {
        Some(Command::PreLaunch) => DecodedPacket::PreLaunch(PreLaunchPacket::read(&mut rdr)?),
        _ => DecodedPacket::Raw(RawPayload {
            command: header.command,
            bytes: rdr.take_rest().to_vec(),
        }),
    };
    Ok(Packet { header, body })
}

/// Prefix `payload` with a header whose size field covers the whole packet.
pub fn encode_packet(
    command: u16,
    request_id: u16,
    payload: &[u8],
) -> Result<Vec<u8>, DecodeError> {
    let total = HEADER_SIZE + payload.len();
    let size = u16::try_from(total).map_err(|_| DecodeError::PayloadTooLarge(total))?;
    let mut w = WireWriter::new();
    PacketHeader {
        size,
        command,
        request_id,
    }
    .write(&mut w);
    w.put_bytes(payload);
    Ok(w.into_inner())
}

pub fn encode_prelaunch(
    request_id: u16,
    packet: &PreLaunchPacket,
) -> Result<Vec<u8>, DecodeError> {
    let mut w = WireWriter::new();
    packet.write(&mut w);
    encode_packet(Command::PreLaunch as u16, request_id, &w.into_inner())
}

/// Commands the host sends to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundCommand {
    Pause,
    Resume,
    AddBreakpoint { address: u32, user_data: u32 },
    RemoveBreakpoint { address: u32 },
}

impl OutboundCommand {
    pub fn command(&self) -> Command {
        match self {
            OutboundCommand::Pause => Command::Pause,
            OutboundCommand::Resume => Command::Resume,
            OutboundCommand::AddBreakpoint { .. } => Command::AddBreakpoint,
            OutboundCommand::RemoveBreakpoint { .. } => Command::RemoveBreakpoint,
        }
    }

    pub fn encode(&self, request_id: u16) -> Result<Vec<u8>, DecodeError> {
        let mut w = WireWriter::new();
        match *self {
            OutboundCommand::Pause | OutboundCommand::Resume => {}
            OutboundCommand::AddBreakpoint { address, user_data } => {
                w.put_u32(address);
                w.put_u32(user_data);
            }
            OutboundCommand::RemoveBreakpoint { address } => w.put_u32(address),
        }
        encode_packet(self.command() as u16, request_id, &w.into_inner())
    }
}

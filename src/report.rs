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

//! Stock consumers used by the binary: a JSON-lines writer for tools sitting
//! on our stdout, and a plain log summary.

use std::error::Error;
use std::io::{self, Write};

use log::{error, info};
use serde_json::{json, Value};

use crate::protocol::{DecodedPacket, Packet};
use crate::session::{PacketHandler, SessionError, SessionHandle};

/// Helper to write a JSON `Value` to stdout as a single line.
///
/// Serializes first, then holds stdout's process-wide lock only for the write
/// and flush, so lines from different sessions never interleave.
pub fn write_json_locked(msg: &Value) -> Result<(), Box<dyn Error + Send + Sync>> {
    let body = serde_json::to_vec(msg)?;
    let stdout = io::stdout();
    let mut w = stdout.lock();
    w.write_all(&body)?;
    w.write_all(b"\n")?;
    w.flush()?;
    Ok(())
}

pub fn opened_event(session: &SessionHandle) -> Value {
    json!({
        "event": "opened",
        "session": session.id(),
        "peer": session.peer().to_string(),
    })
}

pub fn packet_event(session: &SessionHandle, packet: &Packet) -> Value {
    json!({
        "event": "packet",
        "session": session.id(),
        "packet": packet,
    })
}

pub fn closed_event(session: &SessionHandle, result: &Result<(), SessionError>) -> Value {
    let error = result.as_ref().err().map(|e| e.to_string());
    json!({
        "event": "closed",
        "session": session.id(),
        "error": error,
    })
}

#[derive(Debug, Default)]
pub struct JsonReporter;

impl JsonReporter {
    fn emit(&self, msg: &Value) {
        if let Err(e) = write_json_locked(msg) {
            error!("Failed to write event: {}", e);
        }
    }
}

impl PacketHandler for JsonReporter {
    fn on_open(&self, session: &SessionHandle) {
        self.emit(&opened_event(session));
    }

    fn on_packet(&self, session: &SessionHandle, packet: Packet) {
        self.emit(&packet_event(session, &packet));
    }

    fn on_closed(&self, session: &SessionHandle, result: Result<(), SessionError>) {
        self.emit(&closed_event(session, &result));
    }
}

/// Logs a one-line summary per packet.
#[derive(Debug, Default)]
pub struct LogReporter;

impl PacketHandler for LogReporter {
    fn on_packet(&self, session: &SessionHandle, packet: Packet) {
        match &packet.body {
            DecodedPacket::PreLaunch(pak) => {
                info!(
                    "Session {}: pre-launch, {} modules, {} threads",
                    session.id(),
                    pak.info.modules.len(),
                    pak.info.threads.len()
                );
                for thread in &pak.info.threads {
                    info!(
                        "  thread {:?} core {} pc 0x{:08x} state {}",
                        thread.name, thread.core_id, thread.pc, thread.state
                    );
                }
            }
            DecodedPacket::Raw(raw) => info!(
                "Session {}: command {} with {} raw bytes",
                session.id(),
                raw.command,
                raw.bytes.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_state::{ModuleInfo, PauseInfo, PreLaunchPacket};
    use crate::protocol::{decode_packet, encode_prelaunch};
    use crate::session::ChannelHandler;

    #[tokio::test]
    async fn packet_event_shape() {
        // Borrow a real handle from a loopback session.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (handler, mut rx) = ChannelHandler::new();
        let handler = std::sync::Arc::new(handler);
        tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            crate::session::run_session(stream, 9, peer, handler).await;
        });
        let _client = tokio::net::TcpStream::connect(addr).await.unwrap();
        let handle = match rx.recv().await.unwrap() {
            crate::session::SessionEvent::Opened(h) => h,
            other => panic!("unexpected event {:?}", other),
        };

        let pak = PreLaunchPacket {
            info: PauseInfo {
                modules: vec![ModuleInfo { name: "rpx".into() }],
                threads: Vec::new(),
            },
        };
        let packet = decode_packet(&encode_prelaunch(2, &pak).unwrap()).unwrap();
        let v = packet_event(&handle, &packet);
        assert_eq!(v["event"], "packet");
        assert_eq!(v["session"], 9);
        assert_eq!(v["packet"]["header"]["request_id"], 2);
        assert_eq!(v["packet"]["body"]["kind"], "preLaunch");
        assert_eq!(v["packet"]["body"]["info"]["modules"][0]["name"], "rpx");

        let closed = closed_event(&handle, &Err(SessionError::Closed));
        assert_eq!(closed["error"], "session is closed");
        assert!(closed_event(&handle, &Ok(()))["error"].is_null());
    }
}

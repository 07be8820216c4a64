// Crate root: declare modules and control visibility
pub mod config;
pub mod debug;
pub mod debug_state;
pub mod framer;
pub mod protocol;
pub mod report;
pub mod server;
pub mod session;
pub mod wire;

// Re-export commonly used API from the library for binaries/tests
pub use config::{ListenArgs, ServerConfig};
pub use debug_state::{ModuleInfo, PauseInfo, PreLaunchPacket, ThreadInfo};
pub use protocol::{decode_packet, Command, DecodedPacket, OutboundCommand, Packet, RawPayload};
pub use server::DebugServer;
pub use session::{ChannelHandler, PacketHandler, SessionError, SessionEvent, SessionHandle};
pub use wire::DecodeError;

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

use std::net::{IpAddr, Ipv4Addr};

use clap::Parser;

use crate::protocol::DEFAULT_PORT;

pub const DEFAULT_BACKLOG: u32 = 100;

/// Where and how the listener binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: IpAddr,
    /// 0 picks an ephemeral port.
    pub port: u16,
    pub backlog: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            backlog: DEFAULT_BACKLOG,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "debugnet-host", version, about = "Host side listener for the target debug link")]
pub struct ListenArgs {
    /// Address to listen on
    #[arg(long = "bind", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// TCP port to listen on (0 = auto-assign)
    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Listen backlog
    #[arg(long = "backlog", default_value_t = DEFAULT_BACKLOG)]
    pub backlog: u32,

    /// Write every session event to stdout as one JSON object per line
    #[arg(long = "json", default_value_t = false)]
    pub json: bool,

    /// Enable debug output
    #[arg(short = 'd', long = "debug", default_value_t = false)]
    pub debug: bool,
}

impl ListenArgs {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind: self.bind,
            port: self.port,
            backlog: self.backlog,
        }
    }
}

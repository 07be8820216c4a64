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

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use log::info;

use debugnet_host::report::{JsonReporter, LogReporter};
use debugnet_host::{debug, DebugServer, ListenArgs, PacketHandler};

#[tokio::main]
async fn main() -> Result<()> {
    let args = ListenArgs::parse();
    let _logger = debug::init_logging(args.debug)?;

    let server = DebugServer::bind(&args.server_config())?;
    let handler: Arc<dyn PacketHandler> = if args.json {
        Arc::new(JsonReporter)
    } else {
        Arc::new(LogReporter)
    };

    tokio::select! {
        _ = server.run(handler) => {}
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("Interrupted, shutting down");
        }
    }
    Ok(())
}

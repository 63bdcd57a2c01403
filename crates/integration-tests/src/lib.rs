// stepscope - interactive step debugger
// Copyright (C) 2024 The stepscope contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Shared harness for stepscope integration tests
//!
//! Runs a real engine serve loop against a real client transport with
//! no child process in between: the blocking backend runs on a
//! blocking thread over a bridged in-memory duplex, and the serve loop
//! returning plays the role of process exit (the bridges drop, the
//! client sees the pipe close).

use stepscope_client::PipeTransport;
use stepscope_engine::{serve, Engine, Script, ScriptInspector};
use tokio_util::io::SyncIoBridge;
use tracing::debug;

pub mod script;

/// Spawn a backend over an in-memory pipe and return the connected
/// transport.
pub fn spawn_backend(script: Script) -> PipeTransport {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::task::spawn_blocking(move || {
        let input = std::io::BufReader::new(SyncIoBridge::new(server_read));
        let output = SyncIoBridge::new(server_write);
        let mut engine = Engine::new(ScriptInspector::new(script));
        if let Err(e) = serve(&mut engine, input, output) {
            debug!(error = %e, "backend serve loop ended with error");
        }
        let _ = done_tx.send(());
    });

    let (read, write) = tokio::io::split(client);
    PipeTransport::spawn(write, read, async move {
        let _ = done_rx.await;
    })
}

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

//! The `backend` subcommand: serve the engine over stdio.

use std::path::Path;

use eyre::Result;
use stepscope_engine::{serve, Engine, Script, ScriptInspector};
use tracing::info;

/// Load the recording and serve the framed protocol over this process's
/// stdin/stdout until EOF or debuggee completion. The serve loop is
/// fully blocking, so it runs on a blocking thread; stdout must carry
/// nothing but the protocol.
pub async fn run_backend(script: &Path) -> Result<()> {
    let script = Script::from_path(script)?;
    info!(stops = script.stops.len(), "recording loaded");

    let mut engine = Engine::new(ScriptInspector::new(script));
    tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin().lock();
        let stdout = std::io::stdout().lock();
        serve(&mut engine, stdin, stdout)
    })
    .await??;
    Ok(())
}

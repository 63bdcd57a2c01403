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

//! stepscope - an incremental-sync step debugger
//!
//! One binary, two roles: `backend` serves the framed line protocol
//! over stdio against a recorded execution script, and `debug` spawns
//! itself as that backend, drives it step by step, and prints the
//! synchronized mirror after each stop.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eyre::Result;

mod cmd;

/// Command-line interface for stepscope
#[derive(Debug, Parser)]
#[command(name = "stepscope")]
#[command(about = "An incremental-sync step debugger over a byte pipe")]
#[command(version)]
pub struct Cli {
    /// Also write logs to a rotating file under the system temp dir
    #[arg(long, global = true)]
    pub log_file: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve the debugger backend over stdin/stdout
    Backend {
        /// Recorded execution script (JSON) to replay
        #[arg(long, env = "STEPSCOPE_SCRIPT")]
        script: PathBuf,
    },
    /// Debug a recorded execution, printing the mirror at each stop
    Debug {
        /// Recorded execution script (JSON) to replay
        #[arg(long, env = "STEPSCOPE_SCRIPT")]
        script: PathBuf,

        /// Number of steps to run after attaching
        #[arg(long, default_value = "1")]
        steps: usize,

        /// Expand a variable before stepping, as `<depth>:<name>`
        #[arg(long)]
        expand: Vec<String>,

        /// Evaluate an expression at every stop
        #[arg(long)]
        eval: Option<String>,

        /// Use the multi-line rendering for --eval
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let component = match &cli.command {
        Commands::Backend { .. } => "stepscope-backend",
        Commands::Debug { .. } => "stepscope",
    };
    stepscope_common::logging::init_logging(component, cli.log_file)?;

    match cli.command {
        Commands::Backend { script } => cmd::run_backend(&script).await,
        Commands::Debug { script, steps, expand, eval, pretty } => {
            cmd::run_debug(cmd::DebugArgs { script, steps, expand, eval, pretty }).await
        }
    }
}

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

//! Blocking serve loop
//!
//! The backend is single-threaded and fully synchronous: it writes the
//! prompt tag, blocks on the next command line, executes it to
//! completion, writes exactly one framed reply (or the unframed stop
//! banner for `step`), and loops. EOF on the input ends the loop, as
//! does the debuggee running to completion, after which the process
//! exits and the client observes the pipe closing.

use std::io::{BufRead, Write};

use eyre::Result;
use stepscope_common::{frame_reply, PROMPT_TAG};
use tracing::{debug, info};

use crate::{Command, Engine, Inspector, Reply, StepOutcome};

/// Run the engine over a byte pipe until EOF or debuggee completion.
pub fn serve<I: Inspector>(
    engine: &mut Engine<I>,
    input: impl BufRead,
    mut output: impl Write,
) -> Result<()> {
    info!("backend serving");
    let mut lines = input.lines();
    loop {
        // Prompt tag goes out before blocking on the command read; it
        // glues onto the next output line and the client strips it
        // during header scan.
        write!(output, "{PROMPT_TAG}")?;
        output.flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;

        if line.trim().is_empty() {
            writeln!(output)?;
            output.flush()?;
            continue;
        }

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                // Malformed commands still get a well-framed reply.
                debug!(line = %line, error = %e, "rejecting command");
                write!(output, "{}", frame_reply(&[e.to_string()]))?;
                output.flush()?;
                continue;
            }
        };

        match engine.handle(command) {
            Reply::Payload(payload) => {
                write!(output, "{}", frame_reply(&payload))?;
            }
            Reply::Stepped(StepOutcome::Stopped) => {
                if let Some(position) = engine.current_position() {
                    // pdb-style stop banner, unframed transport junk.
                    writeln!(
                        output,
                        "> {}({}){}()",
                        position.filename, position.line, position.function
                    )?;
                }
            }
            Reply::Stepped(StepOutcome::Finished) => {
                info!("debuggee finished, backend exiting");
                output.flush()?;
                return Ok(());
            }
        }
        output.flush()?;
    }
    info!("input closed, backend exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Script, ScriptFrame, ScriptInspector, Stop};

    fn script(stops: usize) -> Script {
        Script {
            stops: (0..stops)
                .map(|i| Stop {
                    frames: vec![ScriptFrame {
                        filename: "demo.rs".to_string(),
                        line: i as u32 + 1,
                        function: "main".to_string(),
                        span: None,
                        locals: Vec::new(),
                    }],
                    globals: Vec::new(),
                })
                .collect(),
        }
    }

    fn run(input: &str, stops: usize) -> String {
        let mut engine = Engine::new(ScriptInspector::new(script(stops)));
        let mut output = Vec::new();
        serve(&mut engine, input.as_bytes(), &mut output).expect("serve");
        String::from_utf8(output).expect("utf-8 output")
    }

    #[test]
    fn test_prompt_tag_precedes_the_first_read() {
        // No commands at all: the pending tag is still on the wire.
        let output = run("", 1);
        assert_eq!(output, "[stepscope] ");
    }

    #[test]
    fn test_every_reply_is_framed_and_tagged() {
        let output = run("where\n", 1);
        assert_eq!(output, "[stepscope] lines: 1\nFile \"demo.rs\", line 1, in main\n[stepscope] ");
    }

    #[test]
    fn test_step_writes_unframed_banner() {
        let output = run("step\nwhere\n", 2);
        assert!(output.starts_with("[stepscope] > demo.rs(2)main()\n"));
        assert!(output.contains("lines: 1\n"));
    }

    #[test]
    fn test_final_step_exits_cleanly() {
        // One stop: the first step exhausts the recording; the pending
        // `where` must never be answered.
        let output = run("step\nwhere\n", 1);
        assert_eq!(output, "[stepscope] ");
    }

    #[test]
    fn test_unknown_command_is_framed_error() {
        let output = run("quit\n", 1);
        assert_eq!(output, "[stepscope] lines: 1\nunknown command \"quit\"\n[stepscope] ");
    }

    #[test]
    fn test_empty_payload_is_lines_zero() {
        let output = run("frames\n", 1);
        assert_eq!(output, "[stepscope] lines: 0\n[stepscope] ");
    }
}

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

//! The `debug` subcommand: spawn a backend, drive it, print the mirror.

use std::path::PathBuf;

use eyre::{bail, eyre, Result, WrapErr};
use stepscope_client::{DebugSession, Mark, Mirror, PipeTransport, SessionError};
use tokio::process::Command;
use tracing::info;

/// Arguments of the `debug` subcommand.
#[derive(Debug)]
pub struct DebugArgs {
    /// Recording to replay.
    pub script: PathBuf,
    /// Steps to run after attaching.
    pub steps: usize,
    /// `<depth>:<name>` variables to expand before stepping.
    pub expand: Vec<String>,
    /// Expression evaluated at every stop.
    pub eval: Option<String>,
    /// Multi-line rendering for the evaluation.
    pub pretty: bool,
}

/// Spawn this very binary as the backend, attach, apply the requested
/// expansions, then step and print until done or the debuggee finishes.
pub async fn run_debug(args: DebugArgs) -> Result<()> {
    let exe = std::env::current_exe().wrap_err("cannot locate own executable")?;
    let mut command = Command::new(exe);
    command.arg("backend").arg("--script").arg(&args.script);

    let transport = PipeTransport::spawn_child(command).wrap_err("failed to spawn backend")?;
    let mut session = DebugSession::new(transport);

    info!("attaching");
    session.attach().await.map_err(|e| eyre!("attach failed: {e}"))?;
    println!("--- attached ---");
    print_mirror(session.mirror());

    for spec in &args.expand {
        let (depth, name) = parse_expand_spec(spec)?;
        let Some(id) = session.mirror().variable(depth, &name).map(|v| v.id) else {
            bail!("no variable {name:?} at depth {depth}");
        };
        session.expand(id).await.map_err(|e| eyre!("expand {spec:?} failed: {e}"))?;
    }
    if let Some(expression) = &args.eval {
        print_evaluation(&mut session, expression, args.pretty).await?;
    }

    for step in 1..=args.steps {
        match session.step().await {
            Ok(()) => {
                println!("--- step {step} ---");
                print_mirror(session.mirror());
                if let Some(expression) = &args.eval {
                    print_evaluation(&mut session, expression, args.pretty).await?;
                }
            }
            Err(SessionError::Closed) => {
                println!("--- debuggee finished ---");
                break;
            }
            Err(e) => return Err(eyre!("step {step} failed: {e}")),
        }
    }

    session.stop();
    Ok(())
}

async fn print_evaluation(
    session: &mut DebugSession,
    expression: &str,
    pretty: bool,
) -> Result<()> {
    match session.evaluate(expression, pretty).await {
        Ok(text) => println!("{expression} => {text}"),
        Err(SessionError::Closed) => println!("{expression} => <backend closed>"),
        Err(e) => return Err(eyre!("evaluation failed: {e}")),
    }
    Ok(())
}

/// `<depth>:<name>`, e.g. `0:config`.
fn parse_expand_spec(spec: &str) -> Result<(usize, String)> {
    let (depth, name) = spec
        .split_once(':')
        .ok_or_else(|| eyre!("expand spec {spec:?} is not of the form <depth>:<name>"))?;
    let depth = depth.parse::<usize>().wrap_err_with(|| format!("bad depth in {spec:?}"))?;
    Ok((depth, name.to_string()))
}

/// Render the mirror to stdout: frames oldest first, each with its
/// variables and any expanded attributes, change marks shown as the
/// delta characters.
fn print_mirror(mirror: &Mirror) {
    for depth in 0..mirror.frame_count() {
        let Some(frame) = mirror.frame_at(depth) else { continue };
        match frame.span {
            Some(span) => println!("#{depth} {}, at {span}", frame.frame),
            None => println!("#{depth} {}", frame.frame),
        }
        for variable in mirror.variables_at(depth) {
            let mark = match variable.mark {
                Mark::Added => "+ ",
                Mark::Modified => "* ",
                _ => "  ",
            };
            println!("    {mark}{} {} = {}", variable.name, variable.type_name, variable.rendered);
        }
    }
    for (id, depth, path) in mirror.expanded_attributes() {
        if let Some(attribute) = mirror.attribute(id) {
            let default = if attribute.default { " (default)" } else { "" };
            println!(
                "    [{depth}] {path} {} = {}{default}",
                attribute.type_name, attribute.rendered
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_expand_spec() {
        assert_eq!(parse_expand_spec("0:config").unwrap(), (0, "config".to_string()));
        assert_eq!(parse_expand_spec("2:x:y").unwrap(), (2, "x:y".to_string()));
        assert!(parse_expand_spec("config").is_err());
        assert!(parse_expand_spec("deep:config").is_err());
    }
}

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

//! Command parsing and dispatch
//!
//! One text command per line, keyword plus positional arguments. Every
//! command except `step` produces exactly one framed payload; `step`
//! advances the provider and is answered only by the unframed stop
//! banner (or by process exit when the debuggee finishes).
//!
//! | command | effect |
//! |---|---|
//! | `step` | advance one unit; may terminate the backend |
//! | `where` | stack trace, innermost first |
//! | `seek` | stack trace with source ranges |
//! | `frames` | variable delta; updates the retained snapshot |
//! | `ev <expr>` | evaluate, rendering collapsed to one line |
//! | `evp <expr>` | evaluate, natural multi-line rendering |
//! | `detail <depth> <path>` | single-value detail |
//! | `detailall <depth> <path>` | children detail |
//! | `comp <partial>` | completion candidates (alias `compliment`) |
//! | `amu <unit>` | argument memory usage of the innermost frame |
//!
//! Evaluation failures and lookup misses come back as well-framed
//! payload text; only `frames` mutates engine state.

use itertools::Itertools;
use stepscope_common::{
    CompletionCandidate, CompletionReply, DetailLine, DetailReply, FrameLine, SeekLine,
};
use thiserror::Error;
use tracing::debug;

use crate::{
    collapse, format_bytes, FrameInfo, Inspector, SnapshotStore, StepOutcome, ValueView,
};

/// A parsed wire command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Advance execution one unit.
    Step,
    /// Full stack trace.
    Where,
    /// Stack trace with source ranges.
    Seek,
    /// Variable delta for the current stack.
    Frames,
    /// Evaluate, collapsed rendering.
    Ev(String),
    /// Evaluate, natural rendering.
    Evp(String),
    /// Single-value detail.
    Detail {
        /// Frame depth holding the root name.
        depth: usize,
        /// Dotted path from the root name.
        path: String,
    },
    /// Children detail.
    DetailAll {
        /// Frame depth holding the root name.
        depth: usize,
        /// Dotted path from the root name.
        path: String,
    },
    /// Completion candidates for a partial expression.
    Comp(String),
    /// Argument memory usage in the given unit.
    Amu(String),
}

/// A command line that could not be understood. Reported as framed
/// text, never as a dropped connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Unknown keyword.
    #[error("unknown command {0:?}")]
    Unknown(String),
    /// Keyword recognized, arguments not.
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl Command {
    /// Parse one command line.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        let (keyword, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        match keyword {
            "step" => Ok(Self::Step),
            "where" => Ok(Self::Where),
            "seek" => Ok(Self::Seek),
            "frames" => Ok(Self::Frames),
            "ev" => Ok(Self::Ev(rest.to_string())),
            "evp" => Ok(Self::Evp(rest.to_string())),
            "detail" => parse_target(rest, "detail <depth> <dotted.path>")
                .map(|(depth, path)| Self::Detail { depth, path }),
            "detailall" => parse_target(rest, "detailall <depth> <dotted.path>")
                .map(|(depth, path)| Self::DetailAll { depth, path }),
            "comp" | "compliment" => Ok(Self::Comp(rest.to_string())),
            "amu" => Ok(Self::Amu(rest.to_string())),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn parse_target(rest: &str, usage: &'static str) -> Result<(usize, String), CommandError> {
    let (depth, path) = rest.split_once(' ').ok_or(CommandError::Usage(usage))?;
    let depth = depth.parse::<usize>().map_err(|_| CommandError::Usage(usage))?;
    if path.trim().is_empty() {
        return Err(CommandError::Usage(usage));
    }
    Ok((depth, path.trim().to_string()))
}

/// What a dispatched command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Payload lines to be framed and written.
    Payload(Vec<String>),
    /// A `step` completed with this outcome.
    Stepped(StepOutcome),
}

/// The backend engine: one provider plus the retained snapshot.
#[derive(Debug)]
pub struct Engine<I> {
    inspector: I,
    snapshot: SnapshotStore,
}

impl<I: Inspector> Engine<I> {
    /// Wrap a provider with an empty retained snapshot: the first
    /// `frames` reports the full state as Added.
    pub fn new(inspector: I) -> Self {
        Self { inspector, snapshot: SnapshotStore::new() }
    }

    /// Innermost frame of the current stack, for the stop banner.
    pub fn current_position(&self) -> Option<FrameInfo> {
        self.inspector.stack().into_iter().next_back()
    }

    /// Dispatch one command.
    pub fn handle(&mut self, command: Command) -> Reply {
        debug!(?command, "dispatching");
        match command {
            Command::Step => Reply::Stepped(self.inspector.step()),
            Command::Where => Reply::Payload(self.do_where()),
            Command::Seek => Reply::Payload(self.do_seek()),
            Command::Frames => Reply::Payload(self.do_frames()),
            Command::Ev(expr) => Reply::Payload(self.do_ev(&expr)),
            Command::Evp(expr) => Reply::Payload(self.do_evp(&expr)),
            Command::Detail { depth, path } => Reply::Payload(self.do_detail(depth, &path)),
            Command::DetailAll { depth, path } => Reply::Payload(self.do_detailall(depth, &path)),
            Command::Comp(partial) => Reply::Payload(self.do_comp(&partial)),
            Command::Amu(unit) => Reply::Payload(self.do_amu(&unit)),
        }
    }

    /// Stack trace, innermost frame first.
    fn do_where(&self) -> Vec<String> {
        self.inspector
            .stack()
            .iter()
            .rev()
            .map(|f| {
                FrameLine { filename: f.filename.clone(), line: f.line, function: f.function.clone() }
                    .to_string()
            })
            .collect()
    }

    /// Stack trace with source ranges, innermost frame first.
    fn do_seek(&self) -> Vec<String> {
        self.inspector
            .stack()
            .iter()
            .rev()
            .map(|f| {
                SeekLine {
                    frame: FrameLine {
                        filename: f.filename.clone(),
                        line: f.line,
                        function: f.function.clone(),
                    },
                    span: f.span,
                }
                .to_string()
            })
            .collect()
    }

    /// Variable delta; the one side-effecting query.
    fn do_frames(&mut self) -> Vec<String> {
        let stack = self.inspector.stack();
        let locals: Vec<_> = (0..stack.len()).map(|depth| self.inspector.locals(depth)).collect();
        self.snapshot
            .diff(&stack, &locals)
            .iter()
            .flat_map(|delta| delta.to_lines())
            .collect()
    }

    fn do_ev(&self, expr: &str) -> Vec<String> {
        match self.inspector.eval(expr) {
            Ok(view) => vec![collapse(&view.text)],
            Err(e) => vec![collapse(&e.to_string())],
        }
    }

    /// Like `ev` but the value's natural multi-line form survives; the
    /// framing's exact line count carries it.
    fn do_evp(&self, expr: &str) -> Vec<String> {
        match self.inspector.eval(expr) {
            Ok(view) => view.text.split('\n').map(|l| l.trim_end_matches('\r').to_string()).collect(),
            Err(e) => e.to_string().split('\n').map(str::to_string).collect(),
        }
    }

    /// Resolve `<root>.<member>...` at a depth: the root against the
    /// retained snapshot, the rest through the provider. Pure.
    fn resolve_path(&self, depth: usize, path: &str) -> Result<ValueView, Vec<String>> {
        let mut segments = path.split('.');
        let root = segments.next().unwrap_or_default();
        let Some(binding) = self.snapshot.binding(depth, root) else {
            // Lookup miss: the root is not a known frame-local name.
            return Err(DetailReply::Failed.to_lines());
        };
        let mut view = self
            .inspector
            .view(binding.id)
            .map_err(|e| vec![collapse(&e.to_string())])?;
        for segment in segments {
            view = self.inspector.member(view.id, segment).map_err(|e| vec![collapse(&e.to_string())])?;
        }
        Ok(view)
    }

    fn do_detail(&self, depth: usize, path: &str) -> Vec<String> {
        match self.resolve_path(depth, path) {
            Ok(view) => {
                let name = path.rsplit('.').next().unwrap_or(path);
                DetailReply::Success(vec![DetailLine {
                    name: name.to_string(),
                    type_name: view.type_name.clone(),
                    default: view.default,
                    rendered: collapse(&view.text),
                }])
                .to_lines()
            }
            Err(lines) => lines,
        }
    }

    fn do_detailall(&self, depth: usize, path: &str) -> Vec<String> {
        let view = match self.resolve_path(depth, path) {
            Ok(view) => view,
            Err(lines) => return lines,
        };
        match self.inspector.members(view.id) {
            Ok(members) => DetailReply::Success(
                members
                    .into_iter()
                    .map(|(name, member)| DetailLine {
                        name,
                        type_name: member.type_name,
                        default: member.default,
                        rendered: collapse(&member.text),
                    })
                    .collect(),
            )
            .to_lines(),
            Err(e) => vec![collapse(&e.to_string())],
        }
    }

    /// Completion. A bare prefix filters the innermost scope (globals
    /// shadowed by locals); a dotted prefix evaluates the base
    /// expression and filters its members.
    fn do_comp(&self, partial: &str) -> Vec<String> {
        let partial = partial.trim();
        let trailing_dot = partial.ends_with('.');
        let partial = partial.trim_end_matches('.');

        let (base, prefix) = match partial.rsplit_once('.') {
            Some((base, prefix)) => (Some(base), prefix),
            None if trailing_dot => (Some(partial), ""),
            None => (None, partial),
        };

        let candidates = match base {
            None => {
                // Scope filter: globals first, locals shadow.
                let innermost = self
                    .inspector
                    .stack()
                    .len()
                    .checked_sub(1)
                    .map(|depth| self.inspector.locals(depth))
                    .unwrap_or_default();
                let globals = self.inspector.globals();
                globals
                    .iter()
                    .filter(|(name, _)| innermost.iter().all(|local| local.name != *name))
                    .map(|(name, view)| (name.clone(), view.type_name.clone()))
                    .chain(innermost.iter().map(|l| (l.name.clone(), l.value.type_name.clone())))
                    .filter(|(name, _)| name.starts_with(prefix))
                    .collect_vec()
            }
            Some(base) => {
                let view = match self.inspector.eval(base) {
                    Ok(view) => view,
                    Err(e) => {
                        return CompletionReply::Failed(collapse(&e.to_string())).to_lines();
                    }
                };
                match self.inspector.members(view.id) {
                    Ok(members) => members
                        .into_iter()
                        .filter(|(name, _)| name.starts_with(prefix))
                        .map(|(name, member)| (name, member.type_name))
                        .collect_vec(),
                    Err(e) => return CompletionReply::Failed(collapse(&e.to_string())).to_lines(),
                }
            }
        };

        CompletionReply::Success(
            candidates
                .into_iter()
                .map(|(name, type_name)| CompletionCandidate { name, type_name })
                .collect(),
        )
        .to_lines()
    }

    /// Memory usage of the innermost frame's arguments.
    fn do_amu(&self, unit: &str) -> Vec<String> {
        let Some(depth) = self.inspector.stack().len().checked_sub(1) else {
            return Vec::new();
        };
        self.inspector
            .locals(depth)
            .iter()
            .filter(|local| local.argument)
            .map(|local| match self.inspector.size_of(local.value.id) {
                Some(size) => format!("{} = {}", local.name, format_bytes(size, unit)),
                None => format!("{} = *** undefined ***", local.name),
            })
            .collect()
    }
}

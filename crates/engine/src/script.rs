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

//! Scripted replay provider
//!
//! A JSON execution recording replayed stop by stop: each stop lists
//! the full stack with locals (and optional globals), and `step` just
//! moves to the next stop. This is the project's deterministic
//! [`Inspector`] for demos and tests.
//!
//! Identity follows the recording's `tag` labels: a tagged value keeps
//! its [`ValueId`] across stops (same object, possibly mutated), while
//! untagged values are re-tagged at every stop (each occurrence is a
//! distinct object). Member trees are indexed per stop so `detail`
//! walks resolve against the current position only.

use std::{collections::HashMap, fs, path::Path};

use serde::{Deserialize, Serialize};
use stepscope_common::SourceSpan;
use tracing::debug;

use crate::{FrameInfo, InspectError, Inspector, Local, StepOutcome, ValueId, ValueView};

/// A whole execution recording.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Script {
    /// Stops in execution order; stop 0 is the attach position.
    pub stops: Vec<Stop>,
}

impl Script {
    /// Load a recording from a JSON file.
    pub fn from_path(path: &Path) -> eyre::Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// One paused position of the recording.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stop {
    /// Call stack, oldest frame first.
    pub frames: Vec<ScriptFrame>,
    /// Globals visible from the innermost frame.
    #[serde(default)]
    pub globals: Vec<ScriptBinding>,
}

/// One recorded frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptFrame {
    /// Source file.
    pub filename: String,
    /// Current line.
    pub line: u32,
    /// Function name.
    pub function: String,
    /// Source range as `[startLine, startCol, endLine, endCol]`;
    /// defaults to the whole current line.
    #[serde(default)]
    pub span: Option<[u32; 4]>,
    /// Locals in declaration order.
    #[serde(default)]
    pub locals: Vec<ScriptBinding>,
}

/// One recorded binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptBinding {
    /// Binding name.
    pub name: String,
    /// Whether the binding is a formal argument.
    #[serde(default)]
    pub arg: bool,
    /// The bound value.
    pub value: ScriptValue,
}

/// One recorded value, possibly with a member tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptValue {
    /// Type name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Natural rendering; may contain newlines.
    pub text: String,
    /// Identity label: values sharing a tag across stops are the same
    /// object. Untagged values are distinct objects at every stop.
    #[serde(default)]
    pub tag: Option<String>,
    /// Language-default/no-op marker.
    #[serde(default)]
    pub default: bool,
    /// Approximate size in bytes, for `amu`.
    #[serde(default)]
    pub size: Option<u64>,
    /// Introspectable members, declaration order.
    #[serde(default)]
    pub members: Vec<ScriptMember>,
}

/// One member of a recorded value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptMember {
    /// Member name.
    pub name: String,
    /// Member value.
    pub value: ScriptValue,
}

/// Everything indexed about one value at the current stop.
#[derive(Debug, Clone)]
struct IndexedValue {
    view: ValueView,
    size: Option<u64>,
    members: Vec<(String, ValueId)>,
}

/// Replays a [`Script`] as an [`Inspector`].
#[derive(Debug)]
pub struct ScriptInspector {
    script: Script,
    stop: usize,
    next_id: u64,
    /// Stable ids for tagged values, surviving across stops.
    tags: HashMap<String, ValueId>,
    /// Per-stop index, rebuilt on every advance.
    values: HashMap<ValueId, IndexedValue>,
    stack: Vec<FrameInfo>,
    locals: Vec<Vec<Local>>,
    globals: Vec<(String, ValueView)>,
}

impl ScriptInspector {
    /// Build an inspector positioned at the recording's first stop.
    pub fn new(script: Script) -> Self {
        let mut inspector = Self {
            script,
            stop: 0,
            next_id: 0,
            tags: HashMap::new(),
            values: HashMap::new(),
            stack: Vec::new(),
            locals: Vec::new(),
            globals: Vec::new(),
        };
        inspector.reindex();
        inspector
    }

    /// Stop currently replayed, 0-based.
    pub fn position(&self) -> usize {
        self.stop
    }

    fn fresh_id(&mut self) -> ValueId {
        let id = ValueId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Assign an id to a value node and index it, recursing into its
    /// member tree.
    fn index_value(&mut self, value: &ScriptValue) -> ValueId {
        let id = match &value.tag {
            Some(tag) => match self.tags.get(tag) {
                Some(id) => *id,
                None => {
                    let id = self.fresh_id();
                    self.tags.insert(tag.clone(), id);
                    id
                }
            },
            None => self.fresh_id(),
        };
        let members = value
            .members
            .iter()
            .map(|member| (member.name.clone(), self.index_value(&member.value)))
            .collect();
        self.values.insert(
            id,
            IndexedValue {
                view: ValueView {
                    id,
                    type_name: value.type_name.clone(),
                    text: value.text.clone(),
                    default: value.default,
                },
                size: value.size,
                members,
            },
        );
        id
    }

    /// Rebuild the per-stop index for the current position.
    fn reindex(&mut self) {
        self.values.clear();
        self.stack.clear();
        self.locals.clear();
        self.globals.clear();

        let Some(stop) = self.script.stops.get(self.stop).cloned() else {
            return;
        };

        for frame in &stop.frames {
            let span = frame.span.map_or(
                SourceSpan { start_line: frame.line, start_col: 0, end_line: frame.line, end_col: 0 },
                |[a, b, c, d]| SourceSpan { start_line: a, start_col: b, end_line: c, end_col: d },
            );
            self.stack.push(FrameInfo {
                filename: frame.filename.clone(),
                line: frame.line,
                function: frame.function.clone(),
                span,
            });
            let locals = frame
                .locals
                .iter()
                .map(|binding| {
                    let id = self.index_value(&binding.value);
                    Local {
                        name: binding.name.clone(),
                        value: self.values[&id].view.clone(),
                        argument: binding.arg,
                    }
                })
                .collect();
            self.locals.push(locals);
        }

        for binding in &stop.globals {
            let id = self.index_value(&binding.value);
            self.globals.push((binding.name.clone(), self.values[&id].view.clone()));
        }

        debug!(stop = self.stop, frames = self.stack.len(), "replay position indexed");
    }

    fn lookup(&self, id: ValueId) -> Result<&IndexedValue, InspectError> {
        self.values.get(&id).ok_or(InspectError::StaleValue(id))
    }
}

impl Inspector for ScriptInspector {
    fn stack(&self) -> Vec<FrameInfo> {
        self.stack.clone()
    }

    fn locals(&self, depth: usize) -> Vec<Local> {
        self.locals.get(depth).cloned().unwrap_or_default()
    }

    fn globals(&self) -> Vec<(String, ValueView)> {
        self.globals.clone()
    }

    fn view(&self, value: ValueId) -> Result<ValueView, InspectError> {
        Ok(self.lookup(value)?.view.clone())
    }

    fn members(&self, value: ValueId) -> Result<Vec<(String, ValueView)>, InspectError> {
        let indexed = self.lookup(value)?;
        indexed
            .members
            .iter()
            .map(|(name, id)| Ok((name.clone(), self.lookup(*id)?.view.clone())))
            .collect()
    }

    fn member(&self, value: ValueId, name: &str) -> Result<ValueView, InspectError> {
        let indexed = self.lookup(value)?;
        let (_, id) = indexed
            .members
            .iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| InspectError::NoSuchMember {
                type_name: indexed.view.type_name.clone(),
                name: name.to_string(),
            })?;
        self.view(*id)
    }

    /// Evaluation over a recording is dotted-name resolution: the root
    /// segment against innermost locals, then globals, then a member
    /// walk.
    fn eval(&self, expr: &str) -> Result<ValueView, InspectError> {
        let expr = expr.trim();
        let mut segments = expr.split('.');
        let root = segments
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| InspectError::Eval(format!("cannot evaluate {expr:?}")))?;

        let innermost = self.locals.last().map(Vec::as_slice).unwrap_or(&[]);
        let mut view = innermost
            .iter()
            .find(|local| local.name == root)
            .map(|local| local.value.clone())
            .or_else(|| {
                self.globals.iter().find(|(name, _)| name == root).map(|(_, v)| v.clone())
            })
            .ok_or_else(|| InspectError::Eval(format!("name {root:?} is not defined")))?;
        for segment in segments {
            view = self.member(view.id, segment)?;
        }
        Ok(view)
    }

    fn size_of(&self, value: ValueId) -> Option<u64> {
        self.values.get(&value)?.size
    }

    fn step(&mut self) -> StepOutcome {
        self.stop += 1;
        if self.stop >= self.script.stops.len() {
            debug!(stop = self.stop, "recording exhausted");
            return StepOutcome::Finished;
        }
        self.reindex();
        StepOutcome::Stopped
    }
}

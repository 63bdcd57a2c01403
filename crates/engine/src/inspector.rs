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

//! Introspection provider boundary
//!
//! The engine never inspects a live process directly; everything it
//! knows arrives through the [`Inspector`] trait. Values cross the
//! boundary as [`ValueView`]s carrying an opaque [`ValueId`]: the
//! provider assigns a fresh id the first time a value is observed and
//! re-tags it only on genuine rebinding, never on in-place mutation.
//! Identity comparison on ids is therefore cheap and safe where value
//! equality would be neither.
//!
//! View text may contain newlines; collapsing it to a single wire line
//! is the engine's job, not the provider's.

use std::fmt;

use serde::{Deserialize, Serialize};
use stepscope_common::SourceSpan;
use thiserror::Error;

/// Opaque identity token for an observed value.
///
/// Equal ids mean "same object, possibly mutated since"; differing ids
/// mean the binding was rebound. Ids are stable for the lifetime of the
/// binding and meaningless across provider restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(pub u64);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A value as observed at the provider boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueView {
    /// Identity token, see [`ValueId`].
    pub id: ValueId,
    /// Type name of the value.
    pub type_name: String,
    /// Natural rendering; may span multiple lines.
    pub text: String,
    /// Whether this is a language-default/no-op member.
    pub default: bool,
}

/// One activation record of the current call stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    /// Source file of the frame.
    pub filename: String,
    /// Currently executing line.
    pub line: u32,
    /// Function name.
    pub function: String,
    /// Fine-grained source range currently executing.
    pub span: SourceSpan,
}

/// One local binding of a frame, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Local {
    /// Binding name.
    pub name: String,
    /// Observed value.
    pub value: ValueView,
    /// Whether the binding is a formal argument of the frame's function.
    pub argument: bool,
}

/// Result of advancing execution by one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Execution paused at a new position.
    Stopped,
    /// The debuggee ran to completion; the backend should exit.
    Finished,
}

/// Failure inside the provider, reported back as framed text and never
/// across the pipe as a raw panic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InspectError {
    /// A member walk hit a name the value does not have.
    #[error("'{type_name}' has no member '{name}'")]
    NoSuchMember {
        /// Type the lookup was attempted on.
        type_name: String,
        /// Missing member name.
        name: String,
    },
    /// The id does not refer to a currently observable value.
    #[error("stale value handle {0}")]
    StaleValue(ValueId),
    /// Expression evaluation failed; carries the provider's message.
    #[error("{0}")]
    Eval(String),
}

/// The capability boundary between the engine and whatever it debugs.
///
/// All query methods are pure: they must not re-tag identity tokens or
/// otherwise disturb provider state. Only [`Inspector::step`] advances.
pub trait Inspector {
    /// Current call stack, oldest frame first.
    fn stack(&self) -> Vec<FrameInfo>;

    /// Locals of the frame at `depth` (0 = oldest), declaration order.
    fn locals(&self, depth: usize) -> Vec<Local>;

    /// Global bindings visible from the innermost frame.
    fn globals(&self) -> Vec<(String, ValueView)>;

    /// Current view of an already observed value.
    fn view(&self, value: ValueId) -> Result<ValueView, InspectError>;

    /// Enumerate the introspectable members of a value, in declaration
    /// order, defaults included.
    fn members(&self, value: ValueId) -> Result<Vec<(String, ValueView)>, InspectError>;

    /// Look up a single member of a value.
    fn member(&self, value: ValueId, name: &str) -> Result<ValueView, InspectError>;

    /// Evaluate an expression in the innermost frame's scope.
    fn eval(&self, expr: &str) -> Result<ValueView, InspectError>;

    /// Approximate in-memory size of a value, in bytes, if known.
    fn size_of(&self, value: ValueId) -> Option<u64>;

    /// Advance execution one unit.
    fn step(&mut self) -> StepOutcome;
}

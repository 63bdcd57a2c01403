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

//! Variable delta channel (`frames` payload)
//!
//! The payload is a sequence of line pairs. The first line of each pair
//! locates the frame the change belongs to:
//!
//! ```text
//! [<frameDepth>] File "<filename>", line <lineno>, in <function>
//! ```
//!
//! and the second carries the change itself:
//!
//! ```text
//! <mode> <name> <typeName> <renderedValue>
//! ```
//!
//! where mode is `+` (added), `*` (modified) or `-` (removed). The
//! rendered value runs to the end of the line and may contain spaces;
//! it never contains raw newlines. For removals the locator carries the
//! frame position last captured for the binding, not the current stack.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::FrameLine;
use crate::ProtocolError;

/// Kind of change a delta describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeltaMode {
    /// The name first appeared in its frame's locals.
    Added,
    /// The name was rebound to a different object.
    Modified,
    /// The name left its frame's locals, or its whole frame is gone.
    Removed,
}

impl DeltaMode {
    /// Wire character for this mode.
    pub fn as_char(self) -> char {
        match self {
            Self::Added => '+',
            Self::Modified => '*',
            Self::Removed => '-',
        }
    }

    /// Parse the wire character.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Self::Added),
            '*' => Some(Self::Modified),
            '-' => Some(Self::Removed),
            _ => None,
        }
    }
}

/// Locator line of a delta pair: frame depth plus the frame position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaLocator {
    /// Depth of the frame, 0 = oldest surviving frame.
    pub depth: usize,
    /// Position of the frame the change belongs to.
    pub frame: FrameLine,
}

impl DeltaLocator {
    /// Parse a `[<depth>] File ...` locator line.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let malformed = || ProtocolError::MalformedLine { what: "delta locator", line: line.to_string() };
        let rest = line.strip_prefix('[').ok_or_else(malformed)?;
        let (depth, frame) = rest.split_once("] ").ok_or_else(malformed)?;
        let depth = depth.parse::<usize>().map_err(|_| malformed())?;
        Ok(Self { depth, frame: FrameLine::parse(frame)? })
    }
}

impl fmt::Display for DeltaLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.depth, self.frame)
    }
}

/// One change to one variable binding, as carried by a delta line pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDelta {
    /// Which frame the binding lives (or lived) in.
    pub locator: DeltaLocator,
    /// Added, modified or removed.
    pub mode: DeltaMode,
    /// Name of the binding within its frame.
    pub name: String,
    /// Type name of the bound value at capture time.
    pub type_name: String,
    /// Single-line rendering of the value at capture time.
    pub rendered: String,
}

impl VariableDelta {
    /// Emit the two wire lines for this delta.
    pub fn to_lines(&self) -> [String; 2] {
        [
            self.locator.to_string(),
            format!("{} {} {} {}", self.mode.as_char(), self.name, self.type_name, self.rendered),
        ]
    }

    /// Parse one locator/data line pair.
    pub fn parse_pair(locator: &str, data: &str) -> Result<Self, ProtocolError> {
        let malformed = || ProtocolError::MalformedLine { what: "delta data", line: data.to_string() };
        let locator = DeltaLocator::parse(locator)?;
        let (mode, rest) = data.split_once(' ').ok_or_else(malformed)?;
        let mode = mode
            .chars()
            .next()
            .filter(|_| mode.len() == 1)
            .and_then(DeltaMode::from_char)
            .ok_or_else(malformed)?;
        let (name, rest) = rest.split_once(' ').ok_or_else(malformed)?;
        let (type_name, rendered) = rest.split_once(' ').ok_or_else(malformed)?;
        Ok(Self {
            locator,
            mode,
            name: name.to_string(),
            type_name: type_name.to_string(),
            rendered: rendered.to_string(),
        })
    }

    /// Parse a whole `frames` payload into deltas. The payload must pair
    /// up exactly.
    pub fn parse_payload(lines: &[String]) -> Result<Vec<Self>, ProtocolError> {
        if lines.len() % 2 != 0 {
            return Err(ProtocolError::OddDeltaPayload(lines.len()));
        }
        lines.chunks_exact(2).map(|pair| Self::parse_pair(&pair[0], &pair[1])).collect()
    }
}

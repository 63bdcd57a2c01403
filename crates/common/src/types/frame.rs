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

//! Stack trace line formats (`where` and `seek` payloads)

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// One stack frame position as it appears on the wire:
/// `File "<filename>", line <lineno>, in <function>`.
///
/// `filename` and `function` are the frame's identity; `line` is mutable
/// metadata and takes no part in identity comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLine {
    /// Source file of the frame.
    pub filename: String,
    /// Current line within the file. Excluded from identity.
    pub line: u32,
    /// Function name of the activation record.
    pub function: String,
}

impl FrameLine {
    /// Two frame lines denote the same frame when filename and function
    /// agree, regardless of the current line.
    pub fn same_frame(&self, other: &Self) -> bool {
        self.filename == other.filename && self.function == other.function
    }

    /// Parse a `File "<filename>", line <n>, in <function>` line.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let malformed = || ProtocolError::MalformedLine { what: "stack frame", line: line.to_string() };
        let rest = line.strip_prefix("File \"").ok_or_else(malformed)?;
        let (filename, rest) = rest.split_once("\", line ").ok_or_else(malformed)?;
        let (lineno, function) = rest.split_once(", in ").ok_or_else(malformed)?;
        let lineno = lineno.parse::<u32>().map_err(|_| malformed())?;
        Ok(Self { filename: filename.to_string(), line: lineno, function: function.to_string() })
    }
}

impl fmt::Display for FrameLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File \"{}\", line {}, in {}", self.filename, self.line, self.function)
    }
}

/// A fine-grained source range, printed as
/// `<startLine>_<startCol>_<endLine>_<endCol>` in `seek` payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    /// First line of the range (1-based).
    pub start_line: u32,
    /// Column offset on the first line (0-based).
    pub start_col: u32,
    /// Last line of the range (1-based, inclusive).
    pub end_line: u32,
    /// Column offset just past the range on the last line.
    pub end_col: u32,
}

impl SourceSpan {
    /// Parse the `a_b_c_d` underscore form.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let malformed = || ProtocolError::MalformedLine { what: "source span", line: text.to_string() };
        let mut parts = text.split('_').map(|p| p.parse::<u32>());
        let mut next = || parts.next().ok_or_else(malformed)?.map_err(|_| malformed());
        let span = Self { start_line: next()?, start_col: next()?, end_line: next()?, end_col: next()? };
        if parts.next().is_some() {
            return Err(malformed());
        }
        Ok(span)
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}_{}", self.start_line, self.start_col, self.end_line, self.end_col)
    }
}

/// One `seek` payload line: a frame position plus its source range,
/// `File "<filename>", line <n>, in <function>, at <span>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekLine {
    /// The frame position.
    pub frame: FrameLine,
    /// The currently executing source range within that frame.
    pub span: SourceSpan,
}

impl SeekLine {
    /// Parse a seek payload line.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let (frame, span) = line.rsplit_once(", at ").ok_or_else(|| ProtocolError::MalformedLine {
            what: "seek frame",
            line: line.to_string(),
        })?;
        Ok(Self { frame: FrameLine::parse(frame)?, span: SourceSpan::parse(span)? })
    }
}

impl fmt::Display for SeekLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, at {}", self.frame, self.span)
    }
}

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

//! Completion query payload (`comp`)
//!
//! Header `Success` followed by one `<name> <typeName>` line per
//! candidate, or `Failed` followed by the error text.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{DETAIL_FAILED, DETAIL_SUCCESS};
use crate::ProtocolError;

/// One completion candidate: an identifier plus a coarse type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCandidate {
    /// Candidate identifier.
    pub name: String,
    /// Coarse type tag used for icon selection on the UI side.
    pub type_name: String,
}

impl CompletionCandidate {
    /// Parse a `<name> <typeName>` line.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let (name, type_name) = line.split_once(' ').ok_or_else(|| ProtocolError::MalformedLine {
            what: "completion",
            line: line.to_string(),
        })?;
        Ok(Self { name: name.to_string(), type_name: type_name.to_string() })
    }
}

impl fmt::Display for CompletionCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.type_name)
    }
}

/// A parsed completion reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionReply {
    /// Candidates matching the typed prefix, in scope order.
    Success(Vec<CompletionCandidate>),
    /// The base expression failed to evaluate; carries the error text.
    Failed(String),
}

impl CompletionReply {
    /// Parse a whole completion payload.
    pub fn parse(lines: &[String]) -> Result<Self, ProtocolError> {
        match lines.first().map(String::as_str) {
            Some(DETAIL_SUCCESS) => {
                let candidates = lines[1..]
                    .iter()
                    .map(|l| CompletionCandidate::parse(l))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::Success(candidates))
            }
            Some(DETAIL_FAILED) => Ok(Self::Failed(lines[1..].join("\n"))),
            Some(other) => {
                Err(ProtocolError::MalformedLine { what: "completion header", line: other.to_string() })
            }
            None => {
                Err(ProtocolError::MalformedLine { what: "completion header", line: String::new() })
            }
        }
    }

    /// Emit the payload lines for this reply.
    pub fn to_lines(&self) -> Vec<String> {
        match self {
            Self::Success(candidates) => {
                let mut lines = vec![DETAIL_SUCCESS.to_string()];
                lines.extend(candidates.iter().map(ToString::to_string));
                lines
            }
            Self::Failed(message) => {
                let mut lines = vec![DETAIL_FAILED.to_string()];
                lines.extend(message.lines().map(str::to_string));
                lines
            }
        }
    }
}

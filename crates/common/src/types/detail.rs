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

//! Detail query payloads (`detail` / `detailall`)
//!
//! The first payload line is `Success` or `Failed`. On success each
//! following line describes one introspected member:
//!
//! ```text
//! <name> <typeName> <T|F> <renderedValue>
//! ```
//!
//! `T` marks a language-default member (display dimmed, never omitted).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Header line of a detail reply.
pub const DETAIL_SUCCESS: &str = "Success";
/// Header line of a failed detail reply (root name not found).
pub const DETAIL_FAILED: &str = "Failed";

/// One member line of a successful detail reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailLine {
    /// Member name.
    pub name: String,
    /// Member type name.
    pub type_name: String,
    /// Whether the member is a language-default/no-op entry.
    pub default: bool,
    /// Single-line rendering of the member value.
    pub rendered: String,
}

impl DetailLine {
    /// Parse a `<name> <type> <T|F> <value>` line.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let malformed = || ProtocolError::MalformedLine { what: "detail", line: line.to_string() };
        let (name, rest) = line.split_once(' ').ok_or_else(malformed)?;
        let (type_name, rest) = rest.split_once(' ').ok_or_else(malformed)?;
        let (default, rendered) = rest.split_once(' ').ok_or_else(malformed)?;
        let default = match default {
            "T" => true,
            "F" => false,
            _ => return Err(malformed()),
        };
        Ok(Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            default,
            rendered: rendered.to_string(),
        })
    }
}

impl fmt::Display for DetailLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let default = if self.default { 'T' } else { 'F' };
        write!(f, "{} {} {} {}", self.name, self.type_name, default, self.rendered)
    }
}

/// A parsed detail reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailReply {
    /// The target resolved; members follow.
    Success(Vec<DetailLine>),
    /// The target's root name was not found at the requested depth.
    Failed,
}

impl DetailReply {
    /// Parse a whole detail payload.
    pub fn parse(lines: &[String]) -> Result<Self, ProtocolError> {
        match lines.first().map(String::as_str) {
            Some(DETAIL_SUCCESS) => {
                let members =
                    lines[1..].iter().map(|l| DetailLine::parse(l)).collect::<Result<Vec<_>, _>>()?;
                Ok(Self::Success(members))
            }
            Some(DETAIL_FAILED) => Ok(Self::Failed),
            Some(other) => {
                Err(ProtocolError::MalformedLine { what: "detail header", line: other.to_string() })
            }
            None => Err(ProtocolError::MalformedLine { what: "detail header", line: String::new() }),
        }
    }

    /// Emit the payload lines for this reply.
    pub fn to_lines(&self) -> Vec<String> {
        match self {
            Self::Success(members) => {
                let mut lines = vec![DETAIL_SUCCESS.to_string()];
                lines.extend(members.iter().map(ToString::to_string));
                lines
            }
            Self::Failed => vec![DETAIL_FAILED.to_string()],
        }
    }
}

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

//! Line-count framing for pipe responses
//!
//! Every backend response is one header line `lines: <N>` followed by
//! exactly N literal payload lines. The backend also writes its prompt
//! tag before each command read, without a trailing newline, so the tag
//! glues onto whatever the backend prints next; the client strips it
//! while scanning for a header. Payload lines are never tagged.
//!
//! The count must be exact. Payload text that would contain embedded
//! newlines is collapsed at the source (see the engine's renderer), so
//! counting literal lines is sufficient on both sides.

use crate::ProtocolError;

/// Tag the backend writes before each command read. Glued (no newline)
/// onto the next output line.
pub const PROMPT_TAG: &str = "[stepscope] ";

/// Prefix of the framing header line.
pub const HEADER_PREFIX: &str = "lines: ";

/// Format a framing header for a payload of `count` lines.
pub fn header(count: usize) -> String {
    format!("{HEADER_PREFIX}{count}")
}

/// Strip the backend prompt tag from the front of a line, if present.
pub fn strip_prompt_tag(line: &str) -> &str {
    line.strip_prefix(PROMPT_TAG).unwrap_or(line)
}

/// Try to read `line` as a framing header.
///
/// Returns `None` if the line is not a header at all (the transport
/// treats such lines as junk and keeps scanning), and `Some(Err(_))` if
/// it claims to be a header but the count does not parse.
pub fn parse_header(line: &str) -> Option<Result<usize, ProtocolError>> {
    let rest = strip_prompt_tag(line).trim();
    let count = rest.strip_prefix(HEADER_PREFIX)?;
    Some(count.trim().parse::<usize>().map_err(|_| ProtocolError::BadHeader(line.to_string())))
}

/// Render a full framed reply: header plus payload, each line
/// newline-terminated. An empty payload is exactly `lines: 0\n`.
pub fn frame_reply(payload: &[String]) -> String {
    let mut out = header(payload.len());
    out.push('\n');
    for line in payload {
        out.push_str(line);
        out.push('\n');
    }
    out
}

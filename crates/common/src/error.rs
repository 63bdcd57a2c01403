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

//! Protocol-level error taxonomy
//!
//! These errors cover exactly one failure class: the bytes on the pipe do
//! not match the framing or payload grammar. Evaluation failures and
//! lookup misses are *not* errors at this level; the backend reports them
//! as well-framed payload text. A `ProtocolError` on the client side is
//! fatal to the current synchronization pass and poisons the mirror.

use thiserror::Error;

/// A violation of the wire grammar. Never recovered by guessing; the
/// operation that hit it is aborted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A line announced itself as a framing header but the line count
    /// would not parse.
    #[error("unparseable framing header: {0:?}")]
    BadHeader(String),

    /// The stream ended before the declared number of payload lines
    /// arrived.
    #[error("framed payload truncated: header declared {expected} lines, got {got}")]
    TruncatedPayload {
        /// Line count declared by the `lines: N` header.
        expected: usize,
        /// Lines actually read before the stream ended.
        got: usize,
    },

    /// A payload line did not split into the fields its format requires.
    #[error("malformed {what} line: {line:?}")]
    MalformedLine {
        /// Which payload grammar the line was parsed against.
        what: &'static str,
        /// The offending line, verbatim.
        line: String,
    },

    /// The variable-delta channel pairs a locator line with a data line;
    /// an odd payload cannot be paired.
    #[error("variable delta payload has odd line count {0}")]
    OddDeltaPayload(usize),

    /// A delta referred to a frame depth the mirror does not hold.
    #[error("frame depth {depth} out of range (mirror holds {len} frames)")]
    DepthOutOfRange {
        /// Depth named by the delta locator.
        depth: usize,
        /// Number of frames currently mirrored.
        len: usize,
    },
}

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

//! Shared protocol definitions for stepscope components
//!
//! Both ends of the debugger pipe depend on this crate: the wire framing
//! (`lines: N` headers, prompt tag), the payload line formats for every
//! response shape, the protocol error taxonomy, and the common logging
//! setup. Nothing here performs I/O; the backend and the client each own
//! their half of the pipe and use these types to agree on what flows
//! through it.

pub mod error;
pub use error::*;

pub mod framing;
pub use framing::*;

pub mod logging;

pub mod types;
pub use types::*;

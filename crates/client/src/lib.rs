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

//! stepscope frontend core
//!
//! The client half of the debugger, headless: [`transport`] owns the
//! pipe and enforces the one-request-in-flight discipline, [`mirror`]
//! holds the locally reconstructed tree of frames, variables and
//! expanded attributes, [`sync`] applies delta payloads to it, and
//! [`session`] orchestrates the whole step pipeline. Rendering the
//! mirror is someone else's job.

pub mod mirror;
pub use mirror::*;

pub mod session;
pub use session::*;

pub mod sync;
pub use sync::*;

pub mod transport;
pub use transport::*;

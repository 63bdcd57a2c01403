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

//! stepscope backend engine
//!
//! The backend half of the debugger: an [`Inspector`] provides the live
//! call stack, the [`snapshot`] module diffs it against the previous
//! capture, [`commands`] dispatches the wire commands onto both, and
//! [`server`] runs the whole thing as a blocking loop over a byte pipe.
//! [`script`] ships the deterministic scripted provider used by demos
//! and tests.

pub mod commands;
pub use commands::*;

pub mod inspector;
pub use inspector::*;

pub mod render;
pub use render::*;

pub mod script;
pub use script::*;

pub mod server;
pub use server::*;

pub mod snapshot;
pub use snapshot::*;

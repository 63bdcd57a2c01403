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

//! Payload line formats, one module per response shape
//!
//! Each type knows how to print itself onto the wire and how to parse
//! itself back; both directions are exercised by both processes (the
//! backend formats, the client parses, and the tests close the loop).

mod completion;
mod delta;
mod detail;
mod frame;

pub use completion::*;
pub use delta::*;
pub use detail::*;
pub use frame::*;

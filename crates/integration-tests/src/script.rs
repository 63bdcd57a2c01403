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

//! Terse builders for recorded execution scripts

use stepscope_engine::{Script, ScriptBinding, ScriptFrame, ScriptMember, ScriptValue, Stop};

/// A plain untagged value: a fresh object at every stop.
pub fn value(type_name: &str, text: &str) -> ScriptValue {
    ScriptValue {
        type_name: type_name.to_string(),
        text: text.to_string(),
        tag: None,
        default: false,
        size: None,
        members: Vec::new(),
    }
}

/// A tagged value: the same object wherever the tag reappears.
pub fn tagged(tag: &str, type_name: &str, text: &str) -> ScriptValue {
    ScriptValue { tag: Some(tag.to_string()), ..value(type_name, text) }
}

/// Attach members to a value.
pub fn with_members(mut base: ScriptValue, members: Vec<(&str, ScriptValue)>) -> ScriptValue {
    base.members = members
        .into_iter()
        .map(|(name, value)| ScriptMember { name: name.to_string(), value })
        .collect();
    base
}

/// A local binding.
pub fn binding(name: &str, value: ScriptValue) -> ScriptBinding {
    ScriptBinding { name: name.to_string(), arg: false, value }
}

/// An argument binding, for `amu`.
pub fn argument(name: &str, mut value: ScriptValue, size: u64) -> ScriptBinding {
    value.size = Some(size);
    ScriptBinding { name: name.to_string(), arg: true, value }
}

/// A recorded frame.
pub fn frame(filename: &str, line: u32, function: &str, locals: Vec<ScriptBinding>) -> ScriptFrame {
    ScriptFrame {
        filename: filename.to_string(),
        line,
        function: function.to_string(),
        span: Some([line, 0, line, 10]),
        locals,
    }
}

/// A stop with no globals.
pub fn stop(frames: Vec<ScriptFrame>) -> Stop {
    Stop { frames, globals: Vec::new() }
}

/// A whole recording.
pub fn script(stops: Vec<Stop>) -> Script {
    Script { stops }
}

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

//! Retained snapshot and identity diff
//!
//! The engine keeps, per frame depth, the frame position plus the
//! bindings it reported last time: name, identity token, type name and
//! single-line rendering. [`SnapshotStore::diff`] compares a freshly
//! captured stack against the retained state and emits the minimal
//! Added/Modified/Removed stream; afterwards the retained state equals
//! what a fresh capture would produce, including updated renderings for
//! same-identity values that mutated in place (those deliberately emit
//! nothing).
//!
//! Change detection is identity-only: a binding is Modified iff its
//! [`ValueId`] changed, i.e. iff it was rebound. Frame identity is
//! positional: depth plus (filename, function). The retained frame list
//! is prefix-matched against the new stack; at the first mismatched
//! depth every deeper retained frame is stale, all its bindings are
//! removed and the new frames' bindings are added. Removals are emitted
//! before adds within each depth so a Removed/Added pair at the same
//! locator replays correctly.

use std::collections::HashSet;

use stepscope_common::{DeltaLocator, DeltaMode, FrameLine, VariableDelta};
use tracing::trace;

use crate::{collapse, FrameInfo, Local, ValueId};

/// One retained binding: everything needed to re-emit or remove it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedBinding {
    /// Identity token at last capture.
    pub id: ValueId,
    /// Type name at last capture.
    pub type_name: String,
    /// Single-line rendering at last capture.
    pub rendered: String,
    /// Whether the binding is a formal argument.
    pub argument: bool,
}

/// Retained state of one frame depth.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DepthRecord {
    /// Frame position at last capture; its line is the removal locator.
    frame: FrameLine,
    /// Bindings in locals declaration order.
    bindings: Vec<(String, RetainedBinding)>,
}

/// The engine's retained snapshot, oldest frame first.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    depths: Vec<DepthRecord>,
}

impl SnapshotStore {
    /// An empty store. The first diff reports the whole state as Added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of depths currently retained.
    pub fn depth_count(&self) -> usize {
        self.depths.len()
    }

    /// Look up a retained binding by depth and name.
    pub fn binding(&self, depth: usize, name: &str) -> Option<&RetainedBinding> {
        self.depths.get(depth)?.bindings.iter().find(|(n, _)| n == name).map(|(_, b)| b)
    }

    /// Retained bindings at a depth, declaration order.
    pub fn bindings(&self, depth: usize) -> &[(String, RetainedBinding)] {
        self.depths.get(depth).map(|d| d.bindings.as_slice()).unwrap_or(&[])
    }

    /// Diff a fresh capture against the retained state and replace it.
    ///
    /// `stack` is oldest-first; `locals[depth]` are the locals of
    /// `stack[depth]` in declaration order. Emission order is depth
    /// ascending, removals before adds/modifies within each depth;
    /// depths beyond the new stack (truncated frames) come last, all
    /// their bindings removed.
    pub fn diff(&mut self, stack: &[FrameInfo], locals: &[Vec<Local>]) -> Vec<VariableDelta> {
        debug_assert_eq!(stack.len(), locals.len());

        let new_frames: Vec<FrameLine> = stack
            .iter()
            .map(|f| FrameLine { filename: f.filename.clone(), line: f.line, function: f.function.clone() })
            .collect();

        // Prefix match: the first depth whose (filename, function)
        // changed invalidates every deeper retained frame.
        let stale_from = self
            .depths
            .iter()
            .zip(&new_frames)
            .position(|(old, new)| !old.frame.same_frame(new))
            .unwrap_or(new_frames.len().min(self.depths.len()));

        let mut deltas = Vec::new();
        let mut removed: HashSet<(usize, String)> = HashSet::new();
        let mut new_depths = Vec::with_capacity(stack.len());

        for (depth, (frame_line, frame_locals)) in new_frames.iter().zip(locals).enumerate() {
            let survives = depth < stale_from;
            let previous =
                self.depths.get(depth).map(|d| d.bindings.as_slice()).unwrap_or(&[]);
            let old_frame = self.depths.get(depth).map(|d| &d.frame);

            // Removals first. Everything goes when the frame is stale;
            // otherwise only names that left the locals.
            for (name, binding) in previous {
                let still_present =
                    survives && frame_locals.iter().any(|local| local.name == *name);
                if !still_present && removed.insert((depth, name.clone())) {
                    deltas.push(removal(depth, old_frame.unwrap_or(frame_line), name, binding));
                }
            }

            let mut bindings = Vec::with_capacity(frame_locals.len());
            for local in frame_locals {
                let rendered = collapse(&local.value.text);
                let mode = match previous.iter().find(|(n, _)| *n == local.name) {
                    Some((_, old)) if survives => {
                        // Same name in a surviving frame: only a rebind
                        // (identity change) is reportable.
                        (old.id != local.value.id).then_some(DeltaMode::Modified)
                    }
                    _ => Some(DeltaMode::Added),
                };
                if let Some(mode) = mode {
                    deltas.push(VariableDelta {
                        locator: DeltaLocator { depth, frame: frame_line.clone() },
                        mode,
                        name: local.name.clone(),
                        type_name: local.value.type_name.clone(),
                        rendered: rendered.clone(),
                    });
                }
                bindings.push((
                    local.name.clone(),
                    RetainedBinding {
                        id: local.value.id,
                        type_name: local.value.type_name.clone(),
                        rendered,
                        argument: local.argument,
                    },
                ));
            }
            new_depths.push(DepthRecord { frame: frame_line.clone(), bindings });
        }

        // Frames truncated off the innermost end: everything they held
        // is removed, locators carrying the last captured position.
        for (depth, record) in self.depths.iter().enumerate().skip(stack.len()) {
            for (name, binding) in &record.bindings {
                if removed.insert((depth, name.clone())) {
                    deltas.push(removal(depth, &record.frame, name, binding));
                }
            }
        }

        trace!(deltas = deltas.len(), depths = new_depths.len(), "snapshot diff complete");
        self.depths = new_depths;
        deltas
    }
}

fn removal(depth: usize, frame: &FrameLine, name: &str, binding: &RetainedBinding) -> VariableDelta {
    VariableDelta {
        locator: DeltaLocator { depth, frame: frame.clone() },
        mode: DeltaMode::Removed,
        name: name.to_string(),
        type_name: binding.type_name.clone(),
        rendered: binding.rendered.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValueView;
    use stepscope_common::SourceSpan;

    fn frame(filename: &str, line: u32, function: &str) -> FrameInfo {
        FrameInfo {
            filename: filename.to_string(),
            line,
            function: function.to_string(),
            span: SourceSpan { start_line: line, start_col: 0, end_line: line, end_col: 0 },
        }
    }

    fn local(name: &str, id: u64, type_name: &str, text: &str) -> Local {
        Local {
            name: name.to_string(),
            value: ValueView {
                id: ValueId(id),
                type_name: type_name.to_string(),
                text: text.to_string(),
                default: false,
            },
            argument: false,
        }
    }

    fn modes(deltas: &[VariableDelta]) -> Vec<(DeltaMode, usize, String)> {
        deltas.iter().map(|d| (d.mode, d.locator.depth, d.name.clone())).collect()
    }

    #[test]
    fn test_first_diff_reports_everything_added() {
        let mut store = SnapshotStore::new();
        let stack = vec![frame("a.rs", 1, "main"), frame("a.rs", 5, "work")];
        let locals = vec![vec![local("x", 1, "i32", "1")], vec![local("y", 2, "i32", "2")]];
        let deltas = store.diff(&stack, &locals);
        assert_eq!(
            modes(&deltas),
            vec![
                (DeltaMode::Added, 0, "x".to_string()),
                (DeltaMode::Added, 1, "y".to_string())
            ]
        );
    }

    #[test]
    fn test_noop_diff_is_empty() {
        let mut store = SnapshotStore::new();
        let stack = vec![frame("a.rs", 1, "main")];
        let locals = vec![vec![local("x", 1, "i32", "1")]];
        store.diff(&stack, &locals);
        assert!(store.diff(&stack, &locals).is_empty());
    }

    #[test]
    fn test_mutation_in_place_emits_nothing_but_updates_retained() {
        let mut store = SnapshotStore::new();
        let stack = vec![frame("a.rs", 1, "main")];
        store.diff(&stack, &[vec![local("v", 7, "Vec<i32>", "[1]")]]);

        // Same identity, new rendering: mutated in place.
        let deltas = store.diff(&stack, &[vec![local("v", 7, "Vec<i32>", "[1, 2]")]]);
        assert!(deltas.is_empty());
        assert_eq!(store.binding(0, "v").unwrap().rendered, "[1, 2]");
    }

    #[test]
    fn test_rebind_to_equal_rendering_is_modified() {
        let mut store = SnapshotStore::new();
        let stack = vec![frame("a.rs", 1, "main")];
        store.diff(&stack, &[vec![local("v", 7, "Vec<i32>", "[1]")]]);

        // New identity, identical rendering: still a rebind.
        let deltas = store.diff(&stack, &[vec![local("v", 8, "Vec<i32>", "[1]")]]);
        assert_eq!(modes(&deltas), vec![(DeltaMode::Modified, 0, "v".to_string())]);
    }

    #[test]
    fn test_name_leaving_locals_is_removed() {
        let mut store = SnapshotStore::new();
        let stack = vec![frame("a.rs", 1, "main")];
        store.diff(&stack, &[vec![local("a", 1, "i32", "1"), local("b", 2, "i32", "2")]]);
        let deltas = store.diff(&stack, &[vec![local("a", 1, "i32", "1")]]);
        assert_eq!(modes(&deltas), vec![(DeltaMode::Removed, 0, "b".to_string())]);
    }

    #[test]
    fn test_frame_truncation_removes_deep_frames_and_adds_new() {
        let mut store = SnapshotStore::new();
        let stack3 = vec![frame("a.rs", 1, "fn1"), frame("b.rs", 2, "fn2"), frame("c.rs", 3, "fn3")];
        store.diff(
            &stack3,
            &[
                vec![local("a", 1, "i32", "1")],
                vec![local("b", 2, "i32", "2")],
                vec![local("c", 3, "i32", "3")],
            ],
        );

        // New stack: [A@fn1, D@fn4]. B, C and their variables removed,
        // D's variables added, A untouched.
        let stack2 = vec![frame("a.rs", 1, "fn1"), frame("d.rs", 9, "fn4")];
        let deltas =
            store.diff(&stack2, &[vec![local("a", 1, "i32", "1")], vec![local("d", 4, "i32", "4")]]);
        assert_eq!(
            modes(&deltas),
            vec![
                (DeltaMode::Removed, 1, "b".to_string()),
                (DeltaMode::Added, 1, "d".to_string()),
                (DeltaMode::Removed, 2, "c".to_string()),
            ]
        );
        assert_eq!(store.depth_count(), 2);
    }

    #[test]
    fn test_frame_replacement_emits_removal_before_add_at_same_locator() {
        let mut store = SnapshotStore::new();
        let old = vec![frame("a.rs", 1, "main"), frame("b.rs", 2, "first")];
        store.diff(&old, &[vec![], vec![local("x", 1, "i32", "1")]]);

        // Same depth, different function, same variable name.
        let new = vec![frame("a.rs", 1, "main"), frame("b.rs", 8, "second")];
        let deltas = store.diff(&new, &[vec![], vec![local("x", 9, "i32", "1")]]);
        assert_eq!(
            modes(&deltas),
            vec![
                (DeltaMode::Removed, 1, "x".to_string()),
                (DeltaMode::Added, 1, "x".to_string())
            ]
        );
        // The removal carries the old frame position.
        assert_eq!(deltas[0].locator.frame.function, "first");
        assert_eq!(deltas[1].locator.frame.function, "second");
    }

    #[test]
    fn test_mid_stack_replacement_invalidates_deeper_matching_frames() {
        let mut store = SnapshotStore::new();
        let old = vec![frame("a.rs", 1, "fn1"), frame("b.rs", 2, "fn2"), frame("c.rs", 3, "fn3")];
        store.diff(
            &old,
            &[vec![local("a", 1, "i32", "1")], vec![local("b", 2, "i32", "2")], vec![local("c", 3, "i32", "3")]],
        );

        // Depth 1 replaced; depth 2 looks identical but is stale by
        // prefix matching and must be re-reported.
        let new = vec![frame("a.rs", 1, "fn1"), frame("x.rs", 5, "fnx"), frame("c.rs", 3, "fn3")];
        let deltas = store.diff(
            &new,
            &[vec![local("a", 1, "i32", "1")], vec![local("x", 9, "i32", "9")], vec![local("c", 3, "i32", "3")]],
        );
        assert_eq!(
            modes(&deltas),
            vec![
                (DeltaMode::Removed, 1, "b".to_string()),
                (DeltaMode::Added, 1, "x".to_string()),
                (DeltaMode::Removed, 2, "c".to_string()),
                (DeltaMode::Added, 2, "c".to_string()),
            ]
        );
    }

    #[test]
    fn test_line_change_alone_is_not_a_variable_delta() {
        let mut store = SnapshotStore::new();
        store.diff(&[frame("a.rs", 1, "main")], &[vec![local("x", 1, "i32", "1")]]);
        let deltas = store.diff(&[frame("a.rs", 2, "main")], &[vec![local("x", 1, "i32", "1")]]);
        assert!(deltas.is_empty());
        // But the retained position tracks the new line.
        assert_eq!(store.bindings(0).len(), 1);
        assert_eq!(store.binding(0, "x").unwrap().rendered, "1");
    }

    #[test]
    fn test_retained_state_equals_fresh_snapshot() {
        let mut store = SnapshotStore::new();
        let stack = vec![frame("a.rs", 1, "main")];
        store.diff(&stack, &[vec![local("x", 1, "i32", "1"), local("y", 2, "str", "hi")]]);
        let locals = vec![vec![local("x", 3, "i64", "9")]];
        store.diff(&stack, &locals);

        let mut fresh = SnapshotStore::new();
        fresh.diff(&stack, &locals);
        assert_eq!(store.bindings(0), fresh.bindings(0));
    }
}

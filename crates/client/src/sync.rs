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

//! Delta application
//!
//! Translates parsed payloads into mirror mutations. The synchronizer
//! is where the protocol's error severities bite: a lookup miss inside
//! a delta (a removal naming an unknown binding) is logged and skipped,
//! but any [`ProtocolError`] poisons the mirror permanently because a
//! diff stream applied on top of unknown state would silently corrupt
//! every later step.

use stepscope_common::{
    DeltaMode, DetailReply, FrameLine, ProtocolError, SeekLine, VariableDelta,
};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::mirror::{Mirror, NodeId};

/// Why a payload could not be applied.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The payload violated the wire grammar. The mirror is now
    /// desynchronized.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// A previous pass already poisoned the mirror; no further payloads
    /// are accepted.
    #[error("mirror is desynchronized, restart the session")]
    Desynchronized,
}

/// Applies payloads to a [`Mirror`] in the order the session issues
/// them: stack first, then deltas, then expansions and spans.
#[derive(Debug, Default)]
pub struct Synchronizer {
    mirror: Mirror,
    desynchronized: bool,
}

impl Synchronizer {
    /// A synchronizer over an empty mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// The mirrored state.
    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    /// Whether a protocol error has poisoned the mirror.
    pub fn is_desynchronized(&self) -> bool {
        self.desynchronized
    }

    fn guard(&self) -> Result<(), SyncError> {
        if self.desynchronized {
            return Err(SyncError::Desynchronized);
        }
        Ok(())
    }

    fn poison(&mut self, e: ProtocolError) -> SyncError {
        error!(error = %e, "protocol violation, mirror desynchronized");
        self.desynchronized = true;
        e.into()
    }

    /// Apply a `where` payload: reconcile the mirrored stack against
    /// the reported one by lockstep prefix match. Runs the maintenance
    /// pass first, settling marks and purging last step's removals.
    ///
    /// The payload lists frames innermost first; the mirror stores them
    /// oldest first.
    pub fn apply_stack(&mut self, payload: &[String]) -> Result<(), SyncError> {
        self.guard()?;
        self.mirror.maintain();

        let mut reported = Vec::with_capacity(payload.len());
        for line in payload.iter().rev() {
            match FrameLine::parse(line) {
                Ok(frame) => reported.push(frame),
                Err(e) => return Err(self.poison(e)),
            }
        }

        // Longest prefix of positionally identical frames survives;
        // everything past the first mismatch is torn down and rebuilt.
        let mut matched = 0;
        while matched < reported.len() {
            match self.mirror.frame_at(matched) {
                Some(held) if held.frame.same_frame(&reported[matched]) => matched += 1,
                _ => break,
            }
        }
        self.mirror.truncate_frames(matched);

        for (depth, frame) in reported.into_iter().enumerate() {
            if depth < matched {
                // Same frame, possibly a new line.
                if let Some(held) = self.mirror.frame_at_mut(depth) {
                    held.frame.line = frame.line;
                    held.span = None;
                }
            } else {
                self.mirror.push_frame(frame);
            }
        }
        debug!(frames = self.mirror.frame_count(), surviving = matched, "stack reconciled");
        Ok(())
    }

    /// Apply a `frames` payload of variable deltas.
    ///
    /// Adds at an unknown depth are a protocol violation (the delta
    /// stream disagrees with the stack we just applied). Modifies and
    /// removals naming an unknown binding are logged and skipped; the
    /// removal may concern a binding a frame truncation already purged.
    pub fn apply_deltas(&mut self, payload: &[String]) -> Result<(), SyncError> {
        self.guard()?;
        let deltas = match VariableDelta::parse_payload(payload) {
            Ok(deltas) => deltas,
            Err(e) => return Err(self.poison(e)),
        };

        for delta in deltas {
            let depth = delta.locator.depth;
            match delta.mode {
                DeltaMode::Added => {
                    if self
                        .mirror
                        .add_variable(depth, &delta.name, &delta.type_name, &delta.rendered)
                        .is_none()
                    {
                        let e = ProtocolError::DepthOutOfRange {
                            depth,
                            len: self.mirror.frame_count(),
                        };
                        return Err(self.poison(e));
                    }
                }
                DeltaMode::Modified => match self.mirror.variable(depth, &delta.name) {
                    Some(node) => {
                        let id = node.id;
                        self.mirror.modify_variable(id, &delta.type_name, &delta.rendered);
                    }
                    None => {
                        warn!(depth, name = %delta.name, "modify for unknown binding, skipping");
                    }
                },
                DeltaMode::Removed => match self.mirror.variable(depth, &delta.name) {
                    Some(node) => {
                        let id = node.id;
                        self.mirror.remove_variable(id);
                    }
                    None => {
                        warn!(depth, name = %delta.name, "removal for unknown binding, skipping");
                    }
                },
            }
        }
        Ok(())
    }

    /// Apply a `seek` payload: attach source spans to the mirrored
    /// frames. Innermost first on the wire, like `where`.
    pub fn apply_seek(&mut self, payload: &[String]) -> Result<(), SyncError> {
        self.guard()?;
        let mut seeks = Vec::with_capacity(payload.len());
        for line in payload.iter().rev() {
            match SeekLine::parse(line) {
                Ok(seek) => seeks.push(seek),
                Err(e) => return Err(self.poison(e)),
            }
        }
        for (depth, seek) in seeks.into_iter().enumerate() {
            if let Some(frame) = self.mirror.frame_at_mut(depth) {
                frame.span = Some(seek.span);
            }
        }
        Ok(())
    }

    /// Apply a `detail` payload re-queried for one expanded attribute.
    /// The first member of a successful reply is the attribute itself;
    /// a `Failed` reply means the root binding is gone, which the next
    /// stack/delta pass will resolve, so it is ignored here.
    pub fn apply_detail(&mut self, id: NodeId, payload: &[String]) -> Result<(), SyncError> {
        self.guard()?;
        let reply = match DetailReply::parse(payload) {
            Ok(reply) => reply,
            Err(e) => return Err(self.poison(e)),
        };
        match reply {
            DetailReply::Success(members) => {
                if let Some(member) = members.first() {
                    self.mirror.refresh_attribute(
                        id,
                        &member.name,
                        &member.type_name,
                        &member.rendered,
                        member.default,
                    );
                }
            }
            DetailReply::Failed => {
                debug!(node = %id, "detail refresh failed, leaving stale rendering");
            }
        }
        Ok(())
    }

    /// Apply a `detailall` payload: populate attribute children of
    /// `parent` at `parent_path`. Returns the created node ids. A
    /// `Failed` reply creates nothing.
    pub fn apply_expansion(
        &mut self,
        parent: NodeId,
        depth: usize,
        parent_path: &str,
        payload: &[String],
    ) -> Result<Vec<NodeId>, SyncError> {
        self.guard()?;
        let reply = match DetailReply::parse(payload) {
            Ok(reply) => reply,
            Err(e) => return Err(self.poison(e)),
        };
        let members = match reply {
            DetailReply::Success(members) => members,
            DetailReply::Failed => {
                debug!(node = %parent, path = %parent_path, "expansion failed");
                return Ok(Vec::new());
            }
        };
        let created = members
            .iter()
            .map(|member| {
                let path = format!("{parent_path}.{}", member.name);
                self.mirror.add_attribute(
                    parent,
                    depth,
                    &path,
                    &member.name,
                    &member.type_name,
                    &member.rendered,
                    member.default,
                )
            })
            .collect();
        Ok(created)
    }

    /// Collapse an expanded node, purging its attribute descendants.
    pub fn collapse(&mut self, parent: NodeId) {
        self.mirror.collapse_attributes(parent);
    }

    /// Poison the mirror from outside, for protocol violations detected
    /// above the payload level (e.g. an unparseable completion reply).
    pub fn mark_desynchronized(&mut self) {
        self.desynchronized = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::Mark;

    fn where_lines(frames: &[(&str, u32, &str)]) -> Vec<String> {
        // Innermost first, like the wire.
        frames
            .iter()
            .rev()
            .map(|(file, line, function)| format!("File \"{file}\", line {line}, in {function}"))
            .collect()
    }

    fn delta_lines(deltas: &[(usize, &str, char, &str, &str, &str)]) -> Vec<String> {
        deltas
            .iter()
            .flat_map(|(depth, function, mode, name, type_name, rendered)| {
                [
                    format!("[{depth}] File \"a.rs\", line 1, in {function}"),
                    format!("{mode} {name} {type_name} {rendered}"),
                ]
            })
            .collect()
    }

    #[test]
    fn test_stack_prefix_survives_and_line_updates() {
        let mut sync = Synchronizer::new();
        sync.apply_stack(&where_lines(&[("a.rs", 1, "main"), ("a.rs", 5, "work")])).unwrap();
        let work_id = sync.mirror().frame_at(1).unwrap().id;

        sync.apply_stack(&where_lines(&[("a.rs", 2, "main"), ("a.rs", 9, "work")])).unwrap();
        let work = sync.mirror().frame_at(1).unwrap();
        assert_eq!(work.id, work_id, "same frame keeps its node");
        assert_eq!(work.frame.line, 9);
    }

    #[test]
    fn test_stack_mismatch_tears_down_deeper_frames() {
        let mut sync = Synchronizer::new();
        sync.apply_stack(&where_lines(&[("a.rs", 1, "main"), ("a.rs", 5, "work")])).unwrap();
        sync.apply_deltas(&delta_lines(&[(1, "work", '+', "x", "i32", "1")])).unwrap();

        // `work` replaced by `other` at the same depth.
        sync.apply_stack(&where_lines(&[("a.rs", 1, "main"), ("a.rs", 3, "other")])).unwrap();
        assert!(sync.mirror().variable(1, "x").is_none());
        assert_eq!(sync.mirror().frame_at(1).unwrap().frame.function, "other");
    }

    #[test]
    fn test_delta_lifecycle() {
        let mut sync = Synchronizer::new();
        sync.apply_stack(&where_lines(&[("a.rs", 1, "main")])).unwrap();

        sync.apply_deltas(&delta_lines(&[(0, "main", '+', "x", "i32", "1")])).unwrap();
        let x = sync.mirror().variable(0, "x").unwrap();
        assert_eq!(x.mark, Mark::Added);
        let id = x.id;

        // Next step: the stack pass settles the mark, then a modify.
        sync.apply_stack(&where_lines(&[("a.rs", 2, "main")])).unwrap();
        assert_eq!(sync.mirror().variable_node(id).unwrap().mark, Mark::Quiet);
        sync.apply_deltas(&delta_lines(&[(0, "main", '*', "x", "i32", "2")])).unwrap();
        let x = sync.mirror().variable(0, "x").unwrap();
        assert_eq!(x.mark, Mark::Modified);
        assert_eq!(x.rendered, "2");

        // Removal: pending until the next stack pass, then gone.
        sync.apply_stack(&where_lines(&[("a.rs", 3, "main")])).unwrap();
        sync.apply_deltas(&delta_lines(&[(0, "main", '-', "x", "i32", "2")])).unwrap();
        assert!(sync.mirror().variable(0, "x").is_none());
        assert!(sync.mirror().variable_node(id).is_some());
        sync.apply_stack(&where_lines(&[("a.rs", 4, "main")])).unwrap();
        assert!(sync.mirror().variable_node(id).is_none());
    }

    #[test]
    fn test_removal_of_unknown_binding_is_skipped() {
        let mut sync = Synchronizer::new();
        sync.apply_stack(&where_lines(&[("a.rs", 1, "main")])).unwrap();
        sync.apply_deltas(&delta_lines(&[(0, "main", '-', "ghost", "i32", "0")])).unwrap();
        assert!(!sync.is_desynchronized());
    }

    #[test]
    fn test_add_at_unknown_depth_poisons() {
        let mut sync = Synchronizer::new();
        sync.apply_stack(&where_lines(&[("a.rs", 1, "main")])).unwrap();
        let err = sync
            .apply_deltas(&delta_lines(&[(7, "main", '+', "x", "i32", "1")]))
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Protocol(ProtocolError::DepthOutOfRange { depth: 7, len: 1 })
        ));
        assert!(sync.is_desynchronized());
        assert!(matches!(sync.apply_stack(&[]), Err(SyncError::Desynchronized)));
    }

    #[test]
    fn test_malformed_delta_poisons() {
        let mut sync = Synchronizer::new();
        sync.apply_stack(&where_lines(&[("a.rs", 1, "main")])).unwrap();
        let payload = vec!["not a locator".to_string(), "+ x i32 1".to_string()];
        assert!(sync.apply_deltas(&payload).is_err());
        assert!(sync.is_desynchronized());
    }

    #[test]
    fn test_seek_attaches_spans() {
        let mut sync = Synchronizer::new();
        sync.apply_stack(&where_lines(&[("a.rs", 1, "main"), ("a.rs", 5, "work")])).unwrap();
        let payload = vec![
            "File \"a.rs\", line 5, in work, at 5_4_5_19".to_string(),
            "File \"a.rs\", line 1, in main, at 1_0_1_10".to_string(),
        ];
        sync.apply_seek(&payload).unwrap();
        assert_eq!(sync.mirror().frame_at(0).unwrap().span.unwrap().start_line, 1);
        assert_eq!(sync.mirror().frame_at(1).unwrap().span.unwrap().end_col, 19);
    }

    #[test]
    fn test_expansion_and_refresh() {
        let mut sync = Synchronizer::new();
        sync.apply_stack(&where_lines(&[("a.rs", 1, "main")])).unwrap();
        sync.apply_deltas(&delta_lines(&[(0, "main", '+', "obj", "Thing", "Thing")])).unwrap();
        let var = sync.mirror().variable(0, "obj").unwrap().id;

        let payload = vec!["Success".to_string(), "len usize F 3".to_string()];
        let created = sync.apply_expansion(var, 0, "obj", &payload).unwrap();
        assert_eq!(created.len(), 1);
        let attr = sync.mirror().attribute(created[0]).unwrap();
        assert_eq!(attr.path, "obj.len");
        assert_eq!(attr.rendered, "3");

        let refresh = vec!["Success".to_string(), "len usize F 4".to_string()];
        sync.apply_detail(created[0], &refresh).unwrap();
        assert_eq!(sync.mirror().attribute(created[0]).unwrap().rendered, "4");
    }

    #[test]
    fn test_failed_expansion_creates_nothing() {
        let mut sync = Synchronizer::new();
        sync.apply_stack(&where_lines(&[("a.rs", 1, "main")])).unwrap();
        sync.apply_deltas(&delta_lines(&[(0, "main", '+', "obj", "Thing", "Thing")])).unwrap();
        let var = sync.mirror().variable(0, "obj").unwrap().id;
        let created =
            sync.apply_expansion(var, 0, "obj", &["Failed".to_string()]).unwrap();
        assert!(created.is_empty());
        assert!(!sync.mirror().has_attribute_children(var));
    }
}

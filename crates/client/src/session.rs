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

//! Session orchestration
//!
//! Drives the fixed per-step query pipeline over the transport and
//! feeds each reply to the synchronizer:
//!
//! 1. `step` + `where` in one batch (the stop banner is transport junk,
//!    the `where` reply reconciles the stack),
//! 2. `frames` for the variable deltas,
//! 3. one `detail` per currently expanded attribute,
//! 4. `seek` for the source spans.
//!
//! The backend running to completion surfaces here as the distinct
//! [`SessionError::Closed`], after which the session answers nothing
//! but lets the caller keep inspecting the final mirror.

use stepscope_common::{CompletionCandidate, CompletionReply};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::mirror::{Mirror, NodeId};
use crate::sync::{SyncError, Synchronizer};
use crate::transport::{PipeTransport, TransportError};

/// How a session operation can fail.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backend exited; the mirror holds the last synchronized
    /// state and stays readable.
    #[error("debuggee finished, backend closed")]
    Closed,
    /// Pipe-level failure.
    #[error(transparent)]
    Transport(TransportError),
    /// The reply did not apply to the mirror.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// One live debugging session over one backend process.
#[derive(Debug)]
pub struct DebugSession {
    transport: PipeTransport,
    sync: Synchronizer,
    closed: bool,
}

impl DebugSession {
    /// Wrap an already spawned transport.
    pub fn new(transport: PipeTransport) -> Self {
        Self { transport, sync: Synchronizer::new(), closed: false }
    }

    /// The mirrored state, readable even after the session closed.
    pub fn mirror(&self) -> &Mirror {
        self.sync.mirror()
    }

    /// Whether the backend is known to be gone.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    async fn request(&mut self, lines: Vec<String>) -> Result<Vec<String>, SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        match self.transport.request(lines).await {
            Ok(payload) => Ok(payload),
            Err(TransportError::Closed) => {
                info!("backend closed, session over");
                self.closed = true;
                Err(SessionError::Closed)
            }
            Err(e @ TransportError::Protocol(_)) => {
                // A framing error swallows a whole response; the mirror
                // can no longer claim to match the backend.
                self.sync.mark_desynchronized();
                Err(SessionError::Transport(e))
            }
            Err(e) => Err(SessionError::Transport(e)),
        }
    }

    /// Synchronize without stepping: the initial attach pass that
    /// populates the mirror at the first stop.
    #[instrument(skip(self))]
    pub async fn attach(&mut self) -> Result<(), SessionError> {
        let stack = self.request(vec!["where".to_string()]).await?;
        self.sync.apply_stack(&stack)?;
        self.refresh().await
    }

    /// Advance the debuggee one statement and resynchronize the mirror.
    #[instrument(skip(self))]
    pub async fn step(&mut self) -> Result<(), SessionError> {
        // step and where share one round trip; the stop banner between
        // them is skipped by the transport's header scan.
        let stack = self.request(vec!["step".to_string(), "where".to_string()]).await?;
        self.sync.apply_stack(&stack)?;
        self.refresh().await
    }

    async fn refresh(&mut self) -> Result<(), SessionError> {
        let deltas = self.request(vec!["frames".to_string()]).await?;
        self.sync.apply_deltas(&deltas)?;

        // Expanded attributes have no delta channel; each is re-queried
        // every step.
        for (id, depth, path) in self.sync.mirror().expanded_attributes() {
            let reply = self.request(vec![format!("detail {depth} {path}")]).await?;
            self.sync.apply_detail(id, &reply)?;
        }

        let seek = self.request(vec!["seek".to_string()]).await?;
        self.sync.apply_seek(&seek)?;
        Ok(())
    }

    /// Expand a variable or attribute node, populating its member
    /// children. Returns `false` without a query when the node already
    /// has children (the de-duplication that keeps a double-click from
    /// doubling the tree).
    #[instrument(skip(self))]
    pub async fn expand(&mut self, id: NodeId) -> Result<bool, SessionError> {
        if self.sync.mirror().has_attribute_children(id) {
            debug!(node = %id, "already expanded");
            return Ok(false);
        }
        let Some((depth, path)) = self.node_path(id) else {
            debug!(node = %id, "not an expandable node");
            return Ok(false);
        };
        let reply = self.request(vec![format!("detailall {depth} {path}")]).await?;
        let created = self.sync.apply_expansion(id, depth, &path, &reply)?;
        Ok(!created.is_empty())
    }

    fn node_path(&self, id: NodeId) -> Option<(usize, String)> {
        if let Some(v) = self.mirror().variable_node(id) {
            return Some((v.depth, v.name.clone()));
        }
        if let Some(a) = self.mirror().attribute(id) {
            return Some((a.depth, a.path.clone()));
        }
        None
    }

    /// Collapse an expanded node, locally only; the backend holds no
    /// expansion state.
    pub fn collapse(&mut self, id: NodeId) {
        self.sync.collapse(id);
    }

    /// Evaluate an expression in the innermost frame. `pretty` selects
    /// the multi-line rendering (`evp`) over the collapsed one (`ev`).
    /// Evaluation failure is not an error; the backend frames the error
    /// text and it comes back as the result.
    #[instrument(skip(self))]
    pub async fn evaluate(&mut self, expression: &str, pretty: bool) -> Result<String, SessionError> {
        let command = if pretty { "evp" } else { "ev" };
        let payload = self.request(vec![format!("{command} {expression}")]).await?;
        Ok(payload.join("\n"))
    }

    /// Complete a partial dotted expression against the innermost
    /// frame's scope. `Failed` replies yield no candidates; an
    /// unparseable reply poisons the mirror like any protocol error.
    #[instrument(skip(self))]
    pub async fn complete(
        &mut self,
        partial: &str,
    ) -> Result<Vec<CompletionCandidate>, SessionError> {
        let payload = self.request(vec![format!("comp {partial}")]).await?;
        match CompletionReply::parse(&payload) {
            Ok(CompletionReply::Success(candidates)) => Ok(candidates),
            Ok(CompletionReply::Failed(message)) => {
                debug!(%message, "completion failed");
                Ok(Vec::new())
            }
            Err(e) => {
                self.sync.mark_desynchronized();
                Err(SyncError::Protocol(e).into())
            }
        }
    }

    /// Argument memory-usage report for the innermost frame, one
    /// pre-rendered line per argument. Unknown units coerce to bytes on
    /// the backend side.
    pub async fn argument_memory(&mut self, unit: &str) -> Result<Vec<String>, SessionError> {
        self.request(vec![format!("amu {unit}")]).await
    }

    /// End the session, killing the backend if it is still running.
    pub fn stop(self) {
        self.transport.shutdown();
    }

    /// Node lookup shared with renderers.
    pub fn describe(&self, id: NodeId) -> Option<String> {
        let mirror = self.mirror();
        if let Some(v) = mirror.variable_node(id) {
            return Some(format!("{} {} = {}", v.name, v.type_name, v.rendered));
        }
        if let Some(a) = mirror.attribute(id) {
            return Some(format!("{} {} = {}", a.path, a.type_name, a.rendered));
        }
        None
    }
}

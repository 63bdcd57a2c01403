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

//! End-to-end synchronization tests
//!
//! A real engine serve loop on one side of an in-memory pipe, a real
//! session on the other. The central property: after every step the
//! mirror's frames and variables match what the backend's provider
//! reports directly, with nothing but deltas having crossed the pipe.

use stepscope_client::{DebugSession, Mark, SessionError};
use stepscope_integration_tests::script::{
    argument, binding, frame, script, stop, tagged, value, with_members,
};
use stepscope_integration_tests::spawn_backend;
use stepscope_engine::{Script, Stop};
use tracing::info;

fn session_over(script: Script) -> DebugSession {
    stepscope_common::logging::ensure_test_logging(None);
    DebugSession::new(spawn_backend(script))
}

/// Collect `(name, rendered)` pairs the mirror holds at one depth.
fn mirrored(session: &DebugSession, depth: usize) -> Vec<(String, String)> {
    session
        .mirror()
        .variables_at(depth)
        .into_iter()
        .map(|v| (v.name.clone(), v.rendered.clone()))
        .collect()
}

/// What the recording says one stop's frame should hold.
fn recorded(stop: &Stop, depth: usize) -> Vec<(String, String)> {
    stop.frames[depth]
        .locals
        .iter()
        .map(|b| (b.name.clone(), b.value.text.clone()))
        .collect()
}

fn assert_mirror_matches(session: &DebugSession, stop: &Stop) {
    assert_eq!(session.mirror().frame_count(), stop.frames.len());
    for depth in 0..stop.frames.len() {
        let mut held = mirrored(session, depth);
        let mut expected = recorded(stop, depth);
        held.sort();
        expected.sort();
        assert_eq!(held, expected, "mismatch at depth {depth}");
    }
}

/// A four-stop recording exercising add, rebind, removal, a pushed and
/// popped frame, and a mid-stack frame replacement.
fn eventful_script() -> Script {
    script(vec![
        // Attach: main with two locals.
        stop(vec![frame(
            "main.rs",
            3,
            "main",
            vec![binding("a", value("i32", "1")), binding("b", value("String", "\"hi\""))],
        )]),
        // Step 1: call into work; b removed, c added in main.
        stop(vec![
            frame(
                "main.rs",
                4,
                "main",
                vec![binding("a", value("i32", "1")), binding("c", value("bool", "true"))],
            ),
            frame("work.rs", 10, "work", vec![binding("w", value("u64", "10"))]),
        ]),
        // Step 2: work replaced by other at the same depth.
        stop(vec![
            frame(
                "main.rs",
                4,
                "main",
                vec![binding("a", value("i32", "1")), binding("c", value("bool", "true"))],
            ),
            frame("other.rs", 7, "other", vec![binding("o", value("i32", "-1"))]),
        ]),
        // Step 3: back to just main.
        stop(vec![frame("main.rs", 5, "main", vec![binding("a", value("i32", "2"))])]),
    ])
}

#[tokio::test(flavor = "multi_thread")]
async fn test_mirror_tracks_backend_across_steps() {
    let recording = eventful_script();
    let stops = recording.stops.clone();
    let mut session = session_over(recording);

    session.attach().await.expect("attach");
    info!("attached");
    assert_mirror_matches(&session, &stops[0]);

    for (index, expected) in stops.iter().enumerate().skip(1) {
        session.step().await.expect("step");
        info!(stop = index, "stepped");
        assert_mirror_matches(&session, expected);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_frame_replacement_rebuilds_the_frame() {
    let recording = eventful_script();
    let mut session = session_over(recording);
    session.attach().await.unwrap();
    session.step().await.unwrap();

    let work_id = session.mirror().frame_at(1).unwrap().id;
    let w_id = session.mirror().variable(1, "w").unwrap().id;

    // work -> other at depth 1: new frame node, old variable gone.
    session.step().await.unwrap();
    let other = session.mirror().frame_at(1).unwrap();
    assert_ne!(other.id, work_id);
    assert_eq!(other.frame.function, "other");
    assert!(session.mirror().variable(1, "w").is_none());
    assert_eq!(session.mirror().variable(1, "o").unwrap().mark, Mark::Added);

    // The purge lands on the following pass.
    session.step().await.unwrap();
    assert!(session.mirror().variable_node(w_id).is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_surviving_frame_keeps_identity_and_line() {
    let recording = eventful_script();
    let mut session = session_over(recording);
    session.attach().await.unwrap();
    let main_id = session.mirror().frame_at(0).unwrap().id;
    assert_eq!(session.mirror().frame_at(0).unwrap().frame.line, 3);

    session.step().await.unwrap();
    let main = session.mirror().frame_at(0).unwrap();
    assert_eq!(main.id, main_id, "same function and file is the same frame");
    assert_eq!(main.frame.line, 4);
    assert!(main.span.is_some(), "seek ran");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rebind_marks_modified_but_mutation_stays_quiet() {
    let recording = script(vec![
        stop(vec![frame(
            "m.rs",
            1,
            "main",
            vec![
                binding("rebound", value("i32", "1")),
                binding("mutated", tagged("obj", "Vec", "[1]")),
            ],
        )]),
        stop(vec![frame(
            "m.rs",
            2,
            "main",
            vec![
                // Untagged: a fresh object each stop, so this is a rebind.
                binding("rebound", value("i32", "2")),
                // Same tag: the same object mutated in place; no delta.
                binding("mutated", tagged("obj", "Vec", "[1, 2]")),
            ],
        )]),
    ]);
    let mut session = session_over(recording);
    session.attach().await.unwrap();
    session.step().await.unwrap();

    let rebound = session.mirror().variable(0, "rebound").unwrap();
    assert_eq!(rebound.mark, Mark::Modified);
    assert_eq!(rebound.rendered, "2");

    let mutated = session.mirror().variable(0, "mutated").unwrap();
    assert_eq!(mutated.mark, Mark::Quiet);
    // Mutation in place crosses the pipe as nothing at all; the mirror
    // still shows the capture-time rendering.
    assert_eq!(mutated.rendered, "[1]");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_expansion_deduplicates_and_refreshes() {
    let point = |x: &str| {
        with_members(
            tagged("p", "Point", "Point { .. }"),
            vec![("x", value("i32", x)), ("y", value("i32", "0"))],
        )
    };
    let recording = script(vec![
        stop(vec![frame("m.rs", 1, "main", vec![binding("p", point("1"))])]),
        stop(vec![frame("m.rs", 2, "main", vec![binding("p", point("5"))])]),
    ]);
    let mut session = session_over(recording);
    session.attach().await.unwrap();

    let p = session.mirror().variable(0, "p").unwrap().id;
    assert!(session.expand(p).await.unwrap());
    assert!(!session.expand(p).await.unwrap(), "second expand is a local no-op");

    let expanded = session.mirror().expanded_attributes();
    assert_eq!(expanded.len(), 2);
    let x = expanded.iter().find(|(_, _, path)| path == "p.x").unwrap().0;
    assert_eq!(session.mirror().attribute(x).unwrap().rendered, "1");

    // Each step re-queries every expanded attribute.
    session.step().await.unwrap();
    assert_eq!(session.mirror().attribute(x).unwrap().rendered, "5");

    // Collapse is purely local.
    session.collapse(p);
    assert!(session.mirror().expanded_attributes().is_empty());
    assert!(session.expand(p).await.unwrap(), "collapsed node expands again");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_backend_exhaustion_closes_the_session() {
    let recording = script(vec![stop(vec![frame(
        "m.rs",
        1,
        "main",
        vec![binding("x", value("i32", "1"))],
    )])]);
    let mut session = session_over(recording);
    session.attach().await.unwrap();

    // One stop only: the first step runs the recording out.
    let err = session.step().await.unwrap_err();
    assert!(matches!(err, SessionError::Closed));
    assert!(session.is_closed());
    // The last synchronized state survives the close.
    assert_eq!(session.mirror().variable(0, "x").unwrap().rendered, "1");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_evaluate_and_complete_over_the_pipe() {
    let recording = script(vec![stop(vec![frame(
        "m.rs",
        1,
        "main",
        vec![
            binding("counter", value("u32", "7")),
            binding(
                "config",
                with_members(
                    value("Config", "Config {\n  retries: 3,\n}"),
                    vec![("retries", value("u8", "3"))],
                ),
            ),
        ],
    )])]);
    let mut session = session_over(recording);
    session.attach().await.unwrap();

    // Collapsed vs natural rendering of the same value.
    assert_eq!(session.evaluate("config", false).await.unwrap(), "Config {  retries: 3,}");
    assert_eq!(session.evaluate("config", true).await.unwrap(), "Config {\n  retries: 3,\n}");
    assert_eq!(session.evaluate("config.retries", false).await.unwrap(), "3");
    // Evaluation failure comes back as framed text, not an error.
    let text = session.evaluate("missing", false).await.unwrap();
    assert!(text.contains("not defined"), "got {text:?}");

    let names: Vec<String> =
        session.complete("co").await.unwrap().into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["counter".to_string(), "config".to_string()]);
    let members: Vec<String> =
        session.complete("config.re").await.unwrap().into_iter().map(|c| c.name).collect();
    assert_eq!(members, vec!["retries".to_string()]);
    assert!(session.complete("missing.x").await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_argument_memory_report() {
    let recording = script(vec![stop(vec![frame(
        "m.rs",
        1,
        "main",
        vec![
            argument("buffer", value("Vec", "[..]"), 2_500),
            argument("flags", value("u8", "0"), 1),
            binding("local_only", value("i32", "9")),
        ],
    )])]);
    let mut session = session_over(recording);
    session.attach().await.unwrap();

    let report = session.argument_memory("KB").await.unwrap();
    assert_eq!(report, vec!["buffer = 2.50 KB".to_string(), "flags = 0.00 KB".to_string()]);
}

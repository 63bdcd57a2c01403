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

//! Logging configuration for stepscope components
//!
//! Console output always goes to stderr: the backend's stdout *is* the
//! wire, and a single stray log line there would desynchronize the
//! framing. File logging (daily rotation under the system temp dir) can
//! be enabled per component. RUST_LOG is honored, defaulting to INFO.

use std::{env, fs, io, path::PathBuf, sync::Once};

use eyre::Result;
use tracing::Level;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt::{self, time::LocalTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Initialize logging for a stepscope process.
///
/// # Arguments
/// * `component_name` - Name of the component (e.g. "stepscope", "stepscope-backend")
/// * `enable_file_logging` - Whether to also log to a rotating file
pub fn init_logging(component_name: &str, enable_file_logging: bool) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    // stderr, never stdout: stdout carries the framed protocol.
    let console_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(LocalTime::rfc_3339())
        .with_ansi(true)
        .with_writer(io::stderr);

    if enable_file_logging {
        let log_dir = create_log_directory(component_name)?;
        let file_appender = rolling::daily(&log_dir, format!("{component_name}.log"));
        let (non_blocking_appender, guard) = non_blocking(file_appender);

        // Keep the writer guard alive for the life of the process.
        std::mem::forget(guard);

        let file_layer = fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(LocalTime::rfc_3339())
            .with_ansi(false)
            .with_writer(non_blocking_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer.boxed())
            .with(file_layer.boxed())
            .try_init()
            .map_err(|e| eyre::eyre!("failed to initialize tracing subscriber: {e}"))?;

        tracing::info!(
            component = component_name,
            log_dir = %log_dir.display(),
            "logging initialized with console and file output"
        );
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .try_init()
            .map_err(|e| eyre::eyre!("failed to initialize tracing subscriber: {e}"))?;

        tracing::debug!(component = component_name, "logging initialized, console only");
    }

    Ok(())
}

/// Create the per-component log directory in the system temp folder.
fn create_log_directory(component_name: &str) -> Result<PathBuf> {
    let log_dir = env::temp_dir().join("stepscope-logs").join(component_name);
    fs::create_dir_all(&log_dir)?;
    Ok(log_dir)
}

// Global test logging initialization - set up at most once per test process.
static TEST_LOGGING_INIT: Once = Once::new();

/// Safe logging initialization for tests; may be called from any test,
/// any number of times.
pub fn ensure_test_logging(default_level: Option<Level>) {
    TEST_LOGGING_INIT.call_once(|| {
        let default_level = default_level.unwrap_or(Level::INFO);
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_level.as_str()))
            .expect("failed to create environment filter");

        // Ignore errors: a subscriber installed by another harness is fine.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(io::stderr)
            .compact()
            .try_init();
    });
}

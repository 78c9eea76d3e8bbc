//! Domain-specific errors.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::domain::model::{Stage, TargetId};

/// Oldest arsonc that understands the node id label flag.
pub const MIN_ARSONC_NOTE: &str = "a build recent enough to support `decompile -l`";

/// Which of the two compiler invocations is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMode {
    Compile,
    Decompile,
}

impl ToolMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolMode::Compile => "compile",
            ToolMode::Decompile => "decompile",
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            ToolMode::Compile => Stage::Compile,
            ToolMode::Decompile => Stage::Decompile,
        }
    }
}

impl fmt::Display for ToolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures while running the external compiler.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(
        "could not locate {binary}; put arsonc ({}) next to matchstack or on PATH, or pass --compiler",
        MIN_ARSONC_NOTE
    )]
    NotFound { binary: String },
    #[error("failed to launch {}: {source}", .binary.display())]
    Launch {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed waiting for arsonc {mode}: {source}")]
    Wait {
        mode: ToolMode,
        #[source]
        source: io::Error,
    },
    #[error("arsonc {mode} {}{}", describe_exit(.code), describe_stderr(.stderr))]
    Failed {
        mode: ToolMode,
        code: Option<i32>,
        stderr: String,
    },
    #[error("arsonc {mode} did not finish within {}s", .timeout.as_secs())]
    TimedOut { mode: ToolMode, timeout: Duration },
    #[error("arsonc {mode} reported success but {} was not produced", .path.display())]
    MissingArtifact { mode: ToolMode, path: PathBuf },
    #[error("failed to read arsonc {mode} output {}: {source}", .path.display())]
    Output {
        mode: ToolMode,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {code}"),
        None => "was terminated by a signal".to_owned(),
    }
}

fn describe_stderr(stderr: &str) -> String {
    if stderr.trim().is_empty() {
        String::new()
    } else {
        format!(":\n{stderr}")
    }
}

/// Every way a lookup run can fail.
#[derive(Debug, Error)]
pub enum MatchstackError {
    #[error("{0}")]
    Argument(String),
    #[error("invalid configuration: {0:#}")]
    Config(anyhow::Error),
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    ToolInvocation(#[from] ToolError),
    #[error(
        "node id {target} was not found in this decompilation ({}); it may have been pruned during compilation or come from a different build",
        describe_marker(.marker)
    )]
    NodeNotFound {
        target: TargetId,
        marker: Option<u32>,
    },
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
}

fn describe_marker(marker: &Option<u32>) -> String {
    match marker {
        Some(marker) => format!("no `ID: {marker}` marker"),
        None => "its adjusted label is out of range".to_owned(),
    }
}

impl MatchstackError {
    /// Process exit status reported for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            MatchstackError::Output(_) => 1,
            MatchstackError::Argument(_) | MatchstackError::Config(_) => 2,
            MatchstackError::Io { .. } => 3,
            MatchstackError::ToolInvocation(_) => 4,
            MatchstackError::NodeNotFound { .. } => 5,
        }
    }
}

/// A [`MatchstackError`] labelled with the stage it came from.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: MatchstackError,
}

impl StageError {
    pub fn new(stage: Stage, source: impl Into<MatchstackError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.source.exit_code()
    }
}

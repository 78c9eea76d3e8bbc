//! Domain models for a single node lookup run.

use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Node id as it appears in an engine crash stack trace.
pub type TargetId = u32;

/// Duplicate of the caller's data file living inside the scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedCopy {
    pub path: PathBuf,
}

/// Binary form written by the compile invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    pub path: PathBuf,
}

/// Decompiled script text with inline node markers, held as lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotatedText {
    lines: Vec<String>,
}

impl AnnotatedText {
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text
                .lines()
                .map(|line| line.trim_end_matches('\r').to_owned())
                .collect(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Result of scanning the annotated text for a node marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMatch {
    /// Index of the first matching line; this is the line that gets rendered.
    pub line_index: usize,
    /// Marker value actually found on the line.
    pub marker: u32,
    /// Every matching line in document order, `line_index` included.
    pub occurrences: Vec<usize>,
}

/// Number of lines shown on each side of the matched line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextSize {
    pub before: usize,
    pub after: usize,
}

impl Default for ContextSize {
    fn default() -> Self {
        Self {
            before: 5,
            after: 20,
        }
    }
}

/// Half-open range of line indices around a matched line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextWindow {
    pub range: Range<usize>,
    pub target: usize,
}

impl ContextWindow {
    /// Window around `target`, clamped to `[0, total)`.
    pub fn around(target: usize, total: usize, size: ContextSize) -> Self {
        let target = target.min(total.saturating_sub(1));
        let start = target.saturating_sub(size.before);
        let end = target
            .saturating_add(size.after)
            .saturating_add(1)
            .min(total);
        Self {
            range: start..end,
            target,
        }
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// When to emit ANSI colors on stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum ColorChoice {
    /// Color only when stdout is a terminal and `NO_COLOR` is unset.
    #[default]
    Auto,
    /// Always color.
    Always,
    /// Never color.
    Never,
}

/// Step of the lookup that an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuration,
    Staging,
    Compile,
    Decompile,
    Locate,
    Render,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Configuration => "configuration",
            Stage::Staging => "staging",
            Stage::Compile => "compile",
            Stage::Decompile => "decompile",
            Stage::Locate => "locate",
            Stage::Render => "render",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

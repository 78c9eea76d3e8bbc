//! Linear lookup pipeline: stage, compile, decompile, locate, render.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::app::locate::NodeLocator;
use crate::app::render::{ContextRenderer, RenderOptions};
use crate::domain::errors::{MatchstackError, StageError};
use crate::domain::model::{ContextWindow, NodeMatch, Stage, TargetId};
use crate::infra::config::Config;
use crate::infra::staging::Staging;
use crate::infra::toolchain::Toolchain;

/// What the caller asked to look up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub input: PathBuf,
    pub target: TargetId,
}

/// Settings for a run, independent of the toolchain in use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub staging_root: Option<PathBuf>,
    pub label_offset: i64,
    pub render: RenderOptions,
}

impl PipelineOptions {
    /// Build options from configuration; `color` is the already resolved
    /// decision whether to emit ANSI colors.
    pub fn from_config(config: &Config, color: bool) -> Self {
        Self {
            staging_root: config.staging.root.clone(),
            label_offset: config.locate.label_offset,
            render: RenderOptions {
                size: config.render.context_size(),
                theme: config.render.theme.clone(),
                color,
                fold_braces: config.render.fold_braces,
            },
        }
    }
}

/// Outcome of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupReport {
    pub found: NodeMatch,
    pub window: ContextWindow,
}

pub struct Pipeline<T> {
    toolchain: T,
    renderer: ContextRenderer,
    options: PipelineOptions,
}

impl<T: Toolchain> Pipeline<T> {
    pub fn new(toolchain: T, options: PipelineOptions) -> Self {
        Self {
            toolchain,
            renderer: ContextRenderer::new(),
            options,
        }
    }

    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    /// Run every stage in order, writing the rendered context to `out`.
    ///
    /// The first failing stage ends the run; nothing is written to `out`
    /// unless the node was located.
    pub fn run<W: Write>(
        &self,
        request: &LookupRequest,
        out: &mut W,
    ) -> Result<LookupReport, StageError> {
        tracing::info!(input = %request.input.display(), target_id = request.target, "starting lookup");

        let staging = Staging::stage(&request.input, self.options.staging_root.as_deref())
            .map_err(|err| StageError::new(Stage::Staging, err))?;
        tracing::info!(scratch = %staging.dir().display(), "staged");

        let artifact = self
            .toolchain
            .compile(staging.copy())
            .map_err(|err| StageError::new(Stage::Compile, err))?;
        tracing::info!(artifact = %artifact.path.display(), "compiled");

        staging
            .discard_copy()
            .map_err(|err| StageError::new(Stage::Decompile, err))?;
        let text = self
            .toolchain
            .decompile(&artifact)
            .map_err(|err| StageError::new(Stage::Decompile, err))?;
        tracing::info!(lines = text.len(), "decompiled");

        let found = NodeLocator::new(self.options.label_offset)
            .locate(&text, request.target)
            .map_err(|err| StageError::new(Stage::Locate, err))?;
        tracing::info!(line = found.line_index + 1, marker = found.marker, "located");

        let window = self
            .renderer
            .render(
                out,
                &display_name(&request.input),
                &text,
                &found,
                request.target,
                &self.options.render,
            )
            .map_err(|err| StageError::new(Stage::Render, MatchstackError::Output(err)))?;
        tracing::info!("rendered");

        Ok(LookupReport { found, window })
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

//! Command line surface.

use std::env;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::app::pipeline::{LookupRequest, Pipeline, PipelineOptions};
use crate::domain::errors::{MatchstackError, StageError};
use crate::domain::model::{ColorChoice, Stage, TargetId};
use crate::infra::config::Config;
use crate::infra::toolchain::Arsonc;

/// Show the decompiled DTA script around a node id from a crash stack trace.
///
/// The input is compiled and decompiled with arsonc (a build that supports
/// `decompile -l`), which labels every node inline.
#[derive(Debug, Clone, Parser)]
#[command(name = "matchstack", author, version)]
pub struct Cli {
    /// Path to the .dta file the node belongs to
    pub input_file: PathBuf,

    /// Node id as printed in the stack trace (e.g. 227)
    #[arg(value_parser = parse_target_id)]
    pub target_id: TargetId,

    /// arsonc binary to use instead of searching next to matchstack and on PATH
    #[arg(short = 'c', long, value_name = "PATH")]
    pub compiler: Option<PathBuf>,

    /// Offset between a node id and the label arsonc prints for it
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    pub offset: Option<i64>,

    /// Lines of context before the matched line
    #[arg(short = 'B', long, value_name = "LINES")]
    pub before: Option<usize>,

    /// Lines of context after the matched line
    #[arg(short = 'A', long, value_name = "LINES")]
    pub after: Option<usize>,

    /// Syntax highlighting theme
    #[arg(long, value_name = "NAME")]
    pub theme: Option<String>,

    /// When to use colors
    #[arg(long, value_enum, value_name = "WHEN")]
    pub color: Option<ColorChoice>,

    /// Show the decompiler's brace and label lines as they are
    #[arg(long)]
    pub no_fold: bool,

    /// Give up on arsonc after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Additional config file layered over the user config
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Layer command line flags over the loaded configuration.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(compiler) = &self.compiler {
            config.toolchain.compiler = Some(compiler.clone());
        }
        if let Some(timeout) = self.timeout {
            config.toolchain.timeout_secs = Some(timeout);
        }
        if let Some(offset) = self.offset {
            config.locate.label_offset = offset;
        }
        if let Some(before) = self.before {
            config.render.before = before;
        }
        if let Some(after) = self.after {
            config.render.after = after;
        }
        if let Some(theme) = &self.theme {
            config.render.theme = theme.clone();
        }
        if let Some(color) = self.color {
            config.render.color = color;
        }
        if self.no_fold {
            config.render.fold_braces = false;
        }
        config
    }
}

fn parse_target_id(value: &str) -> Result<TargetId, MatchstackError> {
    value.trim().parse().map_err(|_| {
        MatchstackError::Argument(format!(
            "`{value}` is not a node id; expected a non-negative integer"
        ))
    })
}

/// Decide whether stdout gets ANSI colors.
pub fn use_color(choice: ColorChoice) -> bool {
    match choice {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal(),
    }
}

/// Load configuration, run the lookup and print the context to stdout.
pub fn run(cli: &Cli) -> Result<(), StageError> {
    let config = Config::load(cli.config.as_deref())
        .map_err(|err| StageError::new(Stage::Configuration, MatchstackError::Config(err)))?;
    let config = cli.apply(config);
    tracing::debug!(?config, "effective configuration");

    let toolchain = Arsonc::new(config.toolchain.compiler.clone())
        .with_timeout(config.toolchain.timeout_secs.map(Duration::from_secs));
    let options = PipelineOptions::from_config(&config, use_color(config.render.color));
    let pipeline = Pipeline::new(toolchain, options);

    let request = LookupRequest {
        input: cli.input_file.clone(),
        target: cli.target_id,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    pipeline.run(&request, &mut out)?;
    out.flush()
        .map_err(|err| StageError::new(Stage::Render, MatchstackError::Output(err)))
}

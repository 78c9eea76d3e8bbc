//! Adapter around the external `arsonc` compiler/decompiler.

use std::env;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use once_cell::unsync::OnceCell;

use crate::domain::errors::{ToolError, ToolMode};
use crate::domain::model::{AnnotatedText, CompiledArtifact, StagedCopy};

pub const COMPILER_NAME: &str = "arsonc";

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// The two compiler operations a lookup depends on.
pub trait Toolchain {
    /// Compile the staged data file into its binary form.
    fn compile(&self, staged: &StagedCopy) -> Result<CompiledArtifact, ToolError>;

    /// Decompile the binary form back to text with node id labels.
    fn decompile(&self, artifact: &CompiledArtifact) -> Result<AnnotatedText, ToolError>;
}

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
}

/// Runs the real `arsonc` binary.
///
/// The binary is resolved lazily on first use so that staging problems are
/// reported before a missing compiler.
#[derive(Debug, Default)]
pub struct Arsonc {
    requested: Option<PathBuf>,
    resolved: OnceCell<PathBuf>,
    timeout: Option<Duration>,
}

impl Arsonc {
    /// `requested` is either a path to the binary or a bare name looked up on
    /// `PATH`; `None` searches for `arsonc`.
    pub fn new(requested: Option<PathBuf>) -> Self {
        Self {
            requested,
            resolved: OnceCell::new(),
            timeout: None,
        }
    }

    /// Kill the compiler when it runs longer than `timeout`. `None` waits
    /// until it exits.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> Result<&Path, ToolError> {
        self.resolved
            .get_or_try_init(|| locate_compiler(self.requested.as_deref()))
            .map(PathBuf::as_path)
    }

    /// Run the compiler with `args`, failing on launch errors, timeouts and
    /// non-zero exit statuses.
    pub fn run(&self, mode: ToolMode, args: &[&OsStr]) -> Result<ToolOutput, ToolError> {
        let binary = self.binary()?;
        let mut command = Command::new(binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(binary = %binary.display(), ?args, %mode, "running compiler");

        let launch_error = |source| ToolError::Launch {
            binary: binary.to_path_buf(),
            source,
        };
        let output = match self.timeout {
            None => command.output().map_err(launch_error)?,
            Some(timeout) => {
                let child = command.spawn().map_err(launch_error)?;
                wait_with_timeout(child, mode, timeout)?
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(ToolError::Failed {
                mode,
                code: output.status.code(),
                stderr: stderr.trim_end().to_owned(),
            });
        }

        if !stderr.trim().is_empty() {
            tracing::debug!(%mode, stderr = %stderr.trim_end(), "compiler wrote to stderr");
        }

        Ok(ToolOutput { stdout })
    }
}

impl Toolchain for Arsonc {
    fn compile(&self, staged: &StagedCopy) -> Result<CompiledArtifact, ToolError> {
        let mode = ToolMode::Compile;
        self.run(
            mode,
            &[
                OsStr::new("compile"),
                staged.path.as_os_str(),
                OsStr::new("--encryption"),
                OsStr::new("none"),
                OsStr::new("--output-encoding"),
                OsStr::new("utf8"),
            ],
        )?;

        let artifact = staged.path.with_extension("dtb");
        if !artifact.is_file() {
            return Err(ToolError::MissingArtifact {
                mode,
                path: artifact,
            });
        }
        Ok(CompiledArtifact { path: artifact })
    }

    fn decompile(&self, artifact: &CompiledArtifact) -> Result<AnnotatedText, ToolError> {
        let mode = ToolMode::Decompile;
        let output = self.run(
            mode,
            &[
                OsStr::new("decompile"),
                OsStr::new("-l"),
                OsStr::new("-i"),
                artifact.path.as_os_str(),
            ],
        )?;

        // arsonc writes the regenerated script next to the artifact; older
        // builds print it instead.
        let regenerated = artifact.path.with_extension("dta");
        if regenerated.is_file() {
            let bytes = fs::read(&regenerated).map_err(|source| ToolError::Output {
                mode,
                path: regenerated.clone(),
                source,
            })?;
            tracing::debug!(path = %regenerated.display(), "read regenerated script");
            return Ok(AnnotatedText::from_text(&String::from_utf8_lossy(&bytes)));
        }

        Ok(AnnotatedText::from_text(&output.stdout))
    }
}

/// Resolve the compiler binary: an explicit path, then next to the running
/// executable, then `PATH`.
pub fn locate_compiler(requested: Option<&Path>) -> Result<PathBuf, ToolError> {
    let name: OsString = match requested {
        Some(path) if path.components().count() > 1 || path.is_absolute() => {
            return if path.is_file() {
                Ok(path.to_path_buf())
            } else {
                Err(ToolError::NotFound {
                    binary: path.display().to_string(),
                })
            };
        }
        Some(name) => name.as_os_str().to_owned(),
        None => format!("{COMPILER_NAME}{}", env::consts::EXE_SUFFIX).into(),
    };

    let beside_exe = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&name)))
        .filter(|candidate| candidate.is_file());
    if let Some(found) = beside_exe {
        return Ok(found);
    }

    env::var_os("PATH")
        .and_then(|paths| {
            env::split_paths(&paths)
                .map(|dir| dir.join(&name))
                .find(|candidate| candidate.is_file())
        })
        .ok_or_else(|| ToolError::NotFound {
            binary: name.to_string_lossy().into_owned(),
        })
}

fn wait_with_timeout(
    mut child: Child,
    mode: ToolMode,
    timeout: Duration,
) -> Result<Output, ToolError> {
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);
    let deadline = Instant::now() + timeout;

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                abort(&mut child, mode);
                return Err(ToolError::TimedOut { mode, timeout });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                abort(&mut child, mode);
                return Err(ToolError::Wait { mode, source });
            }
        }
    };

    Ok(Output {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

/// Kill and reap a compiler that will not be waited on normally.
fn abort(child: &mut Child, mode: ToolMode) {
    if let Err(err) = child.kill() {
        tracing::warn!(error = %err, %mode, "failed to kill compiler");
    }
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

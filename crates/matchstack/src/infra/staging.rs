//! Scratch directory staging for compiler input.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::domain::errors::MatchstackError;
use crate::domain::model::StagedCopy;

const SCRATCH_PREFIX: &str = "matchstack-";
const ARTIFACT_EXTENSION: &str = "dtb";

/// Run-scoped scratch directory holding a copy of the source file.
///
/// The directory and everything the compiler writes into it are removed
/// when the value is dropped.
#[derive(Debug)]
pub struct Staging {
    dir: TempDir,
    copy: StagedCopy,
}

impl Staging {
    /// Copy `source` into a fresh scratch directory under `root`, or the OS
    /// temp directory when no root is configured.
    pub fn stage(source: &Path, root: Option<&Path>) -> Result<Self, MatchstackError> {
        let source = fs::canonicalize(source).map_err(|err| io_error(source, err))?;
        let metadata = fs::metadata(&source).map_err(|err| io_error(&source, err))?;
        if !metadata.is_file() {
            return Err(io_error(
                &source,
                io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }

        let builder = {
            let mut builder = tempfile::Builder::new();
            builder.prefix(SCRATCH_PREFIX);
            builder
        };
        let dir = match root {
            Some(root) => builder.tempdir_in(root).map_err(|err| io_error(root, err))?,
            None => builder
                .tempdir()
                .map_err(|err| io_error(&env::temp_dir(), err))?,
        };

        let file_name = source.file_name().ok_or_else(|| {
            io_error(
                &source,
                io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
            )
        })?;
        let mut destination = dir.path().join(file_name);
        // The compiler writes `<stem>.dtb` beside its input, which must not be
        // the input itself.
        if destination
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(ARTIFACT_EXTENSION))
        {
            destination.set_extension("dta");
        }
        fs::copy(&source, &destination).map_err(|err| io_error(&destination, err))?;

        tracing::debug!(
            source = %source.display(),
            staged = %destination.display(),
            "staged input"
        );

        Ok(Self {
            dir,
            copy: StagedCopy { path: destination },
        })
    }

    pub fn copy(&self) -> &StagedCopy {
        &self.copy
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the staged copy so the decompiler can regenerate a file of the
    /// same name.
    pub fn discard_copy(&self) -> Result<(), MatchstackError> {
        match fs::remove_file(&self.copy.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&self.copy.path, err)),
        }
    }
}

fn io_error(path: &Path, source: io::Error) -> MatchstackError {
    MatchstackError::Io {
        path: PathBuf::from(path),
        source,
    }
}

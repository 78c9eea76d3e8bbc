//! Infrastructure adapters for the filesystem, the external compiler,
//! configuration and terminal output.

pub mod config;
pub mod highlight;
pub mod logging;
pub mod staging;
pub mod toolchain;

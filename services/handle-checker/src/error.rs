//! Service-specific error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// File I/O failures at the edges of a run.
///
/// Config problems are `common::Error`; engine failures are
/// `handle_pool::Error`. Probe failures never surface as errors at all,
/// they end up in the run report.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to read handle list {}: {source}", path.display())]
    HandleList { path: PathBuf, source: io::Error },

    #[error("failed to open output file {}: {source}", path.display())]
    Output { path: PathBuf, source: io::Error },

    #[error("failed to write metrics snapshot {}: {source}", path.display())]
    MetricsSnapshot { path: PathBuf, source: io::Error },
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for the docent CLI layer.
//!
//! The model core itself has no fatal path: everything it cannot make
//! sense of becomes a collected diagnostic. Errors here cover the outer
//! shell only, reading sources from disk and writing the JSON dump.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by source discovery and output writing.
#[derive(Debug, Error)]
pub enum Error {
    /// A path given on the command line does not exist or is not readable.
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing the model dump failed.
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Serializing the model dump failed.
    #[error("cannot serialize model dump: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

//! Error types for the compile pipeline.
//!
//! Lexing and parsing never fail; they degrade and record diagnostics. The
//! errors here are the fatal ones: a host rejection, an internal printer
//! invariant, bad options, or I/O in the batch and cache layers.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("host compiler failed for {source_id}: {source}")]
    Host {
        source_id: String,
        #[source]
        source: HostError,
    },

    #[error(transparent)]
    Print(#[from] PrintError),

    #[error("invalid compile options: {0}")]
    Options(#[from] serde_json::Error),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CompileError {
    pub fn host(source_id: impl Into<String>, source: HostError) -> Self {
        CompileError::Host {
            source_id: source_id.into(),
            source,
        }
    }
}

/// Failures raised by a [`HostCompiler`](crate::host::HostCompiler).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("template error in {source_id}: {message}")]
    Template { source_id: String, message: String },

    #[error("cannot compile component metadata: {0}")]
    Metadata(String),

    #[error("host initialisation failed: {0}")]
    Init(String),
}

/// Internal invariant violations in the output tree.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PrintError {
    #[error("unknown binary operator code {0}")]
    UnmappedBinaryOperator(u8),

    #[error("unknown unary operator code {0}")]
    UnmappedUnaryOperator(u8),

    #[error("invalid external reference: neither name nor module name is set")]
    InvalidExternalReference,
}

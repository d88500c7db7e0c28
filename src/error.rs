//! Crate-wide error type. Only failures that abort the whole run reach here
//! — per-address anomalies during analysis are logged and skipped (see
//! `core::driver`), never turned into an `Error`.
use thiserror::Error;

use crate::core::decoder::DecodeError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed LE/LX container: {0}")]
    MalformedContainer(String),
    #[error("fatal decode error at 0x{addr:x}: {source}")]
    Decode {
        addr: u32,
        #[source]
        source: DecodeError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

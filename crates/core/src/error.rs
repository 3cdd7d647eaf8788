//! Unified Error Types for txivc
//!
//! Decode and shape errors are caller bugs and are surfaced immediately.
//! Proving failures are never retried. A proof that does not verify is not an
//! error at all: the verification entry points return `false`.

use std::path::PathBuf;

use thiserror::Error;

use crate::proof::ChainPosition;
use crate::tx::TxError;

/// Top-level error type for the proof system
#[derive(Error, Debug)]
pub enum IvcError {
    /// Malformed hex, JSON or proof encoding
    #[error("Decode error: {0}")]
    Decode(String),

    /// Input sizes do not match the compiled circuit
    #[error("Shape error: {0}")]
    Shape(#[from] ShapeError),

    /// Transaction parsing error
    #[error("Transaction error: {0}")]
    Tx(#[from] TxError),

    /// Setup, proving or state-machine error
    #[error("Proof error: {0}")]
    Proof(#[from] ProofError),

    /// Key or constraint-system persistence error
    #[error("Key storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type alias for proof system operations
pub type IvcResult<T> = Result<T, IvcError>;

impl From<hex::FromHexError> for IvcError {
    fn from(err: hex::FromHexError) -> Self {
        IvcError::Decode(format!("invalid hex: {}", err))
    }
}

impl From<serde_json::Error> for IvcError {
    fn from(err: serde_json::Error) -> Self {
        IvcError::Decode(format!("invalid JSON: {}", err))
    }
}

impl From<config::ConfigError> for IvcError {
    fn from(err: config::ConfigError) -> Self {
        IvcError::Configuration(err.to_string())
    }
}

/// Mismatch between supplied data and a compiled circuit layout
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("{field} must be {expected} bytes, got {actual}")]
    Length {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("expected {expected} public inputs, got {actual}")]
    PublicInputs { expected: usize, actual: usize },

    #[error("parent circuit exposes {actual} public inputs, at least {required} needed to carry a transaction id")]
    ParentTooNarrow { required: usize, actual: usize },

    #[error("prefix, previous txid and postfix do not reassemble the transaction")]
    Reassembly,
}

/// Errors from setup, proving and the per-position state machine
#[derive(Error, Debug)]
pub enum ProofError {
    #[error("Circuit not satisfied: {0}")]
    Unsatisfiable(String),

    #[error("Proof generation failed: {0}")]
    GenerationFailed(String),

    #[error("Proof verification failed: {0}")]
    VerificationFailed(String),

    #[error("Setup failed: {0}")]
    SetupFailed(String),

    #[error("{0} keys already exist; re-running setup would orphan every issued proof")]
    SetupAlreadyDone(ChainPosition),

    #[error("{position} stage is not ready: {state}")]
    NotReady {
        position: ChainPosition,
        state: &'static str,
    },

    #[error("Parent proofs from the {0} position cannot be verified on the outer curve")]
    UnsupportedParent(ChainPosition),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors reading or writing persisted setup artifacts
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt artifact {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Stored {position} constraint system does not match the configured layout")]
    LayoutMismatch { position: ChainPosition },
}

/// Input validation utilities
pub mod validation {
    use super::ShapeError;

    /// Check a byte slice against the length fixed by a compiled circuit
    pub fn expect_len(field: &'static str, bytes: &[u8], expected: usize) -> Result<(), ShapeError> {
        if bytes.len() != expected {
            return Err(ShapeError::Length {
                field,
                expected,
                actual: bytes.len(),
            });
        }
        Ok(())
    }

    /// Convert a slice into a 32-byte array
    pub fn hash32(field: &'static str, bytes: &[u8]) -> Result<[u8; 32], ShapeError> {
        expect_len(field, bytes, 32)?;
        let mut out = [0u8; 32];
        out.copy_from_slice(bytes);
        Ok(out)
    }
}

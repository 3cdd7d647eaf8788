//! TxIVC - Transaction Chain Proofs
//!
//! Incrementally verifiable Groth16 proofs that a transaction descends from a
//! genesis transaction. Each proof attests to one transaction id and carries
//! the validity of its whole ancestry, so verification cost stays constant as
//! the chain grows.
//!
//! # Modules
//! - `tx`: transaction ids and the spending-input slicer
//! - `proof`: circuits, setup, key storage and the `ProofSystem` orchestrator
//! - `config`: layered runtime configuration
//! - `api`: request payloads and handlers
//! - `python` (feature `python`): Python bindings

pub mod api;
pub mod config;
pub mod error;
pub mod proof;
pub mod tx;

#[cfg(feature = "python")]
mod python;

// Re-export common types
pub use config::ProofSystemConfig;
pub use error::{IvcError, IvcResult, ProofError, ShapeError, StorageError};
pub use proof::{ChainPosition, ProofJson, ProofSystem};
pub use tx::{slice_tx, TxError, TxId, TxLinkage};

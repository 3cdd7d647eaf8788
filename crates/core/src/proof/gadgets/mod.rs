//! Circuit gadgets for the transaction chain circuits
//!
//! This module contains constraint system implementations for:
//! - Double SHA-256 of a serialized transaction
//! - Byte strings carried as packed public field elements

pub mod bytes;
pub mod sha256d;

pub use bytes::{
    alloc_public_bytes, bytes_per_element, pack_bytes, packed_len, unpack_bytes,
};
pub use sha256d::{enforce_bytes_equal, enforce_hash_chain, sha256d_gadget};

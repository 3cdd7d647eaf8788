//! Double SHA-256 gadget
//!
//! Constrains a transaction id to be `SHA256(SHA256(raw_tx))` over
//! the serialized transaction bytes.

use ark_crypto_primitives::crh::sha256::constraints::Sha256Gadget;
use ark_ff::PrimeField;
use ark_r1cs_std::{prelude::*, uint8::UInt8};
use ark_relations::r1cs::SynthesisError;

/// Double SHA-256 of `data` inside the circuit
pub fn sha256d_gadget<F: PrimeField>(data: &[UInt8<F>]) -> Result<Vec<UInt8<F>>, SynthesisError> {
    let first = Sha256Gadget::digest(data)?;
    let second = Sha256Gadget::digest(&first.0)?;
    Ok(second.0)
}

/// Enforce two byte strings equal, byte by byte
pub fn enforce_bytes_equal<F: PrimeField>(
    left: &[UInt8<F>],
    right: &[UInt8<F>],
) -> Result<(), SynthesisError> {
    if left.len() != right.len() {
        return Err(SynthesisError::Unsatisfiable);
    }
    for (l, r) in left.iter().zip(right) {
        l.enforce_equal(r)?;
    }
    Ok(())
}

/// Enforce `tx_id == sha256d(raw_tx)`
pub fn enforce_hash_chain<F: PrimeField>(
    raw_tx: &[UInt8<F>],
    tx_id: &[UInt8<F>],
) -> Result<(), SynthesisError> {
    let computed = sha256d_gadget(raw_tx)?;
    enforce_bytes_equal(&computed, tx_id)
}

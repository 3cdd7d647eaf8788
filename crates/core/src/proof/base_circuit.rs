//! Base Case Circuit for genesis transactions
//!
//! Proves knowledge of a serialized transaction whose double SHA-256 is the
//! public transaction id. Optionally exposes a token id that must equal the
//! transaction id, anchoring every later proof in the chain to this genesis.
//!
//! Public Inputs (packed, 31 bytes per element):
//! - curr_tx_id: id of the genesis transaction (2 elements)
//! - token_id: equal to curr_tx_id, only when anchoring (2 elements)
//!
//! Private Inputs (Witness):
//! - raw_tx: the serialized transaction, `tx_len` bytes

use ark_r1cs_std::uint8::UInt8;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use serde::{Deserialize, Serialize};

use super::gadgets::{alloc_public_bytes, enforce_bytes_equal, enforce_hash_chain, packed_len};
use super::witness::BaseCaseWitness;
use super::InnerScalar;
use crate::error::ShapeError;
use crate::tx::TX_ID_LEN;

/// Sizes fixed when the base circuit is compiled
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseCaseShape {
    /// Length of every provable genesis transaction
    pub tx_len: usize,
    /// Expose the token id as extra public inputs
    pub anchor_token_id: bool,
}

impl BaseCaseShape {
    pub fn new(tx_len: usize, anchor_token_id: bool) -> Self {
        Self {
            tx_len,
            anchor_token_id,
        }
    }

    /// Number of field elements in the public witness
    pub fn num_public_inputs(&self) -> usize {
        let per_id = packed_len::<InnerScalar>(TX_ID_LEN);
        if self.anchor_token_id {
            2 * per_id
        } else {
            per_id
        }
    }
}

/// Genesis transaction circuit
#[derive(Clone, Debug)]
pub struct BaseCaseCircuit {
    shape: BaseCaseShape,
    witness: Option<BaseCaseWitness>,
}

impl BaseCaseCircuit {
    /// Circuit without assignments, for compilation and key generation
    pub fn from_shape(shape: BaseCaseShape) -> Self {
        Self {
            shape,
            witness: None,
        }
    }

    /// Circuit bound to a full witness
    pub fn new(shape: BaseCaseShape, witness: BaseCaseWitness) -> Result<Self, ShapeError> {
        witness.check_shape(&shape)?;
        Ok(Self {
            shape,
            witness: Some(witness),
        })
    }

    pub fn shape(&self) -> BaseCaseShape {
        self.shape
    }
}

impl ConstraintSynthesizer<InnerScalar> for BaseCaseCircuit {
    fn generate_constraints(
        self,
        cs: ConstraintSystemRef<InnerScalar>,
    ) -> Result<(), SynthesisError> {
        let witness = self.witness.as_ref();

        // ===== Allocate Public Inputs =====
        let curr_tx_id = alloc_public_bytes(
            cs.clone(),
            witness.map(|w| &w.curr_tx_id.as_bytes()[..]),
            TX_ID_LEN,
        )?;

        let token_id = if self.shape.anchor_token_id {
            let token_bytes = witness
                .and_then(|w| w.token_id.as_ref())
                .map(|id| &id.as_bytes()[..]);
            Some(alloc_public_bytes(cs.clone(), token_bytes, TX_ID_LEN)?)
        } else {
            None
        };

        // ===== Allocate Private Inputs (Witnesses) =====
        let raw_values: Vec<Option<u8>> = match witness {
            Some(w) => w.raw_tx.iter().copied().map(Some).collect(),
            None => vec![None; self.shape.tx_len],
        };
        let raw_tx = UInt8::new_witness_vec(cs.clone(), &raw_values)?;

        // ===== Constraint 1: curr_tx_id = sha256d(raw_tx) =====
        enforce_hash_chain(&raw_tx, &curr_tx_id)?;

        // ===== Constraint 2: token_id = curr_tx_id =====
        if let Some(token_id) = token_id {
            enforce_bytes_equal(&token_id, &curr_tx_id)?;
        }

        Ok(())
    }
}

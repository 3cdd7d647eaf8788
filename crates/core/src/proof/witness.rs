//! Witness assembly for both chain positions
//!
//! A full witness carries everything the prover needs. A light witness
//! carries only the public inputs and is what a verifier rebuilds from a
//! transaction id.

use ark_ff::{BigInteger, PrimeField};
use ark_groth16::{Proof, VerifyingKey};
use ark_serialize::CanonicalSerialize;

use super::gadgets::pack_bytes;
use super::{BaseCaseShape, InnerCurve, InnerScalar, NormalCaseShape, OuterScalar};
use crate::error::{validation, ProofError, ShapeError};
use crate::tx::{TxId, TxLinkage};

/// Public inputs of a circuit, in allocation order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicWitness<F: PrimeField> {
    inputs: Vec<F>,
}

impl<F: PrimeField> PublicWitness<F> {
    pub fn new(inputs: Vec<F>) -> Self {
        Self { inputs }
    }

    pub fn inputs(&self) -> &[F] {
        &self.inputs
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Canonical compressed encoding
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProofError> {
        let mut bytes = Vec::new();
        self.inputs
            .serialize_compressed(&mut bytes)
            .map_err(|e| ProofError::Serialization(e.to_string()))?;
        Ok(bytes)
    }

    /// Each input as `MODULUS_BIT_SIZE` little-endian bits
    pub fn to_bits_le(&self) -> Vec<Vec<bool>> {
        self.inputs
            .iter()
            .map(|input| {
                let mut bits = input.into_bigint().to_bits_le();
                bits.truncate(F::MODULUS_BIT_SIZE as usize);
                bits
            })
            .collect()
    }
}

// ===== Base case =====

/// Prover-side data for a genesis transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseCaseWitness {
    pub(crate) raw_tx: Vec<u8>,
    pub(crate) curr_tx_id: TxId,
    pub(crate) token_id: Option<TxId>,
}

impl BaseCaseWitness {
    pub fn raw_tx(&self) -> &[u8] {
        &self.raw_tx
    }

    pub fn curr_tx_id(&self) -> TxId {
        self.curr_tx_id
    }

    pub fn token_id(&self) -> Option<TxId> {
        self.token_id
    }

    /// Public inputs this witness proves
    pub fn public(&self) -> PublicWitness<InnerScalar> {
        base_public_inputs(&self.curr_tx_id, self.token_id.as_ref())
    }

    pub(crate) fn check_shape(&self, shape: &BaseCaseShape) -> Result<(), ShapeError> {
        validation::expect_len("raw transaction", &self.raw_tx, shape.tx_len)?;
        let expected = shape.num_public_inputs();
        let actual = self.public().len();
        if expected != actual {
            return Err(ShapeError::PublicInputs { expected, actual });
        }
        Ok(())
    }
}

/// Full witness for a genesis transaction
///
/// With `anchor_token_id` the transaction's own id is also exposed as the
/// token id of the chain.
pub fn create_base_case_full_witness(
    raw_tx: &[u8],
    curr_tx_id: TxId,
    anchor_token_id: bool,
) -> BaseCaseWitness {
    BaseCaseWitness {
        raw_tx: raw_tx.to_vec(),
        curr_tx_id,
        token_id: anchor_token_id.then_some(curr_tx_id),
    }
}

/// Public inputs of a genesis proof for `curr_tx_id`
pub fn create_base_case_light_witness(
    curr_tx_id: &TxId,
    anchor_token_id: bool,
) -> PublicWitness<InnerScalar> {
    base_public_inputs(curr_tx_id, anchor_token_id.then_some(curr_tx_id))
}

fn base_public_inputs(curr_tx_id: &TxId, token_id: Option<&TxId>) -> PublicWitness<InnerScalar> {
    let mut inputs = pack_bytes(curr_tx_id.as_bytes());
    if let Some(token_id) = token_id {
        inputs.extend(pack_bytes::<InnerScalar>(token_id.as_bytes()));
    }
    PublicWitness::new(inputs)
}

// ===== Normal case =====

/// Prover-side data for a spending transaction
#[derive(Clone, Debug)]
pub struct NormalCaseWitness {
    pub(crate) previous_proof: Proof<InnerCurve>,
    pub(crate) previous_input_bits: Vec<Vec<bool>>,
    pub(crate) prefix: Vec<u8>,
    pub(crate) prev_tx_id: TxId,
    pub(crate) postfix: Vec<u8>,
    pub(crate) curr_tx_id: TxId,
}

impl NormalCaseWitness {
    pub fn curr_tx_id(&self) -> TxId {
        self.curr_tx_id
    }

    pub fn prev_tx_id(&self) -> TxId {
        self.prev_tx_id
    }

    /// Public inputs this witness proves
    pub fn public(&self) -> PublicWitness<OuterScalar> {
        create_normal_light_witness(&self.curr_tx_id)
    }

    pub(crate) fn check_shape(&self, shape: &NormalCaseShape) -> Result<(), ShapeError> {
        validation::expect_len("prefix", &self.prefix, shape.prefix_len)?;
        validation::expect_len("postfix", &self.postfix, shape.postfix_len)?;
        if self.previous_input_bits.len() != shape.parent_inputs {
            return Err(ShapeError::PublicInputs {
                expected: shape.parent_inputs,
                actual: self.previous_input_bits.len(),
            });
        }
        Ok(())
    }
}

/// Full witness for a spending transaction
///
/// `prev_witness` and `prev_proof` are the parent's public inputs and proof;
/// `prev_vk` fixes how many inputs the parent circuit exposes. `curr_tx`
/// must equal `prefix ++ prev_tx_id ++ postfix`.
pub fn create_normal_full_witness(
    prev_witness: &PublicWitness<InnerScalar>,
    prev_proof: &Proof<InnerCurve>,
    prev_vk: &VerifyingKey<InnerCurve>,
    prefix: &[u8],
    prev_tx_id: &[u8],
    postfix: &[u8],
    curr_tx: &[u8],
) -> Result<NormalCaseWitness, ShapeError> {
    let prev_tx_id = TxId::from_slice(prev_tx_id)?;

    let expected = prev_vk.gamma_abc_g1.len().saturating_sub(1);
    if prev_witness.len() != expected {
        return Err(ShapeError::PublicInputs {
            expected,
            actual: prev_witness.len(),
        });
    }

    let linkage = TxLinkage {
        prefix: prefix.to_vec(),
        prev_tx_id,
        postfix: postfix.to_vec(),
    };
    if linkage.reassemble() != curr_tx {
        return Err(ShapeError::Reassembly);
    }

    Ok(NormalCaseWitness {
        previous_proof: prev_proof.clone(),
        previous_input_bits: prev_witness.to_bits_le(),
        prefix: linkage.prefix,
        prev_tx_id,
        postfix: linkage.postfix,
        curr_tx_id: TxId::compute(curr_tx),
    })
}

/// Public inputs of a spending proof for `curr_tx_id`
pub fn create_normal_light_witness(curr_tx_id: &TxId) -> PublicWitness<OuterScalar> {
    PublicWitness::new(pack_bytes(curr_tx_id.as_bytes()))
}

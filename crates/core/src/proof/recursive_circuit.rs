//! Recursive Circuit for spending transactions
//!
//! Runs on the outer curve and proves three things at once:
//! 1. The parent's Groth16 proof verifies under the parent verifying key,
//!    which is baked into the circuit as a constant
//! 2. The previous txid referenced by the spending input equals the txid the
//!    parent proof exposes as its first public inputs
//! 3. The current txid is the double SHA-256 of `prefix ++ prev_tx_id ++ postfix`
//!
//! Public Inputs (packed, 47 bytes per element):
//! - curr_tx_id: id of the spending transaction (1 element)
//!
//! Private Inputs (Witness):
//! - prefix, prev_tx_id, postfix: the spending transaction split around the
//!   referenced txid
//! - parent proof and the parent's public inputs as bits

use ark_crypto_primitives::snark::{BooleanInputVar, SNARKGadget};
use ark_ec::AffineRepr;
use ark_ff::PrimeField;
use ark_groth16::constraints::{ProofVar, VerifyingKeyVar};
use ark_groth16::{Proof, VerifyingKey};
use ark_r1cs_std::{alloc::AllocVar, boolean::Boolean, eq::EqGadget, uint8::UInt8};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use serde::{Deserialize, Serialize};

use super::gadgets::{
    alloc_public_bytes, bytes_per_element, enforce_bytes_equal, enforce_hash_chain, packed_len,
    unpack_bytes,
};
use super::witness::NormalCaseWitness;
use super::{InnerCurve, InnerPairingVar, InnerScalar, InnerVerifierGadget, OuterScalar};
use crate::error::ShapeError;
use crate::tx::TX_ID_LEN;

/// Sizes fixed when the recursive circuit is compiled
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalCaseShape {
    /// Bytes before the referenced txid
    pub prefix_len: usize,
    /// Bytes after the referenced txid
    pub postfix_len: usize,
    /// Public inputs exposed by the parent circuit
    pub parent_inputs: usize,
}

impl NormalCaseShape {
    pub fn new(prefix_len: usize, postfix_len: usize, parent_inputs: usize) -> Self {
        Self {
            prefix_len,
            postfix_len,
            parent_inputs,
        }
    }

    /// Full length of a provable spending transaction
    pub fn tx_len(&self) -> usize {
        self.prefix_len + TX_ID_LEN + self.postfix_len
    }

    pub fn num_public_inputs(&self) -> usize {
        packed_len::<OuterScalar>(TX_ID_LEN)
    }

    /// The parent must expose at least one packed txid
    pub fn check_parent(&self) -> Result<(), ShapeError> {
        let required = packed_len::<InnerScalar>(TX_ID_LEN);
        if self.parent_inputs < required {
            return Err(ShapeError::ParentTooNarrow {
                required,
                actual: self.parent_inputs,
            });
        }
        Ok(())
    }
}

/// Spending transaction circuit
#[derive(Clone, Debug)]
pub struct RecursiveCircuit {
    shape: NormalCaseShape,
    parent_vk: VerifyingKey<InnerCurve>,
    witness: Option<NormalCaseWitness>,
}

impl RecursiveCircuit {
    /// Circuit without assignments, for compilation and key generation
    pub fn from_shape(
        shape: NormalCaseShape,
        parent_vk: VerifyingKey<InnerCurve>,
    ) -> Result<Self, ShapeError> {
        shape.check_parent()?;
        let vk_inputs = parent_vk.gamma_abc_g1.len().saturating_sub(1);
        if vk_inputs != shape.parent_inputs {
            return Err(ShapeError::PublicInputs {
                expected: shape.parent_inputs,
                actual: vk_inputs,
            });
        }
        Ok(Self {
            shape,
            parent_vk,
            witness: None,
        })
    }

    /// Circuit bound to a full witness
    pub fn new(
        shape: NormalCaseShape,
        parent_vk: VerifyingKey<InnerCurve>,
        witness: NormalCaseWitness,
    ) -> Result<Self, ShapeError> {
        witness.check_shape(&shape)?;
        let mut circuit = Self::from_shape(shape, parent_vk)?;
        circuit.witness = Some(witness);
        Ok(circuit)
    }

    pub fn shape(&self) -> NormalCaseShape {
        self.shape
    }
}

/// Stand-in parent proof, only ever synthesized in setup mode
fn placeholder_proof() -> Proof<InnerCurve> {
    Proof {
        a: ark_bls12_377::G1Affine::generator(),
        b: ark_bls12_377::G2Affine::generator(),
        c: ark_bls12_377::G1Affine::generator(),
    }
}

fn optional_bytes(bytes: Option<&[u8]>, len: usize) -> Vec<Option<u8>> {
    match bytes {
        Some(bytes) => bytes.iter().copied().map(Some).collect(),
        None => vec![None; len],
    }
}

impl ConstraintSynthesizer<OuterScalar> for RecursiveCircuit {
    fn generate_constraints(
        self,
        cs: ConstraintSystemRef<OuterScalar>,
    ) -> Result<(), SynthesisError> {
        let witness = self.witness.as_ref();

        // ===== Allocate Public Inputs =====
        let curr_tx_id = alloc_public_bytes(
            cs.clone(),
            witness.map(|w| &w.curr_tx_id.as_bytes()[..]),
            TX_ID_LEN,
        )?;

        // ===== Allocate Private Inputs (Witnesses) =====
        let prefix = UInt8::new_witness_vec(
            cs.clone(),
            &optional_bytes(witness.map(|w| &w.prefix[..]), self.shape.prefix_len),
        )?;
        let prev_tx_id = UInt8::new_witness_vec(
            cs.clone(),
            &optional_bytes(witness.map(|w| &w.prev_tx_id.as_bytes()[..]), TX_ID_LEN),
        )?;
        let postfix = UInt8::new_witness_vec(
            cs.clone(),
            &optional_bytes(witness.map(|w| &w.postfix[..]), self.shape.postfix_len),
        )?;

        let input_bits = InnerScalar::MODULUS_BIT_SIZE as usize;
        let mut parent_inputs = Vec::with_capacity(self.shape.parent_inputs);
        for i in 0..self.shape.parent_inputs {
            let mut bits = Vec::with_capacity(input_bits);
            for j in 0..input_bits {
                bits.push(Boolean::new_witness(cs.clone(), || {
                    witness
                        .and_then(|w| w.previous_input_bits.get(i))
                        .and_then(|element| element.get(j).copied())
                        .ok_or(SynthesisError::AssignmentMissing)
                })?);
            }
            parent_inputs.push(bits);
        }

        let parent_proof = match witness {
            Some(w) => w.previous_proof.clone(),
            None if cs.is_in_setup_mode() => placeholder_proof(),
            None => return Err(SynthesisError::AssignmentMissing),
        };
        let proof_var =
            ProofVar::<InnerCurve, InnerPairingVar>::new_witness(cs.clone(), || Ok(parent_proof))?;
        let vk_var =
            VerifyingKeyVar::<InnerCurve, InnerPairingVar>::new_constant(cs.clone(), &self.parent_vk)?;

        // ===== Constraint 1: parent proof verifies =====
        let input_var = BooleanInputVar::<InnerScalar, OuterScalar>::new(parent_inputs.clone());
        InnerVerifierGadget::verify(&vk_var, &input_var, &proof_var)?
            .enforce_equal(&Boolean::TRUE)?;

        // ===== Constraint 2: prev_tx_id = parent's curr_tx_id =====
        let parent_tx_id =
            unpack_bytes(&parent_inputs, TX_ID_LEN, bytes_per_element::<InnerScalar>())?;
        enforce_bytes_equal(&prev_tx_id, &parent_tx_id)?;

        // ===== Constraint 3: curr_tx_id = sha256d(prefix || prev_tx_id || postfix) =====
        let mut raw_tx = prefix;
        raw_tx.extend(prev_tx_id);
        raw_tx.extend(postfix);
        enforce_hash_chain(&raw_tx, &curr_tx_id)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_groth16::Groth16;
    use ark_relations::r1cs::{ConstraintSystem, SynthesisMode};
    use ark_snark::SNARK;
    use rand::rngs::OsRng;

    use crate::proof::base_circuit::{BaseCaseCircuit, BaseCaseShape};
    use crate::proof::witness::{
        create_base_case_full_witness, create_base_case_light_witness, create_normal_full_witness,
    };
    use crate::tx::TxId;

    const PREFIX: [u8; 5] = [0x02, 0x00, 0x00, 0x00, 0x01];
    const POSTFIX: [u8; 12] = [0xab; 12];

    struct Parent {
        vk: VerifyingKey<InnerCurve>,
        proof: Proof<InnerCurve>,
        tx_id: TxId,
    }

    /// Prove a small genesis transaction on the inner curve
    fn prove_parent(raw: &[u8]) -> (Parent, ark_groth16::ProvingKey<InnerCurve>) {
        let shape = BaseCaseShape::new(raw.len(), false);
        let (pk, vk) =
            Groth16::<InnerCurve>::circuit_specific_setup(BaseCaseCircuit::from_shape(shape), &mut OsRng)
                .unwrap();

        let tx_id = TxId::compute(raw);
        let witness = create_base_case_full_witness(raw, tx_id, false);
        let circuit = BaseCaseCircuit::new(shape, witness).unwrap();
        let proof = Groth16::<InnerCurve>::prove(&pk, circuit, &mut OsRng).unwrap();

        (Parent { vk, proof, tx_id }, pk)
    }

    fn spending_tx(prev: &TxId) -> Vec<u8> {
        let mut raw = PREFIX.to_vec();
        raw.extend_from_slice(prev.as_bytes());
        raw.extend_from_slice(&POSTFIX);
        raw
    }

    fn shape() -> NormalCaseShape {
        NormalCaseShape::new(PREFIX.len(), POSTFIX.len(), 2)
    }

    fn synthesize(circuit: RecursiveCircuit) -> ConstraintSystemRef<OuterScalar> {
        let cs = ConstraintSystem::<OuterScalar>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        cs
    }

    #[test]
    fn test_recursive_circuit_valid() {
        let (parent, _) = prove_parent(b"genesis transaction bytes");
        let raw = spending_tx(&parent.tx_id);

        let parent_public = create_base_case_light_witness(&parent.tx_id, false);
        let witness = create_normal_full_witness(
            &parent_public,
            &parent.proof,
            &parent.vk,
            &PREFIX,
            parent.tx_id.as_bytes(),
            &POSTFIX,
            &raw,
        )
        .unwrap();
        let public = witness.public();

        let cs = synthesize(RecursiveCircuit::new(shape(), parent.vk.clone(), witness).unwrap());

        println!("Recursive circuit constraints: {}", cs.num_constraints());
        assert!(cs.is_satisfied().unwrap());

        let instance = cs.borrow().unwrap().instance_assignment.clone();
        assert_eq!(&instance[1..], public.inputs());
    }

    #[test]
    fn test_recursive_circuit_rejects_foreign_parent_proof() {
        let (parent, pk) = prove_parent(b"genesis transaction bytes");
        let raw = spending_tx(&parent.tx_id);

        // Valid proof, but for a different genesis transaction
        let other_raw = b"another genesis tx bytes!";
        let other_witness =
            create_base_case_full_witness(other_raw, TxId::compute(other_raw), false);
        let other_shape = BaseCaseShape::new(other_raw.len(), false);
        let other_proof = Groth16::<InnerCurve>::prove(
            &pk,
            BaseCaseCircuit::new(other_shape, other_witness).unwrap(),
            &mut OsRng,
        )
        .unwrap();

        let parent_public = create_base_case_light_witness(&parent.tx_id, false);
        let witness = create_normal_full_witness(
            &parent_public,
            &other_proof,
            &parent.vk,
            &PREFIX,
            parent.tx_id.as_bytes(),
            &POSTFIX,
            &raw,
        )
        .unwrap();

        let cs = synthesize(RecursiveCircuit::new(shape(), parent.vk.clone(), witness).unwrap());
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_recursive_circuit_rejects_unlinked_spend() {
        let (parent, _) = prove_parent(b"genesis transaction bytes");

        // Spends some other output; hash chain and parent proof both hold
        let other = TxId::compute(b"unrelated transaction bytes");
        assert_ne!(other, parent.tx_id);
        let raw = spending_tx(&other);

        let parent_public = create_base_case_light_witness(&parent.tx_id, false);
        let witness = create_normal_full_witness(
            &parent_public,
            &parent.proof,
            &parent.vk,
            &PREFIX,
            other.as_bytes(),
            &POSTFIX,
            &raw,
        )
        .unwrap();
        assert_eq!(witness.curr_tx_id(), TxId::compute(&raw));

        let cs = synthesize(RecursiveCircuit::new(shape(), parent.vk.clone(), witness).unwrap());
        assert!(!cs.is_satisfied().unwrap());

        // The same spend linked to the right parent is accepted
        let raw = spending_tx(&parent.tx_id);
        let witness = create_normal_full_witness(
            &parent_public,
            &parent.proof,
            &parent.vk,
            &PREFIX,
            parent.tx_id.as_bytes(),
            &POSTFIX,
            &raw,
        )
        .unwrap();
        let cs = synthesize(RecursiveCircuit::new(shape(), parent.vk.clone(), witness).unwrap());
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_recursive_circuit_rejects_tampered_parent_inputs() {
        let (parent, _) = prove_parent(b"genesis transaction bytes");
        let raw = spending_tx(&parent.tx_id);

        let parent_public = create_base_case_light_witness(&parent.tx_id, false);
        let mut witness = create_normal_full_witness(
            &parent_public,
            &parent.proof,
            &parent.vk,
            &PREFIX,
            parent.tx_id.as_bytes(),
            &POSTFIX,
            &raw,
        )
        .unwrap();

        // Parent inputs now name a different txid than the one being spent
        witness.previous_input_bits[0][3] = !witness.previous_input_bits[0][3];

        let cs = synthesize(RecursiveCircuit::new(shape(), parent.vk.clone(), witness).unwrap());
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_recursive_circuit_shape_checks() {
        let (parent, _) = prove_parent(b"genesis transaction bytes");

        let narrow = NormalCaseShape::new(PREFIX.len(), POSTFIX.len(), 1);
        assert_eq!(
            RecursiveCircuit::from_shape(narrow, parent.vk.clone()).unwrap_err(),
            ShapeError::ParentTooNarrow { required: 2, actual: 1 }
        );

        let wide = NormalCaseShape::new(PREFIX.len(), POSTFIX.len(), 4);
        assert_eq!(
            RecursiveCircuit::from_shape(wide, parent.vk.clone()).unwrap_err(),
            ShapeError::PublicInputs { expected: 4, actual: 2 }
        );

        assert_eq!(shape().tx_len(), PREFIX.len() + 32 + POSTFIX.len());
        assert_eq!(shape().num_public_inputs(), 1);
    }

    #[test]
    fn test_recursive_circuit_setup_mode() {
        let (parent, _) = prove_parent(b"genesis transaction bytes");

        let cs = ConstraintSystem::<OuterScalar>::new_ref();
        cs.set_mode(SynthesisMode::Setup);
        RecursiveCircuit::from_shape(shape(), parent.vk.clone())
            .unwrap()
            .generate_constraints(cs.clone())
            .unwrap();
        assert_eq!(cs.num_instance_variables(), 1 + 1);

        let cs = ConstraintSystem::<OuterScalar>::new_ref();
        let result = RecursiveCircuit::from_shape(shape(), parent.vk)
            .unwrap()
            .generate_constraints(cs);
        assert!(matches!(result, Err(SynthesisError::AssignmentMissing)));
    }
}

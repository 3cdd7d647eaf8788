//! Circuit compilation and Groth16 key generation
//!
//! Compiling synthesizes a circuit in setup mode and records its layout and
//! R1CS dimensions as a `CompiledCircuit`. Key generation runs a
//! circuit-specific Groth16 setup on the same circuit.
//!
//! Keys are produced from local randomness. Whoever runs setup learns the
//! toxic waste and can forge proofs; production keys must come from a
//! multi-party ceremony.

use std::time::Instant;

use ark_ec::pairing::Pairing;
use ark_ff::PrimeField;
use ark_groth16::{Groth16, ProvingKey, VerifyingKey};
use ark_relations::r1cs::{
    ConstraintSynthesizer, ConstraintSystem, OptimizationGoal, SynthesisMode,
};
use ark_snark::SNARK;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::base_circuit::{BaseCaseCircuit, BaseCaseShape};
use super::encoding::verifying_key_to_bytes;
use super::recursive_circuit::{NormalCaseShape, RecursiveCircuit};
use super::{ChainPosition, InnerCurve, InnerScalar, OuterCurve, OuterScalar};
use crate::error::{IvcResult, ProofError, ShapeError};

/// Layout a circuit was compiled for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitLayout {
    Base(BaseCaseShape),
    Normal(NormalCaseShape),
}

impl CircuitLayout {
    pub fn position(&self) -> ChainPosition {
        match self {
            CircuitLayout::Base(_) => ChainPosition::Base,
            CircuitLayout::Normal(_) => ChainPosition::Normal,
        }
    }
}

/// Descriptor of a compiled constraint system
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledCircuit {
    pub layout: CircuitLayout,
    pub num_constraints: usize,
    /// Includes the constant-one variable
    pub num_instance_variables: usize,
    pub num_witness_variables: usize,
    /// SHA-256 of the parent verifying key baked into a recursive circuit
    pub parent_vk_digest: Option<[u8; 32]>,
}

impl CompiledCircuit {
    pub fn position(&self) -> ChainPosition {
        self.layout.position()
    }

    pub fn num_public_inputs(&self) -> usize {
        self.num_instance_variables.saturating_sub(1)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProofError> {
        bincode::serialize(self).map_err(|e| ProofError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProofError> {
        bincode::deserialize(bytes).map_err(|e| ProofError::Serialization(e.to_string()))
    }
}

/// Synthesize `circuit` without assignments and record its dimensions
pub fn compile<F, C>(circuit: C, layout: CircuitLayout) -> Result<CompiledCircuit, ProofError>
where
    F: PrimeField,
    C: ConstraintSynthesizer<F>,
{
    let start = Instant::now();
    let cs = ConstraintSystem::<F>::new_ref();
    cs.set_optimization_goal(OptimizationGoal::Constraints);
    cs.set_mode(SynthesisMode::Setup);

    circuit
        .generate_constraints(cs.clone())
        .map_err(|e| ProofError::SetupFailed(e.to_string()))?;
    cs.finalize();

    let compiled = CompiledCircuit {
        layout,
        num_constraints: cs.num_constraints(),
        num_instance_variables: cs.num_instance_variables(),
        num_witness_variables: cs.num_witness_variables(),
        parent_vk_digest: None,
    };
    info!(
        position = %compiled.position(),
        constraints = compiled.num_constraints,
        public_inputs = compiled.num_public_inputs(),
        elapsed = ?start.elapsed(),
        "compiled circuit"
    );
    Ok(compiled)
}

pub fn compile_base_case(shape: BaseCaseShape) -> Result<CompiledCircuit, ProofError> {
    compile::<InnerScalar, _>(BaseCaseCircuit::from_shape(shape), CircuitLayout::Base(shape))
}

pub fn compile_normal_case(
    shape: NormalCaseShape,
    parent_vk: &VerifyingKey<InnerCurve>,
) -> IvcResult<CompiledCircuit> {
    let circuit = RecursiveCircuit::from_shape(shape, parent_vk.clone())?;
    let mut compiled = compile::<OuterScalar, _>(circuit, CircuitLayout::Normal(shape))?;
    compiled.parent_vk_digest = Some(verifying_key_digest(parent_vk)?);
    Ok(compiled)
}

/// SHA-256 of the uncompressed verifying key
pub fn verifying_key_digest<E: Pairing>(vk: &VerifyingKey<E>) -> Result<[u8; 32], ProofError> {
    Ok(Sha256::digest(verifying_key_to_bytes(vk)?).into())
}

fn generate_keys<E, C, R>(
    circuit: C,
    position: ChainPosition,
    rng: &mut R,
) -> Result<(ProvingKey<E>, VerifyingKey<E>), ProofError>
where
    E: Pairing,
    C: ConstraintSynthesizer<E::ScalarField>,
    R: RngCore + CryptoRng,
{
    warn!(
        %position,
        "generating Groth16 keys from local randomness, not suitable for production"
    );
    let start = Instant::now();
    let keys = Groth16::<E>::circuit_specific_setup(circuit, rng)
        .map_err(|e| ProofError::SetupFailed(e.to_string()))?;
    info!(%position, elapsed = ?start.elapsed(), "generated keys");
    Ok(keys)
}

/// Compile the base circuit and generate its keys
pub fn setup_base_case<R: RngCore + CryptoRng>(
    shape: BaseCaseShape,
    rng: &mut R,
) -> IvcResult<(CompiledCircuit, ProvingKey<InnerCurve>, VerifyingKey<InnerCurve>)> {
    let compiled = compile_base_case(shape)?;
    let (pk, vk) =
        generate_keys::<InnerCurve, _, _>(BaseCaseCircuit::from_shape(shape), ChainPosition::Base, rng)?;
    Ok((compiled, pk, vk))
}

/// Compile the recursive circuit over `parent` and generate its keys
///
/// The parent must be a compiled base circuit: the outer curve cannot verify
/// its own proofs.
pub fn setup_normal_case<R: RngCore + CryptoRng>(
    prefix_len: usize,
    postfix_len: usize,
    parent: &CompiledCircuit,
    parent_vk: &VerifyingKey<InnerCurve>,
    rng: &mut R,
) -> IvcResult<(CompiledCircuit, ProvingKey<OuterCurve>, VerifyingKey<OuterCurve>)> {
    if parent.position() != ChainPosition::Base {
        return Err(ProofError::UnsupportedParent(parent.position()).into());
    }

    let vk_inputs = parent_vk.gamma_abc_g1.len().saturating_sub(1);
    if vk_inputs != parent.num_public_inputs() {
        return Err(ShapeError::PublicInputs {
            expected: parent.num_public_inputs(),
            actual: vk_inputs,
        }
        .into());
    }

    let shape = NormalCaseShape::new(prefix_len, postfix_len, parent.num_public_inputs());
    let compiled = compile_normal_case(shape, parent_vk)?;
    let circuit = RecursiveCircuit::from_shape(shape, parent_vk.clone())?;
    let (pk, vk) = generate_keys::<OuterCurve, _, _>(circuit, ChainPosition::Normal, rng)?;
    Ok((compiled, pk, vk))
}

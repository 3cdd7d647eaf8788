//! Recursive Groth16 proofs over transaction chains
//!
//! Genesis transactions are proven on the inner curve (BLS12-377). Every
//! spending transaction is proven on the outer curve (BW6-761), whose scalar
//! field is the base field of BLS12-377, so the inner pairing check is native
//! arithmetic inside the outer circuit.
//!
//! Components:
//! - `gadgets`: R1CS gadgets (double SHA-256, packed public bytes)
//! - `base_circuit`: genesis circuit (hash chain, optional token anchor)
//! - `recursive_circuit`: spending circuit (hash chain + parent proof + linkage)
//! - `witness`: full and public-only witness assembly
//! - `setup`: circuit compilation and key generation
//! - `keys`: persisted keys and constraint-system descriptors
//! - `encoding`: proof bytes and JSON transport format
//! - `system`: `ProofSystem`, the staged orchestrator

pub mod base_circuit;
pub mod encoding;
pub mod gadgets;
pub mod keys;
pub mod recursive_circuit;
pub mod setup;
pub mod system;
pub mod witness;

use std::fmt;

use ark_groth16::constraints::Groth16VerifierGadget;
use serde::{Deserialize, Serialize};

pub use base_circuit::{BaseCaseCircuit, BaseCaseShape};
pub use encoding::ProofJson;
pub use keys::KeyStore;
pub use recursive_circuit::{NormalCaseShape, RecursiveCircuit};
pub use setup::{setup_base_case, setup_normal_case, CircuitLayout, CompiledCircuit};
pub use system::{ChainStage, ProofSystem, StageState};
pub use witness::{
    create_base_case_full_witness, create_base_case_light_witness, create_normal_full_witness,
    create_normal_light_witness, BaseCaseWitness, NormalCaseWitness, PublicWitness,
};

/// Curve for genesis proofs
pub type InnerCurve = ark_bls12_377::Bls12_377;
/// Curve for spending proofs; its scalar field is `InnerCurve`'s base field
pub type OuterCurve = ark_bw6_761::BW6_761;

pub type InnerScalar = ark_bls12_377::Fr;
pub type OuterScalar = ark_bw6_761::Fr;

/// BLS12-377 pairing evaluated inside BW6-761 circuits
pub type InnerPairingVar = ark_bls12_377::constraints::PairingVar;

/// In-circuit verifier for inner-curve Groth16 proofs
pub type InnerVerifierGadget = Groth16VerifierGadget<InnerCurve, InnerPairingVar>;

/// Position of a transaction in its chain
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainPosition {
    /// Genesis transaction, no parent proof
    Base,
    /// Spending transaction carrying its parent's proof
    Normal,
}

impl fmt::Display for ChainPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainPosition::Base => f.write_str("base"),
            ChainPosition::Normal => f.write_str("normal"),
        }
    }
}

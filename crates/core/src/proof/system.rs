//! Staged proof system for both chain positions
//!
//! Each position moves through `Uninitialized -> Compiled -> Keyed`. Keys
//! are installed exactly once: running setup again would produce new keys
//! and orphan every proof issued under the old ones.

use std::time::Instant;

use ark_ec::pairing::Pairing;
use ark_ff::PrimeField;
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, ProvingKey, VerifyingKey};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem, OptimizationGoal};
use ark_snark::SNARK;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use tracing::{debug, info, instrument, warn};

use super::base_circuit::BaseCaseCircuit;
use super::encoding::ProofJson;
use super::keys::{KeyStore, StoredKeys};
use super::recursive_circuit::RecursiveCircuit;
use super::setup::{
    setup_base_case, setup_normal_case, verifying_key_digest, CircuitLayout, CompiledCircuit,
};
use super::witness::{
    create_base_case_full_witness, create_base_case_light_witness, create_normal_full_witness,
    create_normal_light_witness, BaseCaseWitness, NormalCaseWitness, PublicWitness,
};
use super::{ChainPosition, InnerCurve, InnerScalar, OuterCurve, OuterScalar};
use crate::config::ProofSystemConfig;
use crate::error::{IvcResult, ProofError, ShapeError, StorageError};
use crate::tx::{slice_tx, TxId};

/// Lifecycle of one chain position
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageState {
    Uninitialized,
    Compiled,
    Keyed,
}

impl StageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageState::Uninitialized => "uninitialized",
            StageState::Compiled => "compiled",
            StageState::Keyed => "keyed",
        }
    }
}

/// Groth16 keys installed on a stage
#[derive(Clone)]
pub struct StageKeys<E: Pairing> {
    pub proving_key: ProvingKey<E>,
    pub verifying_key: VerifyingKey<E>,
    pub prepared_vk: PreparedVerifyingKey<E>,
}

/// Compiled circuit and keys for one chain position
pub struct ChainStage<E: Pairing> {
    position: ChainPosition,
    compiled: Option<CompiledCircuit>,
    keys: Option<StageKeys<E>>,
}

impl<E: Pairing> ChainStage<E> {
    pub fn new(position: ChainPosition) -> Self {
        Self {
            position,
            compiled: None,
            keys: None,
        }
    }

    pub fn position(&self) -> ChainPosition {
        self.position
    }

    pub fn state(&self) -> StageState {
        match (&self.compiled, &self.keys) {
            (_, Some(_)) => StageState::Keyed,
            (Some(_), None) => StageState::Compiled,
            (None, None) => StageState::Uninitialized,
        }
    }

    /// Record the compiled circuit; only legal once
    pub fn compile(&mut self, compiled: CompiledCircuit) -> Result<(), ProofError> {
        match self.state() {
            StageState::Uninitialized => {}
            StageState::Compiled => {
                return Err(ProofError::SetupFailed(format!(
                    "{} circuit is already compiled",
                    self.position
                )))
            }
            StageState::Keyed => return Err(ProofError::SetupAlreadyDone(self.position)),
        }

        if compiled.position() != self.position {
            return Err(ProofError::SetupFailed(format!(
                "{} circuit offered to the {} stage",
                compiled.position(),
                self.position
            )));
        }

        debug!(
            position = %self.position,
            constraints = compiled.num_constraints,
            witness_variables = compiled.num_witness_variables,
            "stage compiled"
        );
        self.compiled = Some(compiled);
        Ok(())
    }

    /// Install keys for the compiled circuit; only legal once
    pub fn install_keys(
        &mut self,
        proving_key: ProvingKey<E>,
        verifying_key: VerifyingKey<E>,
    ) -> Result<(), ProofError> {
        let compiled = match (&self.compiled, &self.keys) {
            (_, Some(_)) => return Err(ProofError::SetupAlreadyDone(self.position)),
            (None, None) => return Err(self.not_ready()),
            (Some(compiled), None) => compiled,
        };

        if verifying_key.gamma_abc_g1.len() != compiled.num_instance_variables {
            return Err(ProofError::SetupFailed(format!(
                "verifying key expects {} public inputs, circuit has {}",
                verifying_key.gamma_abc_g1.len().saturating_sub(1),
                compiled.num_public_inputs()
            )));
        }

        let prepared_vk = Groth16::<E>::process_vk(&verifying_key)
            .map_err(|e| ProofError::SetupFailed(e.to_string()))?;

        self.keys = Some(StageKeys {
            proving_key,
            verifying_key,
            prepared_vk,
        });
        info!(position = %self.position, "stage keyed");
        Ok(())
    }

    fn install(&mut self, stored: StoredKeys<E>) -> Result<(), ProofError> {
        self.compile(stored.compiled)?;
        self.install_keys(stored.proving_key, stored.verifying_key)
    }

    pub fn compiled(&self) -> Result<&CompiledCircuit, ProofError> {
        self.compiled.as_ref().ok_or_else(|| self.not_ready())
    }

    pub fn keys(&self) -> Result<&StageKeys<E>, ProofError> {
        self.keys.as_ref().ok_or_else(|| self.not_ready())
    }

    fn ensure_unkeyed(&self) -> Result<(), ProofError> {
        if self.state() == StageState::Keyed {
            return Err(ProofError::SetupAlreadyDone(self.position));
        }
        Ok(())
    }

    fn not_ready(&self) -> ProofError {
        ProofError::NotReady {
            position: self.position,
            state: self.state().as_str(),
        }
    }

    /// Groth16 verification against the installed key
    pub fn verify(&self, public: &[E::ScalarField], proof: &Proof<E>) -> IvcResult<bool> {
        let keys = self.keys()?;
        let expected = keys.verifying_key.gamma_abc_g1.len().saturating_sub(1);
        if public.len() != expected {
            return Err(ShapeError::PublicInputs {
                expected,
                actual: public.len(),
            }
            .into());
        }

        let valid = Groth16::<E>::verify_with_processed_vk(&keys.prepared_vk, public, proof)
            .map_err(|e| ProofError::VerificationFailed(e.to_string()))?;
        Ok(valid)
    }

    fn prove<C>(&self, circuit: C) -> IvcResult<Proof<E>>
    where
        C: ConstraintSynthesizer<E::ScalarField> + Clone,
    {
        let keys = self.keys()?;
        ensure_satisfied(circuit.clone())?;

        let start = Instant::now();
        let proof = Groth16::<E>::prove(&keys.proving_key, circuit, &mut OsRng)
            .map_err(|e| ProofError::GenerationFailed(e.to_string()))?;
        info!(position = %self.position, elapsed = ?start.elapsed(), "generated proof");
        Ok(proof)
    }
}

/// Synthesize the assignment and report the first failing constraint
///
/// Groth16 proving does not check satisfiability itself.
fn ensure_satisfied<F, C>(circuit: C) -> Result<(), ProofError>
where
    F: PrimeField,
    C: ConstraintSynthesizer<F>,
{
    let cs = ConstraintSystem::<F>::new_ref();
    cs.set_optimization_goal(OptimizationGoal::Constraints);
    circuit
        .generate_constraints(cs.clone())
        .map_err(|e| ProofError::Unsatisfiable(e.to_string()))?;

    debug!(
        constraints = cs.num_constraints(),
        witness_variables = cs.num_witness_variables(),
        "synthesized assignment"
    );

    match cs.which_is_unsatisfied() {
        Ok(None) => Ok(()),
        Ok(Some(constraint)) => Err(ProofError::Unsatisfiable(format!(
            "constraint {} does not hold",
            constraint
        ))),
        Err(e) => Err(ProofError::Unsatisfiable(e.to_string())),
    }
}

/// Both chain stages plus their configuration
///
/// Immutable once booted; share it behind an `Arc` for concurrent proving.
pub struct ProofSystem {
    config: ProofSystemConfig,
    base: ChainStage<InnerCurve>,
    normal: ChainStage<OuterCurve>,
}

impl ProofSystem {
    /// Unbooted system with both stages uninitialized
    pub fn new(config: ProofSystemConfig) -> IvcResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            base: ChainStage::new(ChainPosition::Base),
            normal: ChainStage::new(ChainPosition::Normal),
        })
    }

    /// Load persisted keys for both positions, running setup where none exist
    pub fn boot(config: ProofSystemConfig) -> IvcResult<Self> {
        let mut system = Self::new(config)?;
        let store = system.config.key_store();
        system.boot_base(&store, &mut OsRng)?;
        system.boot_normal(&store, &mut OsRng)?;
        info!(dir = %store.dir().display(), "proof system ready");
        Ok(system)
    }

    pub fn config(&self) -> &ProofSystemConfig {
        &self.config
    }

    pub fn base_stage(&self) -> &ChainStage<InnerCurve> {
        &self.base
    }

    pub fn normal_stage(&self) -> &ChainStage<OuterCurve> {
        &self.normal
    }

    /// Both stages keyed
    pub fn is_ready(&self) -> bool {
        self.base.state() == StageState::Keyed && self.normal.state() == StageState::Keyed
    }

    // ===== Setup =====

    /// Load the base stage from `store`, or set it up and persist it
    #[instrument(skip_all, fields(prefix = %self.config.base_key_prefix))]
    pub fn boot_base<R: RngCore + CryptoRng>(
        &mut self,
        store: &KeyStore,
        rng: &mut R,
    ) -> IvcResult<()> {
        let prefix = self.config.base_key_prefix.clone();

        if store.has_keys(&prefix) {
            info!("loading base keys");
            let stored = store.read::<InnerCurve>(&prefix)?;
            if stored.compiled.layout != CircuitLayout::Base(self.config.base_shape()) {
                return Err(StorageError::LayoutMismatch {
                    position: ChainPosition::Base,
                }
                .into());
            }
            self.base.install(stored)?;
        } else {
            info!("no base keys found, running setup");
            self.setup_base(rng)?;
            let keys = self.base.keys()?;
            store.write(&prefix, self.base.compiled()?, &keys.proving_key, &keys.verifying_key)?;
        }
        Ok(())
    }

    /// Load the normal stage from `store`, or set it up and persist it
    ///
    /// Stored keys are only accepted if they were generated against the
    /// current base verifying key.
    #[instrument(skip_all, fields(prefix = %self.config.normal_key_prefix))]
    pub fn boot_normal<R: RngCore + CryptoRng>(
        &mut self,
        store: &KeyStore,
        rng: &mut R,
    ) -> IvcResult<()> {
        let prefix = self.config.normal_key_prefix.clone();

        if store.has_keys(&prefix) {
            info!("loading normal keys");
            let parent_digest = verifying_key_digest(&self.base.keys()?.verifying_key)?;
            let stored = store.read::<OuterCurve>(&prefix)?;
            if stored.compiled.layout != CircuitLayout::Normal(self.config.normal_shape())
                || stored.compiled.parent_vk_digest != Some(parent_digest)
            {
                return Err(StorageError::LayoutMismatch {
                    position: ChainPosition::Normal,
                }
                .into());
            }
            self.normal.install(stored)?;
        } else {
            info!("no normal keys found, running setup");
            self.setup_normal(rng)?;
            let keys = self.normal.keys()?;
            store.write(&prefix, self.normal.compiled()?, &keys.proving_key, &keys.verifying_key)?;
        }
        Ok(())
    }

    /// Compile the base circuit and generate its keys in memory
    #[instrument(skip_all, fields(tx_len = self.config.base_tx_size))]
    pub fn setup_base<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> IvcResult<()> {
        self.base.ensure_unkeyed()?;
        let (compiled, pk, vk) = setup_base_case(self.config.base_shape(), rng)?;
        self.base.compile(compiled)?;
        self.base.install_keys(pk, vk)?;
        Ok(())
    }

    /// Compile the recursive circuit over the keyed base stage and generate
    /// its keys in memory
    #[instrument(skip_all, fields(
        prefix_len = self.config.normal_prefix_size,
        postfix_len = self.config.normal_postfix_size
    ))]
    pub fn setup_normal<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> IvcResult<()> {
        self.normal.ensure_unkeyed()?;
        let parent = self.base.compiled()?;
        let parent_vk = &self.base.keys()?.verifying_key;

        let (compiled, pk, vk) = setup_normal_case(
            self.config.normal_prefix_size,
            self.config.normal_postfix_size,
            parent,
            parent_vk,
            rng,
        )?;
        self.normal.compile(compiled)?;
        self.normal.install_keys(pk, vk)?;
        Ok(())
    }

    // ===== Typed proving and verification =====

    #[instrument(skip_all, fields(tx_id = %witness.curr_tx_id()))]
    pub fn prove_base(&self, witness: &BaseCaseWitness) -> IvcResult<Proof<InnerCurve>> {
        let circuit = BaseCaseCircuit::new(self.config.base_shape(), witness.clone())?;
        self.base.prove(circuit)
    }

    pub fn verify_base(
        &self,
        public: &PublicWitness<InnerScalar>,
        proof: &Proof<InnerCurve>,
    ) -> IvcResult<bool> {
        self.base.verify(public.inputs(), proof)
    }

    #[instrument(skip_all, fields(tx_id = %witness.curr_tx_id()))]
    pub fn prove_normal(&self, witness: &NormalCaseWitness) -> IvcResult<Proof<OuterCurve>> {
        let parent_vk = self.base.keys()?.verifying_key.clone();
        let circuit = RecursiveCircuit::new(self.config.normal_shape(), parent_vk, witness.clone())?;
        self.normal.prove(circuit)
    }

    pub fn verify_normal(
        &self,
        public: &PublicWitness<OuterScalar>,
        proof: &Proof<OuterCurve>,
    ) -> IvcResult<bool> {
        self.normal.verify(public.inputs(), proof)
    }

    // ===== Hex and JSON entry points =====

    /// Prove a genesis transaction given as hex; returns the proof as JSON
    pub fn create_base_case_proof(&self, raw_tx_hex: &str) -> IvcResult<String> {
        let raw_tx = hex::decode(raw_tx_hex)?;
        let tx_id = TxId::compute(&raw_tx);
        debug!(%tx_id, bytes = raw_tx.len(), "base proof requested");

        let witness = create_base_case_full_witness(&raw_tx, tx_id, self.config.anchor_token_id);
        let proof = self.prove_base(&witness)?;
        ProofJson::from_proof(&proof).to_json()
    }

    /// Prove a spending transaction given as hex, chaining onto the proof
    /// of the transaction its input `input_index` spends
    pub fn create_normal_case_proof(
        &self,
        raw_tx_hex: &str,
        input_index: usize,
        is_parent_base: bool,
        parent_proof_json: &str,
    ) -> IvcResult<String> {
        if !is_parent_base {
            return Err(ProofError::UnsupportedParent(ChainPosition::Normal).into());
        }

        let raw_tx = hex::decode(raw_tx_hex)?;
        let linkage = slice_tx(&raw_tx, input_index)?;
        debug!(
            prev_tx_id = %linkage.prev_tx_id,
            prefix = linkage.prefix.len(),
            postfix = linkage.postfix.len(),
            "normal proof requested"
        );

        let parent_proof: Proof<InnerCurve> = ProofJson::from_json(parent_proof_json)?.to_proof()?;
        let parent_public =
            create_base_case_light_witness(&linkage.prev_tx_id, self.config.anchor_token_id);

        // Fail fast before synthesizing the pairing check in-circuit
        if !self.verify_base(&parent_public, &parent_proof)? {
            return Err(ProofError::Unsatisfiable(format!(
                "parent proof does not verify for {}",
                linkage.prev_tx_id
            ))
            .into());
        }

        let witness = create_normal_full_witness(
            &parent_public,
            &parent_proof,
            &self.base.keys()?.verifying_key,
            &linkage.prefix,
            linkage.prev_tx_id.as_bytes(),
            &linkage.postfix,
            &raw_tx,
        )?;
        let proof = self.prove_normal(&witness)?;
        ProofJson::from_proof(&proof).to_json()
    }

    /// Whether `proof_json` proves the genesis transaction `tx_id_hex`
    pub fn verify_base_proof(&self, tx_id_hex: &str, proof_json: &str) -> bool {
        let result = (|| -> IvcResult<bool> {
            let tx_id = TxId::from_hex(tx_id_hex)?;
            let proof: Proof<InnerCurve> = ProofJson::from_json(proof_json)?.to_proof()?;
            let public = create_base_case_light_witness(&tx_id, self.config.anchor_token_id);
            self.verify_base(&public, &proof)
        })();
        report(ChainPosition::Base, tx_id_hex, result)
    }

    /// Whether `proof_json` proves the spending transaction `tx_id_hex`
    pub fn verify_normal_proof(&self, tx_id_hex: &str, proof_json: &str) -> bool {
        let result = (|| -> IvcResult<bool> {
            let tx_id = TxId::from_hex(tx_id_hex)?;
            let proof: Proof<OuterCurve> = ProofJson::from_json(proof_json)?.to_proof()?;
            self.verify_normal(&create_normal_light_witness(&tx_id), &proof)
        })();
        report(ChainPosition::Normal, tx_id_hex, result)
    }
}

fn report(position: ChainPosition, tx_id: &str, result: IvcResult<bool>) -> bool {
    match result {
        Ok(true) => {
            debug!(%position, tx_id, "proof verified");
            true
        }
        Ok(false) => {
            warn!(%position, tx_id, "proof rejected by the pairing check");
            false
        }
        Err(err) => {
            warn!(%position, tx_id, error = %err, "proof could not be verified");
            false
        }
    }
}

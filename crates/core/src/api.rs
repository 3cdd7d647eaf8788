//! Request payloads and handlers
//!
//! JSON bodies as sent by callers of the proving service. Handlers run a
//! payload against a booted `ProofSystem`.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::IvcResult;
use crate::proof::ProofSystem;

/// Request to prove a genesis transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseProofInfo {
    /// Serialized transaction, hex
    pub raw_tx: String,
}

/// Request to prove a spending transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalProofInfo {
    /// Serialized spending transaction, hex
    pub raw_tx: String,
    /// Input whose previous txid links to the parent
    #[serde(default)]
    pub input_index: usize,
    #[serde(default)]
    pub is_parent_base: bool,
    /// Parent proof in its JSON transport form
    pub proof: String,
}

/// Request to check a proof against a transaction id
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyProofInfo {
    pub tx_id: String,
    pub proof: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofResponse {
    pub proof: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
}

pub fn handle_base_proof(system: &ProofSystem, info: &BaseProofInfo) -> IvcResult<ProofResponse> {
    info!(bytes = info.raw_tx.len() / 2, "handling base proof request");
    let proof = system.create_base_case_proof(&info.raw_tx)?;
    Ok(ProofResponse { proof })
}

pub fn handle_normal_proof(
    system: &ProofSystem,
    info: &NormalProofInfo,
) -> IvcResult<ProofResponse> {
    info!(
        bytes = info.raw_tx.len() / 2,
        input_index = info.input_index,
        is_parent_base = info.is_parent_base,
        "handling normal proof request"
    );
    let proof = system.create_normal_case_proof(
        &info.raw_tx,
        info.input_index,
        info.is_parent_base,
        &info.proof,
    )?;
    Ok(ProofResponse { proof })
}

pub fn handle_verify_base(system: &ProofSystem, info: &VerifyProofInfo) -> VerifyResponse {
    VerifyResponse {
        valid: system.verify_base_proof(&info.tx_id, &info.proof),
    }
}

pub fn handle_verify_normal(system: &ProofSystem, info: &VerifyProofInfo) -> VerifyResponse {
    VerifyResponse {
        valid: system.verify_normal_proof(&info.tx_id, &info.proof),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProofSystemConfig;
    use crate::error::{IvcError, ProofError};
    use crate::proof::ChainPosition;

    #[test]
    fn test_normal_payload_json() {
        let body = r#"{"raw_tx":"0200","input_index":1,"is_parent_base":true,"proof":"{}"}"#;
        let info: NormalProofInfo = serde_json::from_str(body).unwrap();
        assert_eq!(info.input_index, 1);
        assert!(info.is_parent_base);

        let defaulted: NormalProofInfo =
            serde_json::from_str(r#"{"raw_tx":"0200","proof":"{}"}"#).unwrap();
        assert_eq!(defaulted.input_index, 0);
        assert!(!defaulted.is_parent_base);

        assert!(serde_json::from_str::<BaseProofInfo>(r#"{"rawTx":"00"}"#).is_err());
    }

    #[test]
    fn test_handlers_surface_errors() {
        let system = ProofSystem::new(ProofSystemConfig::default()).unwrap();

        let err = handle_base_proof(&system, &BaseProofInfo { raw_tx: "xyz".into() }).unwrap_err();
        assert!(matches!(err, IvcError::Decode(_)));

        let info = NormalProofInfo {
            raw_tx: "00".into(),
            input_index: 0,
            is_parent_base: false,
            proof: "{}".into(),
        };
        assert!(matches!(
            handle_normal_proof(&system, &info),
            Err(IvcError::Proof(ProofError::UnsupportedParent(ChainPosition::Normal)))
        ));

        let verify = VerifyProofInfo {
            tx_id: "00".into(),
            proof: "{}".into(),
        };
        assert_eq!(handle_verify_base(&system, &verify), VerifyResponse { valid: false });
        assert_eq!(handle_verify_normal(&system, &verify), VerifyResponse { valid: false });
    }
}

//! Proof and key encodings
//!
//! Verifying keys are hashed over their uncompressed ark-serialize bytes.
//! The JSON transport format carries each proof point as decimal
//! coordinates:
//!
//! ```json
//! { "Ar":  { "X": ["..."], "Y": ["..."] },
//!   "Bs":  { "X": ["...", "..."], "Y": ["...", "..."] },
//!   "Krs": { "X": ["..."], "Y": ["..."] } }
//! ```
//!
//! Coordinates in an extension field list one decimal per base prime field
//! component, lowest first. The point at infinity is written with empty
//! coordinate lists.

use std::str::FromStr;

use ark_ec::pairing::Pairing;
use ark_ec::short_weierstrass::{Affine, SWCurveConfig};
use ark_ec::AffineRepr;
use ark_ff::{BigInteger, Field, PrimeField};
use ark_groth16::{Proof, VerifyingKey};
use ark_serialize::CanonicalSerialize;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::error::{IvcError, IvcResult, ProofError};

/// Uncompressed verifying key bytes
pub fn verifying_key_to_bytes<E: Pairing>(vk: &VerifyingKey<E>) -> Result<Vec<u8>, ProofError> {
    let mut bytes = Vec::new();
    vk.serialize_uncompressed(&mut bytes)
        .map_err(|e| ProofError::Serialization(e.to_string()))?;
    Ok(bytes)
}

/// One affine point as decimal coordinate components
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointJson {
    #[serde(rename = "X")]
    pub x: Vec<String>,
    #[serde(rename = "Y")]
    pub y: Vec<String>,
}

/// Groth16 proof in its JSON transport form
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofJson {
    #[serde(rename = "Ar")]
    pub a: PointJson,
    #[serde(rename = "Bs")]
    pub b: PointJson,
    #[serde(rename = "Krs")]
    pub c: PointJson,
}

impl ProofJson {
    pub fn from_proof<E, P1, P2>(proof: &Proof<E>) -> Self
    where
        E: Pairing<G1Affine = Affine<P1>, G2Affine = Affine<P2>>,
        P1: SWCurveConfig,
        P2: SWCurveConfig,
    {
        Self {
            a: encode_point(&proof.a),
            b: encode_point(&proof.b),
            c: encode_point(&proof.c),
        }
    }

    /// Rebuild the proof, rejecting points off the curve or outside the
    /// prime-order subgroup
    pub fn to_proof<E, P1, P2>(&self) -> IvcResult<Proof<E>>
    where
        E: Pairing<G1Affine = Affine<P1>, G2Affine = Affine<P2>>,
        P1: SWCurveConfig,
        P2: SWCurveConfig,
    {
        Ok(Proof {
            a: decode_point(&self.a, "Ar")?,
            b: decode_point(&self.b, "Bs")?,
            c: decode_point(&self.c, "Krs")?,
        })
    }

    pub fn to_json(&self) -> IvcResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> IvcResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn encode_point<P: SWCurveConfig>(point: &Affine<P>) -> PointJson {
    if point.is_zero() {
        return PointJson {
            x: Vec::new(),
            y: Vec::new(),
        };
    }
    PointJson {
        x: encode_coordinate(&point.x),
        y: encode_coordinate(&point.y),
    }
}

fn encode_coordinate<F: Field>(value: &F) -> Vec<String> {
    value
        .to_base_prime_field_elements()
        .map(|e| BigUint::from_bytes_le(&e.into_bigint().to_bytes_le()).to_string())
        .collect()
}

fn decode_point<P: SWCurveConfig>(point: &PointJson, name: &str) -> IvcResult<Affine<P>> {
    if point.x.is_empty() && point.y.is_empty() {
        return Ok(<Affine<P> as AffineRepr>::zero());
    }

    let x = decode_coordinate::<P::BaseField>(&point.x, name)?;
    let y = decode_coordinate::<P::BaseField>(&point.y, name)?;
    let decoded = Affine::<P>::new_unchecked(x, y);

    if !decoded.is_on_curve() {
        return Err(IvcError::Decode(format!("{} is not on the curve", name)));
    }
    if !decoded.is_in_correct_subgroup_assuming_on_curve() {
        return Err(IvcError::Decode(format!(
            "{} is not in the prime-order subgroup",
            name
        )));
    }
    Ok(decoded)
}

fn decode_coordinate<F: Field>(parts: &[String], name: &str) -> IvcResult<F> {
    let elements = parts
        .iter()
        .map(|part| decode_prime::<F::BasePrimeField>(part, name))
        .collect::<IvcResult<Vec<_>>>()?;

    F::from_base_prime_field_elems(&elements).ok_or_else(|| {
        IvcError::Decode(format!(
            "{} coordinate needs {} components, got {}",
            name,
            F::extension_degree(),
            parts.len()
        ))
    })
}

/// Decimal string to a canonical field element; values at or above the
/// modulus are rejected rather than reduced
fn decode_prime<F: PrimeField>(part: &str, name: &str) -> IvcResult<F> {
    let value = BigUint::from_str(part)
        .map_err(|e| IvcError::Decode(format!("{} has invalid decimal {:?}: {}", name, part, e)))?;
    let modulus = BigUint::from_bytes_le(&F::MODULUS.to_bytes_le());
    if value >= modulus {
        return Err(IvcError::Decode(format!(
            "{} coordinate exceeds the field modulus",
            name
        )));
    }
    Ok(F::from_le_bytes_mod_order(&value.to_bytes_le()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::CurveGroup;
    use ark_std::UniformRand;
    use rand::rngs::OsRng;

    use crate::proof::{InnerCurve, OuterCurve};

    fn random_proof<E: Pairing>() -> Proof<E> {
        let mut rng = OsRng;
        Proof {
            a: E::G1::rand(&mut rng).into_affine(),
            b: E::G2::rand(&mut rng).into_affine(),
            c: E::G1::rand(&mut rng).into_affine(),
        }
    }

    #[test]
    fn test_proof_json_inner_curve() {
        let proof = random_proof::<InnerCurve>();
        let json = ProofJson::from_proof(&proof).to_json().unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["Ar"]["X"].as_array().unwrap().len(), 1);
        assert_eq!(value["Bs"]["X"].as_array().unwrap().len(), 2);
        assert_eq!(value["Krs"]["Y"].as_array().unwrap().len(), 1);

        let decoded: Proof<InnerCurve> = ProofJson::from_json(&json).unwrap().to_proof().unwrap();
        assert_eq!(decoded, proof);
    }

    #[test]
    fn test_proof_json_outer_curve() {
        let proof = random_proof::<OuterCurve>();
        let encoded = ProofJson::from_proof(&proof);

        // BW6-761 G2 lives over the base prime field
        assert_eq!(encoded.b.x.len(), 1);
        let decoded: Proof<OuterCurve> = encoded.to_proof().unwrap();
        assert_eq!(decoded, proof);
    }

    #[test]
    fn test_proof_json_keeps_leading_zeros() {
        let proof = random_proof::<InnerCurve>();
        let encoded = ProofJson::from_proof(&proof);
        let expected = BigUint::from_bytes_le(&proof.a.x.into_bigint().to_bytes_le()).to_string();
        assert_eq!(encoded.a.x[0], expected);
    }

    #[test]
    fn test_proof_json_rejects_bad_points() {
        let proof = random_proof::<InnerCurve>();

        let mut off_curve = ProofJson::from_proof(&proof);
        off_curve.a.y[0] = "1".to_string();
        assert!(matches!(
            off_curve.to_proof::<InnerCurve, _, _>(),
            Err(IvcError::Decode(_))
        ));

        let mut too_big = ProofJson::from_proof(&proof);
        too_big.c.x[0] = BigUint::from_bytes_le(&ark_bls12_377::Fq::MODULUS.to_bytes_le()).to_string();
        assert!(too_big.to_proof::<InnerCurve, _, _>().is_err());

        let mut short = ProofJson::from_proof(&proof);
        short.b.x.pop();
        assert!(short.to_proof::<InnerCurve, _, _>().is_err());

        let mut not_decimal = ProofJson::from_proof(&proof);
        not_decimal.a.x[0] = "0x12".to_string();
        assert!(not_decimal.to_proof::<InnerCurve, _, _>().is_err());

        assert!(ProofJson::from_json("{\"Ar\": 1}").is_err());
    }
}

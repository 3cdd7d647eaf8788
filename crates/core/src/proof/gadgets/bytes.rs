//! Packed Byte Strings for R1CS circuits
//!
//! A byte string becomes a sequence of field elements, each holding
//! `bytes_per_element::<F>()` bytes read little-endian. The last element holds
//! the remainder. Inside a circuit every element is decomposed into bits, the
//! used bits are regrouped into bytes and all unused high bits are pinned to
//! zero so that one field element has exactly one byte reading.

use ark_ff::PrimeField;
use ark_r1cs_std::{alloc::AllocVar, boolean::Boolean, fields::fp::FpVar, prelude::*};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

/// Whole bytes that always fit below the modulus of `F`
pub fn bytes_per_element<F: PrimeField>() -> usize {
    ((F::MODULUS_BIT_SIZE - 1) / 8) as usize
}

/// Number of elements needed to carry `len` bytes
pub fn packed_len<F: PrimeField>(len: usize) -> usize {
    let chunk = bytes_per_element::<F>();
    (len + chunk - 1) / chunk
}

/// Pack bytes into field elements, little-endian within each chunk
pub fn pack_bytes<F: PrimeField>(bytes: &[u8]) -> Vec<F> {
    bytes
        .chunks(bytes_per_element::<F>())
        .map(F::from_le_bytes_mod_order)
        .collect()
}

/// Allocate `len` bytes as packed public inputs
///
/// The instance assignment produced here equals `pack_bytes(bytes)`.
pub fn alloc_public_bytes<F: PrimeField>(
    cs: ConstraintSystemRef<F>,
    bytes: Option<&[u8]>,
    len: usize,
) -> Result<Vec<UInt8<F>>, SynthesisError> {
    let chunk = bytes_per_element::<F>();
    let mut out = Vec::with_capacity(len);

    for start in (0..len).step_by(chunk) {
        let end = usize::min(start + chunk, len);
        let element = FpVar::new_input(cs.clone(), || {
            let part = bytes
                .and_then(|b| b.get(start..end))
                .ok_or(SynthesisError::AssignmentMissing)?;
            Ok(F::from_le_bytes_mod_order(part))
        })?;
        out.extend(regroup(&element.to_bits_le()?, end - start)?);
    }

    Ok(out)
}

/// Read `len` bytes back out of packed elements given as little-endian bits
///
/// `chunk` is the packing width of the field the elements were packed in,
/// which need not be the circuit's own field.
pub fn unpack_bytes<F: PrimeField>(
    elements: &[Vec<Boolean<F>>],
    len: usize,
    chunk: usize,
) -> Result<Vec<UInt8<F>>, SynthesisError> {
    let needed = (len + chunk - 1) / chunk;
    if elements.len() < needed {
        return Err(SynthesisError::Unsatisfiable);
    }

    let mut out = Vec::with_capacity(len);
    for (i, bits) in elements.iter().take(needed).enumerate() {
        let n_bytes = usize::min(chunk, len - i * chunk);
        out.extend(regroup(bits, n_bytes)?);
    }
    Ok(out)
}

/// Low `n_bytes * 8` bits as bytes; every higher bit must be zero
fn regroup<F: PrimeField>(
    bits: &[Boolean<F>],
    n_bytes: usize,
) -> Result<Vec<UInt8<F>>, SynthesisError> {
    let used = n_bytes * 8;
    if bits.len() < used {
        return Err(SynthesisError::Unsatisfiable);
    }

    for bit in &bits[used..] {
        bit.enforce_equal(&Boolean::FALSE)?;
    }

    Ok(bits[..used].chunks(8).map(UInt8::from_bits_le).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bls12_377::Fr;
    use ark_ff::BigInteger;
    use ark_relations::r1cs::ConstraintSystem;

    #[test]
    fn test_packing_widths() {
        assert_eq!(bytes_per_element::<Fr>(), 31);
        assert_eq!(bytes_per_element::<ark_bw6_761::Fr>(), 47);
        assert_eq!(packed_len::<Fr>(32), 2);
        assert_eq!(packed_len::<ark_bw6_761::Fr>(32), 1);
        assert_eq!(packed_len::<Fr>(31), 1);
    }

    #[test]
    fn test_pack_bytes() {
        let bytes: Vec<u8> = (1..=32).collect();
        let packed = pack_bytes::<Fr>(&bytes);

        assert_eq!(packed.len(), 2);
        assert_eq!(packed[0], Fr::from_le_bytes_mod_order(&bytes[..31]));
        assert_eq!(packed[1], Fr::from(32u64));
    }

    #[test]
    fn test_alloc_public_bytes_matches_native() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let bytes: Vec<u8> = (0..32).map(|i| 0xff - i as u8).collect();

        let vars = alloc_public_bytes(cs.clone(), Some(&bytes), bytes.len()).unwrap();

        let values: Vec<u8> = vars.iter().map(|v| v.value().unwrap()).collect();
        assert_eq!(values, bytes);
        assert_eq!(cs.num_instance_variables(), 1 + 2);

        let instance = cs.borrow().unwrap().instance_assignment.clone();
        assert_eq!(&instance[1..], &pack_bytes::<Fr>(&bytes)[..]);
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_alloc_public_bytes_needs_assignment() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let result = alloc_public_bytes(cs, None, 32);
        assert!(matches!(result, Err(SynthesisError::AssignmentMissing)));
    }

    #[test]
    fn test_unpack_rejects_high_bits() {
        let cs = ConstraintSystem::<Fr>::new_ref();

        // Second element claims one byte, but bit 9 is also set
        let first = vec![Boolean::constant(false); 253];
        let mut second_value = Fr::from(0x0201u64).into_bigint().to_bits_le();
        second_value.truncate(253);
        let second: Vec<Boolean<Fr>> = second_value
            .iter()
            .map(|b| Boolean::new_witness(cs.clone(), || Ok(*b)).unwrap())
            .collect();

        let bytes = unpack_bytes(&[first, second], 32, 31).unwrap();
        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes[31].value().unwrap(), 0x01);
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_unpack_too_few_elements() {
        let bits = vec![vec![Boolean::<Fr>::constant(false); 253]];
        assert!(unpack_bytes(&bits, 32, 31).is_err());
    }
}

//! Persisted setup artifacts
//!
//! Each chain position stores three files under one directory:
//! - `{prefix}pk.cbor`: proving key, ark-serialize uncompressed
//! - `{prefix}vk.cbor`: verifying key, ark-serialize uncompressed
//! - `{prefix}ccs.cbor`: compiled constraint-system descriptor, bincode
//!
//! The proving key is the presence marker: if it exists the position is
//! loaded, otherwise setup runs and all three files are written.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use ark_ec::pairing::Pairing;
use ark_groth16::{ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, SerializationError};
use tracing::{debug, info};

use super::setup::CompiledCircuit;
use crate::error::StorageError;

/// Keys and descriptor for one chain position
#[derive(Clone, Debug)]
pub struct StoredKeys<E: Pairing> {
    pub compiled: CompiledCircuit,
    pub proving_key: ProvingKey<E>,
    pub verifying_key: VerifyingKey<E>,
}

/// Directory holding the setup artifacts of both positions
#[derive(Clone, Debug)]
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn proving_key_path(&self, prefix: &str) -> PathBuf {
        self.dir.join(format!("{}pk.cbor", prefix))
    }

    pub fn verifying_key_path(&self, prefix: &str) -> PathBuf {
        self.dir.join(format!("{}vk.cbor", prefix))
    }

    pub fn circuit_path(&self, prefix: &str) -> PathBuf {
        self.dir.join(format!("{}ccs.cbor", prefix))
    }

    /// Whether setup already ran for `prefix`
    pub fn has_keys(&self, prefix: &str) -> bool {
        self.proving_key_path(prefix).exists()
    }

    /// Write all three artifacts for `prefix`
    pub fn write<E: Pairing>(
        &self,
        prefix: &str,
        compiled: &CompiledCircuit,
        proving_key: &ProvingKey<E>,
        verifying_key: &VerifyingKey<E>,
    ) -> Result<(), StorageError> {
        let start = Instant::now();
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let ccs_path = self.circuit_path(prefix);
        write_file(&ccs_path, |w| {
            bincode::serialize_into(w, compiled).map_err(|e| e.to_string())
        })?;

        let vk_path = self.verifying_key_path(prefix);
        write_file(&vk_path, |w| {
            verifying_key
                .serialize_uncompressed(w)
                .map_err(|e| e.to_string())
        })?;

        let pk_path = self.proving_key_path(prefix);
        write_file(&pk_path, |w| {
            proving_key
                .serialize_uncompressed(w)
                .map_err(|e| e.to_string())
        })?;

        info!(
            position = %compiled.position(),
            dir = %self.dir.display(),
            elapsed = ?start.elapsed(),
            "exported keys"
        );
        Ok(())
    }

    /// Read all three artifacts for `prefix`
    ///
    /// The verifying key is fully validated. The proving key is a trusted
    /// local artifact and is read without subgroup checks.
    pub fn read<E: Pairing>(&self, prefix: &str) -> Result<StoredKeys<E>, StorageError> {
        let start = Instant::now();

        let ccs_path = self.circuit_path(prefix);
        let compiled: CompiledCircuit = read_file(&ccs_path, |r| {
            bincode::deserialize_from(r).map_err(|e| e.to_string())
        })?;

        let vk_path = self.verifying_key_path(prefix);
        let verifying_key = read_file(&vk_path, |r| {
            VerifyingKey::<E>::deserialize_uncompressed(r).map_err(describe)
        })?;

        let pk_path = self.proving_key_path(prefix);
        let proving_key = read_file(&pk_path, |r| {
            ProvingKey::<E>::deserialize_uncompressed_unchecked(r).map_err(describe)
        })?;

        if proving_key.vk != verifying_key {
            return Err(StorageError::Corrupt {
                path: vk_path,
                reason: "verifying key does not match the proving key".to_string(),
            });
        }

        info!(
            position = %compiled.position(),
            dir = %self.dir.display(),
            elapsed = ?start.elapsed(),
            "imported keys"
        );
        Ok(StoredKeys {
            compiled,
            proving_key,
            verifying_key,
        })
    }
}

fn describe(err: SerializationError) -> String {
    err.to_string()
}

fn write_file<F>(path: &Path, encode: F) -> Result<(), StorageError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), String>,
{
    let file = File::create(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    encode(&mut writer).map_err(|reason| StorageError::Corrupt {
        path: path.to_path_buf(),
        reason,
    })?;
    writer.flush().map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "wrote artifact");
    Ok(())
}

fn read_file<T, F>(path: &Path, decode: F) -> Result<T, StorageError>
where
    F: FnOnce(&mut BufReader<File>) -> Result<T, String>,
{
    let file = File::open(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    decode(&mut reader).map_err(|reason| StorageError::Corrupt {
        path: path.to_path_buf(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_groth16::Groth16;
    use ark_snark::SNARK;
    use rand::rngs::OsRng;
    use tempdir::TempDir;

    use crate::proof::base_circuit::{BaseCaseCircuit, BaseCaseShape};
    use crate::proof::encoding::verifying_key_to_bytes;
    use crate::proof::setup::setup_base_case;
    use crate::proof::witness::create_base_case_full_witness;
    use crate::proof::InnerCurve;
    use crate::tx::TxId;

    fn base_keys() -> StoredKeys<InnerCurve> {
        let (compiled, proving_key, verifying_key) =
            setup_base_case(BaseCaseShape::new(40, false), &mut OsRng).unwrap();
        StoredKeys {
            compiled,
            proving_key,
            verifying_key,
        }
    }

    fn write_keys(store: &KeyStore, prefix: &str, keys: &StoredKeys<InnerCurve>) {
        store
            .write(prefix, &keys.compiled, &keys.proving_key, &keys.verifying_key)
            .unwrap();
    }

    #[test]
    fn test_paths() {
        let store = KeyStore::new("/keys");
        assert_eq!(store.proving_key_path("base_"), PathBuf::from("/keys/base_pk.cbor"));
        assert_eq!(store.verifying_key_path("base_"), PathBuf::from("/keys/base_vk.cbor"));
        assert_eq!(store.circuit_path("norm_"), PathBuf::from("/keys/norm_ccs.cbor"));
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new("txivc-keys").unwrap();
        let store = KeyStore::new(dir.path().join("nested"));
        let keys = base_keys();

        assert!(!store.has_keys("base_"));
        write_keys(&store, "base_", &keys);
        assert!(store.has_keys("base_"));
        assert!(!store.has_keys("norm_"));

        let loaded: StoredKeys<InnerCurve> = store.read("base_").unwrap();
        assert_eq!(loaded.compiled, keys.compiled);
        assert_eq!(
            verifying_key_to_bytes(&loaded.verifying_key).unwrap(),
            verifying_key_to_bytes(&keys.verifying_key).unwrap()
        );

        // A proof from the written key verifies under the reloaded one
        let raw = [7u8; 40];
        let witness = create_base_case_full_witness(&raw, TxId::compute(&raw), false);
        let public = witness.public();
        let circuit = BaseCaseCircuit::new(BaseCaseShape::new(40, false), witness).unwrap();
        let proof = Groth16::<InnerCurve>::prove(&keys.proving_key, circuit, &mut OsRng).unwrap();

        let pvk = Groth16::<InnerCurve>::process_vk(&loaded.verifying_key).unwrap();
        assert!(
            Groth16::<InnerCurve>::verify_with_processed_vk(&pvk, public.inputs(), &proof).unwrap()
        );
    }

    #[test]
    fn test_read_missing() {
        let dir = TempDir::new("txivc-keys").unwrap();
        let store = KeyStore::new(dir.path());
        let err = store.read::<InnerCurve>("base_").unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }

    #[test]
    fn test_read_corrupt() {
        let dir = TempDir::new("txivc-keys").unwrap();
        let store = KeyStore::new(dir.path());
        write_keys(&store, "base_", &base_keys());

        let vk_path = store.verifying_key_path("base_");
        let bytes = fs::read(&vk_path).unwrap();
        fs::write(&vk_path, &bytes[..bytes.len() / 2]).unwrap();

        let err = store.read::<InnerCurve>("base_").unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }
}

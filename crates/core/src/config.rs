//! Runtime configuration
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `TXIVC_*` environment variables (for example `TXIVC_KEY_DIR=/var/keys`).
//! Circuit sizes are fixed at setup time; changing them requires new keys.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IvcError, IvcResult};
use crate::proof::{BaseCaseShape, KeyStore, NormalCaseShape};
use crate::tx::TX_ID_LEN;

const ENV_PREFIX: &str = "TXIVC";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofSystemConfig {
    /// Directory holding the key and constraint-system files
    pub key_dir: PathBuf,
    pub base_key_prefix: String,
    pub normal_key_prefix: String,
    /// Byte length of a provable genesis transaction
    pub base_tx_size: usize,
    /// Bytes before the spent txid in a provable spending transaction
    pub normal_prefix_size: usize,
    /// Bytes after the spent txid in a provable spending transaction
    pub normal_postfix_size: usize,
    /// Expose the genesis txid as a token id in base proofs
    pub anchor_token_id: bool,
}

impl Default for ProofSystemConfig {
    fn default() -> Self {
        Self {
            key_dir: PathBuf::from("."),
            base_key_prefix: "base_".to_string(),
            normal_key_prefix: "norm_".to_string(),
            base_tx_size: 191,
            normal_prefix_size: 5,
            normal_postfix_size: 188,
            anchor_token_id: false,
        }
    }
}

impl ProofSystemConfig {
    /// Load defaults, then `path` if given, then the environment
    pub fn load(path: Option<&Path>) -> IvcResult<Self> {
        let defaults = Self::default();

        let mut builder = config::Config::builder()
            .set_default("key_dir", defaults.key_dir.to_string_lossy().into_owned())?
            .set_default("base_key_prefix", defaults.base_key_prefix)?
            .set_default("normal_key_prefix", defaults.normal_key_prefix)?
            .set_default("base_tx_size", defaults.base_tx_size as i64)?
            .set_default("normal_prefix_size", defaults.normal_prefix_size as i64)?
            .set_default("normal_postfix_size", defaults.normal_postfix_size as i64)?
            .set_default("anchor_token_id", defaults.anchor_token_id)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::new(
                &path.to_string_lossy(),
                config::FileFormat::Toml,
            ));
        }

        // allow ENV to override
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let loaded: Self = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> IvcResult<()> {
        let sizes = [
            ("base_tx_size", self.base_tx_size),
            ("normal_prefix_size", self.normal_prefix_size),
            ("normal_postfix_size", self.normal_postfix_size),
        ];
        for (name, size) in sizes {
            if size == 0 {
                return Err(IvcError::Configuration(format!("{} must be positive", name)));
            }
        }
        if self.base_key_prefix == self.normal_key_prefix {
            return Err(IvcError::Configuration(
                "base and normal key prefixes must differ".to_string(),
            ));
        }
        Ok(())
    }

    pub fn key_store(&self) -> KeyStore {
        KeyStore::new(&self.key_dir)
    }

    pub fn base_shape(&self) -> BaseCaseShape {
        BaseCaseShape::new(self.base_tx_size, self.anchor_token_id)
    }

    pub fn normal_shape(&self) -> NormalCaseShape {
        NormalCaseShape::new(
            self.normal_prefix_size,
            self.normal_postfix_size,
            self.base_shape().num_public_inputs(),
        )
    }

    /// Byte length of a provable spending transaction
    pub fn normal_tx_size(&self) -> usize {
        self.normal_prefix_size + TX_ID_LEN + self.normal_postfix_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempdir::TempDir;

    #[test]
    fn test_defaults_match_reference_transactions() {
        let config = ProofSystemConfig::default();
        assert_eq!(config.base_tx_size, 191);
        assert_eq!(config.normal_tx_size(), 225);
        assert_eq!(config.base_shape().num_public_inputs(), 2);
        assert_eq!(config.normal_shape().parent_inputs, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new("txivc-config").unwrap();
        let path = dir.path().join("txivc.toml");
        fs::write(
            &path,
            "key_dir = \"/var/lib/txivc\"\nbase_tx_size = 250\nanchor_token_id = true\n",
        )
        .unwrap();

        let config = ProofSystemConfig::load(Some(&path)).unwrap();
        assert_eq!(config.key_dir, PathBuf::from("/var/lib/txivc"));
        assert_eq!(config.base_tx_size, 250);
        assert!(config.anchor_token_id);
        assert_eq!(config.normal_shape().parent_inputs, 4);
        assert_eq!(config.base_key_prefix, "base_");
    }

    #[test]
    fn test_validate() {
        let mut config = ProofSystemConfig::default();
        config.normal_postfix_size = 0;
        assert!(matches!(config.validate(), Err(IvcError::Configuration(_))));

        let mut config = ProofSystemConfig::default();
        config.normal_key_prefix = config.base_key_prefix.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = ProofSystemConfig::load(Some(Path::new("/nonexistent/txivc.toml")));
        assert!(matches!(result, Err(IvcError::Configuration(_))));
    }
}

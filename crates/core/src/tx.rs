//! Transaction ids and prevout slicing
//!
//! A transaction id here is the raw double SHA-256 digest of the serialized
//! transaction, in digest byte order (not the reversed display order used by
//! block explorers).
//!
//! `slice_tx` splits a serialized transaction around the 32-byte previous
//! transaction id referenced by one of its inputs:
//!
//! ```text
//! version(4) | varint(n_inputs) | input_0 | ... | input_k.prev_txid(32) | rest
//! \___________________ prefix ____________________/                      \ postfix /
//! ```

use std::fmt;
use std::io::{Cursor, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::{validation, ShapeError};

/// Length of a transaction id in bytes
pub const TX_ID_LEN: usize = 32;

/// prev_txid (32) + vout (4)
const OUTPOINT_LEN: u64 = 36;
const SEQUENCE_LEN: u64 = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxError {
    #[error("Input index {index} is outside of the range of {count} available inputs")]
    InputIndexOutOfRange { index: usize, count: u64 },
    #[error("Transaction truncated while reading {0}")]
    Truncated(&'static str),
}

/// Double SHA-256 of `bytes`
pub fn sha256d(bytes: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(bytes);
    Sha256::digest(first).into()
}

/// A 32-byte transaction id
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxId([u8; TX_ID_LEN]);

impl TxId {
    /// Compute the id of a serialized transaction
    pub fn compute(raw_tx: &[u8]) -> Self {
        Self(sha256d(raw_tx))
    }

    pub fn from_bytes(bytes: [u8; TX_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Build from a slice, failing unless it is exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ShapeError> {
        validation::hash32("txid", bytes).map(Self)
    }

    /// Parse from hex in digest byte order
    pub fn from_hex(s: &str) -> Result<Self, crate::IvcError> {
        let bytes = hex::decode(s)?;
        Ok(Self::from_slice(&bytes)?)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; TX_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({})", self.to_hex())
    }
}

/// A transaction split around one input's previous transaction id
///
/// `prefix ++ prev_tx_id ++ postfix` is the full serialization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxLinkage {
    pub prefix: Vec<u8>,
    pub prev_tx_id: TxId,
    pub postfix: Vec<u8>,
}

impl TxLinkage {
    /// Concatenate the three parts back into the serialized transaction
    pub fn reassemble(&self) -> Vec<u8> {
        let mut raw = Vec::with_capacity(self.prefix.len() + TX_ID_LEN + self.postfix.len());
        raw.extend_from_slice(&self.prefix);
        raw.extend_from_slice(self.prev_tx_id.as_bytes());
        raw.extend_from_slice(&self.postfix);
        raw
    }
}

/// Split `raw_tx` around the previous txid of input `input_index`
pub fn slice_tx(raw_tx: &[u8], input_index: usize) -> Result<TxLinkage, TxError> {
    let mut reader = Cursor::new(raw_tx);

    reader
        .read_u32::<LittleEndian>()
        .map_err(|_| TxError::Truncated("version"))?;

    let count = read_varint(&mut reader, "input count")?;
    if input_index as u64 >= count {
        return Err(TxError::InputIndexOutOfRange {
            index: input_index,
            count,
        });
    }

    for _ in 0..input_index {
        skip(&mut reader, OUTPOINT_LEN, "outpoint")?;
        let script_len = read_varint(&mut reader, "script length")?;
        skip(&mut reader, script_len, "unlocking script")?;
        skip(&mut reader, SEQUENCE_LEN, "sequence")?;
    }

    let start = reader.position() as usize;
    let mut prev_tx_id = [0u8; TX_ID_LEN];
    reader
        .read_exact(&mut prev_tx_id)
        .map_err(|_| TxError::Truncated("previous txid"))?;

    Ok(TxLinkage {
        prefix: raw_tx[..start].to_vec(),
        prev_tx_id: TxId(prev_tx_id),
        postfix: raw_tx[start + TX_ID_LEN..].to_vec(),
    })
}

/// Bitcoin variable-length integer
fn read_varint(reader: &mut Cursor<&[u8]>, what: &'static str) -> Result<u64, TxError> {
    let truncated = |_| TxError::Truncated(what);
    let value = match reader.read_u8().map_err(truncated)? {
        0xfd => u64::from(reader.read_u16::<LittleEndian>().map_err(truncated)?),
        0xfe => u64::from(reader.read_u32::<LittleEndian>().map_err(truncated)?),
        0xff => reader.read_u64::<LittleEndian>().map_err(truncated)?,
        n => u64::from(n),
    };
    Ok(value)
}

fn skip(reader: &mut Cursor<&[u8]>, len: u64, what: &'static str) -> Result<(), TxError> {
    let remaining = reader.get_ref().len() as u64 - reader.position();
    if len > remaining {
        return Err(TxError::Truncated(what));
    }
    reader
        .seek(SeekFrom::Current(len as i64))
        .map_err(|_| TxError::Truncated(what))?;
    Ok(())
}

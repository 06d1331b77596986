//! FVE metadata blocks.
//!
//! Each metadata block copy has this layout:
//!
//! ```text
//! [block header: 64 bytes][metadata header: 48 bytes][datums ...]
//! ```
//!
//! - **Block header**: `-FVE-FS-` signature, format version (1 = Vista,
//!   2 = Windows 7+), current and next volume state.
//! - **Metadata header**: total metadata size (header included), volume
//!   GUID, next nonce counter, encryption method, creation FILETIME.
//! - **Datums**: VMK entries (one per key protector), the sealed FVEK,
//!   the volume description and assorted bookkeeping.

use std::fmt;
use std::io::{Read, Seek, SeekFrom};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::datum::{self, entry, DatumValue};
use super::protector::KeyProtector;
use super::{filetime_to_utc, read_guid, read_u16, read_u32, read_u64};
use crate::crypto::Sealed;
use crate::errors::BackendError;

/// Signature at the start of every metadata block.
pub const BLOCK_SIGNATURE: &[u8; 8] = b"-FVE-FS-";

/// Size of the block header preceding the metadata header.
pub const BLOCK_HEADER_LEN: usize = 64;

/// Size of the metadata header preceding the datums.
pub const METADATA_HEADER_LEN: usize = 48;

/// Upper bound on the metadata size we are willing to read.
const MAX_METADATA_LEN: usize = 0x10_000;

/// Encryption state recorded in the block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeState {
    Null,
    Decrypted,
    SwitchingEncryption,
    EowActivated,
    Encrypted,
    SwitchEncryptionPaused,
    Unknown(u16),
}

impl VolumeState {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => Self::Null,
            1 => Self::Decrypted,
            2 => Self::SwitchingEncryption,
            3 => Self::EowActivated,
            4 => Self::Encrypted,
            5 => Self::SwitchEncryptionPaused,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for VolumeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Decrypted => f.write_str("decrypted"),
            Self::SwitchingEncryption => f.write_str("encryption or decryption in progress"),
            Self::EowActivated => f.write_str("encrypt-on-write activated"),
            Self::Encrypted => f.write_str("encrypted"),
            Self::SwitchEncryptionPaused => f.write_str("encryption paused"),
            Self::Unknown(raw) => write!(f, "unknown state {raw}"),
        }
    }
}

/// Everything decoded from one metadata block.
#[derive(Debug, Clone)]
pub struct FveMetadata {
    pub version: u16,
    pub state: VolumeState,
    pub next_state: VolumeState,
    pub encrypted_size: u64,
    pub volume_guid: Uuid,
    pub next_nonce_counter: u32,
    pub encryption_method: u16,
    pub created: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub protectors: Vec<KeyProtector>,
    pub sealed_fvek: Option<Sealed>,
}

impl FveMetadata {
    /// An empty, encrypted-state metadata set (for building by hand).
    pub fn new(volume_guid: Uuid) -> Self {
        Self {
            version: 2,
            state: VolumeState::Encrypted,
            next_state: VolumeState::Encrypted,
            encrypted_size: 0,
            volume_guid,
            next_nonce_counter: 0,
            encryption_method: 0,
            created: None,
            description: None,
            protectors: Vec::new(),
            sealed_fvek: None,
        }
    }

    /// Decode a block from its raw bytes (headers and datums).
    pub fn parse(block: &[u8]) -> Result<Self, BackendError> {
        let (version, state, next_state, encrypted_size) = parse_block_header(block)?;
        let metadata_len = metadata_len(block)?;
        if block.len() < BLOCK_HEADER_LEN + metadata_len {
            return Err(BackendError::InvalidMetadata(format!(
                "metadata claims {metadata_len} bytes, block has {}",
                block.len() - BLOCK_HEADER_LEN
            )));
        }

        let header = &block[BLOCK_HEADER_LEN..];
        let volume_guid = read_guid(header, 16)?;
        let next_nonce_counter = read_u32(header, 32)?;
        let encryption_method = read_u16(header, 36)?;
        let created = filetime_to_utc(read_u64(header, 40)?);

        let datums = datum::parse_list(&header[METADATA_HEADER_LEN..metadata_len])?;

        let mut metadata = Self {
            version,
            state,
            next_state,
            encrypted_size,
            volume_guid,
            next_nonce_counter,
            encryption_method,
            created,
            ..Self::new(volume_guid)
        };

        for datum in &datums {
            match (datum.entry_type, &datum.value) {
                (entry::VMK, DatumValue::Vmk { .. }) => {
                    if let Some(protector) = KeyProtector::from_datum(datum) {
                        debug!(guid = %protector.guid, kind = %protector.kind, "found key protector");
                        metadata.protectors.push(protector);
                    }
                }
                (entry::FVEK, DatumValue::AesCcm(sealed)) => {
                    metadata.sealed_fvek = Some(sealed.clone());
                }
                (entry::DESCRIPTION, DatumValue::Unicode(text)) => {
                    metadata.description = Some(text.clone());
                }
                _ => {}
            }
        }

        Ok(metadata)
    }

    /// Read and decode the metadata block at `offset`.
    pub fn read_from<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<Self, BackendError> {
        let io = |source: std::io::Error| {
            BackendError::InvalidMetadata(format!("read at 0x{offset:x}: {source}"))
        };

        let mut block = vec![0u8; BLOCK_HEADER_LEN + METADATA_HEADER_LEN];
        reader.seek(SeekFrom::Start(offset)).map_err(io)?;
        reader.read_exact(&mut block).map_err(io)?;

        parse_block_header(&block)?;
        let metadata_len = metadata_len(&block)?;

        block.resize(BLOCK_HEADER_LEN + metadata_len, 0);
        reader
            .read_exact(&mut block[BLOCK_HEADER_LEN + METADATA_HEADER_LEN..])
            .map_err(io)?;

        Self::parse(&block)
    }
}

fn parse_block_header(block: &[u8]) -> Result<(u16, VolumeState, VolumeState, u64), BackendError> {
    if block.get(..8) != Some(&BLOCK_SIGNATURE[..]) {
        return Err(BackendError::InvalidMetadata(
            "missing -FVE-FS- block signature".into(),
        ));
    }

    let version = read_u16(block, 10)?;
    if version != 1 && version != 2 {
        return Err(BackendError::InvalidMetadata(format!(
            "unsupported metadata version {version}"
        )));
    }

    let state = VolumeState::from_raw(read_u16(block, 12)?);
    let next_state = VolumeState::from_raw(read_u16(block, 14)?);
    let encrypted_size = read_u64(block, 16)?;
    Ok((version, state, next_state, encrypted_size))
}

/// Metadata size from the metadata header, validated.
fn metadata_len(block: &[u8]) -> Result<usize, BackendError> {
    let len = read_u32(block, BLOCK_HEADER_LEN)? as usize;
    if !(METADATA_HEADER_LEN..=MAX_METADATA_LEN).contains(&len) {
        return Err(BackendError::InvalidMetadata(format!(
            "implausible metadata size {len}"
        )));
    }
    Ok(len)
}

//! External key (`.BEK`) files.
//!
//! A BEK file is what Windows writes to a USB stick for the startup-key
//! protector. It carries a 48-byte header shaped like the metadata header
//! (the GUID at offset 16 names the protector it unlocks), followed by an
//! external-key datum whose nested key datum holds the 32-byte unwrap key.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::datum::{self, DatumValue};
use super::{filetime_to_utc, read_guid, read_u32, read_u64};
use crate::errors::BackendError;

/// Size of the BEK header preceding the datums.
const HEADER_LEN: usize = 48;

/// Length of the key held by a startup-key protector.
const KEY_LEN: usize = 32;

/// BEK files are tiny; anything larger is not one.
const MAX_FILE_LEN: u64 = 0x10_000;

/// A decoded external key file.
pub struct BekFile {
    /// GUID of the key protector this file unlocks.
    pub guid: Uuid,
    pub created: Option<DateTime<Utc>>,
    pub key: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for BekFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BekFile")
            .field("guid", &self.guid)
            .field("created", &self.created)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl BekFile {
    /// Load and decode a BEK file from disk.
    pub fn load(path: &Path) -> Result<Self, BackendError> {
        let io = |source: std::io::Error| BackendError::Io {
            path: path.to_path_buf(),
            source,
        };

        let len = fs::metadata(path).map_err(io)?.len();
        if len > MAX_FILE_LEN {
            return Err(BackendError::BekFile(format!(
                "{} is {len} bytes, too large for a BEK file",
                path.display()
            )));
        }

        let data = Zeroizing::new(fs::read(path).map_err(io)?);
        Self::parse(&data)
    }

    /// Decode the raw bytes of a BEK file.
    pub fn parse(data: &[u8]) -> Result<Self, BackendError> {
        let bad = |e: BackendError| BackendError::BekFile(e.to_string());

        if data.len() < HEADER_LEN {
            return Err(BackendError::BekFile(format!(
                "file is {} bytes, shorter than the {HEADER_LEN}-byte header",
                data.len()
            )));
        }

        let size = read_u32(data, 0).map_err(bad)? as usize;
        if size < HEADER_LEN || size > data.len() {
            return Err(BackendError::BekFile(format!(
                "header claims {size} bytes, file has {}",
                data.len()
            )));
        }

        let guid = read_guid(data, 16).map_err(bad)?;
        let created = filetime_to_utc(read_u64(data, 40).map_err(bad)?);
        let datums = datum::parse_list(&data[HEADER_LEN..size]).map_err(bad)?;

        let key = datums
            .iter()
            .find_map(|d| match &d.value {
                DatumValue::External { nested, .. } => datum::find_key(nested),
                _ => None,
            })
            .map(|(_, key)| key)
            .ok_or_else(|| BackendError::BekFile("no external key entry".into()))?;

        if key.len() != KEY_LEN {
            return Err(BackendError::BekFile(format!(
                "external key is {} bytes, expected {KEY_LEN}",
                key.len()
            )));
        }

        Ok(Self {
            guid,
            created,
            key: Zeroizing::new(key.to_vec()),
        })
    }
}

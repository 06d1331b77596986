//! The datum encoding used by FVE metadata entries.
//!
//! Every datum starts with an 8-byte header:
//!
//! ```text
//! [size: u16][entry_type: u16][value_type: u16][version: u16]
//! ```
//!
//! `size` covers the header, the value and any nested datums. Some value
//! types (stretch key, use key, VMK, external key) end with a list of
//! nested datums that fills the rest of `size`.

use uuid::Uuid;
use zeroize::Zeroizing;

use super::{read_array, read_guid, read_u16, read_u64};
use crate::crypto::aes_ccm::{MAC_LEN, NONCE_LEN};
use crate::crypto::Sealed;
use crate::errors::BackendError;

/// Size of the common datum header.
pub const HEADER_LEN: usize = 8;

/// Entry types (what the datum is for).
pub mod entry {
    pub const PROPERTY: u16 = 0x0000;
    pub const VMK: u16 = 0x0002;
    pub const FVEK: u16 = 0x0003;
    pub const VALIDATION: u16 = 0x0004;
    pub const STARTUP_KEY: u16 = 0x0006;
    pub const DESCRIPTION: u16 = 0x0007;
    pub const FVEK_BACKUP: u16 = 0x000b;
    pub const VOLUME_HEADER_BLOCK: u16 = 0x000f;
}

/// Value types (how the datum is encoded).
pub mod value {
    pub const ERASED: u16 = 0x0000;
    pub const KEY: u16 = 0x0001;
    pub const UNICODE: u16 = 0x0002;
    pub const STRETCH_KEY: u16 = 0x0003;
    pub const USE_KEY: u16 = 0x0004;
    pub const AES_CCM: u16 = 0x0005;
    pub const TPM_ENCODED: u16 = 0x0006;
    pub const VALIDATION: u16 = 0x0007;
    pub const VMK: u16 = 0x0008;
    pub const EXTERNAL_KEY: u16 = 0x0009;
}

/// A decoded datum.
#[derive(Debug, Clone)]
pub struct Datum {
    pub entry_type: u16,
    pub value: DatumValue,
}

/// Typed datum payloads. Types this tool never needs stay raw.
#[derive(Debug, Clone)]
pub enum DatumValue {
    Erased,
    Key {
        algorithm: u16,
        key: Zeroizing<Vec<u8>>,
    },
    Unicode(String),
    StretchKey {
        algorithm: u16,
        salt: [u8; 16],
        nested: Vec<Datum>,
    },
    UseKey {
        algorithm: u16,
        nested: Vec<Datum>,
    },
    AesCcm(Sealed),
    Vmk {
        guid: Uuid,
        last_change: u64,
        protection: u16,
        nested: Vec<Datum>,
    },
    External {
        guid: Uuid,
        last_change: u64,
        nested: Vec<Datum>,
    },
    Other {
        value_type: u16,
        data: Vec<u8>,
    },
}

impl Datum {
    /// Datums nested inside this one (empty for leaf types).
    pub fn nested(&self) -> &[Datum] {
        match &self.value {
            DatumValue::StretchKey { nested, .. }
            | DatumValue::UseKey { nested, .. }
            | DatumValue::Vmk { nested, .. }
            | DatumValue::External { nested, .. } => nested,
            _ => &[],
        }
    }
}

/// First sealed payload among `datums`.
pub fn find_sealed(datums: &[Datum]) -> Option<&Sealed> {
    datums.iter().find_map(|d| match &d.value {
        DatumValue::AesCcm(sealed) => Some(sealed),
        _ => None,
    })
}

/// First key among `datums`.
pub fn find_key(datums: &[Datum]) -> Option<(u16, &[u8])> {
    datums.iter().find_map(|d| match &d.value {
        DatumValue::Key { algorithm, key } => Some((*algorithm, key.as_slice())),
        _ => None,
    })
}

/// Parse a sequence of datums filling `buf`.
///
/// A zero size marks trailing padding and ends the list.
pub fn parse_list(buf: &[u8]) -> Result<Vec<Datum>, BackendError> {
    let mut datums = Vec::new();
    let mut offset = 0usize;

    while offset + HEADER_LEN <= buf.len() {
        let size = usize::from(read_u16(buf, offset)?);
        if size == 0 {
            break;
        }
        if size < HEADER_LEN || offset + size > buf.len() {
            return Err(BackendError::InvalidMetadata(format!(
                "datum at 0x{offset:x} has size {size}, {} bytes remain",
                buf.len() - offset
            )));
        }
        datums.push(parse_one(&buf[offset..offset + size])?);
        offset += size;
    }

    Ok(datums)
}

/// Parse a single datum from the start of `buf`, ignoring trailing bytes.
pub fn parse_single(buf: &[u8]) -> Result<Datum, BackendError> {
    let size = usize::from(read_u16(buf, 0)?);
    if size < HEADER_LEN || size > buf.len() {
        return Err(BackendError::InvalidMetadata(format!(
            "datum size {size} does not fit a {}-byte buffer",
            buf.len()
        )));
    }
    parse_one(&buf[..size])
}

/// Decode a decrypted payload that must hold a key datum.
pub fn parse_key_payload(plain: &[u8]) -> Result<(u16, Zeroizing<Vec<u8>>), BackendError> {
    match parse_single(plain)?.value {
        DatumValue::Key { algorithm, key } => Ok((algorithm, key)),
        other => Err(BackendError::InvalidKey(format!(
            "expected a key datum, found {}",
            kind_name(&other)
        ))),
    }
}

/// `buf` is exactly one datum.
fn parse_one(buf: &[u8]) -> Result<Datum, BackendError> {
    let entry_type = read_u16(buf, 2)?;
    let value_type = read_u16(buf, 4)?;

    let need = |min: usize| -> Result<(), BackendError> {
        if buf.len() < min {
            Err(BackendError::InvalidMetadata(format!(
                "datum of value type {value_type} needs {min} bytes, has {}",
                buf.len()
            )))
        } else {
            Ok(())
        }
    };

    let value = match value_type {
        value::ERASED => DatumValue::Erased,
        value::KEY => {
            need(12)?;
            DatumValue::Key {
                algorithm: read_u16(buf, 8)?,
                key: Zeroizing::new(buf[12..].to_vec()),
            }
        }
        value::UNICODE => DatumValue::Unicode(decode_utf16(&buf[HEADER_LEN..])),
        value::STRETCH_KEY => {
            need(28)?;
            DatumValue::StretchKey {
                algorithm: read_u16(buf, 8)?,
                salt: read_array::<16>(buf, 12)?,
                nested: parse_list(&buf[28..])?,
            }
        }
        value::USE_KEY => {
            need(12)?;
            DatumValue::UseKey {
                algorithm: read_u16(buf, 8)?,
                nested: parse_list(&buf[12..])?,
            }
        }
        value::AES_CCM => {
            need(HEADER_LEN + NONCE_LEN + MAC_LEN)?;
            DatumValue::AesCcm(Sealed {
                nonce: read_array::<NONCE_LEN>(buf, 8)?,
                mac: read_array::<MAC_LEN>(buf, 20)?,
                payload: buf[36..].to_vec(),
            })
        }
        value::VMK => {
            need(36)?;
            DatumValue::Vmk {
                guid: read_guid(buf, 8)?,
                last_change: read_u64(buf, 24)?,
                protection: read_u16(buf, 34)?,
                nested: parse_list(&buf[36..])?,
            }
        }
        value::EXTERNAL_KEY => {
            need(32)?;
            DatumValue::External {
                guid: read_guid(buf, 8)?,
                last_change: read_u64(buf, 24)?,
                nested: parse_list(&buf[32..])?,
            }
        }
        other => DatumValue::Other {
            value_type: other,
            data: buf[HEADER_LEN..].to_vec(),
        },
    };

    Ok(Datum { entry_type, value })
}

fn decode_utf16(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

fn kind_name(value: &DatumValue) -> &'static str {
    match value {
        DatumValue::Erased => "erased",
        DatumValue::Key { .. } => "key",
        DatumValue::Unicode(_) => "unicode",
        DatumValue::StretchKey { .. } => "stretch key",
        DatumValue::UseKey { .. } => "use key",
        DatumValue::AesCcm(_) => "AES-CCM",
        DatumValue::Vmk { .. } => "VMK",
        DatumValue::External { .. } => "external key",
        DatumValue::Other { .. } => "unknown",
    }
}

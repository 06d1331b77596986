//! Key protectors decoded from VMK metadata entries.
//!
//! Each VMK entry wraps the volume master key under one secret. Its nested
//! datums carry what is needed to unwrap it:
//!
//! - clear key: a key datum holding the unwrap key in the clear
//! - recovery/user password: a stretch-key datum holding the salt (and, for
//!   the recovery password, the recovery key sealed under the VMK)
//! - startup key: nothing extra; the key comes from the matching BEK file
//!
//! In every case the first top-level AES-CCM datum is the sealed VMK.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::datum::{self, Datum, DatumValue};
use super::filetime_to_utc;
use crate::crypto::{self, RecoveryKey, Sealed, VolumeMasterKey};
use crate::errors::BackendError;

/// What kind of secret protects a VMK entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectorKind {
    ClearKey,
    Tpm,
    StartupKey,
    TpmAndPin,
    RecoveryPassword,
    Password,
    Other(u16),
}

impl ProtectorKind {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0x0000 => Self::ClearKey,
            0x0100 => Self::Tpm,
            0x0200 => Self::StartupKey,
            0x0500 => Self::TpmAndPin,
            0x0800 => Self::RecoveryPassword,
            0x2000 => Self::Password,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for ProtectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClearKey => f.write_str("clear key"),
            Self::Tpm => f.write_str("TPM"),
            Self::StartupKey => f.write_str("startup key"),
            Self::TpmAndPin => f.write_str("TPM and PIN"),
            Self::RecoveryPassword => f.write_str("recovery password"),
            Self::Password => f.write_str("user password"),
            Self::Other(raw) => write!(f, "protector 0x{raw:04x}"),
        }
    }
}

/// One decoded key protector.
#[derive(Debug, Clone)]
pub struct KeyProtector {
    pub guid: Uuid,
    pub kind: ProtectorKind,
    pub last_change: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub stretch_salt: Option<[u8; 16]>,
    pub clear_key: Option<Zeroizing<Vec<u8>>>,
    pub sealed_vmk: Option<Sealed>,
    pub sealed_recovery_key: Option<Sealed>,
}

impl KeyProtector {
    /// A protector with no key material attached.
    pub fn new(guid: Uuid, kind: ProtectorKind) -> Self {
        Self {
            guid,
            kind,
            last_change: None,
            description: None,
            stretch_salt: None,
            clear_key: None,
            sealed_vmk: None,
            sealed_recovery_key: None,
        }
    }

    /// Decode a VMK datum. Returns `None` for any other datum.
    pub fn from_datum(datum: &Datum) -> Option<Self> {
        let DatumValue::Vmk {
            guid,
            last_change,
            protection,
            nested,
        } = &datum.value
        else {
            return None;
        };

        let mut protector = Self::new(*guid, ProtectorKind::from_raw(*protection));
        protector.last_change = filetime_to_utc(*last_change);
        protector.sealed_vmk = datum::find_sealed(nested).cloned();
        protector.clear_key = datum::find_key(nested).map(|(_, key)| Zeroizing::new(key.to_vec()));

        for child in nested {
            match &child.value {
                DatumValue::Unicode(text) if protector.description.is_none() => {
                    protector.description = Some(text.clone());
                }
                DatumValue::StretchKey { salt, nested, .. } => {
                    protector.stretch_salt = Some(*salt);
                    protector.sealed_recovery_key = datum::find_sealed(nested).cloned();
                }
                _ => {}
            }
        }

        Some(protector)
    }

    /// Open the sealed VMK with the key derived from this protector's secret.
    pub fn open_vmk(&self, unwrap_key: &[u8]) -> Result<VolumeMasterKey, BackendError> {
        let sealed = self
            .sealed_vmk
            .as_ref()
            .ok_or(BackendError::MissingEntry("sealed VMK"))?;

        let plain = crypto::open(unwrap_key, sealed)?;
        let (_, key) = datum::parse_key_payload(&plain)?;
        VolumeMasterKey::from_slice(&key).ok_or_else(|| {
            BackendError::InvalidKey(format!("VMK is {} bytes, expected 32", key.len()))
        })
    }

    /// Open the recovery key sealed under the VMK.
    ///
    /// Only recovery-password protectors carry one.
    pub fn open_recovery_key(&self, vmk: &[u8]) -> Result<RecoveryKey, BackendError> {
        let sealed = self
            .sealed_recovery_key
            .as_ref()
            .ok_or(BackendError::MissingEntry("sealed recovery key"))?;

        let plain = crypto::open(vmk, sealed)?;
        let (_, key) = datum::parse_key_payload(&plain)?;
        let bytes: [u8; 16] = key.as_slice().try_into().map_err(|_| {
            BackendError::InvalidKey(format!("recovery key is {} bytes, expected 16", key.len()))
        })?;
        Ok(RecoveryKey::new(bytes))
    }
}

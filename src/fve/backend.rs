//! The disk-backed [`Backend`].

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::{debug, info, warn};

use super::bek::BekFile;
use super::datum;
use super::metadata::FveMetadata;
use super::protector::{KeyProtector, ProtectorKind};
use super::volume::{VolumeHeader, SECTOR_LEN};
use crate::backend::{Backend, Secret};
use crate::crypto::{self, EncryptionMethod, FullVolumeKey, RecoveryPassword, VolumeMasterKey};
use crate::errors::BackendError;

/// Reads FVE metadata from a volume image or block device and unwraps keys
/// with the crypto primitives in [`crate::crypto`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FveBackend;

impl FveBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for FveBackend {
    fn read_metadata(&self, volume: &Path) -> Result<FveMetadata, BackendError> {
        let io = |source: std::io::Error| BackendError::Io {
            path: volume.to_path_buf(),
            source,
        };

        let file = File::open(volume).map_err(io)?;
        let mut reader = BufReader::new(file);

        let mut sector = Vec::with_capacity(SECTOR_LEN);
        reader
            .by_ref()
            .take(SECTOR_LEN as u64)
            .read_to_end(&mut sector)
            .map_err(io)?;

        let header = VolumeHeader::parse(&sector)?;
        debug!(kind = ?header.kind, copies = header.metadata_offsets.len(), "read volume header");

        for (copy, &offset) in header.metadata_offsets.iter().enumerate() {
            match FveMetadata::read_from(&mut reader, offset) {
                Ok(metadata) => {
                    info!(
                        copy,
                        offset,
                        protectors = metadata.protectors.len(),
                        state = %metadata.state,
                        "using FVE metadata block"
                    );
                    return Ok(metadata);
                }
                Err(e) => {
                    warn!(copy, offset, "skipping metadata block: {e}");
                }
            }
        }

        Err(BackendError::NoUsableMetadata(header.metadata_offsets.len()))
    }

    fn unwrap_vmk(
        &self,
        metadata: &FveMetadata,
        secret: &Secret<'_>,
    ) -> Result<VolumeMasterKey, BackendError> {
        match *secret {
            Secret::ClearKey => {
                try_protectors(metadata, ProtectorKind::ClearKey, secret.name(), |p| {
                    let key = p
                        .clear_key
                        .as_ref()
                        .ok_or(BackendError::MissingEntry("clear key"))?;
                    p.open_vmk(key)
                })
            }
            Secret::RecoveryPassword(password) => {
                let recovery_key = RecoveryPassword::parse_key(password)?;
                try_protectors(metadata, ProtectorKind::RecoveryPassword, secret.name(), |p| {
                    let salt = p
                        .stretch_salt
                        .as_ref()
                        .ok_or(BackendError::MissingEntry("stretch key"))?;
                    p.open_vmk(crypto::recovery_password_key(&recovery_key, salt).as_slice())
                })
            }
            Secret::UserPassword(password) => {
                try_protectors(metadata, ProtectorKind::Password, secret.name(), |p| {
                    let salt = p
                        .stretch_salt
                        .as_ref()
                        .ok_or(BackendError::MissingEntry("stretch key"))?;
                    p.open_vmk(crypto::user_password_key(password, salt).as_slice())
                })
            }
            Secret::BekFile(path) => {
                let bek = BekFile::load(path)?;
                let protector = metadata
                    .protectors
                    .iter()
                    .find(|p| p.guid == bek.guid)
                    .ok_or(BackendError::NoMatchingProtector("startup key"))?;
                debug!(guid = %protector.guid, kind = %protector.kind, "BEK file matches protector");
                protector.open_vmk(&bek.key)
            }
        }
    }

    fn unwrap_fvek(
        &self,
        metadata: &FveMetadata,
        vmk: &VolumeMasterKey,
    ) -> Result<FullVolumeKey, BackendError> {
        let sealed = metadata
            .sealed_fvek
            .as_ref()
            .ok_or(BackendError::MissingEntry("FVEK"))?;

        let plain = crypto::open(vmk.as_bytes(), sealed)?;
        let (algorithm, key) = datum::parse_key_payload(&plain)?;
        let method =
            EncryptionMethod::from_id(algorithm).ok_or(BackendError::UnsupportedEncryption(algorithm))?;

        if algorithm != metadata.encryption_method {
            warn!(
                "FVEK algorithm 0x{algorithm:04x} differs from metadata header 0x{:04x}",
                metadata.encryption_method
            );
        }
        debug!(%method, "unwrapped FVEK");

        Ok(FullVolumeKey { method, key })
    }

    fn check_decryption(
        &self,
        _metadata: &FveMetadata,
        fvek: &FullVolumeKey,
    ) -> Result<(), BackendError> {
        let need = fvek.method.min_key_len();
        if fvek.key.len() < need {
            return Err(BackendError::InvalidKey(format!(
                "{} needs a {need}-byte key, FVEK has {}",
                fvek.method,
                fvek.key.len()
            )));
        }
        Ok(())
    }
}

/// Try `open` on every protector of `kind` until one yields the VMK.
///
/// A failure on one protector moves on to the next; the last failure is
/// returned when none succeeds.
fn try_protectors<F>(
    metadata: &FveMetadata,
    kind: ProtectorKind,
    name: &'static str,
    open: F,
) -> Result<VolumeMasterKey, BackendError>
where
    F: Fn(&KeyProtector) -> Result<VolumeMasterKey, BackendError>,
{
    let mut last_err = BackendError::NoMatchingProtector(name);

    for protector in metadata.protectors.iter().filter(|p| p.kind == kind) {
        match open(protector) {
            Ok(vmk) => {
                debug!(guid = %protector.guid, "unwrapped VMK with {name}");
                return Ok(vmk);
            }
            Err(e) => {
                debug!(guid = %protector.guid, "{name} protector rejected: {e}");
                last_err = e;
            }
        }
    }

    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fve::datum::{entry, value};
    use uuid::Uuid;

    fn key_payload(algorithm: u16, key: &[u8]) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&((12 + key.len()) as u16).to_le_bytes());
        b.extend_from_slice(&entry::PROPERTY.to_le_bytes());
        b.extend_from_slice(&value::KEY.to_le_bytes());
        b.extend_from_slice(&1u16.to_le_bytes());
        b.extend_from_slice(&algorithm.to_le_bytes());
        b.extend_from_slice(&[0, 0]);
        b.extend_from_slice(key);
        b
    }

    fn clear_key_metadata(vmk: &[u8; 32]) -> FveMetadata {
        let clear = [0x33u8; 32];
        let mut protector = KeyProtector::new(Uuid::from_u128(1), ProtectorKind::ClearKey);
        protector.clear_key = Some(zeroize::Zeroizing::new(clear.to_vec()));
        protector.sealed_vmk =
            Some(crypto::seal(&clear, [1; 12], &key_payload(0x2000, vmk)).unwrap());

        let mut metadata = FveMetadata::new(Uuid::nil());
        metadata.encryption_method = 0x8004;
        metadata.protectors.push(protector);
        metadata.sealed_fvek =
            Some(crypto::seal(vmk, [2; 12], &key_payload(0x8004, &[0x44; 64])).unwrap());
        metadata
    }

    #[test]
    fn clear_key_then_fvek() {
        let backend = FveBackend::new();
        let metadata = clear_key_metadata(&[0x11; 32]);

        let vmk = backend.unwrap_vmk(&metadata, &Secret::ClearKey).unwrap();
        assert_eq!(vmk.as_bytes(), &[0x11; 32]);

        let fvek = backend.unwrap_fvek(&metadata, &vmk).unwrap();
        assert_eq!(fvek.method, EncryptionMethod::XtsAes128);
        backend.check_decryption(&metadata, &fvek).unwrap();
    }

    #[test]
    fn missing_kind_reports_no_matching_protector() {
        let backend = FveBackend::new();
        let metadata = clear_key_metadata(&[0x11; 32]);
        let result = backend.unwrap_vmk(&metadata, &Secret::UserPassword("hunter2"));
        assert!(matches!(result, Err(BackendError::NoMatchingProtector(_))));
    }

    #[test]
    fn malformed_recovery_password_fails_before_crypto() {
        let backend = FveBackend::new();
        let metadata = clear_key_metadata(&[0x11; 32]);
        let result = backend.unwrap_vmk(&metadata, &Secret::RecoveryPassword("123"));
        assert!(matches!(result, Err(BackendError::InvalidRecoveryPassword(_))));
    }

    #[test]
    fn fvek_with_wrong_vmk_fails() {
        let backend = FveBackend::new();
        let metadata = clear_key_metadata(&[0x11; 32]);
        let wrong = VolumeMasterKey::new([0x12; 32]);
        assert!(matches!(
            backend.unwrap_fvek(&metadata, &wrong),
            Err(BackendError::DecryptionFailed)
        ));
    }

    #[test]
    fn missing_fvek_is_reported() {
        let backend = FveBackend::new();
        let mut metadata = clear_key_metadata(&[0x11; 32]);
        metadata.sealed_fvek = None;
        let vmk = VolumeMasterKey::new([0x11; 32]);
        assert!(matches!(
            backend.unwrap_fvek(&metadata, &vmk),
            Err(BackendError::MissingEntry("FVEK"))
        ));
    }

    #[test]
    fn short_fvek_fails_decryption_check() {
        let backend = FveBackend::new();
        let fvek = FullVolumeKey {
            method: EncryptionMethod::XtsAes256,
            key: zeroize::Zeroizing::new(vec![0; 32]),
        };
        let metadata = FveMetadata::new(Uuid::nil());
        assert!(backend.check_decryption(&metadata, &fvek).is_err());
    }

    #[test]
    fn non_bitlocker_file_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("plain.img");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();
        assert!(matches!(
            FveBackend::new().read_metadata(&path),
            Err(BackendError::NotBitLocker(_))
        ));
    }
}

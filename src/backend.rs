//! The seam between the stage pipeline and the code that touches disk.
//!
//! The pipeline only sequences stages; each transition is a call on a
//! [`Backend`]. [`crate::fve::FveBackend`] is the real implementation; tests
//! substitute stubs to observe the order of calls.

use std::path::Path;

use crate::crypto::{FullVolumeKey, RecoveryKey, VolumeMasterKey};
use crate::errors::BackendError;
use crate::fve::{FveMetadata, KeyProtector, VolumeState};

/// A secret offered to unlock the VMK.
#[derive(Clone, Copy)]
pub enum Secret<'a> {
    ClearKey,
    RecoveryPassword(&'a str),
    UserPassword(&'a str),
    BekFile(&'a Path),
}

impl Secret<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClearKey => "clear key",
            Self::RecoveryPassword(_) => "recovery password",
            Self::UserPassword(_) => "user password",
            Self::BekFile(_) => "BEK file",
        }
    }
}

impl std::fmt::Debug for Secret<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BekFile(path) => write!(f, "BekFile({})", path.display()),
            other => f.write_str(other.name()),
        }
    }
}

/// Stage transition functions.
pub trait Backend {
    /// `Uninitialized -> MetadataRead`.
    fn read_metadata(&self, volume: &Path) -> Result<FveMetadata, BackendError>;

    /// Whether the volume is in a state the later stages can handle.
    fn check_volume_state(&self, metadata: &FveMetadata) -> bool {
        metadata.state == VolumeState::Encrypted
    }

    /// `MetadataRead -> VmkRecovered`, for one secret.
    fn unwrap_vmk(
        &self,
        metadata: &FveMetadata,
        secret: &Secret<'_>,
    ) -> Result<VolumeMasterKey, BackendError>;

    /// `VmkRecovered -> FvekRecovered`.
    fn unwrap_fvek(
        &self,
        metadata: &FveMetadata,
        vmk: &VolumeMasterKey,
    ) -> Result<FullVolumeKey, BackendError>;

    /// `FvekRecovered -> DecryptionReady`.
    fn check_decryption(
        &self,
        metadata: &FveMetadata,
        fvek: &FullVolumeKey,
    ) -> Result<(), BackendError>;

    fn protectors<'m>(&self, metadata: &'m FveMetadata) -> &'m [KeyProtector] {
        &metadata.protectors
    }

    /// Decrypt the recovery key a recovery-password protector holds.
    fn open_recovery_key(
        &self,
        protector: &KeyProtector,
        vmk: &VolumeMasterKey,
    ) -> Result<RecoveryKey, BackendError> {
        protector.open_recovery_key(vmk.as_bytes())
    }
}

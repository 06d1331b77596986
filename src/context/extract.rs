//! Reading the recovery password back out of an unlocked context.

use tracing::debug;

use super::{Context, Stage};
use crate::backend::Backend;
use crate::crypto::RecoveryPassword;
use crate::errors::{BitRecoverError, Result};
use crate::fve::ProtectorKind;

impl<B: Backend> Context<B> {
    /// The volume's recovery password, decrypted with the recovered VMK.
    ///
    /// Needs at least [`Stage::VmkRecovered`]. Does not modify the context.
    pub fn recovery_password(&self) -> Result<RecoveryPassword> {
        let (metadata, vmk) = match (&self.metadata, &self.vmk) {
            (Some(metadata), Some(vmk)) if self.stage >= Stage::VmkRecovered => (metadata, vmk),
            _ => return Err(BitRecoverError::NotInitialized(self.stage)),
        };

        let mut candidates = self
            .backend
            .protectors(metadata)
            .iter()
            .filter(|p| p.kind == ProtectorKind::RecoveryPassword && p.sealed_recovery_key.is_some())
            .peekable();

        if candidates.peek().is_none() {
            return Err(BitRecoverError::NoRecoveryPasswordProtector);
        }

        let mut last_err = None;
        for protector in candidates {
            match self.backend.open_recovery_key(protector, vmk) {
                Ok(key) => {
                    debug!(guid = %protector.guid, "recovery password decrypted");
                    return Ok(RecoveryPassword::from_key(&key));
                }
                Err(e) => {
                    debug!(guid = %protector.guid, "recovery key did not open: {e}");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(source) => Err(BitRecoverError::Backend {
                stage: self.stage,
                source,
            }),
            None => Err(BitRecoverError::NoRecoveryPasswordProtector),
        }
    }
}

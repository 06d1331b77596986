//! Choosing and attempting decryption methods for the VMK stage.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, info};

use super::Context;
use crate::backend::{Backend, Secret};
use crate::crypto::VolumeMasterKey;
use crate::errors::{BackendError, BitRecoverError, Result};
use crate::fve::FveMetadata;

/// A way of unlocking the VMK.
///
/// The declaration order is the attempt priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DecryptionMethod {
    RecoveryPassword,
    UserPassword,
    BekFile,
    ClearKey,
}

impl DecryptionMethod {
    /// Attempt order when several methods are enabled.
    pub const PRIORITY: [DecryptionMethod; 4] = [
        DecryptionMethod::RecoveryPassword,
        DecryptionMethod::UserPassword,
        DecryptionMethod::BekFile,
        DecryptionMethod::ClearKey,
    ];
}

impl fmt::Display for DecryptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RecoveryPassword => "recovery password",
            Self::UserPassword => "user password",
            Self::BekFile => "BEK file",
            Self::ClearKey => "clear key",
        })
    }
}

/// The enabled methods in the order they should be attempted.
pub fn choose_methods(enabled: &BTreeSet<DecryptionMethod>) -> Result<Vec<DecryptionMethod>> {
    let order: Vec<_> = DecryptionMethod::PRIORITY
        .into_iter()
        .filter(|m| enabled.contains(m))
        .collect();

    if order.is_empty() {
        return Err(BitRecoverError::NoKeyProtectorConfigured);
    }
    Ok(order)
}

impl<B: Backend> Context<B> {
    /// Attempt each enabled method once, in priority order, until one
    /// unlocks the VMK.
    pub(super) fn unlock_vmk(
        &self,
        metadata: &FveMetadata,
    ) -> Result<(VolumeMasterKey, DecryptionMethod)> {
        let order = choose_methods(&self.methods)?;
        let mut failures = Vec::with_capacity(order.len());

        for method in order {
            debug!(%method, "trying decryption method");
            let attempt = self
                .secret_for(method)
                .and_then(|secret| self.backend.unwrap_vmk(metadata, &secret));

            match attempt {
                Ok(vmk) => {
                    info!(%method, "volume master key recovered");
                    return Ok((vmk, method));
                }
                Err(e) => {
                    debug!(%method, "decryption method failed: {e}");
                    failures.push(format!("{method}: {e}"));
                }
            }
        }

        Err(BitRecoverError::NoValidProtector(failures.join("; ")))
    }

    /// The secret configured for `method`. A missing secret fails the
    /// attempt without calling the backend.
    fn secret_for(&self, method: DecryptionMethod) -> std::result::Result<Secret<'_>, BackendError> {
        match method {
            DecryptionMethod::RecoveryPassword => self
                .recovery_password
                .as_deref()
                .map(|s| Secret::RecoveryPassword(s.as_str()))
                .ok_or(BackendError::MissingSecret("recovery password")),
            DecryptionMethod::UserPassword => self
                .user_password
                .as_deref()
                .map(|s| Secret::UserPassword(s.as_str()))
                .ok_or(BackendError::MissingSecret("user password")),
            DecryptionMethod::BekFile => self
                .bek_file
                .as_deref()
                .map(Secret::BekFile)
                .ok_or(BackendError::MissingSecret("BEK file path")),
            DecryptionMethod::ClearKey => Ok(Secret::ClearKey),
        }
    }
}

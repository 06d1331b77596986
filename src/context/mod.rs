//! The recovery context and the state machine that drives it.
//!
//! A [`Context`] is configured through the option registry
//! ([`Context::set`]), then advanced through the ordered [`Stage`]s by
//! [`Context::initialize_until`]. Once the VMK is recovered,
//! [`Context::recovery_password`] reads the recovery password back out.
//!
//! ```text
//! Uninitialized -> MetadataRead -> VmkRecovered -> FvekRecovered -> DecryptionReady
//! ```
//!
//! Every secret and unwrapped key is held in a zeroizing wrapper and wiped
//! when the context is dropped.

mod extract;
mod options;
mod pipeline;
mod selector;
mod stage;


pub use options::{ContextOption, LogLevel, OptionId, OptionValue};
pub use selector::{choose_methods, DecryptionMethod};
pub use stage::Stage;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use crate::backend::Backend;
use crate::crypto::{FullVolumeKey, VolumeMasterKey};
use crate::fve::{FveBackend, FveMetadata};

/// One volume being processed.
pub struct Context<B: Backend = FveBackend> {
    backend: B,

    // Configuration (option registry).
    methods: BTreeSet<DecryptionMethod>,
    recovery_password: Option<Zeroizing<String>>,
    user_password: Option<Zeroizing<String>>,
    bek_file: Option<PathBuf>,
    volume: Option<PathBuf>,
    log_level: LogLevel,
    stop_stage: Stage,
    skip_volume_state_check: bool,

    // State (pipeline).
    stage: Stage,
    metadata: Option<FveMetadata>,
    vmk: Option<VolumeMasterKey>,
    fvek: Option<FullVolumeKey>,
    unlocked_by: Option<DecryptionMethod>,
}

impl Context<FveBackend> {
    /// An empty context reading real volumes.
    pub fn new() -> Self {
        Self::with_backend(FveBackend::new())
    }
}

impl Default for Context<FveBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Context<B> {
    /// An empty context using `backend` for every stage transition.
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            methods: BTreeSet::new(),
            recovery_password: None,
            user_password: None,
            bek_file: None,
            volume: None,
            log_level: LogLevel::default(),
            stop_stage: Stage::DecryptionReady,
            skip_volume_state_check: false,
            stage: Stage::Uninitialized,
            metadata: None,
            vmk: None,
            fvek: None,
            unlocked_by: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn stop_stage(&self) -> Stage {
        self.stop_stage
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    pub fn volume(&self) -> Option<&Path> {
        self.volume.as_deref()
    }

    /// Enabled decryption methods, in priority order.
    pub fn methods(&self) -> &BTreeSet<DecryptionMethod> {
        &self.methods
    }

    /// Decoded metadata, once `MetadataRead` was reached.
    pub fn metadata(&self) -> Option<&FveMetadata> {
        self.metadata.as_ref()
    }

    /// The method that unlocked the VMK.
    pub fn unlocked_by(&self) -> Option<DecryptionMethod> {
        self.unlocked_by
    }

    pub fn fvek(&self) -> Option<&FullVolumeKey> {
        self.fvek.as_ref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: Backend> std::fmt::Debug for Context<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("methods", &self.methods)
            .field("volume", &self.volume)
            .field("bek_file", &self.bek_file)
            .field("log_level", &self.log_level)
            .field("stop_stage", &self.stop_stage)
            .field("skip_volume_state_check", &self.skip_volume_state_check)
            .field("stage", &self.stage)
            .field("unlocked_by", &self.unlocked_by)
            .finish_non_exhaustive()
    }
}

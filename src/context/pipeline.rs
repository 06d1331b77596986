//! The stage pipeline.
//!
//! Each call to `advance` performs exactly one transition. The
//! loop in [`Context::initialize_until`] runs transitions until the stop
//! stage is reached, so a stage is never skipped and never passed.

use tracing::{debug, info};

use super::{choose_methods, Context, Stage};
use crate::backend::Backend;
use crate::errors::{BackendError, BitRecoverError, Result};

impl<B: Backend> Context<B> {
    /// Initialize up to the stop stage configured through the options.
    pub fn initialize(&mut self) -> Result<Stage> {
        self.initialize_until(self.stop_stage)
    }

    /// Advance stage by stage until `stop` is reached.
    ///
    /// Returns the stage reached (always `stop`). On failure the context
    /// stays at the last completed stage; once it has left `Uninitialized`
    /// it cannot be initialized again.
    pub fn initialize_until(&mut self, stop: Stage) -> Result<Stage> {
        if self.stage != Stage::Uninitialized {
            return Err(BitRecoverError::AlreadyInitialized(self.stage));
        }
        if self.volume.is_none() {
            return Err(BitRecoverError::MissingVolume);
        }
        if stop >= Stage::VmkRecovered {
            choose_methods(&self.methods)?;
        }

        info!(stop = %stop, "initializing context");

        while self.stage < stop {
            let Some(next) = self.stage.next() else {
                break;
            };
            self.advance(next)?;
            debug!(stage = %self.stage, "stage reached");

            if self.stage == Stage::MetadataRead && !self.skip_volume_state_check {
                self.check_volume_state()?;
            }
        }

        Ok(self.stage)
    }

    /// Perform the single transition into `next`.
    fn advance(&mut self, next: Stage) -> Result<()> {
        let tag = |source: BackendError| BitRecoverError::Backend {
            stage: next,
            source,
        };

        match next {
            Stage::Uninitialized => {}
            Stage::MetadataRead => {
                let volume = self.volume.as_deref().ok_or(BitRecoverError::MissingVolume)?;
                let metadata = self.backend.read_metadata(volume).map_err(tag)?;
                self.metadata = Some(metadata);
            }
            Stage::VmkRecovered => {
                let metadata = self
                    .metadata
                    .as_ref()
                    .ok_or(BitRecoverError::NotInitialized(self.stage))?;
                let (vmk, method) = self.unlock_vmk(metadata)?;
                self.vmk = Some(vmk);
                self.unlocked_by = Some(method);
            }
            Stage::FvekRecovered => {
                let (metadata, vmk) = self
                    .metadata
                    .as_ref()
                    .zip(self.vmk.as_ref())
                    .ok_or(BitRecoverError::NotInitialized(self.stage))?;
                let fvek = self.backend.unwrap_fvek(metadata, vmk).map_err(tag)?;
                self.fvek = Some(fvek);
            }
            Stage::DecryptionReady => {
                let (metadata, fvek) = self
                    .metadata
                    .as_ref()
                    .zip(self.fvek.as_ref())
                    .ok_or(BitRecoverError::NotInitialized(self.stage))?;
                self.backend.check_decryption(metadata, fvek).map_err(tag)?;
            }
        }

        self.stage = next;
        Ok(())
    }

    fn check_volume_state(&self) -> Result<()> {
        let metadata = self
            .metadata
            .as_ref()
            .ok_or(BitRecoverError::NotInitialized(self.stage))?;
        if !self.backend.check_volume_state(metadata) {
            return Err(BitRecoverError::UnsupportedVolumeState(metadata.state));
        }
        Ok(())
    }
}

//! Cryptographic primitives used to unlock BitLocker key material.
//!
//! This module provides:
//! - AES-256-CCM open/seal of metadata payloads (`aes_ccm`)
//! - SHA-256 key stretching for password-based protectors (`stretch`)
//! - Recovery password parsing and formatting (`recovery`)
//! - Zeroizing wrappers for unlocked keys (`keys`)

pub mod aes_ccm;
pub mod keys;
pub mod recovery;
pub mod stretch;

pub use aes_ccm::{open, seal, Sealed};
pub use keys::{EncryptionMethod, FullVolumeKey, VolumeMasterKey};
pub use recovery::{RecoveryKey, RecoveryPassword};
pub use stretch::{recovery_password_key, stretch_key, user_password_key};

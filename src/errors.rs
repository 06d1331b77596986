use std::path::PathBuf;
use thiserror::Error;

use crate::context::Stage;
use crate::fve::VolumeState;

/// Failures raised by the metadata and crypto backends.
///
/// The pipeline wraps these in [`BitRecoverError::Backend`] together with
/// the stage that was being entered.
#[derive(Debug, Error)]
pub enum BackendError {
    // --- Volume / metadata errors ---
    #[error("not a BitLocker volume: {0}")]
    NotBitLocker(String),

    #[error("invalid FVE metadata: {0}")]
    InvalidMetadata(String),

    #[error("no readable FVE metadata block (tried {0} copies)")]
    NoUsableMetadata(usize),

    #[error("metadata has no {0} entry")]
    MissingEntry(&'static str),

    #[error("unsupported encryption method 0x{0:04x}")]
    UnsupportedEncryption(u16),

    // --- Secret errors ---
    #[error("no {0} was supplied")]
    MissingSecret(&'static str),

    #[error("invalid recovery password: {0}")]
    InvalidRecoveryPassword(String),

    #[error("BEK file error: {0}")]
    BekFile(String),

    #[error("no {0} protector on this volume")]
    NoMatchingProtector(&'static str),

    // --- Crypto errors ---
    #[error("decryption failed (wrong secret or corrupted metadata)")]
    DecryptionFailed,

    #[error("unexpected decrypted key: {0}")]
    InvalidKey(String),

    // --- IO errors ---
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// All errors surfaced by the recovery context and the CLI.
#[derive(Debug, Error)]
pub enum BitRecoverError {
    // --- Configuration errors ---
    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("no volume path configured")]
    MissingVolume,

    #[error("context was already initialized (stage: {0})")]
    AlreadyInitialized(Stage),

    // --- Initialization errors ---
    #[error("volume is not in a supported state ({0})")]
    UnsupportedVolumeState(VolumeState),

    #[error("no decryption method configured, use one of -c, -f, -p or -u")]
    NoKeyProtectorConfigured,

    #[error("no configured method could unlock the volume master key ({0})")]
    NoValidProtector(String),

    #[error("failed while reaching stage '{stage}': {source}")]
    Backend {
        stage: Stage,
        #[source]
        source: BackendError,
    },

    // --- Extraction errors ---
    #[error("context is not initialized far enough (stage: {0})")]
    NotInitialized(Stage),

    #[error("volume has no recovery password key protector")]
    NoRecoveryPasswordProtector,

    // --- Ambient errors ---
    #[error("config file error: {0}")]
    Config(String),

    #[error("password prompt failed: {0}")]
    Prompt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for results of the recovery core.
pub type Result<T> = std::result::Result<T, BitRecoverError>;

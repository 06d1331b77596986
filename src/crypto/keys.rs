//! Unlocked key material.
//!
//! Both wrappers zero their bytes when dropped so the VMK and FVEK cannot
//! linger in memory after the context is torn down.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Length of a volume master key (AES-256).
pub const VMK_LEN: usize = 32;

/// A 32-byte volume master key, zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct VolumeMasterKey {
    bytes: [u8; VMK_LEN],
}

impl VolumeMasterKey {
    pub fn new(bytes: [u8; VMK_LEN]) -> Self {
        Self { bytes }
    }

    /// Build a key from a decrypted slice, which must be exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; VMK_LEN] = bytes.try_into().ok()?;
        Some(Self::new(arr))
    }

    pub fn as_bytes(&self) -> &[u8; VMK_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for VolumeMasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VolumeMasterKey(..)")
    }
}

/// Bulk encryption method of the volume (the FVEK algorithm).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMethod {
    Aes128Diffuser,
    Aes256Diffuser,
    Aes128,
    Aes256,
    XtsAes128,
    XtsAes256,
}

impl EncryptionMethod {
    /// Map the on-disk algorithm identifier.
    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            0x8000 => Some(Self::Aes128Diffuser),
            0x8001 => Some(Self::Aes256Diffuser),
            0x8002 => Some(Self::Aes128),
            0x8003 => Some(Self::Aes256),
            0x8004 => Some(Self::XtsAes128),
            0x8005 => Some(Self::XtsAes256),
            _ => None,
        }
    }

    /// Minimum key length the method needs (tweak/diffuser keys included).
    pub fn min_key_len(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes256 | Self::Aes128Diffuser | Self::XtsAes128 => 32,
            Self::Aes256Diffuser | Self::XtsAes256 => 64,
        }
    }
}

impl fmt::Display for EncryptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Aes128Diffuser => "AES-128-CBC + Elephant diffuser",
            Self::Aes256Diffuser => "AES-256-CBC + Elephant diffuser",
            Self::Aes128 => "AES-128-CBC",
            Self::Aes256 => "AES-256-CBC",
            Self::XtsAes128 => "XTS-AES-128",
            Self::XtsAes256 => "XTS-AES-256",
        };
        f.write_str(name)
    }
}

/// The full-volume encryption key and its algorithm.
pub struct FullVolumeKey {
    pub method: EncryptionMethod,
    pub key: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for FullVolumeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FullVolumeKey")
            .field("method", &self.method)
            .field("key_len", &self.key.len())
            .finish()
    }
}

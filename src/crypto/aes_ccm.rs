//! AES-256-CCM authenticated decryption of FVE payloads.
//!
//! Every wrapped key in the metadata is stored as a nonce, a MAC and an
//! encrypted payload. The nonce is 12 bytes (an 8-byte FILETIME followed by
//! a 4-byte counter) and the MAC is a 16-byte CCM tag.

use aes::Aes256;
use ccm::aead::generic_array::GenericArray;
use ccm::aead::{Aead, KeyInit};
use ccm::consts::{U12, U16};
use ccm::Ccm;
use zeroize::Zeroizing;

use crate::errors::BackendError;

/// Size of the CCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the CCM authentication tag in bytes.
pub const MAC_LEN: usize = 16;

type Aes256Ccm = Ccm<Aes256, U16, U12>;

/// An AES-CCM protected payload as stored in the metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub nonce: [u8; NONCE_LEN],
    pub mac: [u8; MAC_LEN],
    pub payload: Vec<u8>,
}

/// Decrypt and authenticate `sealed` with a 256-bit `key`.
///
/// The plaintext is returned in a zeroizing buffer: it always holds key
/// material.
pub fn open(key: &[u8], sealed: &Sealed) -> Result<Zeroizing<Vec<u8>>, BackendError> {
    let cipher = Aes256Ccm::new_from_slice(key)
        .map_err(|_| BackendError::InvalidKey(format!("{}-byte unwrap key", key.len())))?;

    // The aead API expects the tag appended to the ciphertext.
    let mut buf = Vec::with_capacity(sealed.payload.len() + MAC_LEN);
    buf.extend_from_slice(&sealed.payload);
    buf.extend_from_slice(&sealed.mac);

    let plaintext = cipher
        .decrypt(GenericArray::from_slice(&sealed.nonce), buf.as_slice())
        .map_err(|_| BackendError::DecryptionFailed)?;

    Ok(Zeroizing::new(plaintext))
}

/// Encrypt `plaintext` under `key` with an explicit `nonce`.
///
/// BitLocker derives nonces from the metadata's nonce counter, so the caller
/// owns nonce uniqueness.
pub fn seal(key: &[u8], nonce: [u8; NONCE_LEN], plaintext: &[u8]) -> Result<Sealed, BackendError> {
    let cipher = Aes256Ccm::new_from_slice(key)
        .map_err(|_| BackendError::InvalidKey(format!("{}-byte wrap key", key.len())))?;

    let mut out = cipher
        .encrypt(GenericArray::from_slice(&nonce), plaintext)
        .map_err(|_| BackendError::InvalidKey("payload too large for CCM".into()))?;

    let tag_start = out.len() - MAC_LEN;
    let mut mac = [0u8; MAC_LEN];
    mac.copy_from_slice(&out[tag_start..]);
    out.truncate(tag_start);

    Ok(Sealed {
        nonce,
        mac,
        payload: out,
    })
}

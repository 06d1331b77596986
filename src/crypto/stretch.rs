//! SHA-256 key stretching for password-based key protectors.
//!
//! Recovery-password and user-password protectors do not store the VMK
//! under the secret directly. The secret is first hashed, then stretched by
//! chaining SHA-256 over an 88-byte state block:
//!
//! ```text
//! [updated_hash: 32][password_hash: 32][salt: 16][hash_count: u64 LE]
//! ```
//!
//! After `STRETCH_ROUNDS` rounds `updated_hash` is the AES-CCM key that
//! opens the protector's sealed VMK.

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::recovery::RecoveryKey;

/// Number of SHA-256 rounds applied by BitLocker (2^20).
pub const STRETCH_ROUNDS: u64 = 0x10_0000;

/// Length of the per-protector salt in bytes.
pub const SALT_LEN: usize = 16;

/// Length of the stretched key (AES-256).
pub const KEY_LEN: usize = 32;

const STATE_LEN: usize = 32 + 32 + SALT_LEN + 8;

/// Stretch a 32-byte password hash with the protector's salt.
pub fn stretch_key(password_hash: &[u8; KEY_LEN], salt: &[u8; SALT_LEN]) -> Zeroizing<[u8; KEY_LEN]> {
    stretch_with_rounds(password_hash, salt, STRETCH_ROUNDS)
}

/// Derive the unlock key of a recovery-password protector.
pub fn recovery_password_key(key: &RecoveryKey, salt: &[u8; SALT_LEN]) -> Zeroizing<[u8; KEY_LEN]> {
    let hash = Zeroizing::new(sha256(key.as_bytes()));
    stretch_key(&hash, salt)
}

/// Derive the unlock key of a user-password protector.
///
/// The password is hashed as UTF-16LE without a terminator, twice.
pub fn user_password_key(password: &str, salt: &[u8; SALT_LEN]) -> Zeroizing<[u8; KEY_LEN]> {
    let utf16: Zeroizing<Vec<u8>> = Zeroizing::new(
        password
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect(),
    );
    let once = Zeroizing::new(sha256(&utf16));
    let twice = Zeroizing::new(sha256(once.as_slice()));
    stretch_key(&twice, salt)
}

pub(crate) fn stretch_with_rounds(
    password_hash: &[u8; KEY_LEN],
    salt: &[u8; SALT_LEN],
    rounds: u64,
) -> Zeroizing<[u8; KEY_LEN]> {
    let mut state = Zeroizing::new([0u8; STATE_LEN]);
    state[32..64].copy_from_slice(password_hash);
    state[64..80].copy_from_slice(salt);

    for count in 0..rounds {
        state[80..88].copy_from_slice(&count.to_le_bytes());
        let digest = Sha256::digest(&state[..]);
        state[..32].copy_from_slice(&digest);
    }

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&state[..32]);
    key
}

fn sha256(data: &[u8]) -> [u8; KEY_LEN] {
    Sha256::digest(data).into()
}

//! Recovery password parsing and formatting.
//!
//! A recovery password is 48 digits written as 8 dash-separated blocks of
//! 6 digits. Each block is a multiple of 11 below `2^16 * 11`; dividing by
//! 11 yields one little-endian `u16` of the 128-bit recovery key.

use std::fmt;
use std::str::FromStr;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::errors::BackendError;

/// Number of dash-separated blocks.
pub const BLOCK_COUNT: usize = 8;

/// Digits per block.
pub const BLOCK_DIGITS: usize = 6;

/// Length of the printable form: 8 blocks of 6 digits and 7 dashes.
pub const PASSWORD_LEN: usize = BLOCK_COUNT * BLOCK_DIGITS + BLOCK_COUNT - 1;

/// Length of the binary recovery key.
pub const KEY_LEN: usize = 16;

/// Exclusive upper bound of a block value.
const BLOCK_LIMIT: u32 = 0x1_0000 * 11;

/// The 128-bit binary form of a recovery password.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RecoveryKey {
    bytes: [u8; KEY_LEN],
}

impl RecoveryKey {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for RecoveryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecoveryKey(..)")
    }
}

/// A printable recovery password, e.g.
/// `000000-111111-222222-333333-444444-555555-666666-707707`.
///
/// The string is wiped from memory on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct RecoveryPassword(Zeroizing<String>);

impl RecoveryPassword {
    /// Format a binary recovery key into its printable form.
    pub fn from_key(key: &RecoveryKey) -> Self {
        let mut out = Zeroizing::new(String::with_capacity(PASSWORD_LEN));
        for (i, word) in key.bytes.chunks_exact(2).enumerate() {
            if i > 0 {
                out.push('-');
            }
            let block = u32::from(u16::from_le_bytes([word[0], word[1]])) * 11;
            out.push_str(&format!("{block:06}"));
        }
        Self(out)
    }

    /// Validate a printable recovery password and convert it to its key.
    pub fn parse_key(input: &str) -> Result<RecoveryKey, BackendError> {
        let input = input.trim();
        let blocks: Vec<&str> = input.split('-').collect();
        if blocks.len() != BLOCK_COUNT {
            return Err(BackendError::InvalidRecoveryPassword(format!(
                "expected {BLOCK_COUNT} blocks, got {}",
                blocks.len()
            )));
        }

        let mut bytes = [0u8; KEY_LEN];
        for (i, block) in blocks.iter().enumerate() {
            let value = parse_block(block).map_err(|reason| {
                BackendError::InvalidRecoveryPassword(format!("block {}: {reason}", i + 1))
            })?;
            bytes[i * 2..i * 2 + 2].copy_from_slice(&value.to_le_bytes());
        }

        let key = RecoveryKey::new(bytes);
        bytes.zeroize();
        Ok(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RecoveryPassword {
    type Err = BackendError;

    /// Parse and normalize a recovery password.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_key(s).map(|key| Self::from_key(&key))
    }
}

impl fmt::Display for RecoveryPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RecoveryPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecoveryPassword(..)")
    }
}

/// Check one 6-digit block and return its 16-bit key word.
fn parse_block(block: &str) -> Result<u16, String> {
    if block.len() != BLOCK_DIGITS || !block.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("'{block}' is not {BLOCK_DIGITS} digits"));
    }

    let digits: Vec<i32> = block.bytes().map(|b| i32::from(b - b'0')).collect();
    let check = (digits[0] - digits[1] + digits[2] - digits[3] + digits[4]).rem_euclid(11);
    if check != digits[5] {
        return Err("check digit mismatch".into());
    }

    let value: u32 = block
        .parse()
        .map_err(|e| format!("'{block}' is not a number: {e}"))?;
    if value % 11 != 0 {
        return Err("not a multiple of 11".into());
    }
    if value >= BLOCK_LIMIT {
        return Err(format!("value {value} out of range"));
    }

    u16::try_from(value / 11).map_err(|_| format!("value {value} out of range"))
}

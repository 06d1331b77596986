//! BitLocker (FVE) on-disk metadata.
//!
//! This module provides:
//! - Volume boot sector parsing and metadata block location (`volume`)
//! - The generic datum encoding used by every metadata entry (`datum`)
//! - FVE metadata block headers and volume state (`metadata`)
//! - Key protectors decoded from VMK entries (`protector`)
//! - External key (`.BEK`) files (`bek`)
//! - `FveBackend`, the disk-backed implementation of [`crate::backend::Backend`] (`backend`)

pub mod backend;
pub mod bek;
pub mod datum;
pub mod metadata;
pub mod protector;
pub mod volume;

pub use backend::FveBackend;
pub use bek::BekFile;
pub use datum::{Datum, DatumValue};
pub use metadata::{FveMetadata, VolumeState};
pub use protector::{KeyProtector, ProtectorKind};
pub use volume::{VolumeHeader, VolumeKind};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::BackendError;

/// Seconds between 1601-01-01 (FILETIME epoch) and 1970-01-01.
const FILETIME_EPOCH_DIFF: i64 = 11_644_473_600;

/// FILETIME ticks per second (100ns intervals).
const FILETIME_TICKS: u64 = 10_000_000;

/// Convert a Windows FILETIME into UTC. Zero means "unset".
pub fn filetime_to_utc(filetime: u64) -> Option<DateTime<Utc>> {
    if filetime == 0 {
        return None;
    }
    let secs = i64::try_from(filetime / FILETIME_TICKS).ok()? - FILETIME_EPOCH_DIFF;
    let nanos = u32::try_from((filetime % FILETIME_TICKS) * 100).ok()?;
    DateTime::from_timestamp(secs, nanos)
}

// ---------------------------------------------------------------------------
// Bounds-checked little-endian readers shared by the parsers
// ---------------------------------------------------------------------------

fn field<'a>(buf: &'a [u8], offset: usize, len: usize) -> Result<&'a [u8], BackendError> {
    offset
        .checked_add(len)
        .and_then(|end| buf.get(offset..end))
        .ok_or_else(|| {
            BackendError::InvalidMetadata(format!(
                "read of {len} bytes at 0x{offset:x} past end of {}-byte buffer",
                buf.len()
            ))
        })
}

pub(crate) fn read_u8(buf: &[u8], offset: usize) -> Result<u8, BackendError> {
    Ok(field(buf, offset, 1)?[0])
}

pub(crate) fn read_u16(buf: &[u8], offset: usize) -> Result<u16, BackendError> {
    let b = field(buf, offset, 2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

pub(crate) fn read_u32(buf: &[u8], offset: usize) -> Result<u32, BackendError> {
    let mut b = [0u8; 4];
    b.copy_from_slice(field(buf, offset, 4)?);
    Ok(u32::from_le_bytes(b))
}

pub(crate) fn read_u64(buf: &[u8], offset: usize) -> Result<u64, BackendError> {
    let mut b = [0u8; 8];
    b.copy_from_slice(field(buf, offset, 8)?);
    Ok(u64::from_le_bytes(b))
}

pub(crate) fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N], BackendError> {
    let mut out = [0u8; N];
    out.copy_from_slice(field(buf, offset, N)?);
    Ok(out)
}

/// GUIDs are stored in the mixed-endian Windows layout.
pub(crate) fn read_guid(buf: &[u8], offset: usize) -> Result<Uuid, BackendError> {
    Ok(Uuid::from_bytes_le(read_array::<16>(buf, offset)?))
}

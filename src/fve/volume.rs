//! The BitLocker volume boot sector.
//!
//! The first sector of an encrypted volume replaces the filesystem boot
//! sector. It identifies the BitLocker flavour and tells where the three
//! copies of the FVE metadata block live.

use uuid::Uuid;

use super::{read_guid, read_u16, read_u64, read_u8};
use crate::errors::BackendError;

/// Size of the boot sector we read.
pub const SECTOR_LEN: usize = 512;

/// OEM identifier of Vista and Windows 7+ volumes.
const FVE_SIGNATURE: &[u8; 8] = b"-FVE-FS-";

/// OEM identifier of BitLocker To Go volumes.
const TOGO_SIGNATURE: &[u8; 8] = b"MSWIN4.1";

/// Identifier stored at 0xA0 by Windows 7 and later.
pub const BITLOCKER_GUID: Uuid = Uuid::from_u128(0x4967_d63b_2e29_4ad8_8399_f6a3_39e3_d001);

const OEM_OFFSET: usize = 3;
const GUID_OFFSET: usize = 0xa0;
const METADATA_OFFSETS: [usize; 3] = [0xb0, 0xb8, 0xc0];

// Vista stores a single metadata location as a cluster number.
const BYTES_PER_SECTOR_OFFSET: usize = 0x0b;
const SECTORS_PER_CLUSTER_OFFSET: usize = 0x0d;
const METADATA_LCN_OFFSET: usize = 0x38;

/// Which BitLocker flavour wrote the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeKind {
    Vista,
    Seven,
    ToGo,
}

/// Decoded boot sector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeHeader {
    pub kind: VolumeKind,
    /// Absolute byte offsets of the metadata block copies, in order.
    pub metadata_offsets: Vec<u64>,
}

impl VolumeHeader {
    /// Decode the first sector of a volume.
    pub fn parse(sector: &[u8]) -> Result<Self, BackendError> {
        if sector.len() < SECTOR_LEN {
            return Err(BackendError::NotBitLocker(format!(
                "volume is only {} bytes long",
                sector.len()
            )));
        }

        let oem = &sector[OEM_OFFSET..OEM_OFFSET + 8];
        let has_guid = read_guid(sector, GUID_OFFSET)? == BITLOCKER_GUID;

        let kind = match (oem == FVE_SIGNATURE, oem == TOGO_SIGNATURE, has_guid) {
            (true, _, true) => VolumeKind::Seven,
            (true, _, false) => VolumeKind::Vista,
            (_, true, true) => VolumeKind::ToGo,
            _ => {
                return Err(BackendError::NotBitLocker(format!(
                    "unknown boot sector signature {:?}",
                    String::from_utf8_lossy(oem)
                )))
            }
        };

        let metadata_offsets = match kind {
            VolumeKind::Vista => {
                let bytes_per_sector = u64::from(read_u16(sector, BYTES_PER_SECTOR_OFFSET)?);
                let sectors_per_cluster = u64::from(read_u8(sector, SECTORS_PER_CLUSTER_OFFSET)?);
                let lcn = read_u64(sector, METADATA_LCN_OFFSET)?;
                lcn.checked_mul(sectors_per_cluster)
                    .and_then(|v| v.checked_mul(bytes_per_sector))
                    .into_iter()
                    .collect()
            }
            VolumeKind::Seven | VolumeKind::ToGo => METADATA_OFFSETS
                .iter()
                .map(|&off| read_u64(sector, off))
                .collect::<Result<Vec<_>, _>>()?,
        };

        let metadata_offsets: Vec<u64> = metadata_offsets.into_iter().filter(|&o| o != 0).collect();
        if metadata_offsets.is_empty() {
            return Err(BackendError::NotBitLocker(
                "boot sector lists no metadata block".into(),
            ));
        }

        Ok(Self {
            kind,
            metadata_offsets,
        })
    }
}

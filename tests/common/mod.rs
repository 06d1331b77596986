//! Synthetic BitLocker volume images for integration tests.
//!
//! The image holds a Windows 7 style boot sector and three copies of the
//! FVE metadata block. Each copy carries a description, one VMK entry per
//! enabled protector and the sealed FVEK, all keyed with the constants
//! below.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use bitrecover::crypto::{self, RecoveryPassword};
use uuid::Uuid;

pub const RECOVERY_PASSWORD: &str = "466895-217492-569250-069608-104434-135707-527241-083622";
pub const WRONG_RECOVERY_PASSWORD: &str = "309540-054054-123915-625218-602910-100716-346984-130779";
pub const USER_PASSWORD: &str = "correct horse battery staple";
pub const DESCRIPTION: &str = "DESKTOP-4F2K C: 3/14/2024";

pub const VMK: [u8; 32] = [0x5a; 32];
pub const FVEK: [u8; 64] = [0x77; 64];
pub const CLEAR_KEY: [u8; 32] = [0x33; 32];
pub const STARTUP_KEY: [u8; 32] = [0x44; 32];

pub const RECOVERY_GUID: Uuid = Uuid::from_u128(0x6a1c_1f0e_8b7d_4b0a_9a55_0c4f_2e1d_0001);
pub const USER_GUID: Uuid = Uuid::from_u128(0x6a1c_1f0e_8b7d_4b0a_9a55_0c4f_2e1d_0002);
pub const CLEAR_GUID: Uuid = Uuid::from_u128(0x6a1c_1f0e_8b7d_4b0a_9a55_0c4f_2e1d_0003);
pub const STARTUP_GUID: Uuid = Uuid::from_u128(0x6a1c_1f0e_8b7d_4b0a_9a55_0c4f_2e1d_0004);
pub const VOLUME_GUID: Uuid = Uuid::from_u128(0x1111_2222_3333_4444_5555_6666_7777_8888);

const BITLOCKER_GUID: Uuid = Uuid::from_u128(0x4967_d63b_2e29_4ad8_8399_f6a3_39e3_d001);
const METADATA_OFFSETS: [u64; 3] = [0x1000, 0x3000, 0x5000];
const IMAGE_LEN: usize = 0x8000;
const XTS_AES_128: u16 = 0x8004;

const ENTRY_PROPERTY: u16 = 0x0000;
const ENTRY_VMK: u16 = 0x0002;
const ENTRY_FVEK: u16 = 0x0003;
const ENTRY_STARTUP_KEY: u16 = 0x0006;
const ENTRY_DESCRIPTION: u16 = 0x0007;

const VALUE_KEY: u16 = 0x0001;
const VALUE_UNICODE: u16 = 0x0002;
const VALUE_STRETCH_KEY: u16 = 0x0003;
const VALUE_AES_CCM: u16 = 0x0005;
const VALUE_VMK: u16 = 0x0008;
const VALUE_EXTERNAL_KEY: u16 = 0x0009;

/// Which protectors and state the image should have.
#[derive(Debug, Clone)]
pub struct ImageSpec {
    pub recovery_password: bool,
    pub user_password: bool,
    pub clear_key: bool,
    pub startup_key: bool,
    pub state: u16,
    pub corrupt_first_copy: bool,
}

impl Default for ImageSpec {
    fn default() -> Self {
        Self {
            recovery_password: true,
            user_password: false,
            clear_key: false,
            startup_key: false,
            state: 4,
            corrupt_first_copy: false,
        }
    }
}

impl ImageSpec {
    /// Every protector kind.
    pub fn all_protectors() -> Self {
        Self {
            user_password: true,
            clear_key: true,
            startup_key: true,
            ..Self::default()
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut nonce = NonceCounter(0);
        let block = metadata_block(self, &mut nonce);

        let mut image = vec![0u8; IMAGE_LEN];
        image[..512].copy_from_slice(&boot_sector());
        for (i, &offset) in METADATA_OFFSETS.iter().enumerate() {
            let start = offset as usize;
            image[start..start + block.len()].copy_from_slice(&block);
            if i == 0 && self.corrupt_first_copy {
                image[start..start + 8].copy_from_slice(b"GARBAGE!");
            }
        }
        image
    }

    /// Write the image into `dir` and return its path.
    pub fn write(&self, dir: &Path) -> PathBuf {
        let path = dir.join("bitlocker.img");
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}

/// A `.BEK` file unlocking the startup-key protector.
pub fn bek_file(guid: Uuid) -> Vec<u8> {
    let key = datum(ENTRY_PROPERTY, VALUE_KEY, &key_body(0x2002, &STARTUP_KEY));

    let mut body = Vec::new();
    body.extend_from_slice(&guid.to_bytes_le());
    body.extend_from_slice(&0u64.to_le_bytes());
    body.extend_from_slice(&key);
    let external = datum(ENTRY_STARTUP_KEY, VALUE_EXTERNAL_KEY, &body);

    let mut out = metadata_header(external.len(), guid);
    out.extend_from_slice(&external);
    out
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

struct NonceCounter(u32);

impl NonceCounter {
    fn next(&mut self) -> [u8; 12] {
        self.0 += 1;
        let mut nonce = [0u8; 12];
        nonce[..8].copy_from_slice(&0x01da_7b1c_0000_0000u64.to_le_bytes());
        nonce[8..].copy_from_slice(&self.0.to_le_bytes());
        nonce
    }
}

fn boot_sector() -> Vec<u8> {
    let mut s = vec![0u8; 512];
    s[0..3].copy_from_slice(&[0xeb, 0x58, 0x90]);
    s[3..11].copy_from_slice(b"-FVE-FS-");
    s[0x0b..0x0d].copy_from_slice(&512u16.to_le_bytes());
    s[0x0d] = 8;
    s[0xa0..0xb0].copy_from_slice(&BITLOCKER_GUID.to_bytes_le());
    for (i, offset) in METADATA_OFFSETS.iter().enumerate() {
        let at = 0xb0 + i * 8;
        s[at..at + 8].copy_from_slice(&offset.to_le_bytes());
    }
    s[510..512].copy_from_slice(&[0x55, 0xaa]);
    s
}

fn metadata_block(spec: &ImageSpec, nonce: &mut NonceCounter) -> Vec<u8> {
    let mut datums = datum(ENTRY_DESCRIPTION, VALUE_UNICODE, &utf16(DESCRIPTION));

    if spec.recovery_password {
        datums.extend(recovery_protector(nonce));
    }
    if spec.user_password {
        datums.extend(user_protector(nonce));
    }
    if spec.clear_key {
        datums.extend(clear_key_protector(nonce));
    }
    if spec.startup_key {
        datums.extend(startup_key_protector(nonce));
    }

    let fvek = sealed(&VMK, nonce, &datum(ENTRY_PROPERTY, VALUE_KEY, &key_body(XTS_AES_128, &FVEK)));
    datums.extend(datum(ENTRY_FVEK, VALUE_AES_CCM, &fvek));

    let mut block = vec![0u8; 64];
    block[0..8].copy_from_slice(b"-FVE-FS-");
    block[8..10].copy_from_slice(&64u16.to_le_bytes());
    block[10..12].copy_from_slice(&2u16.to_le_bytes());
    block[12..14].copy_from_slice(&spec.state.to_le_bytes());
    block[14..16].copy_from_slice(&spec.state.to_le_bytes());
    block[16..24].copy_from_slice(&(IMAGE_LEN as u64).to_le_bytes());
    for (i, offset) in METADATA_OFFSETS.iter().enumerate() {
        let at = 32 + i * 8;
        block[at..at + 8].copy_from_slice(&offset.to_le_bytes());
    }

    block.extend(metadata_header(datums.len(), VOLUME_GUID));
    block.extend(datums);
    block
}

/// The 48-byte header shared by metadata blocks and BEK files.
fn metadata_header(datums_len: usize, guid: Uuid) -> Vec<u8> {
    let size = (48 + datums_len) as u32;
    let mut h = vec![0u8; 48];
    h[0..4].copy_from_slice(&size.to_le_bytes());
    h[4..8].copy_from_slice(&1u32.to_le_bytes());
    h[8..12].copy_from_slice(&48u32.to_le_bytes());
    h[12..16].copy_from_slice(&size.to_le_bytes());
    h[16..32].copy_from_slice(&guid.to_bytes_le());
    h[32..36].copy_from_slice(&10u32.to_le_bytes());
    h[36..38].copy_from_slice(&XTS_AES_128.to_le_bytes());
    h[40..48].copy_from_slice(&0x01da_7b1c_9f3e_4a00u64.to_le_bytes());
    h
}

// ---------------------------------------------------------------------------
// Protectors
// ---------------------------------------------------------------------------

fn vmk_payload() -> Vec<u8> {
    datum(ENTRY_PROPERTY, VALUE_KEY, &key_body(0x2000, &VMK))
}

fn recovery_protector(nonce: &mut NonceCounter) -> Vec<u8> {
    let salt = [0x01u8; 16];
    let recovery_key = RecoveryPassword::parse_key(RECOVERY_PASSWORD).unwrap();
    let unlock = crypto::recovery_password_key(&recovery_key, &salt);

    let sealed_recovery_key = sealed(
        &VMK,
        nonce,
        &datum(ENTRY_PROPERTY, VALUE_KEY, &key_body(0x1000, recovery_key.as_bytes())),
    );
    let stretch = stretch_datum(&salt, &datum(ENTRY_PROPERTY, VALUE_AES_CCM, &sealed_recovery_key));
    let sealed_vmk = sealed(unlock.as_slice(), nonce, &vmk_payload());

    let mut nested = stretch;
    nested.extend(datum(ENTRY_PROPERTY, VALUE_AES_CCM, &sealed_vmk));
    vmk_datum(RECOVERY_GUID, 0x0800, &nested)
}

fn user_protector(nonce: &mut NonceCounter) -> Vec<u8> {
    let salt = [0x02u8; 16];
    let unlock = crypto::user_password_key(USER_PASSWORD, &salt);
    let sealed_vmk = sealed(unlock.as_slice(), nonce, &vmk_payload());

    let mut nested = stretch_datum(&salt, &[]);
    nested.extend(datum(ENTRY_PROPERTY, VALUE_AES_CCM, &sealed_vmk));
    vmk_datum(USER_GUID, 0x2000, &nested)
}

fn clear_key_protector(nonce: &mut NonceCounter) -> Vec<u8> {
    let sealed_vmk = sealed(&CLEAR_KEY, nonce, &vmk_payload());

    let mut nested = datum(ENTRY_PROPERTY, VALUE_KEY, &key_body(0x2000, &CLEAR_KEY));
    nested.extend(datum(ENTRY_PROPERTY, VALUE_AES_CCM, &sealed_vmk));
    vmk_datum(CLEAR_GUID, 0x0000, &nested)
}

fn startup_key_protector(nonce: &mut NonceCounter) -> Vec<u8> {
    let sealed_vmk = sealed(&STARTUP_KEY, nonce, &vmk_payload());
    vmk_datum(
        STARTUP_GUID,
        0x0200,
        &datum(ENTRY_PROPERTY, VALUE_AES_CCM, &sealed_vmk),
    )
}

// ---------------------------------------------------------------------------
// Datums
// ---------------------------------------------------------------------------

fn datum(entry_type: u16, value_type: u16, body: &[u8]) -> Vec<u8> {
    let mut d = Vec::with_capacity(8 + body.len());
    d.extend_from_slice(&((8 + body.len()) as u16).to_le_bytes());
    d.extend_from_slice(&entry_type.to_le_bytes());
    d.extend_from_slice(&value_type.to_le_bytes());
    d.extend_from_slice(&1u16.to_le_bytes());
    d.extend_from_slice(body);
    d
}

fn key_body(algorithm: u16, key: &[u8]) -> Vec<u8> {
    let mut b = Vec::with_capacity(4 + key.len());
    b.extend_from_slice(&algorithm.to_le_bytes());
    b.extend_from_slice(&[0, 0]);
    b.extend_from_slice(key);
    b
}

fn stretch_datum(salt: &[u8; 16], nested: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&0x1000u16.to_le_bytes());
    body.extend_from_slice(&[0, 0]);
    body.extend_from_slice(salt);
    body.extend_from_slice(nested);
    datum(ENTRY_PROPERTY, VALUE_STRETCH_KEY, &body)
}

fn vmk_datum(guid: Uuid, protection: u16, nested: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&guid.to_bytes_le());
    body.extend_from_slice(&0x01da_7b1c_9f3e_4a00u64.to_le_bytes());
    body.extend_from_slice(&[0, 0]);
    body.extend_from_slice(&protection.to_le_bytes());
    body.extend_from_slice(nested);
    datum(ENTRY_VMK, VALUE_VMK, &body)
}

/// AES-CCM datum body: nonce, MAC, ciphertext.
fn sealed(key: &[u8], nonce: &mut NonceCounter, plaintext: &[u8]) -> Vec<u8> {
    let sealed = crypto::seal(key, nonce.next(), plaintext).unwrap();
    let mut body = Vec::new();
    body.extend_from_slice(&sealed.nonce);
    body.extend_from_slice(&sealed.mac);
    body.extend_from_slice(&sealed.payload);
    body
}

fn utf16(text: &str) -> Vec<u8> {
    text.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(|u| u.to_le_bytes())
        .collect()
}

use std::fmt;
use std::str::FromStr;

/// How far a [`super::Context`] has been initialized.
///
/// Stages are totally ordered and only ever advance one step at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Uninitialized,
    MetadataRead,
    VmkRecovered,
    FvekRecovered,
    DecryptionReady,
}

impl Stage {
    /// Every stage, in order.
    pub const ALL: [Stage; 5] = [
        Stage::Uninitialized,
        Stage::MetadataRead,
        Stage::VmkRecovered,
        Stage::FvekRecovered,
        Stage::DecryptionReady,
    ];

    /// The stage after this one, if any.
    pub fn next(self) -> Option<Stage> {
        match self {
            Self::Uninitialized => Some(Self::MetadataRead),
            Self::MetadataRead => Some(Self::VmkRecovered),
            Self::VmkRecovered => Some(Self::FvekRecovered),
            Self::FvekRecovered => Some(Self::DecryptionReady),
            Self::DecryptionReady => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::MetadataRead => "metadata-read",
            Self::VmkRecovered => "vmk-recovered",
            Self::FvekRecovered => "fvek-recovered",
            Self::DecryptionReady => "decryption-ready",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown stage '{s}'"))
    }
}

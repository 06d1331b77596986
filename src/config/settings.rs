use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::context::{ContextOption, OptionValue};
use crate::errors::{BitRecoverError, Result};

/// Optional configuration file, given with `--config` or `BITRECOVER_CONFIG`.
///
/// ```toml
/// [options]
/// verbosity = "info"
/// use-bek-file = true
/// bek-file-path = "/media/usb/5D4C6A2E.BEK"
/// ```
///
/// Keys are option identifiers; values go through
/// [`ContextOption::from_raw`], so the same shape rules apply as for
/// library callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub options: BTreeMap<String, RawValue>,
}

/// A TOML option value before it is checked against its identifier.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Flag(bool),
    Text(String),
}

impl fmt::Debug for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(b) => write!(f, "Flag({b})"),
            Self::Text(_) => f.write_str("Text(..)"),
        }
    }
}

impl From<&RawValue> for OptionValue {
    fn from(raw: &RawValue) -> Self {
        match raw {
            RawValue::Flag(b) => OptionValue::Flag(*b),
            RawValue::Text(s) => OptionValue::Text(Zeroizing::new(s.clone())),
        }
    }
}

// ── Implementation ───────────────────────────────────────────────────

impl Settings {
    /// Load settings from an explicitly named file.
    ///
    /// A missing or unparsable file is an error: the user asked for it.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BitRecoverError::Config(format!(
                "{} does not exist",
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            BitRecoverError::Config(format!("cannot read {}: {e}", path.display()))
        })?;

        Self::parse(&contents)
            .map_err(|e| BitRecoverError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Parse settings from TOML text.
    pub fn parse(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// The `[options]` table as typed context options, in key order.
    pub fn context_options(&self) -> Result<Vec<ContextOption>> {
        self.options
            .iter()
            .map(|(key, value)| {
                ContextOption::from_raw(key, value.into())
                    .map_err(|e| BitRecoverError::Config(format!("[options] {key}: {e}")))
            })
            .collect()
    }
}

// ── Tests ────────────────────────────────────────────────────────────

//! The option registry: typed configuration written into a [`Context`]
//! before it is initialized.
//!
//! [`ContextOption`] is the typed form used by library callers.
//! [`ContextOption::from_raw`] is the untyped entry point (identifier +
//! value) used by the configuration file; it checks the value's shape
//! against the identifier.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::debug;
use zeroize::Zeroizing;

use super::{Context, DecryptionMethod, Stage};
use crate::backend::Backend;
use crate::errors::{BitRecoverError, Result};

/// Diagnostic verbosity, from silent to chatty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Quiet,
    Critical,
    Error,
    #[default]
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quiet => "quiet",
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" | "off" => Ok(Self::Quiet),
            "critical" => Ok(Self::Critical),
            "error" => Ok(Self::Error),
            "warning" | "warn" => Ok(Self::Warning),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            other => Err(format!("unknown verbosity '{other}'")),
        }
    }
}

/// The closed set of option identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionId {
    UseClearKey,
    UseRecoveryPassword,
    RecoveryPassword,
    UseUserPassword,
    UserPassword,
    UseBekFile,
    BekFilePath,
    VolumePath,
    Verbosity,
    StopStage,
    SkipVolumeStateCheck,
}

impl OptionId {
    pub const ALL: [OptionId; 11] = [
        OptionId::UseClearKey,
        OptionId::UseRecoveryPassword,
        OptionId::RecoveryPassword,
        OptionId::UseUserPassword,
        OptionId::UserPassword,
        OptionId::UseBekFile,
        OptionId::BekFilePath,
        OptionId::VolumePath,
        OptionId::Verbosity,
        OptionId::StopStage,
        OptionId::SkipVolumeStateCheck,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::UseClearKey => "use-clear-key",
            Self::UseRecoveryPassword => "use-recovery-password",
            Self::RecoveryPassword => "recovery-password",
            Self::UseUserPassword => "use-user-password",
            Self::UserPassword => "user-password",
            Self::UseBekFile => "use-bek-file",
            Self::BekFilePath => "bek-file-path",
            Self::VolumePath => "volume-path",
            Self::Verbosity => "verbosity",
            Self::StopStage => "stop-stage",
            Self::SkipVolumeStateCheck => "skip-volume-state-check",
        }
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionId {
    type Err = BitRecoverError;

    fn from_str(s: &str) -> Result<Self> {
        OptionId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| BitRecoverError::InvalidOption(format!("unknown option '{s}'")))
    }
}

/// An untyped option value.
#[derive(Clone)]
pub enum OptionValue {
    Flag(bool),
    Text(Zeroizing<String>),
    Level(LogLevel),
    Stage(Stage),
}

impl OptionValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(Zeroizing::new(s.into()))
    }

    fn shape(&self) -> &'static str {
        match self {
            Self::Flag(_) => "a flag",
            Self::Text(_) => "a string",
            Self::Level(_) => "a log level",
            Self::Stage(_) => "a stage",
        }
    }
}

impl fmt::Debug for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(b) => write!(f, "Flag({b})"),
            Self::Text(_) => f.write_str("Text(..)"),
            Self::Level(l) => write!(f, "Level({l})"),
            Self::Stage(s) => write!(f, "Stage({s})"),
        }
    }
}

/// One typed option.
#[derive(Clone)]
pub enum ContextOption {
    UseClearKey(bool),
    UseRecoveryPassword(bool),
    RecoveryPassword(Zeroizing<String>),
    UseUserPassword(bool),
    UserPassword(Zeroizing<String>),
    UseBekFile(bool),
    BekFilePath(PathBuf),
    VolumePath(PathBuf),
    Verbosity(LogLevel),
    StopStage(Stage),
    SkipVolumeStateCheck(bool),
}

impl ContextOption {
    pub fn id(&self) -> OptionId {
        match self {
            Self::UseClearKey(_) => OptionId::UseClearKey,
            Self::UseRecoveryPassword(_) => OptionId::UseRecoveryPassword,
            Self::RecoveryPassword(_) => OptionId::RecoveryPassword,
            Self::UseUserPassword(_) => OptionId::UseUserPassword,
            Self::UserPassword(_) => OptionId::UserPassword,
            Self::UseBekFile(_) => OptionId::UseBekFile,
            Self::BekFilePath(_) => OptionId::BekFilePath,
            Self::VolumePath(_) => OptionId::VolumePath,
            Self::Verbosity(_) => OptionId::Verbosity,
            Self::StopStage(_) => OptionId::StopStage,
            Self::SkipVolumeStateCheck(_) => OptionId::SkipVolumeStateCheck,
        }
    }

    /// Build a typed option from an identifier and an untyped value.
    ///
    /// Enumerated options also accept their names as text
    /// (`verbosity = "debug"`, `stop-stage = "vmk-recovered"`).
    pub fn from_raw(identifier: &str, value: OptionValue) -> Result<Self> {
        let id: OptionId = identifier.parse()?;
        let mismatch = |value: &OptionValue| {
            BitRecoverError::InvalidOption(format!(
                "'{id}' does not take {}",
                value.shape()
            ))
        };

        let option = match (id, value) {
            (OptionId::UseClearKey, OptionValue::Flag(b)) => Self::UseClearKey(b),
            (OptionId::UseRecoveryPassword, OptionValue::Flag(b)) => Self::UseRecoveryPassword(b),
            (OptionId::UseUserPassword, OptionValue::Flag(b)) => Self::UseUserPassword(b),
            (OptionId::UseBekFile, OptionValue::Flag(b)) => Self::UseBekFile(b),
            (OptionId::SkipVolumeStateCheck, OptionValue::Flag(b)) => Self::SkipVolumeStateCheck(b),

            (OptionId::RecoveryPassword, OptionValue::Text(s)) => Self::RecoveryPassword(s),
            (OptionId::UserPassword, OptionValue::Text(s)) => Self::UserPassword(s),
            (OptionId::BekFilePath, OptionValue::Text(s)) => Self::BekFilePath(PathBuf::from(s.as_str())),
            (OptionId::VolumePath, OptionValue::Text(s)) => Self::VolumePath(PathBuf::from(s.as_str())),

            (OptionId::Verbosity, OptionValue::Level(level)) => Self::Verbosity(level),
            (OptionId::Verbosity, OptionValue::Text(s)) => {
                Self::Verbosity(s.parse().map_err(BitRecoverError::InvalidOption)?)
            }
            (OptionId::StopStage, OptionValue::Stage(stage)) => Self::StopStage(stage),
            (OptionId::StopStage, OptionValue::Text(s)) => {
                Self::StopStage(s.parse().map_err(BitRecoverError::InvalidOption)?)
            }

            (_, other) => return Err(mismatch(&other)),
        };
        Ok(option)
    }
}

impl fmt::Debug for ContextOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecoveryPassword(_) | Self::UserPassword(_) => {
                write!(f, "{}(<redacted>)", self.id())
            }
            Self::BekFilePath(p) | Self::VolumePath(p) => write!(f, "{}({})", self.id(), p.display()),
            Self::Verbosity(l) => write!(f, "{}({l})", self.id()),
            Self::StopStage(s) => write!(f, "{}({s})", self.id()),
            Self::UseClearKey(b)
            | Self::UseRecoveryPassword(b)
            | Self::UseUserPassword(b)
            | Self::UseBekFile(b)
            | Self::SkipVolumeStateCheck(b) => write!(f, "{}({b})", self.id()),
        }
    }
}

impl<B: Backend> Context<B> {
    /// Store one option, replacing any earlier value for the same identifier.
    ///
    /// Only allowed while the context is still uninitialized.
    pub fn set(&mut self, option: ContextOption) -> Result<()> {
        if self.stage != Stage::Uninitialized {
            return Err(BitRecoverError::AlreadyInitialized(self.stage));
        }
        debug!(option = ?option, "set option");

        match option {
            ContextOption::UseClearKey(on) => self.toggle(DecryptionMethod::ClearKey, on),
            ContextOption::UseRecoveryPassword(on) => {
                self.toggle(DecryptionMethod::RecoveryPassword, on)
            }
            ContextOption::UseUserPassword(on) => self.toggle(DecryptionMethod::UserPassword, on),
            ContextOption::UseBekFile(on) => self.toggle(DecryptionMethod::BekFile, on),
            ContextOption::RecoveryPassword(s) => {
                self.recovery_password = Some(non_empty(OptionId::RecoveryPassword, s)?);
            }
            ContextOption::UserPassword(s) => {
                self.user_password = Some(non_empty(OptionId::UserPassword, s)?);
            }
            ContextOption::BekFilePath(path) => {
                self.bek_file = Some(non_empty_path(OptionId::BekFilePath, path)?);
            }
            ContextOption::VolumePath(path) => {
                self.volume = Some(non_empty_path(OptionId::VolumePath, path)?);
            }
            ContextOption::Verbosity(level) => self.log_level = level,
            ContextOption::StopStage(Stage::Uninitialized) => {
                return Err(BitRecoverError::InvalidOption(
                    "stop-stage must be past 'uninitialized'".into(),
                ));
            }
            ContextOption::StopStage(stage) => self.stop_stage = stage,
            ContextOption::SkipVolumeStateCheck(skip) => self.skip_volume_state_check = skip,
        }
        Ok(())
    }

    fn toggle(&mut self, method: DecryptionMethod, on: bool) {
        if on {
            self.methods.insert(method);
        } else {
            self.methods.remove(&method);
        }
    }
}

fn non_empty(id: OptionId, value: Zeroizing<String>) -> Result<Zeroizing<String>> {
    if value.is_empty() {
        return Err(BitRecoverError::InvalidOption(format!("'{id}' must not be empty")));
    }
    Ok(value)
}

fn non_empty_path(id: OptionId, path: PathBuf) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(BitRecoverError::InvalidOption(format!("'{id}' must not be empty")));
    }
    Ok(path)
}

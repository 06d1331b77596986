//! CLI module: Clap argument parser, secret input, and the recover command.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{ArgGroup, Parser};
use zeroize::Zeroizing;

use crate::context::{ContextOption, LogLevel};
use crate::errors::{BitRecoverError, Result};

/// Environment variable read by `-p` when no value is given.
pub const RECOVERY_PASSWORD_ENV: &str = "BITRECOVER_RECOVERY_PASSWORD";

/// Environment variable read by `-u` when no value is given.
pub const USER_PASSWORD_ENV: &str = "BITRECOVER_USER_PASSWORD";

/// bitrecover: print the recovery password of a BitLocker volume.
///
/// Unlocks the volume master key with one of the decryption methods and
/// prints the 48-digit recovery password on standard output.
#[derive(Parser, Debug)]
#[command(
    name = "bitrecover",
    about = "Print the recovery password of a BitLocker volume",
    disable_version_flag = true
)]
#[command(group(
    ArgGroup::new("method")
        .multiple(false)
        .args(["clearkey", "bekfile", "recovery_password", "user_password"])
))]
pub struct Cli {
    /// BitLocker volume (block device or image) to read
    #[arg(short = 'V', long, value_name = "PATH")]
    pub volume: PathBuf,

    /// Unlock with the clear key (suspended protection)
    #[arg(short = 'c', long)]
    pub clearkey: bool,

    /// Unlock with a startup key (.BEK) file
    #[arg(short = 'f', long, value_name = "PATH")]
    pub bekfile: Option<PathBuf>,

    /// Unlock with a recovery password (omit the value to read
    /// BITRECOVER_RECOVERY_PASSWORD or be prompted)
    #[arg(short = 'p', long, value_name = "PASSWORD", num_args = 0..=1)]
    pub recovery_password: Option<Option<String>>,

    /// Unlock with the user password (omit the value to read
    /// BITRECOVER_USER_PASSWORD or be prompted)
    #[arg(short = 'u', long, value_name = "PASSWORD", num_args = 0..=1)]
    pub user_password: Option<Option<String>>,

    /// Print nothing but the password and fatal errors
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,

    /// Print debug diagnostics on standard error
    #[arg(short = 'v', long)]
    pub verbosity: bool,

    /// TOML file with an [options] table applied before the flags
    #[arg(long, value_name = "PATH", env = "BITRECOVER_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Translate the flags into context options.
    ///
    /// Secrets not given on the command line are resolved here, so this
    /// may read the environment or prompt.
    pub fn context_options(&self) -> Result<Vec<ContextOption>> {
        let mut options = vec![ContextOption::VolumePath(self.volume.clone())];

        if self.clearkey {
            options.push(ContextOption::UseClearKey(true));
        }
        if let Some(path) = &self.bekfile {
            options.push(ContextOption::UseBekFile(true));
            options.push(ContextOption::BekFilePath(path.clone()));
        }
        if let Some(given) = &self.recovery_password {
            let secret = resolve_secret(given.as_deref(), RECOVERY_PASSWORD_ENV, "Recovery password")?;
            options.push(ContextOption::UseRecoveryPassword(true));
            options.push(ContextOption::RecoveryPassword(secret));
        }
        if let Some(given) = &self.user_password {
            let secret = resolve_secret(given.as_deref(), USER_PASSWORD_ENV, "User password")?;
            options.push(ContextOption::UseUserPassword(true));
            options.push(ContextOption::UserPassword(secret));
        }

        if self.quiet {
            options.push(ContextOption::Verbosity(LogLevel::Quiet));
        } else if self.verbosity {
            options.push(ContextOption::Verbosity(LogLevel::Debug));
        }

        Ok(options)
    }

    /// Whether a password was typed on the command line itself.
    pub fn has_inline_secret(&self) -> bool {
        matches!(self.recovery_password, Some(Some(_))) || matches!(self.user_password, Some(Some(_)))
    }
}

/// Get a secret, trying in order:
/// 1. The value given on the command line
/// 2. The `env_var` environment variable
/// 3. Interactive hidden prompt (only when a terminal is attached)
///
/// Returns `Zeroizing<String>` so the secret is wiped from memory on drop.
pub fn resolve_secret(given: Option<&str>, env_var: &str, prompt: &str) -> Result<Zeroizing<String>> {
    if let Some(value) = given {
        return Ok(Zeroizing::new(value.to_string()));
    }

    if let Ok(value) = std::env::var(env_var) {
        if !value.is_empty() {
            return Ok(Zeroizing::new(value));
        }
    }

    if !console::user_attended_stderr() {
        return Err(BitRecoverError::Prompt(format!(
            "{prompt} not given, {env_var} is unset and there is no terminal to ask on"
        )));
    }

    let value = dialoguer::Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(|e| BitRecoverError::Prompt(e.to_string()))?;
    Ok(Zeroizing::new(value))
}

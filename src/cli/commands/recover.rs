//! `bitrecover`: unlock the VMK and print the recovery password.

use tracing::debug;

use crate::cli::{output, Cli};
use crate::config::Settings;
use crate::context::{Context, ContextOption, LogLevel, Stage};
use crate::crypto::RecoveryPassword;
use crate::errors::Result;
use crate::logging;

/// Build a context from the config file and the flags, initialize it up
/// to the VMK and read the recovery password.
pub fn recover(cli: &Cli) -> Result<RecoveryPassword> {
    let mut ctx = Context::new();

    // 1. Config file first, so the flags below override it.
    if let Some(path) = &cli.config {
        for option in Settings::load(path)?.context_options()? {
            ctx.set(option)?;
        }
    }

    // 2. Command-line flags (may prompt for a secret).
    for option in cli.context_options()? {
        ctx.set(option)?;
    }

    // 3. Nothing past the VMK is needed, and any volume state will do.
    ctx.set(ContextOption::StopStage(Stage::VmkRecovered))?;
    ctx.set(ContextOption::SkipVolumeStateCheck(true))?;

    logging::init(ctx.log_level());

    if cli.has_inline_secret() && ctx.log_level() > LogLevel::Error {
        output::warning("password given on the command line is visible to other local users");
    }

    let stage = ctx.initialize()?;
    debug!(%stage, unlocked_by = ?ctx.unlocked_by(), "context initialized");

    ctx.recovery_password()
}

/// Execute the command: print the password alone on standard output.
pub fn execute(cli: &Cli) -> Result<()> {
    let password = recover(cli)?;
    println!("{password}");
    Ok(())
}

//! Colored terminal output helpers.
//!
//! Standard output carries only the recovery password, so every message
//! here goes to stderr.

use console::style;

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").for_stderr().red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").for_stderr().yellow().bold(), msg);
}

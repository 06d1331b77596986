//! Optional TOML configuration.

mod settings;

pub use settings::{RawValue, Settings};

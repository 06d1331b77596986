pub mod backend;
pub mod cli;
pub mod config;
pub mod context;
pub mod crypto;
pub mod errors;
pub mod fve;
pub mod logging;

mod args;
mod commands;
pub mod config;
mod handlers;
pub mod output;
mod session_loader;
pub mod types;

pub use args::{Cli, Commands, SessionArgs};
pub use commands::run;

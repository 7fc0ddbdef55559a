pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
mod args;

#[cfg(feature = "cli")]
pub use args::{CliConfig, Command, GamesCommand};
pub use cli::LocalStorage;
pub use toml_config::AppConfig;

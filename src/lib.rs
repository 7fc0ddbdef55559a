pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{AppConfig, LocalStorage};

pub use adapters::{ApiClient, ChatClient, FileCapture};
pub use core::{engine::PracticeEngine, flow::StorytellingFlow};
pub use utils::error::{PracticeError, Result};

pub mod catalog;
pub mod conversation;
pub mod engine;
pub mod feedback;
pub mod flow;
pub mod history;
pub mod pagination;
pub mod recorder;
pub mod scorer;
pub mod session;
pub mod weekly_plan;

pub use crate::domain::ports::{CaptureDevice, ConfigProvider, PracticeFlow, Storage};
pub use crate::utils::error::Result;

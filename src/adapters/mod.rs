// Adapters layer: concrete implementations for external systems (http services, audio input).

pub mod audio;
pub mod chat;
pub mod http;
pub mod speech;

pub use audio::FileCapture;
pub use chat::ChatClient;
pub use http::ApiClient;

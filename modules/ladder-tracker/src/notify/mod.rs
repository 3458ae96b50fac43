pub mod backend;
pub mod log;
pub mod render;
pub mod webhook;

pub use backend::Reporter;
pub use log::LogReporter;
pub use webhook::WebhookReporter;

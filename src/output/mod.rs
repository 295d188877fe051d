pub mod config;
pub mod presenter;
pub mod types;

pub use config::OutputConfig;
pub use presenter::Emitter;
pub use types::{Envelope, Meta};

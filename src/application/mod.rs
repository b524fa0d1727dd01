mod application_impl;
pub mod data;
mod render;
mod runtime_config;

pub use application_impl::{Application, ApplicationError};
pub use render::render_outline;
pub use runtime_config::RuntimeConfig;

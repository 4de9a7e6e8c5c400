//! Core configuration shared by the render system and its managers

pub mod config;

pub use config::{DeferPolicy, RenderSystemConfig, MAX_SUPPORTED_FRAMES_IN_FLIGHT};

//! Headless backend
//!
//! Keeps native objects as plain ids in memory. Every call is appended to a
//! log so callers can assert on ordering, and creation failures can be
//! injected to exercise cleanup paths.

mod device;
mod shader_factory;

pub use device::{DeviceCall, HeadlessDevice};
pub use shader_factory::{default_predefined_shaders, HeadlessShaderFactory};

//! Backend implementations of the native device collaborators
//!
//! Only an in-memory headless backend ships with the crate; GPU backends plug
//! in by implementing [`NativeDevice`](crate::render::api::NativeDevice) and
//! [`NativeShaderFactory`](crate::render::api::NativeShaderFactory).

/// In-memory backend used by tests and the headless demo
pub mod headless;

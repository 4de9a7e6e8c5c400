//! Backend abstraction traits for the render system
//!
//! The render system never talks to OpenGL or Vulkan directly. Everything it
//! needs from a backend goes through [`NativeDevice`] (textures, buffers,
//! materials, command recording) and [`NativeShaderFactory`] (shader modules).

pub mod frame_data;
pub mod native_device;
pub mod shader_factory;

pub use frame_data::{BeginFrameInfo, CameraInfo, DependentCreateInfo};
pub use native_device::{
    NativeBufferHandle, NativeDevice, NativeMaterialCreateInfo, NativeMaterialHandle,
    NativeTextureHandle, NativeTextureInfo, TextureCaps,
};
pub use shader_factory::{NativeShaderFactory, NativeShaderHandle, ShaderCreateInfo, ShaderStage};

//! Native device abstraction
//!
//! The device is shared between the render system, its managers and the
//! dynamic resource links as `Rc<dyn NativeDevice>`, so every method takes
//! `&self`. Implementations keep their own interior mutability.

use bitflags::bitflags;

use super::frame_data::{BeginFrameInfo, CameraInfo, DependentCreateInfo};
use super::shader_factory::NativeShaderHandle;
use crate::render::resources::{
    BufferContent, MaterialInfo, PxExtent2D, RawTexture, TextureFilterHint, TextureFlags,
    VertexDeclaration,
};
use crate::render::{RenderResult, RenderSystemEvent};

/// Backend handle of a native texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeTextureHandle(pub u64);

/// Backend handle of a native vertex or index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeBufferHandle(pub u64);

/// Backend handle of a native material (pipeline state object)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeMaterialHandle(pub u64);

bitflags! {
    /// Texture capabilities reported by the backend
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureCaps: u32 {
        /// Dynamic textures can be updated after creation
        const DYNAMIC_UPDATE = 0x01;
        /// Texture coordinates must be flipped on the Y axis
        const REQUIRES_Y_FLIP = 0x02;
    }
}

/// What the backend knows about a live native texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeTextureInfo {
    /// Native handle
    pub handle: NativeTextureHandle,
    /// Current size in pixels
    pub extent_px: PxExtent2D,
    /// True if created with the dynamic hint
    pub is_dynamic: bool,
}

/// Everything the backend needs to build a native material
#[derive(Debug, Clone, Copy)]
pub struct NativeMaterialCreateInfo<'a> {
    /// Fixed-function state
    pub info: &'a MaterialInfo,
    /// Native vertex shader
    pub vertex_shader: NativeShaderHandle,
    /// Native fragment shader
    pub fragment_shader: NativeShaderHandle,
    /// Layout of the vertices the material will draw
    pub vertex_declaration: &'a VertexDeclaration,
}

/// Native device adapter
///
/// Creation calls may fail; destruction calls are assumed to always succeed.
pub trait NativeDevice {
    /// Texture capabilities of this device
    fn texture_caps(&self) -> TextureCaps;

    /// Create a native texture
    fn create_texture(
        &self,
        texture: &RawTexture<'_>,
        filter: TextureFilterHint,
        flags: TextureFlags,
        is_dynamic: bool,
    ) -> RenderResult<NativeTextureHandle>;

    /// Replace the content of a texture created with the dynamic hint
    fn update_texture(
        &self,
        handle: NativeTextureHandle,
        texture: &RawTexture<'_>,
        filter: TextureFilterHint,
        flags: TextureFlags,
    ) -> RenderResult<()>;

    /// Destroy a native texture
    fn destroy_texture(&self, handle: NativeTextureHandle);

    /// Look up a live native texture
    fn try_get_texture(&self, handle: NativeTextureHandle) -> Option<NativeTextureInfo>;

    /// Render system event delivered to a live dynamic texture
    ///
    /// Backends that keep per-frame staging copies drop or rebuild them here.
    fn on_dynamic_texture_event(&self, _handle: NativeTextureHandle, _event: RenderSystemEvent) {}

    /// Create a native buffer with room for `capacity_bytes`
    fn create_buffer(
        &self,
        content: &BufferContent<'_>,
        capacity_bytes: usize,
        is_dynamic: bool,
    ) -> RenderResult<NativeBufferHandle>;

    /// Replace the content of a buffer created with the dynamic hint
    fn update_buffer(&self, handle: NativeBufferHandle, content: &BufferContent<'_>) -> RenderResult<()>;

    /// Destroy a native buffer
    fn destroy_buffer(&self, handle: NativeBufferHandle);

    /// Render system event delivered to a live dynamic buffer
    fn on_dynamic_buffer_event(&self, _handle: NativeBufferHandle, _event: RenderSystemEvent) {}

    /// Create a native material
    fn create_material(&self, create_info: &NativeMaterialCreateInfo<'_>) -> RenderResult<NativeMaterialHandle>;

    /// Destroy a native material
    fn destroy_material(&self, handle: NativeMaterialHandle);

    /// Create swapchain dependent device state
    fn create_dependent_resources(&self, create_info: &DependentCreateInfo) -> RenderResult<()>;

    /// Destroy swapchain dependent device state
    fn destroy_dependent_resources(&self);

    /// Begin recording a frame
    fn begin_frame(&self, frame_info: &BeginFrameInfo);

    /// Finish recording a frame
    fn end_frame(&self);

    /// Open a caching window
    fn begin_cache(&self);

    /// Close the caching window
    fn end_cache(&self);

    /// Begin a command block
    fn begin_cmds(&self);

    /// End the command block
    fn end_cmds(&self);

    /// Set the active camera
    fn cmd_set_camera(&self, camera: &CameraInfo);

    /// Bind a material together with its textures
    fn cmd_bind_material(&self, material: NativeMaterialHandle, textures: &[NativeTextureHandle]);

    /// Bind an index buffer
    fn cmd_bind_index_buffer(&self, buffer: NativeBufferHandle);

    /// Bind a vertex buffer
    fn cmd_bind_vertex_buffer(&self, buffer: NativeBufferHandle);

    /// Draw non-indexed vertices
    fn cmd_draw(&self, vertex_count: u32, first_vertex: u32);

    /// Draw indexed vertices
    fn cmd_draw_indexed(&self, index_count: u32, first_index: u32);
}

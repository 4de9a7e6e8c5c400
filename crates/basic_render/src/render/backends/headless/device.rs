//! In-memory native device

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::render::api::{
    BeginFrameInfo, CameraInfo, DependentCreateInfo, NativeBufferHandle, NativeDevice, NativeMaterialCreateInfo,
    NativeMaterialHandle, NativeTextureHandle, NativeTextureInfo, TextureCaps,
};
use crate::render::resources::{BufferContent, PxExtent2D, RawTexture, TextureFilterHint, TextureFlags};
use crate::render::{RenderError, RenderResult, RenderSystemEvent};

/// One call received by a [`HeadlessDevice`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    /// Texture created
    CreateTexture(NativeTextureHandle),
    /// Texture content replaced
    UpdateTexture(NativeTextureHandle),
    /// Texture destroyed
    DestroyTexture(NativeTextureHandle),
    /// Event forwarded to a dynamic texture
    TextureEvent(NativeTextureHandle, RenderSystemEvent),
    /// Buffer created
    CreateBuffer(NativeBufferHandle),
    /// Buffer content replaced
    UpdateBuffer(NativeBufferHandle),
    /// Buffer destroyed
    DestroyBuffer(NativeBufferHandle),
    /// Event forwarded to a dynamic buffer
    BufferEvent(NativeBufferHandle, RenderSystemEvent),
    /// Material created
    CreateMaterial(NativeMaterialHandle),
    /// Material destroyed
    DestroyMaterial(NativeMaterialHandle),
    /// Swapchain dependent state created
    CreateDependentResources(PxExtent2D),
    /// Swapchain dependent state destroyed
    DestroyDependentResources,
    /// Frame started
    BeginFrame(u32),
    /// Frame finished
    EndFrame,
    /// Caching window opened
    BeginCache,
    /// Caching window closed
    EndCache,
    /// Command block opened
    BeginCmds,
    /// Command block closed
    EndCmds,
    /// Camera set
    SetCamera,
    /// Material bound with its textures
    BindMaterial(NativeMaterialHandle, Vec<NativeTextureHandle>),
    /// Index buffer bound
    BindIndexBuffer(NativeBufferHandle),
    /// Vertex buffer bound
    BindVertexBuffer(NativeBufferHandle),
    /// Non-indexed draw
    Draw {
        /// Vertices drawn
        vertex_count: u32,
        /// First vertex
        first_vertex: u32,
    },
    /// Indexed draw
    DrawIndexed {
        /// Indices drawn
        index_count: u32,
        /// First index
        first_index: u32,
    },
}

#[derive(Debug, Default)]
struct DeviceState {
    next_id: u64,
    textures: HashMap<NativeTextureHandle, NativeTextureInfo>,
    buffers: HashMap<NativeBufferHandle, usize>,
    materials: HashSet<NativeMaterialHandle>,
    created_textures: usize,
    created_buffers: usize,
    created_materials: usize,
    dependent_extent: Option<PxExtent2D>,
    last_camera: Option<CameraInfo>,
    calls: Vec<DeviceCall>,
    fail_textures: bool,
    fail_buffers: bool,
    fail_dependent_resources: bool,
    material_budget: Option<usize>,
}

impl DeviceState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Native device that keeps everything in memory
#[derive(Debug)]
pub struct HeadlessDevice {
    caps: TextureCaps,
    state: RefCell<DeviceState>,
}

impl HeadlessDevice {
    /// Device supporting dynamic textures
    pub fn new() -> Self {
        Self::with_caps(TextureCaps::DYNAMIC_UPDATE)
    }

    /// Device reporting the given texture caps
    pub fn with_caps(caps: TextureCaps) -> Self {
        Self {
            caps,
            state: RefCell::new(DeviceState::default()),
        }
    }

    /// Make texture creation fail
    pub fn set_fail_texture_creation(&self, fail: bool) {
        self.state.borrow_mut().fail_textures = fail;
    }

    /// Make buffer creation fail
    pub fn set_fail_buffer_creation(&self, fail: bool) {
        self.state.borrow_mut().fail_buffers = fail;
    }

    /// Make material creation fail
    pub fn set_fail_material_creation(&self, fail: bool) {
        self.state.borrow_mut().material_budget = fail.then_some(0);
    }

    /// Let `count` more material creations succeed, then fail
    pub fn fail_material_creation_after(&self, count: usize) {
        self.state.borrow_mut().material_budget = Some(count);
    }

    /// Make dependent resource creation fail
    pub fn set_fail_dependent_resources(&self, fail: bool) {
        self.state.borrow_mut().fail_dependent_resources = fail;
    }

    /// Number of live textures
    pub fn live_texture_count(&self) -> usize {
        self.state.borrow().textures.len()
    }

    /// Number of live buffers
    pub fn live_buffer_count(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    /// Number of live materials
    pub fn live_material_count(&self) -> usize {
        self.state.borrow().materials.len()
    }

    /// Textures created so far
    pub fn created_texture_count(&self) -> usize {
        self.state.borrow().created_textures
    }

    /// Buffers created so far
    pub fn created_buffer_count(&self) -> usize {
        self.state.borrow().created_buffers
    }

    /// Materials created so far
    pub fn created_material_count(&self) -> usize {
        self.state.borrow().created_materials
    }

    /// True if the texture has not been destroyed
    pub fn is_texture_alive(&self, handle: NativeTextureHandle) -> bool {
        self.state.borrow().textures.contains_key(&handle)
    }

    /// True if the buffer has not been destroyed
    pub fn is_buffer_alive(&self, handle: NativeBufferHandle) -> bool {
        self.state.borrow().buffers.contains_key(&handle)
    }

    /// True if the material has not been destroyed
    pub fn is_material_alive(&self, handle: NativeMaterialHandle) -> bool {
        self.state.borrow().materials.contains(&handle)
    }

    /// Extent of the current dependent resources
    pub fn dependent_extent(&self) -> Option<PxExtent2D> {
        self.state.borrow().dependent_extent
    }

    /// Camera of the last `cmd_set_camera`
    pub fn last_camera(&self) -> Option<CameraInfo> {
        self.state.borrow().last_camera
    }

    /// Calls received since creation or the last [`HeadlessDevice::clear_calls`]
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state.borrow().calls.clone()
    }

    /// Forget the recorded calls
    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    fn record(&self, call: DeviceCall) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeDevice for HeadlessDevice {
    fn texture_caps(&self) -> TextureCaps {
        self.caps
    }

    fn create_texture(
        &self,
        texture: &RawTexture<'_>,
        _filter: TextureFilterHint,
        _flags: TextureFlags,
        is_dynamic: bool,
    ) -> RenderResult<NativeTextureHandle> {
        let mut state = self.state.borrow_mut();
        if state.fail_textures {
            return Err(RenderError::ResourceCreationFailed("headless texture creation disabled".to_string()));
        }
        let handle = NativeTextureHandle(state.next_id());
        state.textures.insert(
            handle,
            NativeTextureInfo {
                handle,
                extent_px: texture.extent_px,
                is_dynamic,
            },
        );
        state.created_textures += 1;
        state.calls.push(DeviceCall::CreateTexture(handle));
        Ok(handle)
    }

    fn update_texture(
        &self,
        handle: NativeTextureHandle,
        texture: &RawTexture<'_>,
        _filter: TextureFilterHint,
        _flags: TextureFlags,
    ) -> RenderResult<()> {
        let mut state = self.state.borrow_mut();
        let info = state
            .textures
            .get_mut(&handle)
            .ok_or_else(|| RenderError::NotFound(format!("native texture {}", handle.0)))?;
        if !info.is_dynamic {
            return Err(RenderError::UsageError(format!("native texture {} is not dynamic", handle.0)));
        }
        info.extent_px = texture.extent_px;
        state.calls.push(DeviceCall::UpdateTexture(handle));
        Ok(())
    }

    fn destroy_texture(&self, handle: NativeTextureHandle) {
        let mut state = self.state.borrow_mut();
        if state.textures.remove(&handle).is_none() {
            log::warn!("HeadlessDevice: destroy of unknown texture {}", handle.0);
        }
        state.calls.push(DeviceCall::DestroyTexture(handle));
    }

    fn try_get_texture(&self, handle: NativeTextureHandle) -> Option<NativeTextureInfo> {
        self.state.borrow().textures.get(&handle).copied()
    }

    fn on_dynamic_texture_event(&self, handle: NativeTextureHandle, event: RenderSystemEvent) {
        self.record(DeviceCall::TextureEvent(handle, event));
    }

    fn create_buffer(
        &self,
        content: &BufferContent<'_>,
        capacity_bytes: usize,
        _is_dynamic: bool,
    ) -> RenderResult<NativeBufferHandle> {
        let mut state = self.state.borrow_mut();
        if state.fail_buffers {
            return Err(RenderError::ResourceCreationFailed("headless buffer creation disabled".to_string()));
        }
        if content.bytes.len() > capacity_bytes {
            return Err(RenderError::InvalidArgument(format!(
                "{} bytes do not fit a buffer of {} bytes",
                content.bytes.len(),
                capacity_bytes
            )));
        }
        let handle = NativeBufferHandle(state.next_id());
        state.buffers.insert(handle, capacity_bytes);
        state.created_buffers += 1;
        state.calls.push(DeviceCall::CreateBuffer(handle));
        Ok(handle)
    }

    fn update_buffer(&self, handle: NativeBufferHandle, content: &BufferContent<'_>) -> RenderResult<()> {
        let mut state = self.state.borrow_mut();
        let capacity = *state
            .buffers
            .get(&handle)
            .ok_or_else(|| RenderError::NotFound(format!("native buffer {}", handle.0)))?;
        if content.bytes.len() > capacity {
            return Err(RenderError::InvalidArgument(format!(
                "{} bytes do not fit native buffer {} ({} bytes)",
                content.bytes.len(),
                handle.0,
                capacity
            )));
        }
        state.calls.push(DeviceCall::UpdateBuffer(handle));
        Ok(())
    }

    fn destroy_buffer(&self, handle: NativeBufferHandle) {
        let mut state = self.state.borrow_mut();
        if state.buffers.remove(&handle).is_none() {
            log::warn!("HeadlessDevice: destroy of unknown buffer {}", handle.0);
        }
        state.calls.push(DeviceCall::DestroyBuffer(handle));
    }

    fn on_dynamic_buffer_event(&self, handle: NativeBufferHandle, event: RenderSystemEvent) {
        self.record(DeviceCall::BufferEvent(handle, event));
    }

    fn create_material(&self, create_info: &NativeMaterialCreateInfo<'_>) -> RenderResult<NativeMaterialHandle> {
        let mut state = self.state.borrow_mut();
        let budget = state.material_budget;
        match budget {
            Some(0) => {
                return Err(RenderError::ResourceCreationFailed(
                    "headless material creation disabled".to_string(),
                ))
            }
            Some(remaining) => state.material_budget = Some(remaining - 1),
            None => {}
        }
        let handle = NativeMaterialHandle(state.next_id());
        log::trace!(
            "HeadlessDevice: material {} ({:?}, shaders {}/{})",
            handle.0,
            create_info.info.blend,
            create_info.vertex_shader.0,
            create_info.fragment_shader.0
        );
        state.materials.insert(handle);
        state.created_materials += 1;
        state.calls.push(DeviceCall::CreateMaterial(handle));
        Ok(handle)
    }

    fn destroy_material(&self, handle: NativeMaterialHandle) {
        let mut state = self.state.borrow_mut();
        if !state.materials.remove(&handle) {
            log::warn!("HeadlessDevice: destroy of unknown material {}", handle.0);
        }
        state.calls.push(DeviceCall::DestroyMaterial(handle));
    }

    fn create_dependent_resources(&self, create_info: &DependentCreateInfo) -> RenderResult<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_dependent_resources {
            return Err(RenderError::ResourceCreationFailed(
                "headless dependent resource creation disabled".to_string(),
            ));
        }
        state.dependent_extent = Some(create_info.extent_px);
        state
            .calls
            .push(DeviceCall::CreateDependentResources(create_info.extent_px));
        Ok(())
    }

    fn destroy_dependent_resources(&self) {
        let mut state = self.state.borrow_mut();
        state.dependent_extent = None;
        state.calls.push(DeviceCall::DestroyDependentResources);
    }

    fn begin_frame(&self, frame_info: &BeginFrameInfo) {
        self.record(DeviceCall::BeginFrame(frame_info.frame_index));
    }

    fn end_frame(&self) {
        self.record(DeviceCall::EndFrame);
    }

    fn begin_cache(&self) {
        self.record(DeviceCall::BeginCache);
    }

    fn end_cache(&self) {
        self.record(DeviceCall::EndCache);
    }

    fn begin_cmds(&self) {
        self.record(DeviceCall::BeginCmds);
    }

    fn end_cmds(&self) {
        self.record(DeviceCall::EndCmds);
    }

    fn cmd_set_camera(&self, camera: &CameraInfo) {
        let mut state = self.state.borrow_mut();
        state.last_camera = Some(*camera);
        state.calls.push(DeviceCall::SetCamera);
    }

    fn cmd_bind_material(&self, material: NativeMaterialHandle, textures: &[NativeTextureHandle]) {
        self.record(DeviceCall::BindMaterial(material, textures.to_vec()));
    }

    fn cmd_bind_index_buffer(&self, buffer: NativeBufferHandle) {
        self.record(DeviceCall::BindIndexBuffer(buffer));
    }

    fn cmd_bind_vertex_buffer(&self, buffer: NativeBufferHandle) {
        self.record(DeviceCall::BindVertexBuffer(buffer));
    }

    fn cmd_draw(&self, vertex_count: u32, first_vertex: u32) {
        self.record(DeviceCall::Draw {
            vertex_count,
            first_vertex,
        });
    }

    fn cmd_draw_indexed(&self, index_count: u32, first_index: u32) {
        self.record(DeviceCall::DrawIndexed {
            index_count,
            first_index,
        });
    }
}

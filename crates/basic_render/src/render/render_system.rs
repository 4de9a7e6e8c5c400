//! Render system facade
//!
//! Owns the four resource managers, drives their per-frame garbage
//! collection and presentation events in a fixed order, and guards the
//! frame / cache / command block state machine in front of the device.

use std::rc::Rc;

use super::api::{
    BeginFrameInfo, CameraInfo, DependentCreateInfo, NativeDevice, NativeShaderFactory, NativeTextureHandle,
    ShaderCreateInfo, TextureCaps,
};
use super::managers::{BufferManager, MaterialManager, ShaderManager, TextureManager};
use super::resources::{
    Buffer, BufferContent, BufferType, BufferUsage, DynamicBuffer, DynamicTexture, Material, MaterialCreateInfo,
    MaterialInfo, PredefinedShaderType, PxExtent2D, RawTexture, ShaderHandle, StaticBuffer, StaticTexture,
    Texture2D, TextureFilterHint, TextureFlags, TextureHandle, VertexDeclaration,
};
use super::{RenderError, RenderResult, RenderSystemEvent};
use crate::core::RenderSystemConfig;

/// The resource managers owned by the render system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceManagerKind {
    /// [`ShaderManager`]
    Shaders,
    /// [`BufferManager`]
    Buffers,
    /// [`TextureManager`]
    Textures,
    /// [`MaterialManager`]
    Materials,
}

/// Direction a lifecycle call travels through the managers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CascadeDirection {
    /// Dependencies before dependents
    Build,
    /// Dependents before dependencies
    Teardown,
}

impl CascadeDirection {
    /// Direction used to deliver `event`
    pub const fn for_event(event: RenderSystemEvent) -> Self {
        match event {
            RenderSystemEvent::SwapchainRecreated => Self::Build,
            RenderSystemEvent::SwapchainLost => Self::Teardown,
        }
    }
}

/// Order in which the managers are visited
///
/// Materials reference shaders, buffers and textures, so they are built last
/// and torn down first.
pub const fn cascade_order(direction: CascadeDirection) -> [ResourceManagerKind; 4] {
    match direction {
        CascadeDirection::Build => [
            ResourceManagerKind::Shaders,
            ResourceManagerKind::Buffers,
            ResourceManagerKind::Textures,
            ResourceManagerKind::Materials,
        ],
        CascadeDirection::Teardown => [
            ResourceManagerKind::Materials,
            ResourceManagerKind::Textures,
            ResourceManagerKind::Buffers,
            ResourceManagerKind::Shaders,
        ],
    }
}

/// Caching classification of the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CachingState {
    /// No caching window is open
    #[default]
    Invalid,
    /// Opened by `begin_cache`
    UserCached,
    /// Opened implicitly by `begin_cmds`
    ForceCached,
}

#[derive(Debug, Default)]
struct FrameRecord {
    in_frame: bool,
    recording_cmds: bool,
    caching: CachingState,
    // Layouts of the bindings in the current command block
    material_declaration: Option<VertexDeclaration>,
    vertex_declaration: Option<VertexDeclaration>,
}

/// Everything needed to create a [`RenderSystem`]
pub struct RenderSystemCreateInfo {
    /// Native device
    pub device: Rc<dyn NativeDevice>,
    /// Native shader factory
    pub shader_factory: Rc<dyn NativeShaderFactory>,
    /// Frames in flight and defer policy
    pub config: RenderSystemConfig,
}

impl RenderSystemCreateInfo {
    /// Bundle the collaborators and the configuration
    pub fn new(
        device: Rc<dyn NativeDevice>,
        shader_factory: Rc<dyn NativeShaderFactory>,
        config: RenderSystemConfig,
    ) -> Self {
        Self {
            device,
            shader_factory,
            config,
        }
    }
}

/// Render system facade
///
/// ```text
/// Constructed ──create_dependent_resources──> DependentResourcesValid
///      ^                                              │
///      └──── destroy_dependent_resources | lost ──────┘
///
/// Idle ──begin_frame──> InFrame ──begin_cmds──> RecordingCmds
///   ^                      │  ^                       │
///   └────── end_frame ─────┘  └──────── end_cmds ─────┘
/// ```
pub struct RenderSystem {
    device: Rc<dyn NativeDevice>,
    config: RenderSystemConfig,
    shaders: ShaderManager,
    textures: TextureManager,
    buffers: BufferManager,
    materials: MaterialManager,
    dependent_resources_valid: bool,
    frame: FrameRecord,
}

impl RenderSystem {
    /// Create the render system and its predefined shaders
    pub fn new(create_info: RenderSystemCreateInfo) -> RenderResult<Self> {
        let RenderSystemCreateInfo {
            device,
            shader_factory,
            config,
        } = create_info;
        config.validate()?;

        let shaders = ShaderManager::new(shader_factory)?;
        let textures = TextureManager::new(Rc::clone(&device), &config);
        let buffers = BufferManager::new(Rc::clone(&device), &config);
        let materials = MaterialManager::new(Rc::clone(&device), &config);
        log::info!(
            "RenderSystem: created with {} frames in flight",
            config.max_frames_in_flight
        );
        Ok(Self {
            device,
            config,
            shaders,
            textures,
            buffers,
            materials,
            dependent_resources_valid: false,
            frame: FrameRecord::default(),
        })
    }

    /// Active configuration
    pub const fn config(&self) -> &RenderSystemConfig {
        &self.config
    }

    /// Texture manager
    pub const fn textures(&self) -> &TextureManager {
        &self.textures
    }

    /// Buffer manager
    pub const fn buffers(&self) -> &BufferManager {
        &self.buffers
    }

    /// Shader manager
    pub const fn shaders(&self) -> &ShaderManager {
        &self.shaders
    }

    /// Material manager
    pub const fn materials(&self) -> &MaterialManager {
        &self.materials
    }

    /// True between `create_dependent_resources` and its teardown
    pub const fn is_dependent_resources_valid(&self) -> bool {
        self.dependent_resources_valid
    }

    /// True between `begin_frame` and `end_frame`
    pub const fn is_in_frame(&self) -> bool {
        self.frame.in_frame
    }

    /// True between `begin_cmds` and `end_cmds`
    pub const fn is_recording_cmds(&self) -> bool {
        self.frame.recording_cmds
    }

    /// Caching classification of the current frame
    pub const fn caching_state(&self) -> CachingState {
        self.frame.caching
    }

    // ---------------------------------------------------------------------
    // Lifecycle

    /// Run one garbage collection pass in every manager
    pub fn pre_update(&mut self) {
        for kind in cascade_order(CascadeDirection::Teardown) {
            match kind {
                ResourceManagerKind::Materials => self.materials.pre_update(&mut self.shaders),
                ResourceManagerKind::Textures => self.textures.pre_update(),
                ResourceManagerKind::Buffers => self.buffers.pre_update(),
                ResourceManagerKind::Shaders => {}
            }
        }
    }

    /// Deliver a presentation event to every manager
    ///
    /// A lost swapchain also tears down the dependent resources since the
    /// device is idle at that point.
    pub fn on_render_system_event(&mut self, event: RenderSystemEvent) {
        log::info!("RenderSystem: {:?}", event);
        if event == RenderSystemEvent::SwapchainLost && self.dependent_resources_valid {
            self.dependent_resources_valid = false;
            self.teardown_dependent_resources();
        }
        for kind in cascade_order(CascadeDirection::for_event(event)) {
            match kind {
                ResourceManagerKind::Shaders => self.shaders.on_render_system_event(event),
                ResourceManagerKind::Buffers => self.buffers.on_render_system_event(event),
                ResourceManagerKind::Textures => self.textures.on_render_system_event(event),
                ResourceManagerKind::Materials => self.materials.on_render_system_event(&mut self.shaders, event),
            }
        }
    }

    /// Create swapchain dependent resources
    ///
    /// On failure everything created so far is torn down again.
    pub fn create_dependent_resources(&mut self, create_info: &DependentCreateInfo) -> RenderResult<()> {
        if self.dependent_resources_valid {
            return Err(RenderError::UsageError(
                "dependent resources are already created".to_string(),
            ));
        }
        self.device.create_dependent_resources(create_info)?;
        for kind in cascade_order(CascadeDirection::Build) {
            let result = match kind {
                ResourceManagerKind::Shaders => Ok(()),
                ResourceManagerKind::Buffers => {
                    self.buffers.create_dependent_resources();
                    Ok(())
                }
                ResourceManagerKind::Textures => {
                    self.textures.create_dependent_resources();
                    Ok(())
                }
                ResourceManagerKind::Materials => self.materials.create_dependent_resources(&self.shaders),
            };
            if let Err(err) = result {
                log::error!("RenderSystem: dependent resource creation failed: {}", err);
                self.teardown_dependent_resources();
                return Err(err);
            }
        }
        self.dependent_resources_valid = true;
        log::info!(
            "RenderSystem: dependent resources created ({}x{})",
            create_info.extent_px.width,
            create_info.extent_px.height
        );
        Ok(())
    }

    /// Destroy swapchain dependent resources
    pub fn destroy_dependent_resources(&mut self) {
        if !self.dependent_resources_valid {
            log::debug!("RenderSystem: dependent resources are not created");
            return;
        }
        self.dependent_resources_valid = false;
        self.teardown_dependent_resources();
        log::info!("RenderSystem: dependent resources destroyed");
    }

    fn teardown_dependent_resources(&mut self) {
        for kind in cascade_order(CascadeDirection::Teardown) {
            match kind {
                ResourceManagerKind::Materials => self.materials.destroy_dependent_resources(&mut self.shaders),
                ResourceManagerKind::Textures => self.textures.destroy_dependent_resources(),
                ResourceManagerKind::Buffers => self.buffers.destroy_dependent_resources(),
                ResourceManagerKind::Shaders => {}
            }
        }
        self.device.destroy_dependent_resources();
    }

    // ---------------------------------------------------------------------
    // Frame state machine

    /// Begin a frame; an unfinished previous frame is ended first
    pub fn begin_frame(&mut self, frame_info: &BeginFrameInfo) {
        if self.frame.in_frame {
            log::error!("RenderSystem: begin_frame called while in a frame, ending the previous frame");
            self.end_frame();
        }
        self.device.begin_frame(frame_info);
        self.frame.in_frame = true;
    }

    /// End the current frame
    pub fn end_frame(&mut self) {
        if !self.frame.in_frame {
            log::warn!("RenderSystem: end_frame called outside a frame, ignored");
            return;
        }
        if self.frame.recording_cmds {
            log::error!("RenderSystem: end_frame called while recording commands, ending them");
            self.end_cmds();
        }
        if self.frame.caching == CachingState::UserCached {
            log::error!("RenderSystem: end_frame called with an open cache window, closing it");
            self.end_cache();
        }
        self.device.end_frame();
        self.frame.in_frame = false;
    }

    /// Open a user cache window
    pub fn begin_cache(&mut self) {
        if !self.frame.in_frame || self.frame.recording_cmds || self.frame.caching != CachingState::Invalid {
            log::error!(
                "RenderSystem: begin_cache ignored (in_frame: {}, recording: {}, caching: {:?})",
                self.frame.in_frame,
                self.frame.recording_cmds,
                self.frame.caching
            );
            return;
        }
        self.device.begin_cache();
        self.frame.caching = CachingState::UserCached;
    }

    /// Close the user cache window
    pub fn end_cache(&mut self) {
        if self.frame.recording_cmds || self.frame.caching != CachingState::UserCached {
            log::error!(
                "RenderSystem: end_cache ignored (recording: {}, caching: {:?})",
                self.frame.recording_cmds,
                self.frame.caching
            );
            return;
        }
        self.device.end_cache();
        self.frame.caching = CachingState::Invalid;
    }

    /// Begin a command block
    ///
    /// Without an open cache window a force-cached one is opened for the
    /// duration of the block.
    pub fn begin_cmds(&mut self) -> RenderResult<()> {
        if !self.frame.in_frame {
            return Err(RenderError::UsageError("begin_cmds called outside a frame".to_string()));
        }
        if self.frame.recording_cmds {
            log::error!("RenderSystem: begin_cmds called while recording, ending the previous block");
            self.end_cmds();
        }
        if self.frame.caching == CachingState::Invalid {
            self.device.begin_cache();
            self.frame.caching = CachingState::ForceCached;
        }
        self.device.begin_cmds();
        self.frame.recording_cmds = true;
        self.frame.material_declaration = None;
        self.frame.vertex_declaration = None;
        Ok(())
    }

    /// End the command block
    pub fn end_cmds(&mut self) {
        if !self.frame.recording_cmds {
            log::warn!("RenderSystem: end_cmds called outside a command block, ignored");
            return;
        }
        self.device.end_cmds();
        self.frame.recording_cmds = false;
        if self.frame.caching == CachingState::ForceCached {
            self.device.end_cache();
            self.frame.caching = CachingState::Invalid;
        }
    }

    fn ensure_recording(&self, command: &str) -> RenderResult<()> {
        if self.frame.recording_cmds {
            Ok(())
        } else {
            Err(RenderError::UsageError(format!(
                "{} called outside a begin_cmds/end_cmds block",
                command
            )))
        }
    }

    fn ensure_matching_layout(&self, command: &str) -> RenderResult<()> {
        match (&self.frame.material_declaration, &self.frame.vertex_declaration) {
            (Some(material), Some(vertices)) if material != vertices => Err(RenderError::InvalidArgument(format!(
                "{}: vertex buffer layout (stride {}) does not match the bound material (stride {})",
                command, vertices.stride, material.stride
            ))),
            _ => Ok(()),
        }
    }

    // ---------------------------------------------------------------------
    // Commands

    /// Set the camera used by following draws
    pub fn cmd_set_camera(&mut self, camera: &CameraInfo) -> RenderResult<()> {
        self.ensure_recording("cmd_set_camera")?;
        self.device.cmd_set_camera(camera);
        Ok(())
    }

    /// Bind a material and its texture
    ///
    /// A material without a native counterpart is logged and skipped.
    pub fn cmd_bind_material(&mut self, material: &Material) -> RenderResult<()> {
        self.ensure_recording("cmd_bind_material")?;
        let Some(native) = self.materials.try_get_native_material(material) else {
            log::error!("RenderSystem: material {} has no native material", material.handle().0);
            return Ok(());
        };
        let textures: Vec<NativeTextureHandle> = self
            .materials
            .try_get_material_texture(material)
            .and_then(|texture| self.textures.try_get_native_texture(texture.handle()))
            .into_iter()
            .collect();
        self.device.cmd_bind_material(native, &textures);
        self.frame.material_declaration = self.materials.try_get_material_vertex_declaration(material).cloned();
        Ok(())
    }

    /// Bind an index buffer
    pub fn cmd_bind_index_buffer(&mut self, buffer: &Buffer) -> RenderResult<()> {
        self.ensure_recording("cmd_bind_index_buffer")?;
        match self.buffers.native_buffer_of_type(buffer, BufferType::Index)? {
            Some(native) => self.device.cmd_bind_index_buffer(native),
            None => log::error!("RenderSystem: index buffer {} has no native buffer", buffer.handle().0),
        }
        Ok(())
    }

    /// Bind a vertex buffer
    pub fn cmd_bind_vertex_buffer(&mut self, buffer: &Buffer) -> RenderResult<()> {
        self.ensure_recording("cmd_bind_vertex_buffer")?;
        match self.buffers.native_buffer_of_type(buffer, BufferType::Vertex)? {
            Some(native) => {
                self.device.cmd_bind_vertex_buffer(native);
                self.frame.vertex_declaration = buffer.vertex_declaration().cloned();
            }
            None => log::error!("RenderSystem: vertex buffer {} has no native buffer", buffer.handle().0),
        }
        Ok(())
    }

    /// Draw non-indexed vertices
    ///
    /// Fails if the bound vertex buffer layout differs from the bound material's.
    pub fn cmd_draw(&mut self, vertex_count: u32, first_vertex: u32) -> RenderResult<()> {
        self.ensure_recording("cmd_draw")?;
        self.ensure_matching_layout("cmd_draw")?;
        self.device.cmd_draw(vertex_count, first_vertex);
        Ok(())
    }

    /// Draw indexed vertices
    ///
    /// Fails if the bound vertex buffer layout differs from the bound material's.
    pub fn cmd_draw_indexed(&mut self, index_count: u32, first_index: u32) -> RenderResult<()> {
        self.ensure_recording("cmd_draw_indexed")?;
        self.ensure_matching_layout("cmd_draw_indexed")?;
        self.device.cmd_draw_indexed(index_count, first_index);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Textures

    /// Texture capabilities of the device
    pub fn texture_caps(&self) -> TextureCaps {
        self.textures.texture_caps()
    }

    /// Create an immutable texture
    pub fn create_texture_2d(
        &mut self,
        texture: &RawTexture<'_>,
        filter: TextureFilterHint,
        flags: TextureFlags,
    ) -> RenderResult<Rc<StaticTexture>> {
        self.textures.create_texture_2d(texture, filter, flags)
    }

    /// Create an updatable texture
    pub fn create_dynamic_texture_2d(
        &mut self,
        texture: &RawTexture<'_>,
        filter: TextureFilterHint,
        flags: TextureFlags,
    ) -> RenderResult<Rc<DynamicTexture>> {
        self.textures.create_dynamic_texture_2d(texture, filter, flags)
    }

    /// Size of a texture, empty if unknown
    pub fn get_texture_extent_px(&self, texture: Option<&Texture2D>) -> PxExtent2D {
        self.textures.get_texture_extent_px(texture)
    }

    /// Native texture behind `handle`
    pub fn try_get_native_texture(&self, handle: TextureHandle) -> Option<NativeTextureHandle> {
        self.textures.try_get_native_texture(handle)
    }

    // ---------------------------------------------------------------------
    // Buffers

    /// Create a buffer of the requested usage
    pub fn create_buffer(&mut self, content: &BufferContent<'_>, usage: BufferUsage) -> RenderResult<Buffer> {
        self.buffers.create_buffer(content, usage)
    }

    /// Create an immutable buffer
    pub fn create_static_buffer(&mut self, content: &BufferContent<'_>) -> RenderResult<Rc<StaticBuffer>> {
        self.buffers.create_static_buffer(content)
    }

    /// Create an updatable buffer holding up to `capacity` elements
    pub fn create_dynamic_buffer(
        &mut self,
        content: &BufferContent<'_>,
        capacity: usize,
    ) -> RenderResult<Rc<DynamicBuffer>> {
        self.buffers.create_dynamic_buffer(content, capacity)
    }

    // ---------------------------------------------------------------------
    // Shaders

    /// Create a custom shader
    pub fn create_shader(&mut self, create_info: &ShaderCreateInfo) -> RenderResult<ShaderHandle> {
        self.shaders.create_shader(create_info)
    }

    /// Add a reference to a shader
    pub fn reference_shader(&mut self, handle: ShaderHandle) -> RenderResult<ShaderHandle> {
        self.shaders.reference_shader(handle)
    }

    /// Release a shader reference
    pub fn destroy_shader(&mut self, handle: ShaderHandle) -> bool {
        self.shaders.destroy_shader(handle)
    }

    /// Handle of a predefined shader
    pub const fn query_predefined_shader_handle(&self, shader_type: PredefinedShaderType) -> ShaderHandle {
        self.shaders.query_predefined_shader_handle(shader_type)
    }

    // ---------------------------------------------------------------------
    // Materials

    /// Create a material
    pub fn create_material(&mut self, create_info: &MaterialCreateInfo, is_dynamic: bool) -> RenderResult<Material> {
        self.materials.create_material(&mut self.shaders, create_info, is_dynamic)
    }

    /// Create a material from `source` with a different texture
    pub fn clone_material_with_texture(
        &mut self,
        source: &Material,
        texture: Texture2D,
        is_dynamic: bool,
    ) -> RenderResult<Material> {
        self.materials
            .clone_material_with_texture(&mut self.shaders, source, texture, is_dynamic)
    }

    /// Create a material from `source` with different fixed function state
    pub fn clone_material_with_info(
        &mut self,
        source: &Material,
        info: MaterialInfo,
        is_dynamic: bool,
    ) -> RenderResult<Material> {
        self.materials
            .clone_material_with_info(&mut self.shaders, source, info, is_dynamic)
    }

    /// Fixed function state of a material
    pub fn get_material_info(&self, material: &Material) -> RenderResult<MaterialInfo> {
        self.materials.get_material_info(material)
    }

    /// Change the fixed function state of a dynamic material
    pub fn set_material_info(&mut self, material: &Material, info: MaterialInfo) -> RenderResult<()> {
        self.materials.set_material_info(&self.shaders, material, info)
    }

    /// Texture used by a material
    pub fn try_get_material_texture(&self, material: &Material) -> Option<Texture2D> {
        self.materials.try_get_material_texture(material)
    }
}

impl Drop for RenderSystem {
    fn drop(&mut self) {
        if self.dependent_resources_valid {
            log::warn!("RenderSystem: dropped with dependent resources still allocated, destroying them");
            self.destroy_dependent_resources();
        }
        self.materials.force_free_all(&mut self.shaders);
        self.textures.force_free_all();
        self.buffers.force_free_all();
        self.shaders.force_free_all();
        log::info!("RenderSystem: shut down");
    }
}

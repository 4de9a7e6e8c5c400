//! Material lifetime management
//!
//! A material record owns a reference to both of its shaders and a strong
//! reference to its texture. Records go away as soon as the application
//! drops the last [`Material`]; the native material they created is retired
//! and destroyed once the frames-in-flight window has drained.
//!
//! Native materials only exist while dependent resources are valid, because
//! backends bake swapchain state (render pass, viewport) into them.

use std::rc::{Rc, Weak};

use super::deferred::{collect_step, CollectAction, CollectPass};
use super::shader_manager::ShaderManager;
use crate::core::{DeferPolicy, RenderSystemConfig};
use crate::foundation::collections::HandleTable;
use crate::render::api::{NativeDevice, NativeMaterialCreateInfo, NativeMaterialHandle, ShaderStage};
use crate::render::resources::{
    BlendState, Material, MaterialCreateInfo, MaterialHandle, MaterialInfo, MaterialTracker, PredefinedShaderType,
    ShaderHandle, Texture2D, VertexDeclaration,
};
use crate::render::{RenderError, RenderResult, RenderSystemEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
struct MaterialDetails {
    info: MaterialInfo,
    vertex_declaration: VertexDeclaration,
    vertex_shader: ShaderHandle,
    fragment_shader: ShaderHandle,
}

struct MaterialRecord {
    details: MaterialDetails,
    texture: Texture2D,
    is_dynamic: bool,
    tracker: Weak<MaterialTracker>,
    native: Option<NativeMaterialHandle>,
}

impl MaterialRecord {
    fn is_alive(&self) -> bool {
        self.tracker.strong_count() > 0
    }

    fn belongs_to(&self, material: &Material) -> bool {
        Weak::ptr_eq(&self.tracker, &material.downgrade())
    }
}

struct RetiredMaterial {
    native: NativeMaterialHandle,
    defer_count: u32,
}

/// Manager for materials
///
/// Every operation that touches shader reference counts borrows the shader
/// manager; the shader manager never knows about materials.
pub struct MaterialManager {
    device: Rc<dyn NativeDevice>,
    max_frames_in_flight: u32,
    policy: DeferPolicy,
    dependent_resources_valid: bool,
    records: HandleTable<MaterialRecord>,
    retired: Vec<RetiredMaterial>,
}

impl MaterialManager {
    /// Create an empty manager
    pub fn new(device: Rc<dyn NativeDevice>, config: &RenderSystemConfig) -> Self {
        Self {
            device,
            max_frames_in_flight: config.max_frames_in_flight,
            policy: config.defer_policy,
            dependent_resources_valid: false,
            records: HandleTable::new(),
            retired: Vec::new(),
        }
    }

    /// Create a material
    ///
    /// Shaders default to the predefined textured pair (`FragmentSdf` for
    /// `BlendState::Sdf`). Static materials with identical details and
    /// texture share one record.
    pub fn create_material(
        &mut self,
        shaders: &mut ShaderManager,
        create_info: &MaterialCreateInfo,
        is_dynamic: bool,
    ) -> RenderResult<Material> {
        create_info.validate()?;
        let details = resolve_details(shaders, create_info)?;

        if !is_dynamic {
            if let Some(material) = self.try_reuse(&details, &create_info.texture) {
                return Ok(material);
            }
        }

        let vertex_shader = shaders.reference_shader(details.vertex_shader)?;
        if let Err(err) = shaders.reference_shader(details.fragment_shader) {
            shaders.destroy_shader(vertex_shader);
            return Err(err);
        }

        let native = if self.dependent_resources_valid {
            match self.create_native(shaders, &details) {
                Ok(native) => Some(native),
                Err(err) => {
                    shaders.destroy_shader(details.fragment_shader);
                    shaders.destroy_shader(details.vertex_shader);
                    return Err(err);
                }
            }
        } else {
            None
        };

        let texture = create_info.texture.clone();
        let (handle, material) = self.records.add_with(|handle| {
            let material = Material::new(MaterialHandle(handle), is_dynamic);
            let record = MaterialRecord {
                details,
                texture,
                is_dynamic,
                tracker: material.downgrade(),
                native,
            };
            (record, material)
        });
        log::debug!(
            "MaterialManager: created material {} (dynamic: {}), count: {}",
            handle,
            is_dynamic,
            self.records.count()
        );
        Ok(material)
    }

    fn try_reuse(&mut self, details: &MaterialDetails, texture: &Texture2D) -> Option<Material> {
        let index = (0..self.records.count()).find(|&index| {
            self.records.get_at(index).is_some_and(|record| {
                !record.is_dynamic && record.details == *details && record.texture.ptr_eq(texture)
            })
        })?;
        let handle = self.records.fast_index_to_handle(index);
        let record = self.records.get_at_mut(index)?;
        if let Some(material) = Material::from_weak(&record.tracker) {
            log::trace!("MaterialManager: reusing material {}", handle);
            return Some(material);
        }
        log::trace!("MaterialManager: reusing material {} with a new tracker", handle);
        let material = Material::new(MaterialHandle(handle), false);
        record.tracker = material.downgrade();
        Some(material)
    }

    /// Create a material from `source` with a different texture
    pub fn clone_material_with_texture(
        &mut self,
        shaders: &mut ShaderManager,
        source: &Material,
        texture: Texture2D,
        is_dynamic: bool,
    ) -> RenderResult<Material> {
        let record = self.get_record(source)?;
        let create_info = clone_create_info(shaders, record, record.details.info, texture);
        let is_dynamic = record.is_dynamic || is_dynamic;
        self.create_material(shaders, &create_info, is_dynamic)
    }

    /// Create a material from `source` with different fixed function state
    pub fn clone_material_with_info(
        &mut self,
        shaders: &mut ShaderManager,
        source: &Material,
        info: MaterialInfo,
        is_dynamic: bool,
    ) -> RenderResult<Material> {
        let record = self.get_record(source)?;
        let create_info = clone_create_info(shaders, record, info, record.texture.clone());
        let is_dynamic = record.is_dynamic || is_dynamic;
        self.create_material(shaders, &create_info, is_dynamic)
    }

    /// Fixed function state of a material
    pub fn get_material_info(&self, material: &Material) -> RenderResult<MaterialInfo> {
        self.get_record(material).map(|record| record.details.info)
    }

    /// Replace the fixed function state of a dynamic material
    ///
    /// The previous native material is retired, not destroyed, since frames
    /// in flight may still use it.
    pub fn set_material_info(
        &mut self,
        shaders: &ShaderManager,
        material: &Material,
        info: MaterialInfo,
    ) -> RenderResult<()> {
        let record = self.get_record(material)?;
        if !record.is_dynamic {
            return Err(RenderError::UsageError(
                "set_material_info can only be called on dynamic materials".to_string(),
            ));
        }
        if record.details.info == info {
            return Ok(());
        }
        let mut details = record.details.clone();
        details.info = info;
        let native = if self.dependent_resources_valid {
            Some(self.create_native(shaders, &details)?)
        } else {
            None
        };

        let defer_count = self.max_frames_in_flight;
        let record = self.records.get_mut(material.handle().0)?;
        record.details = details;
        if let Some(old) = std::mem::replace(&mut record.native, native) {
            self.retired.push(RetiredMaterial {
                native: old,
                defer_count,
            });
        }
        Ok(())
    }

    /// Texture used by a material
    pub fn try_get_material_texture(&self, material: &Material) -> Option<Texture2D> {
        self.try_get_record(material).map(|record| record.texture.clone())
    }

    /// Vertex layout a material was created for
    pub fn try_get_material_vertex_declaration(&self, material: &Material) -> Option<&VertexDeclaration> {
        self.try_get_record(material).map(|record| &record.details.vertex_declaration)
    }

    /// Native material, present while dependent resources are valid
    pub fn try_get_native_material(&self, material: &Material) -> Option<NativeMaterialHandle> {
        self.try_get_record(material).and_then(|record| record.native)
    }

    /// Number of live material records
    pub fn material_count(&self) -> u32 {
        self.records.count()
    }

    /// Number of native materials waiting for their defer window
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    /// Per-frame garbage collection
    pub fn pre_update(&mut self, shaders: &mut ShaderManager) {
        let pass = CollectPass::deferred(self.max_frames_in_flight, self.dependent_resources_valid);
        self.collect_garbage(shaders, pass);
    }

    /// React to a presentation event
    pub fn on_render_system_event(&mut self, shaders: &mut ShaderManager, event: RenderSystemEvent) {
        if event == RenderSystemEvent::SwapchainLost {
            self.collect_garbage(shaders, CollectPass::forced());
        }
    }

    /// Create native materials for every record
    ///
    /// On failure the natives created so far are destroyed again.
    pub fn create_dependent_resources(&mut self, shaders: &ShaderManager) -> RenderResult<()> {
        for index in 0..self.records.count() {
            let Some(record) = self.records.get_at(index) else {
                continue;
            };
            if record.native.is_some() {
                continue;
            }
            match self.create_native(shaders, &record.details) {
                Ok(native) => {
                    if let Some(record) = self.records.get_at_mut(index) {
                        record.native = Some(native);
                    }
                }
                Err(err) => {
                    self.destroy_natives();
                    return Err(err);
                }
            }
        }
        self.dependent_resources_valid = true;
        log::debug!("MaterialManager: created {} native materials", self.records.count());
        Ok(())
    }

    /// Destroy all native materials and collect expired records
    pub fn destroy_dependent_resources(&mut self, shaders: &mut ShaderManager) {
        self.dependent_resources_valid = false;
        self.collect_garbage(shaders, CollectPass::forced());
        self.destroy_natives();
    }

    /// Destroy every record regardless of outstanding materials
    ///
    /// Releases the shader references the records hold.
    pub fn force_free_all(&mut self, shaders: &mut ShaderManager) {
        self.destroy_natives();
        if self.records.is_empty() {
            return;
        }
        let mut still_referenced = 0;
        for (_, record) in self.records.drain() {
            if record.is_alive() {
                still_referenced += 1;
            }
            shaders.destroy_shader(record.details.vertex_shader);
            shaders.destroy_shader(record.details.fragment_shader);
        }
        if still_referenced > 0 {
            log::warn!(
                "MaterialManager: force freed {} materials that were still referenced",
                still_referenced
            );
        }
    }

    fn destroy_natives(&mut self) {
        for retired in self.retired.drain(..) {
            self.device.destroy_material(retired.native);
        }
        for index in 0..self.records.count() {
            if let Some(native) = self.records.get_at_mut(index).and_then(|record| record.native.take()) {
                self.device.destroy_material(native);
            }
        }
    }

    fn create_native(&self, shaders: &ShaderManager, details: &MaterialDetails) -> RenderResult<NativeMaterialHandle> {
        let missing = |handle: ShaderHandle| RenderError::NotFound(format!("shader {} has no native shader", handle.0));
        let vertex_shader = shaders
            .try_get_native_shader(details.vertex_shader)
            .ok_or_else(|| missing(details.vertex_shader))?;
        let fragment_shader = shaders
            .try_get_native_shader(details.fragment_shader)
            .ok_or_else(|| missing(details.fragment_shader))?;
        self.device.create_material(&NativeMaterialCreateInfo {
            info: &details.info,
            vertex_shader,
            fragment_shader,
            vertex_declaration: &details.vertex_declaration,
        })
    }

    fn collect_garbage(&mut self, shaders: &mut ShaderManager, pass: CollectPass) {
        let initial_count = self.records.count();
        for index in (0..initial_count).rev() {
            if self.records.get_at(index).map_or(true, MaterialRecord::is_alive) {
                continue;
            }
            let Ok(record) = self.records.remove_at(index) else {
                continue;
            };
            if let Some(native) = record.native {
                self.retired.push(RetiredMaterial {
                    native,
                    defer_count: self.max_frames_in_flight,
                });
            }
            shaders.destroy_shader(record.details.vertex_shader);
            shaders.destroy_shader(record.details.fragment_shader);
        }

        let threshold = self.policy.threshold(false);
        let device = &self.device;
        self.retired.retain_mut(|retired| {
            match collect_step(false, &mut retired.defer_count, threshold, pass) {
                CollectAction::Keep => true,
                CollectAction::Destroy => {
                    device.destroy_material(retired.native);
                    false
                }
            }
        });

        if initial_count != self.records.count() {
            log::debug!(
                "MaterialManager: collected {} materials, {} remain",
                initial_count - self.records.count(),
                self.records.count()
            );
        }
    }

    fn try_get_record(&self, material: &Material) -> Option<&MaterialRecord> {
        self.records
            .try_get(material.handle().0)
            .filter(|record| record.belongs_to(material))
    }

    fn get_record(&self, material: &Material) -> RenderResult<&MaterialRecord> {
        self.try_get_record(material)
            .ok_or_else(|| RenderError::NotFound(format!("unknown material {}", material.handle().0)))
    }
}

impl Drop for MaterialManager {
    fn drop(&mut self) {
        self.destroy_natives();
        if !self.records.is_empty() {
            log::warn!(
                "MaterialManager: dropped with {} records, their shader references leak",
                self.records.count()
            );
        }
    }
}

fn resolve_details(shaders: &ShaderManager, create_info: &MaterialCreateInfo) -> RenderResult<MaterialDetails> {
    let fragment_type = if create_info.material_info.blend == BlendState::Sdf {
        PredefinedShaderType::FragmentSdf
    } else {
        PredefinedShaderType::Fragment
    };
    let vertex_shader = create_info
        .custom_vertex_shader
        .unwrap_or_else(|| shaders.query_predefined_shader_handle(PredefinedShaderType::Vertex));
    let fragment_shader = create_info
        .custom_fragment_shader
        .unwrap_or_else(|| shaders.query_predefined_shader_handle(fragment_type));

    for (handle, stage) in [(vertex_shader, ShaderStage::Vertex), (fragment_shader, ShaderStage::Fragment)] {
        match shaders.shader_stage(handle) {
            Some(actual) if actual == stage => {}
            Some(actual) => {
                return Err(RenderError::InvalidArgument(format!(
                    "shader {} is a {:?} shader, expected {:?}",
                    handle.0, actual, stage
                )))
            }
            None => return Err(RenderError::NotFound(format!("unknown shader {}", handle.0))),
        }
    }

    let attributes = shaders.vertex_attributes(vertex_shader).unwrap_or_default();
    if let Some(missing) = attributes
        .iter()
        .find(|attribute| !attribute.is_satisfied_by(&create_info.vertex_declaration))
    {
        return Err(RenderError::InvalidArgument(format!(
            "vertex declaration does not provide {:?}{} as {:?}",
            missing.usage, missing.usage_index, missing.format
        )));
    }

    Ok(MaterialDetails {
        info: create_info.material_info,
        vertex_declaration: create_info.vertex_declaration.clone(),
        vertex_shader,
        fragment_shader,
    })
}

/// Custom shaders survive cloning; predefined ones are picked again
fn clone_create_info(
    shaders: &ShaderManager,
    record: &MaterialRecord,
    info: MaterialInfo,
    texture: Texture2D,
) -> MaterialCreateInfo {
    let custom = |handle: ShaderHandle| (!shaders.is_predefined(handle)).then_some(handle);
    MaterialCreateInfo {
        material_info: info,
        vertex_declaration: record.details.vertex_declaration.clone(),
        texture,
        custom_vertex_shader: custom(record.details.vertex_shader),
        custom_fragment_shader: custom(record.details.fragment_shader),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::ShaderCreateInfo;
    use crate::render::backends::headless::{HeadlessDevice, HeadlessShaderFactory};
    use crate::render::managers::TextureManager;
    use crate::render::resources::{
        PixelFormat, PxExtent2D, RawTexture, TextureFilterHint, TextureFlags, VertexPositionColor,
        VertexPositionColorTexture,
    };

    const TEXELS: [u8; 4] = [0xff; 4];

    struct Fixture {
        device: Rc<HeadlessDevice>,
        shaders: ShaderManager,
        textures: TextureManager,
        materials: MaterialManager,
    }

    impl Fixture {
        fn new(frames: u32) -> Self {
            let device = Rc::new(HeadlessDevice::new());
            let config = RenderSystemConfig::new(frames);
            let shaders = ShaderManager::new(Rc::new(HeadlessShaderFactory::new())).unwrap();
            let mut textures = TextureManager::new(device.clone(), &config);
            let mut materials = MaterialManager::new(device.clone(), &config);
            textures.create_dependent_resources();
            materials.create_dependent_resources(&shaders).unwrap();
            Self {
                device,
                shaders,
                textures,
                materials,
            }
        }

        fn texture(&mut self) -> Texture2D {
            let raw = RawTexture::new(PxExtent2D::new(1, 1), PixelFormat::R8G8B8A8Unorm, &TEXELS);
            self.textures
                .create_texture_2d(&raw, TextureFilterHint::Smooth, TextureFlags::empty())
                .unwrap()
                .into()
        }

        fn create_info(&mut self, info: MaterialInfo) -> MaterialCreateInfo {
            let texture = self.texture();
            MaterialCreateInfo::new(info, VertexPositionColorTexture::declaration(), texture)
        }

        fn vertex_ref_count(&self) -> Option<u32> {
            self.shaders
                .shader_ref_count(self.shaders.query_predefined_shader_handle(PredefinedShaderType::Vertex))
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            self.materials.force_free_all(&mut self.shaders);
        }
    }

    #[test]
    fn test_create_material_references_default_shaders() {
        let mut fixture = Fixture::new(2);
        let create_info = fixture.create_info(MaterialInfo::default());
        let material = fixture
            .materials
            .create_material(&mut fixture.shaders, &create_info, false)
            .unwrap();

        assert_eq!(fixture.vertex_ref_count(), Some(2));
        assert!(fixture.materials.try_get_native_material(&material).is_some());
        assert_eq!(fixture.device.live_material_count(), 1);
    }

    #[test]
    fn test_sdf_blend_selects_sdf_fragment_shader() {
        let mut fixture = Fixture::new(2);
        let info = MaterialInfo {
            blend: BlendState::Sdf,
            ..MaterialInfo::default()
        };
        let create_info = fixture.create_info(info);
        let _material = fixture
            .materials
            .create_material(&mut fixture.shaders, &create_info, false)
            .unwrap();

        let sdf = fixture
            .shaders
            .query_predefined_shader_handle(PredefinedShaderType::FragmentSdf);
        let plain = fixture
            .shaders
            .query_predefined_shader_handle(PredefinedShaderType::Fragment);
        assert_eq!(fixture.shaders.shader_ref_count(sdf), Some(2));
        assert_eq!(fixture.shaders.shader_ref_count(plain), Some(1));
    }

    #[test]
    fn test_static_materials_are_deduplicated() {
        let mut fixture = Fixture::new(2);
        let create_info = fixture.create_info(MaterialInfo::default());
        let first = fixture
            .materials
            .create_material(&mut fixture.shaders, &create_info, false)
            .unwrap();
        let second = fixture
            .materials
            .create_material(&mut fixture.shaders, &create_info, false)
            .unwrap();

        assert!(first.ptr_eq(&second));
        assert_eq!(fixture.materials.material_count(), 1);
        assert_eq!(fixture.vertex_ref_count(), Some(2));

        let dynamic = fixture
            .materials
            .create_material(&mut fixture.shaders, &create_info, true)
            .unwrap();
        assert!(!dynamic.ptr_eq(&first));
        assert_eq!(fixture.materials.material_count(), 2);
    }

    #[test]
    fn test_expired_material_releases_shaders_and_retires_native() {
        let mut fixture = Fixture::new(2);
        let create_info = fixture.create_info(MaterialInfo::default());
        let material = fixture
            .materials
            .create_material(&mut fixture.shaders, &create_info, false)
            .unwrap();
        let native = fixture.materials.try_get_native_material(&material).unwrap();
        drop(material);

        fixture.materials.pre_update(&mut fixture.shaders);
        assert_eq!(fixture.materials.material_count(), 0);
        assert_eq!(fixture.vertex_ref_count(), Some(1));
        assert!(fixture.device.is_material_alive(native));
        assert_eq!(fixture.materials.retired_count(), 1);

        fixture.materials.pre_update(&mut fixture.shaders);
        assert!(!fixture.device.is_material_alive(native));
        assert_eq!(fixture.materials.retired_count(), 0);
    }

    #[test]
    fn test_material_keeps_texture_alive() {
        let mut fixture = Fixture::new(2);
        let create_info = fixture.create_info(MaterialInfo::default());
        let texture_native = create_info.texture.native_handle().unwrap();
        let material = fixture
            .materials
            .create_material(&mut fixture.shaders, &create_info, false)
            .unwrap();
        drop(create_info);

        for _ in 0..4 {
            fixture.textures.pre_update();
        }
        assert!(fixture.device.is_texture_alive(texture_native));
        assert!(fixture.materials.try_get_material_texture(&material).is_some());
    }

    #[test]
    fn test_set_material_info_requires_dynamic() {
        let mut fixture = Fixture::new(2);
        let create_info = fixture.create_info(MaterialInfo::default());
        let material = fixture
            .materials
            .create_material(&mut fixture.shaders, &create_info, false)
            .unwrap();

        let result = fixture
            .materials
            .set_material_info(&fixture.shaders, &material, MaterialInfo::alpha_blend());
        assert!(matches!(result, Err(RenderError::UsageError(_))));
    }

    #[test]
    fn test_set_material_info_retires_old_native() {
        let mut fixture = Fixture::new(2);
        let create_info = fixture.create_info(MaterialInfo::default());
        let material = fixture
            .materials
            .create_material(&mut fixture.shaders, &create_info, true)
            .unwrap();
        let old = fixture.materials.try_get_native_material(&material).unwrap();

        fixture
            .materials
            .set_material_info(&fixture.shaders, &material, MaterialInfo::alpha_blend())
            .unwrap();
        let new = fixture.materials.try_get_native_material(&material).unwrap();
        assert_ne!(old, new);
        assert_eq!(
            fixture.materials.get_material_info(&material).unwrap(),
            MaterialInfo::alpha_blend()
        );
        assert!(fixture.device.is_material_alive(old));

        fixture.materials.pre_update(&mut fixture.shaders);
        fixture.materials.pre_update(&mut fixture.shaders);
        assert!(!fixture.device.is_material_alive(old));
        assert!(fixture.device.is_material_alive(new));
    }

    #[test]
    fn test_clone_with_texture_and_info() {
        let mut fixture = Fixture::new(2);
        let create_info = fixture.create_info(MaterialInfo::default());
        let source = fixture
            .materials
            .create_material(&mut fixture.shaders, &create_info, false)
            .unwrap();

        let other_texture = fixture.texture();
        let by_texture = fixture
            .materials
            .clone_material_with_texture(&mut fixture.shaders, &source, other_texture.clone(), false)
            .unwrap();
        assert!(!by_texture.ptr_eq(&source));
        let texture = fixture.materials.try_get_material_texture(&by_texture).unwrap();
        assert!(texture.ptr_eq(&other_texture));

        let by_info = fixture
            .materials
            .clone_material_with_info(&mut fixture.shaders, &source, MaterialInfo::opaque_depth(), true)
            .unwrap();
        assert!(by_info.is_dynamic());
        assert_eq!(
            fixture.materials.get_material_info(&by_info).unwrap(),
            MaterialInfo::opaque_depth()
        );
        assert_eq!(fixture.vertex_ref_count(), Some(4));
    }

    #[test]
    fn test_clone_keeps_custom_shaders() {
        let mut fixture = Fixture::new(2);
        let vertex = fixture
            .shaders
            .create_shader(&ShaderCreateInfo::vertex(Vec::new(), VertexPositionColor::shader_attributes()))
            .unwrap();
        let fragment = fixture
            .shaders
            .create_shader(&ShaderCreateInfo::fragment(Vec::new()))
            .unwrap();
        let texture = fixture.texture();
        let create_info = MaterialCreateInfo::new(MaterialInfo::default(), VertexPositionColor::declaration(), texture)
            .with_shaders(vertex, fragment);
        let source = fixture
            .materials
            .create_material(&mut fixture.shaders, &create_info, false)
            .unwrap();
        let _clone = fixture
            .materials
            .clone_material_with_info(&mut fixture.shaders, &source, MaterialInfo::alpha_blend(), false)
            .unwrap();

        assert_eq!(fixture.shaders.shader_ref_count(vertex), Some(3));
        assert_eq!(fixture.shaders.shader_ref_count(fragment), Some(3));
    }

    #[test]
    fn test_declaration_must_satisfy_vertex_shader() {
        let mut fixture = Fixture::new(2);
        let texture = fixture.texture();
        let create_info = MaterialCreateInfo::new(MaterialInfo::default(), VertexPositionColor::declaration(), texture);

        let result = fixture.materials.create_material(&mut fixture.shaders, &create_info, false);
        assert!(matches!(result, Err(RenderError::InvalidArgument(_))));
        assert_eq!(fixture.vertex_ref_count(), Some(1));
    }

    #[test]
    fn test_native_failure_releases_shader_references() {
        let mut fixture = Fixture::new(2);
        let create_info = fixture.create_info(MaterialInfo::default());
        fixture.device.set_fail_material_creation(true);

        let result = fixture.materials.create_material(&mut fixture.shaders, &create_info, false);
        assert!(matches!(result, Err(RenderError::ResourceCreationFailed(_))));
        assert_eq!(fixture.vertex_ref_count(), Some(1));
        assert_eq!(fixture.materials.material_count(), 0);
    }

    #[test]
    fn test_dependent_resources_rebuild_natives() {
        let mut fixture = Fixture::new(2);
        let create_info = fixture.create_info(MaterialInfo::default());
        let material = fixture
            .materials
            .create_material(&mut fixture.shaders, &create_info, false)
            .unwrap();

        fixture.materials.destroy_dependent_resources(&mut fixture.shaders);
        assert!(fixture.materials.try_get_native_material(&material).is_none());
        assert_eq!(fixture.device.live_material_count(), 0);

        fixture.materials.create_dependent_resources(&fixture.shaders).unwrap();
        assert!(fixture.materials.try_get_native_material(&material).is_some());
        assert_eq!(fixture.device.live_material_count(), 1);
    }

    #[test]
    fn test_dependent_resource_failure_rolls_back() {
        let mut fixture = Fixture::new(2);
        let first = fixture.create_info(MaterialInfo::default());
        let second = fixture.create_info(MaterialInfo::alpha_blend());
        let _a = fixture.materials.create_material(&mut fixture.shaders, &first, false).unwrap();
        let _b = fixture.materials.create_material(&mut fixture.shaders, &second, false).unwrap();
        fixture.materials.destroy_dependent_resources(&mut fixture.shaders);

        fixture.device.fail_material_creation_after(1);
        let result = fixture.materials.create_dependent_resources(&fixture.shaders);
        assert!(result.is_err());
        assert_eq!(fixture.device.live_material_count(), 0);
        assert!(!fixture.materials.dependent_resources_valid);
    }

    #[test]
    fn test_force_free_all_releases_everything() {
        let mut fixture = Fixture::new(2);
        let create_info = fixture.create_info(MaterialInfo::default());
        let material = fixture
            .materials
            .create_material(&mut fixture.shaders, &create_info, false)
            .unwrap();

        fixture.materials.force_free_all(&mut fixture.shaders);
        assert_eq!(fixture.materials.material_count(), 0);
        assert_eq!(fixture.vertex_ref_count(), Some(1));
        assert_eq!(fixture.device.live_material_count(), 0);
        assert!(fixture.materials.get_material_info(&material).is_err());
    }
}

//! Shader lifetime management
//!
//! Shaders are referenced by material records, not by the application, so
//! they use an explicit reference count instead of trackers. The manager
//! creates the predefined shaders up front and refuses to exist if the
//! factory does not deliver exactly the expected set.

use std::rc::Rc;

use crate::foundation::collections::HandleTable;
use crate::render::api::{NativeShaderFactory, NativeShaderHandle, ShaderCreateInfo, ShaderStage};
use crate::render::resources::{
    PredefinedShaderType, ShaderHandle, VertexAttribute, VertexElementFormat, VertexElementUsage,
};
use crate::render::{RenderError, RenderResult, RenderSystemEvent};

/// Attributes every vertex shader must consume
const REQUIRED_VERTEX_ATTRIBUTES: [(VertexElementUsage, VertexElementFormat); 2] = [
    (VertexElementUsage::Position, VertexElementFormat::Vector3),
    (VertexElementUsage::Color, VertexElementFormat::Vector4),
];

/// Minimum attribute count of a vertex shader
const MIN_VERTEX_ATTRIBUTES: usize = 2;

struct ShaderRecord {
    native: NativeShaderHandle,
    stage: ShaderStage,
    vertex_attributes: Vec<VertexAttribute>,
    ref_count: u32,
}

/// Manager for predefined and custom shaders
pub struct ShaderManager {
    factory: Rc<dyn NativeShaderFactory>,
    records: HandleTable<ShaderRecord>,
    predefined: [ShaderHandle; PredefinedShaderType::COUNT],
}

impl ShaderManager {
    /// Create the manager and its predefined shaders
    ///
    /// Any validation or creation failure destroys the shaders created so far
    /// before the error is returned.
    pub fn new(factory: Rc<dyn NativeShaderFactory>) -> RenderResult<Self> {
        let mut manager = Self {
            factory,
            records: HandleTable::new(),
            predefined: [ShaderHandle(0); PredefinedShaderType::COUNT],
        };
        if let Err(err) = manager.create_predefined_shaders() {
            log::error!("ShaderManager: predefined shader setup failed: {}", err);
            manager.force_free_all();
            return Err(err);
        }
        log::info!("ShaderManager: created {} predefined shaders", PredefinedShaderType::COUNT);
        Ok(manager)
    }

    fn create_predefined_shaders(&mut self) -> RenderResult<()> {
        let shaders = self.factory.predefined_shaders();
        for (index, create_info) in shaders.iter().enumerate() {
            let shader_type = PredefinedShaderType::from_index(index).ok_or_else(|| {
                RenderError::InvalidArgument(format!(
                    "expected {} predefined shaders, got {}",
                    PredefinedShaderType::COUNT,
                    shaders.len()
                ))
            })?;
            if create_info.stage != shader_type.stage() {
                return Err(RenderError::InvalidArgument(format!(
                    "predefined shader {:?} must be a {:?} shader, got {:?}",
                    shader_type,
                    shader_type.stage(),
                    create_info.stage
                )));
            }
            validate_shader(create_info)?;
            if shader_type.is_textured_vertex() {
                require_attribute(
                    &create_info.vertex_attributes,
                    VertexElementUsage::TextureCoordinate,
                    VertexElementFormat::Vector2,
                )?;
            }
            self.predefined[index] = self.add_shader(create_info)?;
        }
        if shaders.len() != PredefinedShaderType::COUNT {
            return Err(RenderError::InvalidArgument(format!(
                "expected {} predefined shaders, got {}",
                PredefinedShaderType::COUNT,
                shaders.len()
            )));
        }
        Ok(())
    }

    /// Create a custom shader with a reference count of one
    pub fn create_shader(&mut self, create_info: &ShaderCreateInfo) -> RenderResult<ShaderHandle> {
        validate_shader(create_info)?;
        self.add_shader(create_info)
    }

    fn add_shader(&mut self, create_info: &ShaderCreateInfo) -> RenderResult<ShaderHandle> {
        let native = self.factory.create_shader(create_info)?;
        let handle = self.records.add(ShaderRecord {
            native,
            stage: create_info.stage,
            vertex_attributes: create_info.vertex_attributes.clone(),
            ref_count: 1,
        });
        log::debug!("ShaderManager: created {:?} shader {}", create_info.stage, handle);
        Ok(ShaderHandle(handle))
    }

    /// Handle of a predefined shader
    pub const fn query_predefined_shader_handle(&self, shader_type: PredefinedShaderType) -> ShaderHandle {
        self.predefined[shader_type.index()]
    }

    /// Handle of a predefined shader by table index
    pub fn try_query_predefined_shader_handle(&self, index: usize) -> RenderResult<ShaderHandle> {
        self.predefined.get(index).copied().ok_or_else(|| {
            RenderError::InvalidArgument(format!(
                "predefined shader index {} is out of bounds ({})",
                index,
                PredefinedShaderType::COUNT
            ))
        })
    }

    /// True if `handle` is one of the predefined shaders
    pub fn is_predefined(&self, handle: ShaderHandle) -> bool {
        self.predefined.contains(&handle) && self.records.is_valid_handle(handle.0)
    }

    /// Add a reference to a shader
    pub fn reference_shader(&mut self, handle: ShaderHandle) -> RenderResult<ShaderHandle> {
        let record = self.records.get_mut(handle.0)?;
        if record.ref_count == u32::MAX {
            return Err(RenderError::NotSupported(format!(
                "shader {} reference count is at its maximum",
                handle.0
            )));
        }
        record.ref_count += 1;
        Ok(handle)
    }

    /// Release a reference; the native shader is destroyed with the last one
    ///
    /// Returns false if the handle was not valid. The manager's own reference
    /// to a predefined shader is never released here; only teardown frees it.
    pub fn destroy_shader(&mut self, handle: ShaderHandle) -> bool {
        let is_predefined = self.is_predefined(handle);
        let Some(record) = self.records.try_get_mut(handle.0) else {
            log::debug!("ShaderManager: destroy of unknown shader {} ignored", handle.0);
            return false;
        };
        if record.ref_count > 1 {
            record.ref_count -= 1;
            return true;
        }
        if is_predefined {
            log::warn!("ShaderManager: predefined shader {} can not be destroyed, ignored", handle.0);
            return false;
        }
        if let Some(record) = self.records.take(handle.0) {
            log::debug!("ShaderManager: destroying shader {}", handle.0);
            self.factory.destroy_shader(record.native);
        }
        true
    }

    /// Native shader behind `handle`
    pub fn try_get_native_shader(&self, handle: ShaderHandle) -> Option<NativeShaderHandle> {
        self.records.try_get(handle.0).map(|record| record.native)
    }

    /// Stage of a live shader
    pub fn shader_stage(&self, handle: ShaderHandle) -> Option<ShaderStage> {
        self.records.try_get(handle.0).map(|record| record.stage)
    }

    /// Vertex inputs of a live shader
    pub fn vertex_attributes(&self, handle: ShaderHandle) -> Option<&[VertexAttribute]> {
        self.records
            .try_get(handle.0)
            .map(|record| record.vertex_attributes.as_slice())
    }

    /// Reference count of a live shader
    pub fn shader_ref_count(&self, handle: ShaderHandle) -> Option<u32> {
        self.records.try_get(handle.0).map(|record| record.ref_count)
    }

    /// Number of live shader records
    pub fn shader_count(&self) -> u32 {
        self.records.count()
    }

    /// Shaders hold no swapchain dependent state
    pub fn on_render_system_event(&mut self, event: RenderSystemEvent) {
        log::trace!("ShaderManager: {:?}", event);
    }

    /// Destroy every shader regardless of reference counts
    ///
    /// Returns the number of shaders that still had references besides the
    /// manager's own.
    pub fn force_free_all(&mut self) -> usize {
        let mut leaked = 0;
        for (handle, record) in self.records.drain() {
            if record.ref_count > 1 {
                leaked += 1;
                log::warn!(
                    "ShaderManager: shader {} still had {} references at teardown",
                    handle,
                    record.ref_count
                );
            }
            self.factory.destroy_shader(record.native);
        }
        leaked
    }
}

impl Drop for ShaderManager {
    fn drop(&mut self) {
        self.force_free_all();
    }
}

fn require_attribute(
    attributes: &[VertexAttribute],
    usage: VertexElementUsage,
    format: VertexElementFormat,
) -> RenderResult<()> {
    let found = attributes
        .iter()
        .find(|attribute| attribute.usage == usage && attribute.usage_index == 0);
    match found {
        Some(attribute) if attribute.format == format => Ok(()),
        Some(attribute) => Err(RenderError::InvalidArgument(format!(
            "vertex attribute {:?} must be {:?}, got {:?}",
            usage, format, attribute.format
        ))),
        None => Err(RenderError::InvalidArgument(format!(
            "vertex shader is missing the {:?} attribute",
            usage
        ))),
    }
}

fn validate_shader(create_info: &ShaderCreateInfo) -> RenderResult<()> {
    match create_info.stage {
        ShaderStage::Fragment => {
            if !create_info.vertex_attributes.is_empty() {
                return Err(RenderError::InvalidArgument(
                    "fragment shaders can not declare vertex attributes".to_string(),
                ));
            }
        }
        ShaderStage::Vertex => {
            if create_info.vertex_attributes.len() < MIN_VERTEX_ATTRIBUTES {
                return Err(RenderError::InvalidArgument(format!(
                    "vertex shaders need at least {} attributes, got {}",
                    MIN_VERTEX_ATTRIBUTES,
                    create_info.vertex_attributes.len()
                )));
            }
            for (usage, format) in REQUIRED_VERTEX_ATTRIBUTES {
                require_attribute(&create_info.vertex_attributes, usage, format)?;
            }
        }
    }
    Ok(())
}

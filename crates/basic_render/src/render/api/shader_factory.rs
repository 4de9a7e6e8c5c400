//! Native shader factory abstraction

use crate::render::resources::VertexAttribute;
use crate::render::RenderResult;

/// Backend handle of a native shader module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeShaderHandle(pub u64);

/// Pipeline stage a shader runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex stage
    Vertex,
    /// Fragment stage
    Fragment,
}

/// Shader source plus the vertex input layout it consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderCreateInfo {
    /// Stage the shader is compiled for
    pub stage: ShaderStage,
    /// Backend specific shader blob (SPIR-V, GLSL source, ...)
    pub blob: Vec<u8>,
    /// Vertex inputs; must be empty for fragment shaders
    pub vertex_attributes: Vec<VertexAttribute>,
}

impl ShaderCreateInfo {
    /// Describe a vertex shader
    pub fn vertex(blob: Vec<u8>, vertex_attributes: Vec<VertexAttribute>) -> Self {
        Self {
            stage: ShaderStage::Vertex,
            blob,
            vertex_attributes,
        }
    }

    /// Describe a fragment shader
    pub fn fragment(blob: Vec<u8>) -> Self {
        Self {
            stage: ShaderStage::Fragment,
            blob,
            vertex_attributes: Vec::new(),
        }
    }
}

/// Native shader factory
///
/// Supplies the predefined shaders the shader manager creates at startup and
/// creates/destroys native shader modules on request.
pub trait NativeShaderFactory {
    /// The predefined shaders, in `PredefinedShaderType` order
    fn predefined_shaders(&self) -> Vec<ShaderCreateInfo>;

    /// Create a native shader module
    fn create_shader(&self, create_info: &ShaderCreateInfo) -> RenderResult<NativeShaderHandle>;

    /// Destroy a native shader module
    fn destroy_shader(&self, handle: NativeShaderHandle);
}

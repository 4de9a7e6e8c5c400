//! Shader identities

use crate::foundation::collections::Handle;
use crate::render::api::ShaderStage;

/// Handle of a shader owned by the shader manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderHandle(pub Handle);

/// The built-in shaders every shader factory must supply, in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredefinedShaderType {
    /// Textured vertex shader (position, color, texture coordinate)
    Vertex,
    /// Textured fragment shader
    Fragment,
    /// Signed distance field fragment shader
    FragmentSdf,
    /// Vertex color only vertex shader (position, color)
    VertexColor,
    /// Vertex color only fragment shader
    FragmentColor,
}

impl PredefinedShaderType {
    /// Number of predefined shaders
    pub const COUNT: usize = 5;

    /// All predefined shaders in creation order
    pub const ALL: [Self; Self::COUNT] = [
        Self::Vertex,
        Self::Fragment,
        Self::FragmentSdf,
        Self::VertexColor,
        Self::FragmentColor,
    ];

    /// Slot in the predefined table
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Look up a type by its slot
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Pipeline stage the shader must be compiled for
    pub const fn stage(self) -> ShaderStage {
        match self {
            Self::Vertex | Self::VertexColor => ShaderStage::Vertex,
            Self::Fragment | Self::FragmentSdf | Self::FragmentColor => ShaderStage::Fragment,
        }
    }

    /// True for vertex shaders that also consume texture coordinates
    pub const fn is_textured_vertex(self) -> bool {
        matches!(self, Self::Vertex)
    }
}

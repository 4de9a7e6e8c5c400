//! Vertex layout descriptions
//!
//! A [`VertexDeclaration`] describes the memory layout of a vertex type, a
//! [`VertexAttribute`] describes what a vertex shader consumes. Materials are
//! only valid when every shader attribute can be found in the declaration.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Format of a single vertex element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexElementFormat {
    /// One f32
    Float,
    /// Two f32
    Vector2,
    /// Three f32
    Vector3,
    /// Four f32
    Vector4,
}

impl VertexElementFormat {
    /// Size of the element in bytes
    pub const fn byte_size(self) -> u32 {
        match self {
            Self::Float => 4,
            Self::Vector2 => 8,
            Self::Vector3 => 12,
            Self::Vector4 => 16,
        }
    }
}

/// Semantic meaning of a vertex element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexElementUsage {
    /// Vertex position
    Position,
    /// Vertex color
    Color,
    /// Texture coordinate
    TextureCoordinate,
    /// Normal vector
    Normal,
    /// Tangent vector
    Tangent,
}

/// One element of a vertex declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexElement {
    /// Byte offset inside the vertex
    pub offset: u32,
    /// Element format
    pub format: VertexElementFormat,
    /// Element usage
    pub usage: VertexElementUsage,
    /// Distinguishes multiple elements with the same usage
    pub usage_index: u32,
}

impl VertexElement {
    /// Create an element
    pub const fn new(offset: u32, format: VertexElementFormat, usage: VertexElementUsage, usage_index: u32) -> Self {
        Self {
            offset,
            format,
            usage,
            usage_index,
        }
    }
}

/// Memory layout of a vertex type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexDeclaration {
    /// Size of one vertex in bytes
    pub stride: u32,
    /// Elements in offset order
    pub elements: Vec<VertexElement>,
}

impl VertexDeclaration {
    /// Create a declaration
    pub fn new(stride: u32, elements: Vec<VertexElement>) -> Self {
        Self { stride, elements }
    }

    /// True if the declaration has no elements
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Find the element with the given usage and usage index
    pub fn find(&self, usage: VertexElementUsage, usage_index: u32) -> Option<&VertexElement> {
        self.elements
            .iter()
            .find(|element| element.usage == usage && element.usage_index == usage_index)
    }
}

/// Vertex input consumed by a vertex shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexAttribute {
    /// Shader input location
    pub location: u32,
    /// Expected format
    pub format: VertexElementFormat,
    /// Expected usage
    pub usage: VertexElementUsage,
    /// Usage index
    pub usage_index: u32,
}

impl VertexAttribute {
    /// Create an attribute
    pub const fn new(location: u32, format: VertexElementFormat, usage: VertexElementUsage, usage_index: u32) -> Self {
        Self {
            location,
            format,
            usage,
            usage_index,
        }
    }

    /// True if `declaration` provides this attribute with a matching format
    pub fn is_satisfied_by(&self, declaration: &VertexDeclaration) -> bool {
        declaration
            .find(self.usage, self.usage_index)
            .is_some_and(|element| element.format == self.format)
    }
}

/// Plain-old-data vertex with a known layout
///
/// Vertex buffer content built from a `VertexType` carries its declaration, so
/// draws can check the buffer against the bound material.
pub trait VertexType: Pod {
    /// Layout of the vertex type
    fn declaration() -> VertexDeclaration;
}

/// Position, color and texture coordinate
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexPositionColorTexture {
    /// Position in model space
    pub position: [f32; 3],
    /// RGBA color
    pub color: [f32; 4],
    /// Texture coordinate
    pub tex_coord: [f32; 2],
}

impl VertexPositionColorTexture {
    /// Create a vertex
    pub const fn new(position: [f32; 3], color: [f32; 4], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            color,
            tex_coord,
        }
    }

    /// Layout of this vertex type
    pub fn declaration() -> VertexDeclaration {
        VertexDeclaration::new(
            36,
            vec![
                VertexElement::new(0, VertexElementFormat::Vector3, VertexElementUsage::Position, 0),
                VertexElement::new(12, VertexElementFormat::Vector4, VertexElementUsage::Color, 0),
                VertexElement::new(28, VertexElementFormat::Vector2, VertexElementUsage::TextureCoordinate, 0),
            ],
        )
    }

    /// Attributes a shader consuming this vertex type declares
    pub fn shader_attributes() -> Vec<VertexAttribute> {
        vec![
            VertexAttribute::new(0, VertexElementFormat::Vector3, VertexElementUsage::Position, 0),
            VertexAttribute::new(1, VertexElementFormat::Vector4, VertexElementUsage::Color, 0),
            VertexAttribute::new(2, VertexElementFormat::Vector2, VertexElementUsage::TextureCoordinate, 0),
        ]
    }
}

impl VertexType for VertexPositionColorTexture {
    fn declaration() -> VertexDeclaration {
        Self::declaration()
    }
}

/// Position and color
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexPositionColor {
    /// Position in model space
    pub position: [f32; 3],
    /// RGBA color
    pub color: [f32; 4],
}

impl VertexPositionColor {
    /// Create a vertex
    pub const fn new(position: [f32; 3], color: [f32; 4]) -> Self {
        Self { position, color }
    }

    /// Layout of this vertex type
    pub fn declaration() -> VertexDeclaration {
        VertexDeclaration::new(
            28,
            vec![
                VertexElement::new(0, VertexElementFormat::Vector3, VertexElementUsage::Position, 0),
                VertexElement::new(12, VertexElementFormat::Vector4, VertexElementUsage::Color, 0),
            ],
        )
    }

    /// Attributes a shader consuming this vertex type declares
    pub fn shader_attributes() -> Vec<VertexAttribute> {
        vec![
            VertexAttribute::new(0, VertexElementFormat::Vector3, VertexElementUsage::Position, 0),
            VertexAttribute::new(1, VertexElementFormat::Vector4, VertexElementUsage::Color, 0),
        ]
    }
}

impl VertexType for VertexPositionColor {
    fn declaration() -> VertexDeclaration {
        Self::declaration()
    }
}

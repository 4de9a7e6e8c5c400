//! Material descriptions and the material tracker
//!
//! A material binds a vertex/fragment shader pair, a texture and the fixed
//! function state needed to draw with them.

use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use super::shader::ShaderHandle;
use super::texture::Texture2D;
use super::vertex::VertexDeclaration;
use crate::foundation::collections::Handle;
use crate::render::{RenderError, RenderResult};

/// Color blending mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlendState {
    /// No blending
    #[default]
    Opaque,
    /// Classic source-alpha blending
    AlphaBlend,
    /// Additive blending
    Additive,
    /// Blending of premultiplied alpha
    Premultiplied,
    /// Signed distance field rendering, alpha blended
    Sdf,
}

/// Face culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CullMode {
    /// Draw both faces
    Disabled,
    /// Cull front faces
    Front,
    /// Cull back faces
    #[default]
    Back,
}

/// Winding order of front faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FrontFace {
    /// Counter clockwise triangles face forward
    #[default]
    CounterClockwise,
    /// Clockwise triangles face forward
    Clockwise,
}

/// Depth comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CompareOp {
    /// Never pass
    Never,
    /// Pass if less
    #[default]
    Less,
    /// Pass if equal
    Equal,
    /// Pass if less or equal
    LessOrEqual,
    /// Pass if greater
    Greater,
    /// Pass if not equal
    NotEqual,
    /// Pass if greater or equal
    GreaterOrEqual,
    /// Always pass
    Always,
}

/// Viewport rectangle in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PxViewport {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl PxViewport {
    /// Create a viewport
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// Fixed function state of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MaterialInfo {
    /// Blend mode
    pub blend: BlendState,
    /// Face culling
    pub cull_mode: CullMode,
    /// Front face winding
    pub front_face: FrontFace,
    /// Depth testing enabled
    pub depth_test: bool,
    /// Depth writes enabled
    pub depth_write: bool,
    /// Depth comparison
    pub depth_compare: CompareOp,
    /// Fixed viewport, `None` follows the swapchain
    pub viewport: Option<PxViewport>,
}

impl MaterialInfo {
    /// Opaque material with depth test and writes enabled
    pub fn opaque_depth() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            ..Self::default()
        }
    }

    /// Alpha blended material without depth
    pub fn alpha_blend() -> Self {
        Self {
            blend: BlendState::AlphaBlend,
            cull_mode: CullMode::Disabled,
            ..Self::default()
        }
    }
}

/// Everything needed to create a material
#[derive(Debug, Clone)]
pub struct MaterialCreateInfo {
    /// Fixed function state
    pub material_info: MaterialInfo,
    /// Layout of the vertices drawn with the material
    pub vertex_declaration: VertexDeclaration,
    /// Texture sampled by the fragment shader
    pub texture: Texture2D,
    /// Overrides the predefined vertex shader
    pub custom_vertex_shader: Option<ShaderHandle>,
    /// Overrides the predefined fragment shader
    pub custom_fragment_shader: Option<ShaderHandle>,
}

impl MaterialCreateInfo {
    /// Create info using the predefined shaders
    pub fn new(material_info: MaterialInfo, vertex_declaration: VertexDeclaration, texture: impl Into<Texture2D>) -> Self {
        Self {
            material_info,
            vertex_declaration,
            texture: texture.into(),
            custom_vertex_shader: None,
            custom_fragment_shader: None,
        }
    }

    /// Use a custom shader pair
    #[must_use]
    pub fn with_shaders(mut self, vertex_shader: ShaderHandle, fragment_shader: ShaderHandle) -> Self {
        self.custom_vertex_shader = Some(vertex_shader);
        self.custom_fragment_shader = Some(fragment_shader);
        self
    }

    /// Check the parts that do not need the shader manager
    pub fn validate(&self) -> RenderResult<()> {
        if self.vertex_declaration.is_empty() {
            return Err(RenderError::InvalidArgument(
                "material vertex declaration can not be empty".to_string(),
            ));
        }
        if let Some(viewport) = self.material_info.viewport {
            if viewport.width == 0 || viewport.height == 0 {
                return Err(RenderError::InvalidArgument(format!(
                    "material viewport must be non-empty, got {}x{}",
                    viewport.width, viewport.height
                )));
            }
        }
        Ok(())
    }
}

/// Handle of a material owned by the material manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialHandle(pub Handle);

/// Shared part of a material, observed weakly by the manager
#[derive(Debug)]
pub struct MaterialTracker {
    handle: MaterialHandle,
    is_dynamic: bool,
}

/// Application side material reference
///
/// Cloning shares the tracker. The material is collected once every clone is
/// gone and the defer window has passed.
#[derive(Debug, Clone)]
pub struct Material {
    tracker: Rc<MaterialTracker>,
}

impl Material {
    pub(crate) fn new(handle: MaterialHandle, is_dynamic: bool) -> Self {
        Self {
            tracker: Rc::new(MaterialTracker { handle, is_dynamic }),
        }
    }

    pub(crate) fn from_weak(tracker: &Weak<MaterialTracker>) -> Option<Self> {
        tracker.upgrade().map(|tracker| Self { tracker })
    }

    pub(crate) fn downgrade(&self) -> Weak<MaterialTracker> {
        Rc::downgrade(&self.tracker)
    }

    /// Manager handle
    pub fn handle(&self) -> MaterialHandle {
        self.tracker.handle
    }

    /// True if the material state can be changed after creation
    pub fn is_dynamic(&self) -> bool {
        self.tracker.is_dynamic
    }

    /// True if both refer to the same tracker
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.tracker, &other.tracker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::NativeTextureHandle;
    use crate::render::resources::{PxExtent2D, StaticTexture, TextureHandle, VertexPositionColor};

    fn texture() -> Texture2D {
        Rc::new(StaticTexture::new(TextureHandle(0), PxExtent2D::new(1, 1), NativeTextureHandle(1))).into()
    }

    #[test]
    fn test_create_info_validate() {
        let info = MaterialCreateInfo::new(MaterialInfo::default(), VertexPositionColor::declaration(), texture());
        assert!(info.validate().is_ok());

        let empty = MaterialCreateInfo::new(MaterialInfo::default(), VertexDeclaration::default(), texture());
        assert!(matches!(empty.validate(), Err(RenderError::InvalidArgument(_))));

        let mut bad_viewport = info;
        bad_viewport.material_info.viewport = Some(PxViewport::new(0, 0, 0, 10));
        assert!(bad_viewport.validate().is_err());
    }

    #[test]
    fn test_material_weak_tracking() {
        let material = Material::new(MaterialHandle(3), false);
        let weak = material.downgrade();
        let clone = material.clone();
        assert!(material.ptr_eq(&clone));

        drop(material);
        let revived = Material::from_weak(&weak).map(|m| m.handle());
        assert_eq!(revived, Some(MaterialHandle(3)));

        drop(clone);
        assert!(Material::from_weak(&weak).is_none());
    }
}

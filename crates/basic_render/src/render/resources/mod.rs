//! Resource descriptors and the trackers handed to applications

pub mod buffer;
pub mod material;
pub mod shader;
pub mod texture;
pub mod vertex;

pub use buffer::{
    Buffer, BufferContent, BufferHandle, BufferType, BufferUsage, DynamicBuffer, DynamicBufferLink, StaticBuffer,
};
pub use material::{
    BlendState, CompareOp, CullMode, FrontFace, Material, MaterialCreateInfo, MaterialHandle, MaterialInfo,
    MaterialTracker, PxViewport,
};
pub use shader::{PredefinedShaderType, ShaderHandle};
pub use texture::{
    DynamicTexture, DynamicTextureLink, PixelFormat, PxExtent2D, RawTexture, StaticTexture, Texture2D,
    TextureFilterHint, TextureFlags, TextureHandle,
};
pub use vertex::{
    VertexAttribute, VertexDeclaration, VertexElement, VertexElementFormat, VertexElementUsage, VertexPositionColor,
    VertexPositionColorTexture, VertexType,
};

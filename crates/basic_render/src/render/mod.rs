//! # Render Module
//!
//! Deferred GPU resource lifecycle management behind a small immediate-mode
//! render API.
//!
//! ## Architecture
//!
//! ```text
//! RenderSystem (facade, frame/command state machine)
//!     ├── MaterialManager ──┬──> ShaderManager (reference counted)
//!     │                     └──> Texture2D trackers (strong)
//!     ├── TextureManager  (static + dynamic, deferred destruction)
//!     ├── BufferManager   (static + dynamic, deferred destruction)
//!     └── ShaderManager   (predefined + custom shaders)
//!                 ↓
//!     NativeDevice / NativeShaderFactory (backend collaborators)
//! ```
//!
//! Resource lifetime is driven by ordinary reference counting in application
//! code: every creation call returns an `Rc` tracker and the manager only
//! keeps a `Weak` observer. Each `pre_update` runs a garbage-collection pass
//! that waits for the frames-in-flight window to drain before destroying the
//! native object of an expired tracker.

pub mod api;
pub mod backends;
pub mod managers;
pub mod resources;

mod render_system;

pub use api::{
    BeginFrameInfo, CameraInfo, DependentCreateInfo, NativeBufferHandle, NativeDevice,
    NativeMaterialCreateInfo, NativeMaterialHandle, NativeShaderFactory, NativeShaderHandle,
    NativeTextureHandle, NativeTextureInfo, ShaderCreateInfo, ShaderStage, TextureCaps,
};
pub use render_system::{
    cascade_order, CachingState, CascadeDirection, RenderSystem, RenderSystemCreateInfo,
    ResourceManagerKind,
};
pub use resources::{
    BlendState, Buffer, BufferContent, BufferHandle, BufferType, BufferUsage, CompareOp, CullMode,
    DynamicBuffer, DynamicTexture, FrontFace, Material, MaterialCreateInfo, MaterialHandle,
    MaterialInfo, PixelFormat, PredefinedShaderType, PxExtent2D, PxViewport, RawTexture,
    ShaderHandle, StaticBuffer, StaticTexture, Texture2D, TextureFilterHint, TextureFlags,
    TextureHandle, VertexAttribute, VertexDeclaration, VertexElement, VertexElementFormat,
    VertexElementUsage, VertexPositionColor, VertexPositionColorTexture, VertexType,
};

use crate::config::ConfigError;
use crate::foundation::collections::HandleTableError;
use thiserror::Error;

/// Presentation-layer events forwarded to every resource manager
///
/// Raised by the host windowing layer. A lost swapchain implies the device is
/// idle, which lets the managers collect garbage without waiting for the
/// frames-in-flight window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderSystemEvent {
    /// The swapchain was lost; no GPU work is outstanding
    SwapchainLost,
    /// The swapchain was created again
    SwapchainRecreated,
}

/// Render system errors
///
/// Contract violations (bad handles, calls outside the allowed state, capacity
/// overflow) and backend creation failures are reported through this type.
/// Expected absence is not an error and is reported with `Option`/`bool`.
#[derive(Error, Debug)]
pub enum RenderError {
    /// An argument did not satisfy the operation's preconditions
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The call is not allowed in the current render system state
    ///
    /// For example recording a command outside a `begin_cmds`/`end_cmds` block.
    #[error("Usage error: {0}")]
    UsageError(String),

    /// The request exceeds a capability or representable capacity
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// A required object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The native backend failed to create a resource
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// A handle did not refer to a live record
    #[error("Handle lookup failed: {0}")]
    Handle(#[from] HandleTableError),

    /// The configuration was rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

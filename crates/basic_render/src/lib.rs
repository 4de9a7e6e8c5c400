//! # Basic Render
//!
//! Deferred GPU resource lifecycle management for a small immediate-mode
//! render API.
//!
//! ## Features
//!
//! - **Deferred destruction**: native objects outlive their last reference
//!   until the frames-in-flight window has drained
//! - **Static and dynamic resources**: textures and buffers that can be
//!   updated in place after creation
//! - **Reference counted shaders**: predefined and custom shader modules
//! - **Material caching**: identical static materials share one native object
//! - **Backend agnostic**: everything native goes through two traits
//!
//! ## Quick Start
//!
//! ```rust
//! use std::rc::Rc;
//! use basic_render::prelude::*;
//! use basic_render::render::backends::headless::{HeadlessDevice, HeadlessShaderFactory};
//!
//! fn main() -> Result<(), RenderError> {
//!     let device = Rc::new(HeadlessDevice::new());
//!     let factory = Rc::new(HeadlessShaderFactory::new());
//!     let mut render_system = RenderSystem::new(RenderSystemCreateInfo::new(
//!         device,
//!         factory,
//!         RenderSystemConfig::default(),
//!     ))?;
//!     render_system.create_dependent_resources(&DependentCreateInfo::new(PxExtent2D::new(640, 480)))?;
//!
//!     let indices = [0u16, 1, 2];
//!     let buffer = render_system.create_buffer(&BufferContent::index(&indices), BufferUsage::Static)?;
//!
//!     render_system.pre_update();
//!     render_system.begin_frame(&BeginFrameInfo::new(0));
//!     render_system.begin_cmds()?;
//!     render_system.cmd_bind_index_buffer(&buffer)?;
//!     render_system.cmd_draw_indexed(3, 0)?;
//!     render_system.end_cmds();
//!     render_system.end_frame();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod render;

/// Common imports for render system users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        core::{DeferPolicy, RenderSystemConfig},
        render::{
            BeginFrameInfo, Buffer, BufferContent, BufferUsage, CameraInfo, DependentCreateInfo,
            Material, MaterialCreateInfo, MaterialInfo, PixelFormat, PxExtent2D, RawTexture,
            RenderError, RenderResult, RenderSystem, RenderSystemCreateInfo, RenderSystemEvent,
            Texture2D, TextureFilterHint, TextureFlags, VertexPositionColor,
            VertexPositionColorTexture, VertexType,
        },
    };
}

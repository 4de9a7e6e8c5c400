//! Texture descriptors and trackers
//!
//! The texture manager hands out [`StaticTexture`] and [`DynamicTexture`]
//! trackers wrapped in `Rc`. It only keeps a `Weak` to each tracker, so once
//! the application drops its last `Rc` the next garbage collection pass can
//! start counting down the native texture's defer window.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use image::RgbaImage;

use crate::foundation::collections::Handle;
use crate::render::api::{NativeDevice, NativeTextureHandle};
use crate::render::{RenderError, RenderResult, RenderSystemEvent};

/// Size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PxExtent2D {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl PxExtent2D {
    /// Zero sized extent
    pub const EMPTY: Self = Self { width: 0, height: 0 };

    /// Create an extent
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True if either dimension is zero
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Pixel layout of raw texture content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8 bit RGBA
    R8G8B8A8Unorm,
    /// 8 bit BGRA
    B8G8R8A8Unorm,
    /// 8 bit RGB
    R8G8B8Unorm,
    /// Single 8 bit channel
    R8Unorm,
}

impl PixelFormat {
    /// Bytes used by one pixel
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::R8G8B8A8Unorm | Self::B8G8R8A8Unorm => 4,
            Self::R8G8B8Unorm => 3,
            Self::R8Unorm => 1,
        }
    }
}

/// Sampling hint passed to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFilterHint {
    /// Nearest neighbour sampling
    Nearest,
    /// Linear sampling
    #[default]
    Smooth,
}

bitflags! {
    /// Texture creation flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureFlags: u32 {
        /// Generate a mip chain after upload
        const GENERATE_MIPMAPS = 0x01;
    }
}

/// Borrowed view over texel content
#[derive(Debug, Clone, Copy)]
pub struct RawTexture<'a> {
    /// Size in pixels
    pub extent_px: PxExtent2D,
    /// Pixel format of `content`
    pub format: PixelFormat,
    /// Bytes per row
    pub stride: u32,
    /// Texel bytes, row by row
    pub content: &'a [u8],
}

impl<'a> RawTexture<'a> {
    /// Create a view over tightly packed rows
    ///
    /// A row too wide for a `u32` stride saturates and fails [`Self::validate`].
    pub fn new(extent_px: PxExtent2D, format: PixelFormat, content: &'a [u8]) -> Self {
        Self {
            extent_px,
            format,
            stride: extent_px.width.saturating_mul(format.bytes_per_pixel()),
            content,
        }
    }

    /// View an in-memory RGBA image
    pub fn from_rgba_image(image: &'a RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(PxExtent2D::new(width, height), PixelFormat::R8G8B8A8Unorm, image.as_raw())
    }

    /// Check that extent, stride and content agree
    pub fn validate(&self) -> RenderResult<()> {
        if self.extent_px.is_empty() {
            return Err(RenderError::InvalidArgument(format!(
                "texture extent must be non-empty, got {}x{}",
                self.extent_px.width, self.extent_px.height
            )));
        }
        let row_bytes = u64::from(self.extent_px.width) * u64::from(self.format.bytes_per_pixel());
        if u64::from(self.stride) < row_bytes {
            return Err(RenderError::InvalidArgument(format!(
                "texture stride {} is smaller than a row ({} bytes)",
                self.stride, row_bytes
            )));
        }
        let required = u64::from(self.stride) * u64::from(self.extent_px.height - 1) + row_bytes;
        if (self.content.len() as u64) < required {
            return Err(RenderError::InvalidArgument(format!(
                "texture content has {} bytes, {} required",
                self.content.len(),
                required
            )));
        }
        Ok(())
    }
}

/// Handle of a texture owned by the texture manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub Handle);

/// Tracker for an immutable texture
#[derive(Debug)]
pub struct StaticTexture {
    handle: TextureHandle,
    extent_px: PxExtent2D,
    native: NativeTextureHandle,
    destroyed: Cell<bool>,
}

impl StaticTexture {
    pub(crate) const fn new(handle: TextureHandle, extent_px: PxExtent2D, native: NativeTextureHandle) -> Self {
        Self {
            handle,
            extent_px,
            native,
            destroyed: Cell::new(false),
        }
    }

    /// Manager handle
    pub const fn handle(&self) -> TextureHandle {
        self.handle
    }

    /// Size in pixels
    pub const fn extent_px(&self) -> PxExtent2D {
        self.extent_px
    }

    /// Native handle, `None` once the manager destroyed it
    pub fn native_handle(&self) -> Option<NativeTextureHandle> {
        (!self.destroyed.get()).then_some(self.native)
    }

    pub(crate) fn mark_destroyed(&self) {
        self.destroyed.set(true);
    }
}

/// Connection between a dynamic texture tracker and its native storage
///
/// Shared by the tracker and the manager record. Once the manager destroys the
/// native texture the link stays around but refuses updates.
pub struct DynamicTextureLink {
    device: Rc<dyn NativeDevice>,
    native: NativeTextureHandle,
    extent_px: Cell<PxExtent2D>,
    destroyed: Cell<bool>,
}

impl DynamicTextureLink {
    pub(crate) fn new(device: Rc<dyn NativeDevice>, native: NativeTextureHandle, extent_px: PxExtent2D) -> Self {
        Self {
            device,
            native,
            extent_px: Cell::new(extent_px),
            destroyed: Cell::new(false),
        }
    }

    /// Current size in pixels
    pub fn extent_px(&self) -> PxExtent2D {
        self.extent_px.get()
    }

    /// Native handle, `None` once destroyed
    pub fn native_handle(&self) -> Option<NativeTextureHandle> {
        (!self.destroyed.get()).then_some(self.native)
    }

    /// True once the native texture has been released
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    fn set_data(&self, texture: &RawTexture<'_>, filter: TextureFilterHint, flags: TextureFlags) -> RenderResult<()> {
        if self.destroyed.get() {
            return Err(RenderError::UsageError(
                "dynamic texture was destroyed, it can no longer be updated".to_string(),
            ));
        }
        self.device.update_texture(self.native, texture, filter, flags)?;
        self.extent_px.set(texture.extent_px);
        Ok(())
    }

    pub(crate) fn on_render_system_event(&self, event: RenderSystemEvent) {
        if !self.destroyed.get() {
            self.device.on_dynamic_texture_event(self.native, event);
        }
    }

    pub(crate) fn destroy(&self) {
        if !self.destroyed.replace(true) {
            self.device.destroy_texture(self.native);
        }
    }
}

impl fmt::Debug for DynamicTextureLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicTextureLink")
            .field("native", &self.native)
            .field("extent_px", &self.extent_px.get())
            .field("destroyed", &self.destroyed.get())
            .finish()
    }
}

/// Tracker for a texture whose content can be replaced
#[derive(Debug)]
pub struct DynamicTexture {
    handle: TextureHandle,
    link: Rc<DynamicTextureLink>,
}

impl DynamicTexture {
    pub(crate) const fn new(handle: TextureHandle, link: Rc<DynamicTextureLink>) -> Self {
        Self { handle, link }
    }

    /// Manager handle
    pub const fn handle(&self) -> TextureHandle {
        self.handle
    }

    /// Current size in pixels
    pub fn extent_px(&self) -> PxExtent2D {
        self.link.extent_px()
    }

    /// Native handle, `None` once the manager destroyed it
    pub fn native_handle(&self) -> Option<NativeTextureHandle> {
        self.link.native_handle()
    }

    /// Replace the texture content
    ///
    /// The extent may change. Fails with `UsageError` if the native texture
    /// was already force-destroyed.
    pub fn set_data(&self, texture: &RawTexture<'_>, filter: TextureFilterHint, flags: TextureFlags) -> RenderResult<()> {
        texture.validate()?;
        self.link.set_data(texture, filter, flags)
    }
}

/// Either kind of texture tracker
#[derive(Debug, Clone)]
pub enum Texture2D {
    /// Immutable texture
    Static(Rc<StaticTexture>),
    /// Updatable texture
    Dynamic(Rc<DynamicTexture>),
}

impl Texture2D {
    /// Manager handle
    pub fn handle(&self) -> TextureHandle {
        match self {
            Self::Static(texture) => texture.handle(),
            Self::Dynamic(texture) => texture.handle(),
        }
    }

    /// Current size in pixels
    pub fn extent_px(&self) -> PxExtent2D {
        match self {
            Self::Static(texture) => texture.extent_px(),
            Self::Dynamic(texture) => texture.extent_px(),
        }
    }

    /// Native handle if it is still alive
    pub fn native_handle(&self) -> Option<NativeTextureHandle> {
        match self {
            Self::Static(texture) => texture.native_handle(),
            Self::Dynamic(texture) => texture.native_handle(),
        }
    }

    /// True for the dynamic variant
    pub const fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic(_))
    }

    /// True if both refer to the same tracker
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Static(lhs), Self::Static(rhs)) => Rc::ptr_eq(lhs, rhs),
            (Self::Dynamic(lhs), Self::Dynamic(rhs)) => Rc::ptr_eq(lhs, rhs),
            _ => false,
        }
    }
}

impl From<Rc<StaticTexture>> for Texture2D {
    fn from(texture: Rc<StaticTexture>) -> Self {
        Self::Static(texture)
    }
}

impl From<Rc<DynamicTexture>> for Texture2D {
    fn from(texture: Rc<DynamicTexture>) -> Self {
        Self::Dynamic(texture)
    }
}

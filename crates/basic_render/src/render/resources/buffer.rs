//! Index and vertex buffer content and trackers

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use bytemuck::Pod;

use super::vertex::{VertexDeclaration, VertexType};
use crate::foundation::collections::Handle;
use crate::render::api::{NativeBufferHandle, NativeDevice};
use crate::render::{RenderError, RenderResult, RenderSystemEvent};

/// What a buffer holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    /// 16 bit indices
    Index,
    /// Vertices
    Vertex,
}

/// Whether the buffer content can change after creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    /// Fixed content
    #[default]
    Static,
    /// Content replaced through [`DynamicBuffer::set_data`]
    Dynamic,
}

/// Borrowed view over buffer elements
///
/// Vertex content always carries the declaration of its vertex type.
#[derive(Debug, Clone)]
pub struct BufferContent<'a> {
    /// Element kind
    pub buffer_type: BufferType,
    /// Bytes per element
    pub element_stride: u32,
    /// Element bytes
    pub bytes: &'a [u8],
    /// Layout of vertex elements, `None` for index content
    pub vertex_declaration: Option<VertexDeclaration>,
}

impl<'a> BufferContent<'a> {
    /// Index content
    pub fn index(indices: &'a [u16]) -> Self {
        Self {
            buffer_type: BufferType::Index,
            element_stride: 2,
            bytes: bytemuck::cast_slice(indices),
            vertex_declaration: None,
        }
    }

    /// Vertex content of a vertex type with a known layout
    pub fn vertices<V: VertexType>(vertices: &'a [V]) -> Self {
        Self::vertices_with_declaration(vertices, V::declaration())
    }

    /// Vertex content of any plain-old-data type described by `declaration`
    pub fn vertices_with_declaration<V: Pod>(vertices: &'a [V], declaration: VertexDeclaration) -> Self {
        Self {
            buffer_type: BufferType::Vertex,
            element_stride: std::mem::size_of::<V>() as u32,
            bytes: bytemuck::cast_slice(vertices),
            vertex_declaration: Some(declaration),
        }
    }

    /// Number of elements
    pub fn element_count(&self) -> usize {
        if self.element_stride == 0 {
            0
        } else {
            self.bytes.len() / self.element_stride as usize
        }
    }

    /// Check that the bytes hold a whole number of elements
    pub fn validate(&self) -> RenderResult<()> {
        if self.element_stride == 0 {
            return Err(RenderError::InvalidArgument("buffer element stride can not be zero".to_string()));
        }
        if self.bytes.len() % self.element_stride as usize != 0 {
            return Err(RenderError::InvalidArgument(format!(
                "buffer content of {} bytes is not a multiple of the element stride {}",
                self.bytes.len(),
                self.element_stride
            )));
        }
        match (self.buffer_type, &self.vertex_declaration) {
            (BufferType::Index, None) => Ok(()),
            (BufferType::Index, Some(_)) => Err(RenderError::InvalidArgument(
                "index content can not carry a vertex declaration".to_string(),
            )),
            (BufferType::Vertex, None) => Err(RenderError::InvalidArgument(
                "vertex content needs a vertex declaration".to_string(),
            )),
            (BufferType::Vertex, Some(declaration)) if declaration.stride != self.element_stride => {
                Err(RenderError::InvalidArgument(format!(
                    "vertex declaration stride {} does not match the element stride {}",
                    declaration.stride, self.element_stride
                )))
            }
            (BufferType::Vertex, Some(_)) => Ok(()),
        }
    }
}

/// Handle of a buffer owned by the buffer manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub Handle);

/// Tracker for an immutable buffer
#[derive(Debug)]
pub struct StaticBuffer {
    handle: BufferHandle,
    buffer_type: BufferType,
    element_count: usize,
    vertex_declaration: Option<VertexDeclaration>,
    native: NativeBufferHandle,
    destroyed: Cell<bool>,
}

impl StaticBuffer {
    pub(crate) fn new(handle: BufferHandle, content: &BufferContent<'_>, native: NativeBufferHandle) -> Self {
        Self {
            handle,
            buffer_type: content.buffer_type,
            element_count: content.element_count(),
            vertex_declaration: content.vertex_declaration.clone(),
            native,
            destroyed: Cell::new(false),
        }
    }

    /// Manager handle
    pub const fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Element kind
    pub const fn buffer_type(&self) -> BufferType {
        self.buffer_type
    }

    /// Number of elements
    pub const fn element_count(&self) -> usize {
        self.element_count
    }

    /// Layout of the vertices, `None` for index buffers
    pub fn vertex_declaration(&self) -> Option<&VertexDeclaration> {
        self.vertex_declaration.as_ref()
    }

    /// Native handle, `None` once the manager destroyed it
    pub fn native_handle(&self) -> Option<NativeBufferHandle> {
        (!self.destroyed.get()).then_some(self.native)
    }

    pub(crate) fn mark_destroyed(&self) {
        self.destroyed.set(true);
    }
}

/// Connection between a dynamic buffer tracker and its native storage
pub struct DynamicBufferLink {
    device: Rc<dyn NativeDevice>,
    native: NativeBufferHandle,
    buffer_type: BufferType,
    element_stride: u32,
    vertex_declaration: Option<VertexDeclaration>,
    capacity: usize,
    element_count: Cell<usize>,
    destroyed: Cell<bool>,
}

impl DynamicBufferLink {
    pub(crate) fn new(
        device: Rc<dyn NativeDevice>,
        native: NativeBufferHandle,
        content: &BufferContent<'_>,
        capacity: usize,
    ) -> Self {
        Self {
            device,
            native,
            buffer_type: content.buffer_type,
            element_stride: content.element_stride,
            vertex_declaration: content.vertex_declaration.clone(),
            capacity,
            element_count: Cell::new(content.element_count()),
            destroyed: Cell::new(false),
        }
    }

    /// Maximum number of elements
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of elements currently stored
    pub fn element_count(&self) -> usize {
        self.element_count.get()
    }

    /// Native handle, `None` once destroyed
    pub fn native_handle(&self) -> Option<NativeBufferHandle> {
        (!self.destroyed.get()).then_some(self.native)
    }

    fn set_data(&self, content: &BufferContent<'_>) -> RenderResult<()> {
        if self.destroyed.get() {
            return Err(RenderError::UsageError(
                "dynamic buffer was destroyed, it can no longer be updated".to_string(),
            ));
        }
        if content.buffer_type != self.buffer_type {
            return Err(RenderError::InvalidArgument(format!(
                "buffer holds {:?} elements, got {:?}",
                self.buffer_type, content.buffer_type
            )));
        }
        if content.element_stride != self.element_stride {
            return Err(RenderError::InvalidArgument(format!(
                "element stride {} does not match the buffer stride {}",
                content.element_stride, self.element_stride
            )));
        }
        if content.vertex_declaration != self.vertex_declaration {
            return Err(RenderError::InvalidArgument(
                "vertex declaration does not match the buffer layout".to_string(),
            ));
        }
        let count = content.element_count();
        if count > self.capacity {
            return Err(RenderError::InvalidArgument(format!(
                "{} elements exceed the buffer capacity of {}",
                count, self.capacity
            )));
        }
        self.device.update_buffer(self.native, content)?;
        self.element_count.set(count);
        Ok(())
    }

    pub(crate) fn on_render_system_event(&self, event: RenderSystemEvent) {
        if !self.destroyed.get() {
            self.device.on_dynamic_buffer_event(self.native, event);
        }
    }

    pub(crate) fn destroy(&self) {
        if !self.destroyed.replace(true) {
            self.device.destroy_buffer(self.native);
        }
    }
}

impl fmt::Debug for DynamicBufferLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicBufferLink")
            .field("native", &self.native)
            .field("buffer_type", &self.buffer_type)
            .field("capacity", &self.capacity)
            .field("element_count", &self.element_count.get())
            .field("destroyed", &self.destroyed.get())
            .finish()
    }
}

/// Tracker for a buffer whose content can be replaced
#[derive(Debug)]
pub struct DynamicBuffer {
    handle: BufferHandle,
    link: Rc<DynamicBufferLink>,
}

impl DynamicBuffer {
    pub(crate) const fn new(handle: BufferHandle, link: Rc<DynamicBufferLink>) -> Self {
        Self { handle, link }
    }

    /// Manager handle
    pub const fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Element kind
    pub fn buffer_type(&self) -> BufferType {
        self.link.buffer_type
    }

    /// Maximum number of elements
    pub fn capacity(&self) -> usize {
        self.link.capacity()
    }

    /// Number of elements currently stored
    pub fn element_count(&self) -> usize {
        self.link.element_count()
    }

    /// Layout of the vertices, `None` for index buffers
    pub fn vertex_declaration(&self) -> Option<&VertexDeclaration> {
        self.link.vertex_declaration.as_ref()
    }

    /// Native handle, `None` once the manager destroyed it
    pub fn native_handle(&self) -> Option<NativeBufferHandle> {
        self.link.native_handle()
    }

    /// Replace the buffer content
    ///
    /// Content must match the buffer type and vertex layout and fit the capacity.
    pub fn set_data(&self, content: &BufferContent<'_>) -> RenderResult<()> {
        content.validate()?;
        self.link.set_data(content)
    }
}

/// Either kind of buffer tracker
#[derive(Debug, Clone)]
pub enum Buffer {
    /// Immutable buffer
    Static(Rc<StaticBuffer>),
    /// Updatable buffer
    Dynamic(Rc<DynamicBuffer>),
}

impl Buffer {
    /// Manager handle
    pub fn handle(&self) -> BufferHandle {
        match self {
            Self::Static(buffer) => buffer.handle(),
            Self::Dynamic(buffer) => buffer.handle(),
        }
    }

    /// Element kind
    pub fn buffer_type(&self) -> BufferType {
        match self {
            Self::Static(buffer) => buffer.buffer_type(),
            Self::Dynamic(buffer) => buffer.buffer_type(),
        }
    }

    /// Number of elements currently stored
    pub fn element_count(&self) -> usize {
        match self {
            Self::Static(buffer) => buffer.element_count(),
            Self::Dynamic(buffer) => buffer.element_count(),
        }
    }

    /// Layout of the vertices, `None` for index buffers
    pub fn vertex_declaration(&self) -> Option<&VertexDeclaration> {
        match self {
            Self::Static(buffer) => buffer.vertex_declaration(),
            Self::Dynamic(buffer) => buffer.vertex_declaration(),
        }
    }

    /// Native handle if it is still alive
    pub fn native_handle(&self) -> Option<NativeBufferHandle> {
        match self {
            Self::Static(buffer) => buffer.native_handle(),
            Self::Dynamic(buffer) => buffer.native_handle(),
        }
    }

    /// True for the dynamic variant
    pub const fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic(_))
    }
}

impl From<Rc<StaticBuffer>> for Buffer {
    fn from(buffer: Rc<StaticBuffer>) -> Self {
        Self::Static(buffer)
    }
}

impl From<Rc<DynamicBuffer>> for Buffer {
    fn from(buffer: Rc<DynamicBuffer>) -> Self {
        Self::Dynamic(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::resources::{VertexPositionColor, VertexPositionColorTexture};

    #[test]
    fn test_index_content() {
        let indices = [0u16, 1, 2, 2, 3, 0];
        let content = BufferContent::index(&indices);
        assert_eq!(content.buffer_type, BufferType::Index);
        assert_eq!(content.element_count(), 6);
        assert_eq!(content.bytes.len(), 12);
        assert!(content.validate().is_ok());
    }

    #[test]
    fn test_vertex_content() {
        let vertices = [
            VertexPositionColor::new([0.0, 0.0, 0.0], [1.0; 4]),
            VertexPositionColor::new([1.0, 0.0, 0.0], [1.0; 4]),
        ];
        let content = BufferContent::vertices(&vertices);
        assert_eq!(content.buffer_type, BufferType::Vertex);
        assert_eq!(content.element_stride, 28);
        assert_eq!(content.element_count(), 2);
        assert_eq!(content.vertex_declaration, Some(VertexPositionColor::declaration()));
        assert!(content.validate().is_ok());
    }

    #[test]
    fn test_vertex_content_declaration_must_match_stride() {
        let vertices = [VertexPositionColor::new([0.0, 0.0, 0.0], [1.0; 4])];
        let content =
            BufferContent::vertices_with_declaration(&vertices, VertexPositionColorTexture::declaration());
        assert!(matches!(content.validate(), Err(RenderError::InvalidArgument(_))));

        let undeclared = BufferContent {
            vertex_declaration: None,
            ..content
        };
        assert!(matches!(undeclared.validate(), Err(RenderError::InvalidArgument(_))));

        let indices = [0u16, 1, 2];
        let index_with_layout = BufferContent {
            vertex_declaration: Some(VertexPositionColor::declaration()),
            ..BufferContent::index(&indices)
        };
        assert!(matches!(index_with_layout.validate(), Err(RenderError::InvalidArgument(_))));
    }

    #[test]
    fn test_content_validate_rejects_partial_elements() {
        let bytes = [0u8; 5];
        let content = BufferContent {
            buffer_type: BufferType::Index,
            element_stride: 2,
            bytes: &bytes,
            vertex_declaration: None,
        };
        assert!(matches!(content.validate(), Err(RenderError::InvalidArgument(_))));

        let zero_stride = BufferContent {
            element_stride: 0,
            ..content
        };
        assert_eq!(zero_stride.element_count(), 0);
        assert!(zero_stride.validate().is_err());
    }
}

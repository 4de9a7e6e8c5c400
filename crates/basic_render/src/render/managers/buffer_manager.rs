//! Index and vertex buffer lifetime management
//!
//! Same collection scheme as the texture manager: static buffers keep their
//! native handle in the record, dynamic buffers share a link object with
//! their tracker so updates keep working until the native buffer is gone.

use std::rc::{Rc, Weak};

use super::deferred::{collect_step, CollectAction, CollectPass};
use crate::core::{DeferPolicy, RenderSystemConfig};
use crate::foundation::collections::HandleTable;
use crate::render::api::{NativeBufferHandle, NativeDevice};
use crate::render::resources::{
    Buffer, BufferContent, BufferHandle, BufferType, BufferUsage, DynamicBuffer, DynamicBufferLink, StaticBuffer,
};
use crate::render::{RenderError, RenderResult, RenderSystemEvent};

enum BufferRecord {
    Static {
        tracker: Weak<StaticBuffer>,
        native: NativeBufferHandle,
        defer_count: u32,
    },
    Dynamic {
        tracker: Weak<DynamicBuffer>,
        link: Rc<DynamicBufferLink>,
        defer_count: u32,
    },
}

impl BufferRecord {
    fn is_alive(&self) -> bool {
        match self {
            Self::Static { tracker, .. } => tracker.strong_count() > 0,
            Self::Dynamic { tracker, .. } => tracker.strong_count() > 0,
        }
    }

    const fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic { .. })
    }

    fn defer_count_mut(&mut self) -> &mut u32 {
        match self {
            Self::Static { defer_count, .. } | Self::Dynamic { defer_count, .. } => defer_count,
        }
    }

    fn native_handle(&self) -> Option<NativeBufferHandle> {
        match self {
            Self::Static { native, .. } => Some(*native),
            Self::Dynamic { link, .. } => link.native_handle(),
        }
    }

    fn destroy(&self, device: &dyn NativeDevice) {
        match self {
            Self::Static { tracker, native, .. } => {
                if let Some(tracker) = tracker.upgrade() {
                    tracker.mark_destroyed();
                }
                device.destroy_buffer(*native);
            }
            Self::Dynamic { link, .. } => link.destroy(),
        }
    }
}

/// Manager for static and dynamic index/vertex buffers
pub struct BufferManager {
    device: Rc<dyn NativeDevice>,
    max_frames_in_flight: u32,
    policy: DeferPolicy,
    dependent_resources_valid: bool,
    records: HandleTable<BufferRecord>,
}

impl BufferManager {
    /// Create an empty manager
    pub fn new(device: Rc<dyn NativeDevice>, config: &RenderSystemConfig) -> Self {
        Self {
            device,
            max_frames_in_flight: config.max_frames_in_flight,
            policy: config.defer_policy,
            dependent_resources_valid: false,
            records: HandleTable::new(),
        }
    }

    /// Create a buffer of the requested usage
    ///
    /// Dynamic buffers created this way can hold as many elements as `content`.
    pub fn create_buffer(&mut self, content: &BufferContent<'_>, usage: BufferUsage) -> RenderResult<Buffer> {
        match usage {
            BufferUsage::Static => self.create_static_buffer(content).map(Buffer::Static),
            BufferUsage::Dynamic => self
                .create_dynamic_buffer(content, content.element_count())
                .map(Buffer::Dynamic),
        }
    }

    /// Create an immutable buffer
    pub fn create_static_buffer(&mut self, content: &BufferContent<'_>) -> RenderResult<Rc<StaticBuffer>> {
        content.validate()?;
        let element_count = content.element_count();
        if element_count == 0 {
            return Err(RenderError::InvalidArgument("static buffers can not be empty".to_string()));
        }
        let native = self.device.create_buffer(content, content.bytes.len(), false)?;
        let buffer_type = content.buffer_type;
        let defer_count = self.max_frames_in_flight;
        let (handle, tracker) = self.records.add_with(|handle| {
            let tracker = Rc::new(StaticBuffer::new(BufferHandle(handle), content, native));
            let record = BufferRecord::Static {
                tracker: Rc::downgrade(&tracker),
                native,
                defer_count,
            };
            (record, tracker)
        });
        log::debug!(
            "BufferManager: created static {:?} buffer {} with {} elements",
            buffer_type,
            handle,
            element_count
        );
        Ok(tracker)
    }

    /// Create a buffer with room for `capacity` elements
    pub fn create_dynamic_buffer(
        &mut self,
        content: &BufferContent<'_>,
        capacity: usize,
    ) -> RenderResult<Rc<DynamicBuffer>> {
        content.validate()?;
        if capacity == 0 {
            return Err(RenderError::InvalidArgument("dynamic buffer capacity can not be zero".to_string()));
        }
        if content.element_count() > capacity {
            return Err(RenderError::InvalidArgument(format!(
                "{} elements exceed the requested capacity of {}",
                content.element_count(),
                capacity
            )));
        }
        let capacity_bytes = capacity * content.element_stride as usize;
        let native = self.device.create_buffer(content, capacity_bytes, true)?;
        let link = Rc::new(DynamicBufferLink::new(Rc::clone(&self.device), native, content, capacity));
        let defer_count = self.max_frames_in_flight;
        let (handle, tracker) = self.records.add_with(|handle| {
            let tracker = Rc::new(DynamicBuffer::new(BufferHandle(handle), Rc::clone(&link)));
            let record = BufferRecord::Dynamic {
                tracker: Rc::downgrade(&tracker),
                link,
                defer_count,
            };
            (record, tracker)
        });
        log::debug!(
            "BufferManager: created dynamic {:?} buffer {} with capacity {}",
            content.buffer_type,
            handle,
            capacity
        );
        Ok(tracker)
    }

    /// Native buffer behind `handle`, if it is still alive
    pub fn try_get_native_buffer(&self, handle: BufferHandle) -> Option<NativeBufferHandle> {
        self.records.try_get(handle.0).and_then(BufferRecord::native_handle)
    }

    /// Native buffer of `buffer` if it is of the expected type
    pub(crate) fn native_buffer_of_type(
        &self,
        buffer: &Buffer,
        buffer_type: BufferType,
    ) -> RenderResult<Option<NativeBufferHandle>> {
        if buffer.buffer_type() != buffer_type {
            return Err(RenderError::InvalidArgument(format!(
                "expected a {:?} buffer, got a {:?} buffer",
                buffer_type,
                buffer.buffer_type()
            )));
        }
        Ok(self.try_get_native_buffer(buffer.handle()))
    }

    /// Number of live buffer records
    pub fn buffer_count(&self) -> u32 {
        self.records.count()
    }

    /// Number of live static buffer records
    pub fn static_buffer_count(&self) -> usize {
        self.records.iter().filter(|(_, record)| !record.is_dynamic()).count()
    }

    /// Number of live dynamic buffer records
    pub fn dynamic_buffer_count(&self) -> usize {
        self.records.iter().filter(|(_, record)| record.is_dynamic()).count()
    }

    /// Per-frame garbage collection
    pub fn pre_update(&mut self) {
        let pass = CollectPass::deferred(self.max_frames_in_flight, self.dependent_resources_valid);
        self.collect_garbage(pass);
    }

    /// React to a presentation event
    pub fn on_render_system_event(&mut self, event: RenderSystemEvent) {
        if event == RenderSystemEvent::SwapchainLost {
            self.collect_garbage(CollectPass::forced());
        }
        for (_, record) in self.records.iter() {
            if let BufferRecord::Dynamic { link, .. } = record {
                link.on_render_system_event(event);
            }
        }
    }

    /// Mark dependent resources valid
    pub fn create_dependent_resources(&mut self) {
        self.dependent_resources_valid = true;
    }

    /// Mark dependent resources invalid and collect everything that expired
    pub fn destroy_dependent_resources(&mut self) {
        self.dependent_resources_valid = false;
        self.collect_garbage(CollectPass::forced());
    }

    /// Destroy every buffer regardless of outstanding trackers
    pub fn force_free_all(&mut self) {
        if self.records.is_empty() {
            return;
        }
        let mut still_referenced = 0;
        for (_, record) in self.records.drain() {
            if record.is_alive() {
                still_referenced += 1;
            }
            record.destroy(&*self.device);
        }
        if still_referenced > 0 {
            log::warn!("BufferManager: force freed {} buffers that were still referenced", still_referenced);
        }
    }

    fn collect_garbage(&mut self, pass: CollectPass) {
        let initial_count = self.records.count();
        for index in (0..initial_count).rev() {
            let Some(record) = self.records.get_at_mut(index) else {
                continue;
            };
            let threshold = self.policy.threshold(record.is_dynamic());
            let alive = record.is_alive();
            if collect_step(alive, record.defer_count_mut(), threshold, pass) == CollectAction::Destroy {
                if let Ok(record) = self.records.remove_at(index) {
                    record.destroy(&*self.device);
                }
            }
        }
        if initial_count != self.records.count() {
            log::debug!(
                "BufferManager: collected {} buffers, {} remain",
                initial_count - self.records.count(),
                self.records.count()
            );
        }
    }
}

impl Drop for BufferManager {
    fn drop(&mut self) {
        self.force_free_all();
    }
}

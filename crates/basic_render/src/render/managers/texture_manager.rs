//! Texture lifetime management
//!
//! Owns every static and dynamic texture created through the render system.
//! Applications hold the `Rc` trackers; the manager observes them through
//! `Weak` references and destroys the native texture once a tracker expired
//! and the frames-in-flight window has drained.

use std::rc::{Rc, Weak};

use super::deferred::{collect_step, CollectAction, CollectPass};
use crate::core::{DeferPolicy, RenderSystemConfig};
use crate::foundation::collections::HandleTable;
use crate::render::api::{NativeDevice, NativeTextureHandle, TextureCaps};
use crate::render::resources::{
    DynamicTexture, DynamicTextureLink, PxExtent2D, RawTexture, StaticTexture, Texture2D, TextureFilterHint,
    TextureFlags, TextureHandle,
};
use crate::render::{RenderError, RenderResult, RenderSystemEvent};

enum TextureRecord {
    Static {
        tracker: Weak<StaticTexture>,
        native: NativeTextureHandle,
        defer_count: u32,
    },
    Dynamic {
        tracker: Weak<DynamicTexture>,
        link: Rc<DynamicTextureLink>,
        defer_count: u32,
    },
}

impl TextureRecord {
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

    fn native_handle(&self) -> Option<NativeTextureHandle> {
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
                device.destroy_texture(*native);
            }
            Self::Dynamic { link, .. } => link.destroy(),
        }
    }
}

/// Manager for static and dynamic textures
pub struct TextureManager {
    device: Rc<dyn NativeDevice>,
    max_frames_in_flight: u32,
    policy: DeferPolicy,
    dependent_resources_valid: bool,
    records: HandleTable<TextureRecord>,
}

impl TextureManager {
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

    /// Texture capabilities of the device
    pub fn texture_caps(&self) -> TextureCaps {
        self.device.texture_caps()
    }

    /// Create an immutable texture
    pub fn create_texture_2d(
        &mut self,
        texture: &RawTexture<'_>,
        filter: TextureFilterHint,
        flags: TextureFlags,
    ) -> RenderResult<Rc<StaticTexture>> {
        texture.validate()?;
        let native = self.device.create_texture(texture, filter, flags, false)?;
        let defer_count = self.max_frames_in_flight;
        let extent_px = texture.extent_px;
        let (handle, tracker) = self.records.add_with(|handle| {
            let tracker = Rc::new(StaticTexture::new(TextureHandle(handle), extent_px, native));
            let record = TextureRecord::Static {
                tracker: Rc::downgrade(&tracker),
                native,
                defer_count,
            };
            (record, tracker)
        });
        log::debug!(
            "TextureManager: created static texture {} ({}x{}), count: {}",
            handle,
            extent_px.width,
            extent_px.height,
            self.records.count()
        );
        Ok(tracker)
    }

    /// Create a texture whose content can be replaced later
    ///
    /// Fails with `NotSupported` if the device can not update textures.
    pub fn create_dynamic_texture_2d(
        &mut self,
        texture: &RawTexture<'_>,
        filter: TextureFilterHint,
        flags: TextureFlags,
    ) -> RenderResult<Rc<DynamicTexture>> {
        if !self.device.texture_caps().contains(TextureCaps::DYNAMIC_UPDATE) {
            return Err(RenderError::NotSupported(
                "the device does not support dynamic textures".to_string(),
            ));
        }
        texture.validate()?;
        let native = self.device.create_texture(texture, filter, flags, true)?;
        let link = Rc::new(DynamicTextureLink::new(Rc::clone(&self.device), native, texture.extent_px));
        let defer_count = self.max_frames_in_flight;
        let (handle, tracker) = self.records.add_with(|handle| {
            let tracker = Rc::new(DynamicTexture::new(TextureHandle(handle), Rc::clone(&link)));
            let record = TextureRecord::Dynamic {
                tracker: Rc::downgrade(&tracker),
                link,
                defer_count,
            };
            (record, tracker)
        });
        log::debug!(
            "TextureManager: created dynamic texture {}, count: {}",
            handle,
            self.records.count()
        );
        Ok(tracker)
    }

    /// Size of a texture in pixels
    ///
    /// Unknown or missing textures report an empty extent.
    pub fn get_texture_extent_px(&self, texture: Option<&Texture2D>) -> PxExtent2D {
        let Some(texture) = texture else {
            log::debug!("TextureManager: extent of a missing texture requested");
            return PxExtent2D::EMPTY;
        };
        if !self.records.is_valid_handle(texture.handle().0) {
            log::debug!("TextureManager: extent of unknown texture {} requested", texture.handle().0);
            return PxExtent2D::EMPTY;
        }
        texture.extent_px()
    }

    /// Native texture behind `handle`, if it is still alive
    pub fn try_get_native_texture(&self, handle: TextureHandle) -> Option<NativeTextureHandle> {
        self.records.try_get(handle.0).and_then(TextureRecord::native_handle)
    }

    /// Number of live texture records
    pub fn texture_count(&self) -> u32 {
        self.records.count()
    }

    /// Number of live static texture records
    pub fn static_texture_count(&self) -> usize {
        self.records.iter().filter(|(_, record)| !record.is_dynamic()).count()
    }

    /// Number of live dynamic texture records
    pub fn dynamic_texture_count(&self) -> usize {
        self.records.iter().filter(|(_, record)| record.is_dynamic()).count()
    }

    /// True between `create_dependent_resources` and `destroy_dependent_resources`
    pub const fn is_dependent_resources_valid(&self) -> bool {
        self.dependent_resources_valid
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
            if let TextureRecord::Dynamic { link, .. } = record {
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

    /// Destroy every texture regardless of outstanding trackers
    pub fn force_free_all(&mut self) {
        if self.records.is_empty() {
            return;
        }
        let mut still_referenced = 0;
        for (handle, record) in self.records.drain() {
            if record.is_alive() {
                still_referenced += 1;
                log::trace!("TextureManager: texture {} still referenced at teardown", handle);
            }
            record.destroy(&*self.device);
        }
        if still_referenced > 0 {
            log::warn!(
                "TextureManager: force freed {} textures that were still referenced",
                still_referenced
            );
        }
    }

    fn collect_garbage(&mut self, pass: CollectPass) {
        let initial_count = self.records.count();
        let mut index = initial_count;
        while index > 0 {
            index -= 1;
            let Some(record) = self.records.get_at_mut(index) else {
                continue;
            };
            let threshold = self.policy.threshold(record.is_dynamic());
            let alive = record.is_alive();
            if collect_step(alive, record.defer_count_mut(), threshold, pass) == CollectAction::Destroy {
                let handle = self.records.fast_index_to_handle(index);
                if let Ok(record) = self.records.remove_at(index) {
                    log::trace!("TextureManager: destroying texture {}", handle);
                    record.destroy(&*self.device);
                }
            }
        }
        if initial_count != self.records.count() {
            log::debug!(
                "TextureManager: collected {} textures, {} remain",
                initial_count - self.records.count(),
                self.records.count()
            );
        }
    }
}

impl Drop for TextureManager {
    fn drop(&mut self) {
        self.force_free_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::headless::HeadlessDevice;
    use crate::render::resources::PixelFormat;

    const TEXELS: [u8; 16] = [0xff; 16];

    fn raw() -> RawTexture<'static> {
        RawTexture::new(PxExtent2D::new(2, 2), PixelFormat::R8G8B8A8Unorm, &TEXELS)
    }

    fn manager(device: &Rc<HeadlessDevice>, frames: u32) -> TextureManager {
        let mut manager = TextureManager::new(device.clone(), &RenderSystemConfig::new(frames));
        manager.create_dependent_resources();
        manager
    }

    #[test]
    fn test_static_texture_destroyed_after_n_passes() {
        let device = Rc::new(HeadlessDevice::new());
        let mut manager = manager(&device, 3);

        let texture = manager
            .create_texture_2d(&raw(), TextureFilterHint::Smooth, TextureFlags::empty())
            .unwrap();
        let native = texture.native_handle().unwrap();
        drop(texture);

        manager.pre_update();
        manager.pre_update();
        assert!(device.is_texture_alive(native));
        manager.pre_update();
        assert!(!device.is_texture_alive(native));
        assert_eq!(manager.texture_count(), 0);
    }

    #[test]
    fn test_dynamic_texture_destroyed_one_pass_earlier() {
        let device = Rc::new(HeadlessDevice::new());
        let mut manager = manager(&device, 3);

        let texture = manager
            .create_dynamic_texture_2d(&raw(), TextureFilterHint::Nearest, TextureFlags::empty())
            .unwrap();
        let native = texture.native_handle().unwrap();
        drop(texture);

        manager.pre_update();
        assert!(device.is_texture_alive(native));
        manager.pre_update();
        assert!(!device.is_texture_alive(native));
    }

    #[test]
    fn test_referenced_texture_survives_collection() {
        let device = Rc::new(HeadlessDevice::new());
        let mut manager = manager(&device, 2);

        let texture = manager
            .create_texture_2d(&raw(), TextureFilterHint::Smooth, TextureFlags::empty())
            .unwrap();
        for _ in 0..10 {
            manager.pre_update();
        }
        manager.on_render_system_event(RenderSystemEvent::SwapchainLost);
        assert!(texture.native_handle().is_some_and(|native| device.is_texture_alive(native)));
        assert_eq!(manager.texture_count(), 1);
    }

    #[test]
    fn test_swapchain_lost_collects_immediately() {
        let device = Rc::new(HeadlessDevice::new());
        let mut manager = manager(&device, 3);

        let texture = manager
            .create_dynamic_texture_2d(&raw(), TextureFilterHint::Smooth, TextureFlags::empty())
            .unwrap();
        let native = texture.native_handle().unwrap();
        drop(texture);

        manager.on_render_system_event(RenderSystemEvent::SwapchainLost);
        assert!(!device.is_texture_alive(native));
    }

    #[test]
    fn test_without_dependent_resources_collects_on_first_pass() {
        let device = Rc::new(HeadlessDevice::new());
        let mut manager = TextureManager::new(device.clone(), &RenderSystemConfig::new(3));

        let texture = manager
            .create_texture_2d(&raw(), TextureFilterHint::Smooth, TextureFlags::empty())
            .unwrap();
        drop(texture);
        manager.pre_update();
        assert_eq!(device.live_texture_count(), 0);
    }

    #[test]
    fn test_dynamic_texture_requires_caps() {
        let device = Rc::new(HeadlessDevice::with_caps(TextureCaps::empty()));
        let mut manager = manager(&device, 2);

        let result = manager.create_dynamic_texture_2d(&raw(), TextureFilterHint::Smooth, TextureFlags::empty());
        assert!(matches!(result, Err(RenderError::NotSupported(_))));
        assert_eq!(device.live_texture_count(), 0);
    }

    #[test]
    fn test_invalid_texture_is_rejected_before_device() {
        let device = Rc::new(HeadlessDevice::new());
        let mut manager = manager(&device, 2);

        let empty = RawTexture::new(PxExtent2D::EMPTY, PixelFormat::R8G8B8A8Unorm, &TEXELS);
        let result = manager.create_texture_2d(&empty, TextureFilterHint::Smooth, TextureFlags::empty());
        assert!(matches!(result, Err(RenderError::InvalidArgument(_))));
        assert_eq!(device.created_texture_count(), 0);
    }

    #[test]
    fn test_device_failure_leaves_no_record() {
        let device = Rc::new(HeadlessDevice::new());
        let mut manager = manager(&device, 2);

        device.set_fail_texture_creation(true);
        let result = manager.create_texture_2d(&raw(), TextureFilterHint::Smooth, TextureFlags::empty());
        assert!(matches!(result, Err(RenderError::ResourceCreationFailed(_))));
        assert_eq!(manager.texture_count(), 0);
    }

    #[test]
    fn test_extent_query_soft_fails() {
        let device = Rc::new(HeadlessDevice::new());
        let mut manager = manager(&device, 2);

        assert_eq!(manager.get_texture_extent_px(None), PxExtent2D::EMPTY);

        let texture: Texture2D = manager
            .create_texture_2d(&raw(), TextureFilterHint::Smooth, TextureFlags::empty())
            .unwrap()
            .into();
        assert_eq!(manager.get_texture_extent_px(Some(&texture)), PxExtent2D::new(2, 2));

        manager.force_free_all();
        assert_eq!(manager.get_texture_extent_px(Some(&texture)), PxExtent2D::EMPTY);
    }

    #[test]
    fn test_dynamic_set_data_updates_extent() {
        let device = Rc::new(HeadlessDevice::new());
        let mut manager = manager(&device, 2);

        let texture = manager
            .create_dynamic_texture_2d(&raw(), TextureFilterHint::Smooth, TextureFlags::empty())
            .unwrap();
        let bigger = [0u8; 64];
        let update = RawTexture::new(PxExtent2D::new(4, 4), PixelFormat::R8G8B8A8Unorm, &bigger);
        texture
            .set_data(&update, TextureFilterHint::Smooth, TextureFlags::empty())
            .unwrap();
        assert_eq!(texture.extent_px(), PxExtent2D::new(4, 4));

        let native = texture.native_handle().unwrap();
        assert_eq!(device.try_get_texture(native).map(|info| info.extent_px), Some(PxExtent2D::new(4, 4)));
    }

    #[test]
    fn test_set_data_after_force_free_is_usage_error() {
        let device = Rc::new(HeadlessDevice::new());
        let mut manager = manager(&device, 2);

        let texture = manager
            .create_dynamic_texture_2d(&raw(), TextureFilterHint::Smooth, TextureFlags::empty())
            .unwrap();
        manager.force_free_all();

        assert!(texture.native_handle().is_none());
        let result = texture.set_data(&raw(), TextureFilterHint::Smooth, TextureFlags::empty());
        assert!(matches!(result, Err(RenderError::UsageError(_))));
    }

    #[test]
    fn test_force_free_all_empties_records() {
        let device = Rc::new(HeadlessDevice::new());
        let mut manager = manager(&device, 3);

        let kept = manager
            .create_texture_2d(&raw(), TextureFilterHint::Smooth, TextureFlags::empty())
            .unwrap();
        let dynamic = manager
            .create_dynamic_texture_2d(&raw(), TextureFilterHint::Smooth, TextureFlags::empty())
            .unwrap();
        assert_eq!(manager.static_texture_count(), 1);
        assert_eq!(manager.dynamic_texture_count(), 1);

        manager.force_free_all();
        assert_eq!(manager.texture_count(), 0);
        assert_eq!(device.live_texture_count(), 0);

        // Held trackers no longer hand out the freed natives
        assert_eq!(kept.native_handle(), None);
        assert_eq!(Texture2D::from(kept).native_handle(), None);
        assert_eq!(dynamic.native_handle(), None);
    }

    #[test]
    fn test_events_reach_live_dynamic_textures() {
        let device = Rc::new(HeadlessDevice::new());
        let mut manager = manager(&device, 2);

        let texture = manager
            .create_dynamic_texture_2d(&raw(), TextureFilterHint::Smooth, TextureFlags::empty())
            .unwrap();
        device.clear_calls();
        manager.on_render_system_event(RenderSystemEvent::SwapchainRecreated);

        let native = texture.native_handle().unwrap();
        assert_eq!(
            device.calls(),
            vec![crate::render::backends::headless::DeviceCall::TextureEvent(
                native,
                RenderSystemEvent::SwapchainRecreated
            )]
        );
    }
}

//! Per-frame data passed from the render system to the backend

use nalgebra::Matrix4;

use crate::render::resources::PxExtent2D;

/// Information supplied when a frame begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BeginFrameInfo {
    /// Index of the frame-in-flight slot this frame records into
    pub frame_index: u32,
}

impl BeginFrameInfo {
    /// Create frame info for the given in-flight slot
    pub const fn new(frame_index: u32) -> Self {
        Self { frame_index }
    }
}

/// Information needed to (re)create swapchain dependent resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DependentCreateInfo {
    /// Size of the presentation surface in pixels
    pub extent_px: PxExtent2D,
}

impl DependentCreateInfo {
    /// Create dependent info for a surface of the given size
    pub const fn new(extent_px: PxExtent2D) -> Self {
        Self { extent_px }
    }
}

/// Camera matrices bound with `cmd_set_camera`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraInfo {
    /// Object to world transform
    pub world: Matrix4<f32>,
    /// World to view transform
    pub view: Matrix4<f32>,
    /// View to clip transform
    pub projection: Matrix4<f32>,
}

impl CameraInfo {
    /// Create camera info from the three matrices
    pub const fn new(world: Matrix4<f32>, view: Matrix4<f32>, projection: Matrix4<f32>) -> Self {
        Self {
            world,
            view,
            projection,
        }
    }

    /// Combined world-view-projection matrix
    pub fn world_view_projection(&self) -> Matrix4<f32> {
        self.projection * self.view * self.world
    }
}

impl Default for CameraInfo {
    fn default() -> Self {
        Self::new(Matrix4::identity(), Matrix4::identity(), Matrix4::identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_default_camera_is_identity() {
        assert_eq!(CameraInfo::default().world_view_projection(), Matrix4::identity());
    }

    #[test]
    fn test_world_view_projection_order() {
        let world = Matrix4::new_translation(&Vector3::new(1.0, 0.0, 0.0));
        let view = Matrix4::new_nonuniform_scaling(&Vector3::new(2.0, 2.0, 2.0));
        let camera = CameraInfo::new(world, view, Matrix4::identity());

        let point = camera.world_view_projection().transform_point(&nalgebra::Point3::origin());
        assert_eq!(point, nalgebra::Point3::new(2.0, 0.0, 0.0));
    }
}

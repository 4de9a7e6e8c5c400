//! In-memory shader factory

use std::cell::RefCell;
use std::collections::HashSet;

use crate::render::api::{NativeShaderFactory, NativeShaderHandle, ShaderCreateInfo};
use crate::render::resources::{VertexPositionColor, VertexPositionColorTexture};
use crate::render::{RenderError, RenderResult};

/// A valid set of predefined shaders
pub fn default_predefined_shaders() -> Vec<ShaderCreateInfo> {
    vec![
        ShaderCreateInfo::vertex(b"headless/textured.vert".to_vec(), VertexPositionColorTexture::shader_attributes()),
        ShaderCreateInfo::fragment(b"headless/textured.frag".to_vec()),
        ShaderCreateInfo::fragment(b"headless/sdf.frag".to_vec()),
        ShaderCreateInfo::vertex(b"headless/color.vert".to_vec(), VertexPositionColor::shader_attributes()),
        ShaderCreateInfo::fragment(b"headless/color.frag".to_vec()),
    ]
}

#[derive(Debug, Default)]
struct FactoryState {
    next_id: u64,
    live: HashSet<NativeShaderHandle>,
    created: usize,
    destroyed: usize,
    fail_after: Option<usize>,
}

/// Shader factory that keeps shader ids in memory
#[derive(Debug)]
pub struct HeadlessShaderFactory {
    predefined: Vec<ShaderCreateInfo>,
    state: RefCell<FactoryState>,
}

impl HeadlessShaderFactory {
    /// Factory with a valid predefined shader set
    pub fn new() -> Self {
        Self::with_predefined(default_predefined_shaders())
    }

    /// Factory returning an arbitrary predefined shader list
    pub fn with_predefined(predefined: Vec<ShaderCreateInfo>) -> Self {
        Self {
            predefined,
            state: RefCell::new(FactoryState::default()),
        }
    }

    /// Fail every creation once `count` shaders were created
    pub fn fail_after(&self, count: usize) {
        self.state.borrow_mut().fail_after = Some(count);
    }

    /// Shaders created so far
    pub fn created_count(&self) -> usize {
        self.state.borrow().created
    }

    /// Shaders destroyed so far
    pub fn destroyed_count(&self) -> usize {
        self.state.borrow().destroyed
    }

    /// Shaders currently alive
    pub fn live_shader_count(&self) -> usize {
        self.state.borrow().live.len()
    }

    /// True if the shader has not been destroyed
    pub fn is_shader_alive(&self, handle: NativeShaderHandle) -> bool {
        self.state.borrow().live.contains(&handle)
    }
}

impl Default for HeadlessShaderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeShaderFactory for HeadlessShaderFactory {
    fn predefined_shaders(&self) -> Vec<ShaderCreateInfo> {
        self.predefined.clone()
    }

    fn create_shader(&self, create_info: &ShaderCreateInfo) -> RenderResult<NativeShaderHandle> {
        let mut state = self.state.borrow_mut();
        if matches!(state.fail_after, Some(limit) if state.created >= limit) {
            return Err(RenderError::ResourceCreationFailed(format!(
                "headless {:?} shader creation disabled",
                create_info.stage
            )));
        }
        state.next_id += 1;
        let handle = NativeShaderHandle(state.next_id);
        state.live.insert(handle);
        state.created += 1;
        Ok(handle)
    }

    fn destroy_shader(&self, handle: NativeShaderHandle) {
        let mut state = self.state.borrow_mut();
        if !state.live.remove(&handle) {
            log::warn!("HeadlessShaderFactory: destroy of unknown shader {}", handle.0);
        }
        state.destroyed += 1;
    }
}

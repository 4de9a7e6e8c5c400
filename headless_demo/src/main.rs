//! Headless render system demo
//!
//! Runs a handful of frames against the headless backend, drops resources
//! mid-run and simulates a swapchain loss, logging what the device sees.
//!
//! Usage: `headless_demo [config.toml|config.ron]`

use std::rc::Rc;

use basic_render::prelude::*;
use basic_render::render::backends::headless::{HeadlessDevice, HeadlessShaderFactory};
use basic_render::render::DynamicBuffer;
use image::{Rgba, RgbaImage};
use thiserror::Error;

const FRAME_COUNT: u32 = 6;
const DROP_AFTER_FRAME: u32 = 2;
const EXTENT: PxExtent2D = PxExtent2D::new(800, 600);

/// Demo errors
#[derive(Error, Debug)]
pub enum DemoError {
    /// Render system failure
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Configuration could not be loaded
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

struct Scene {
    material: Material,
    quad: Buffer,
    indices: Buffer,
    scratch: Rc<DynamicBuffer>,
}

struct HeadlessApp {
    device: Rc<HeadlessDevice>,
    factory: Rc<HeadlessShaderFactory>,
    render_system: RenderSystem,
    scene: Option<Scene>,
}

impl HeadlessApp {
    fn new(config: RenderSystemConfig) -> Result<Self, DemoError> {
        let device = Rc::new(HeadlessDevice::new());
        let factory = Rc::new(HeadlessShaderFactory::new());
        let render_system = RenderSystem::new(RenderSystemCreateInfo::new(
            device.clone(),
            factory.clone(),
            config,
        ))?;
        Ok(Self {
            device,
            factory,
            render_system,
            scene: None,
        })
    }

    fn initialize(&mut self) -> Result<(), DemoError> {
        self.render_system
            .create_dependent_resources(&DependentCreateInfo::new(EXTENT))?;

        let checker = RgbaImage::from_fn(8, 8, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([40, 40, 40, 255])
            }
        });
        let texture = self.render_system.create_texture_2d(
            &RawTexture::from_rgba_image(&checker),
            TextureFilterHint::Nearest,
            TextureFlags::empty(),
        )?;
        let material = self.render_system.create_material(
            &MaterialCreateInfo::new(
                MaterialInfo::alpha_blend(),
                VertexPositionColorTexture::declaration(),
                texture,
            ),
            false,
        )?;

        let vertices = [
            VertexPositionColorTexture::new([-1.0, -1.0, 0.0], [1.0; 4], [0.0, 0.0]),
            VertexPositionColorTexture::new([1.0, -1.0, 0.0], [1.0; 4], [1.0, 0.0]),
            VertexPositionColorTexture::new([1.0, 1.0, 0.0], [1.0; 4], [1.0, 1.0]),
            VertexPositionColorTexture::new([-1.0, 1.0, 0.0], [1.0; 4], [0.0, 1.0]),
        ];
        let quad = self
            .render_system
            .create_buffer(&BufferContent::vertices(&vertices), BufferUsage::Static)?;
        let indices = self.render_system.create_buffer(
            &BufferContent::index(&[0, 1, 2, 2, 3, 0]),
            BufferUsage::Static,
        )?;
        let scratch = self
            .render_system
            .create_dynamic_buffer(&BufferContent::index(&[0, 1, 2]), 6)?;

        self.scene = Some(Scene {
            material,
            quad,
            indices,
            scratch,
        });
        self.log_counts("initialized");
        Ok(())
    }

    fn run_frame(&mut self, frame_index: u32) -> Result<(), DemoError> {
        self.render_system.pre_update();
        self.render_system.begin_frame(&BeginFrameInfo::new(frame_index));
        self.render_system.begin_cmds()?;
        self.render_system.cmd_set_camera(&CameraInfo::default())?;
        if let Some(scene) = &self.scene {
            scene.scratch.set_data(&BufferContent::index(&[0, 1, 2, 2, 3, 0]))?;
            self.render_system.cmd_bind_material(&scene.material)?;
            self.render_system.cmd_bind_vertex_buffer(&scene.quad)?;
            self.render_system.cmd_bind_index_buffer(&scene.indices)?;
            self.render_system.cmd_draw_indexed(6, 0)?;
        }
        self.render_system.end_cmds();
        self.render_system.end_frame();

        if frame_index == DROP_AFTER_FRAME {
            log::info!("Dropping scene resources after frame {}", frame_index);
            self.scene = None;
        }
        self.log_counts(&format!("frame {}", frame_index));
        Ok(())
    }

    fn simulate_swapchain_loss(&mut self) -> Result<(), DemoError> {
        self.render_system.on_render_system_event(RenderSystemEvent::SwapchainLost);
        self.log_counts("swapchain lost");
        self.render_system
            .on_render_system_event(RenderSystemEvent::SwapchainRecreated);
        self.render_system
            .create_dependent_resources(&DependentCreateInfo::new(EXTENT))?;
        self.log_counts("swapchain recreated");
        Ok(())
    }

    fn log_counts(&self, stage: &str) {
        log::info!(
            "[{}] live textures: {}, buffers: {}, materials: {}, shaders: {}",
            stage,
            self.device.live_texture_count(),
            self.device.live_buffer_count(),
            self.device.live_material_count(),
            self.factory.live_shader_count()
        );
    }
}

fn load_config() -> Result<RenderSystemConfig, DemoError> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading render config from {}", path);
            Ok(RenderSystemConfig::load_from_file(path)?)
        }
        None => Ok(RenderSystemConfig::default()),
    }
}

fn main() -> Result<(), DemoError> {
    basic_render::foundation::logging::init();

    let config = load_config()?;
    let mut app = HeadlessApp::new(config)?;
    app.initialize()?;
    for frame_index in 0..FRAME_COUNT {
        app.run_frame(frame_index)?;
    }
    app.simulate_swapchain_loss()?;
    app.render_system.destroy_dependent_resources();

    let HeadlessApp {
        device,
        factory,
        render_system,
        ..
    } = app;
    drop(render_system);
    log::info!(
        "Shut down: {} textures, {} buffers, {} materials, {} shaders still alive",
        device.live_texture_count(),
        device.live_buffer_count(),
        device.live_material_count(),
        factory.live_shader_count()
    );
    Ok(())
}

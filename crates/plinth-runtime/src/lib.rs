use std::{f32::consts::PI, path::PathBuf, time::Instant};

use winit::{dpi::PhysicalSize, event_loop::EventLoopProxy, window::Window};

use wgpu::{
    Adapter, CommandEncoderDescriptor, Device, ExperimentalFeatures, Features, Instance, Limits,
    MemoryHints, PowerPreference, Queue, RequestAdapterOptions, Surface, SurfaceConfiguration,
    Texture, TextureFormat, TextureView, TextureViewDescriptor,
};

pub type RcWindow = std::sync::Arc<Window>;

use glam::Vec3;
use plinth_3d::{Layouts, Renderer3D, create_bind_group_layouts};
use plinth_camera::{
    IntroSweep, IntroTimer, OrbitCamera, OrbitController, update_camera_buffer,
};
// The UI layer only sees this crate; the phase type rides along with it.
pub use plinth_camera::CameraPhase;
use plinth_gltf::{LoadOptions, load_gltf_model};
use plinth_scene::{ScaleParams, Scene};

/// Fixed look-at point for both the intro sweep and the orbit control.
const CAMERA_TARGET: Vec3 = Vec3::new(-0.5, 1.2, 0.0);

/// Seed angle for the initial camera position on the sweep circle.
const SEED_ANGLE: f32 = 0.2 * PI;
const SWEEP_RADIUS: f32 = 20.0;

fn initial_camera_position() -> Vec3 {
    Vec3::new(
        SWEEP_RADIUS * SEED_ANGLE.sin(),
        10.0,
        SWEEP_RADIUS * SEED_ANGLE.cos(),
    )
}

/// Once-only latch for GPU teardown: `arm` fires the first call and refuses
/// every later one, so the device is released exactly once even if teardown
/// races a still-pending frame.
#[derive(Debug, Default)]
struct DisposeOnce {
    done: bool,
}

impl DisposeOnce {
    fn arm(&mut self) -> bool {
        !std::mem::replace(&mut self.done, true)
    }

    fn is_done(&self) -> bool {
        self.done
    }
}

/// Offscreen color target the scene is rendered into; the UI layer samples
/// it as a texture. Depth lives with the renderer and is resized alongside.
pub struct Viewport {
    pub color: Texture,
    pub color_view: TextureView,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

impl Viewport {
    pub fn new(device: &wgpu::Device, format: TextureFormat, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("viewport_color"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            color,
            color_view,
            width,
            height,
            format,
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        *self = Viewport::new(device, self.format, width, height);
    }
}

/// One-time initialization: GPU, surface, layouts, model load, camera rig.
/// Runs off the event loop and hands the finished [`Graphics`] back through
/// the proxy. If the model fails to load the error is logged and no event is
/// sent, which leaves the app on its loading screen for good. There is no
/// retry and no fallback asset.
pub async fn create_graphics(
    window: RcWindow,
    proxy: EventLoopProxy<Graphics>,
    model_path: PathBuf,
) {
    let instance = Instance::default();
    let surface = instance
        .create_surface(std::sync::Arc::clone(&window))
        .unwrap();

    let adapter = instance
        .request_adapter(&RequestAdapterOptions {
            power_preference: PowerPreference::default(),
            force_fallback_adapter: false,
            compatible_surface: Some(&surface),
        })
        .await
        .expect("Could not get an adapter (GPU).");

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: Features::empty(),
            required_limits: Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits()),
            memory_hints: MemoryHints::Performance,
            trace: Default::default(),
            experimental_features: ExperimentalFeatures::disabled(),
        })
        .await
        .expect("Failed to get device");

    let size = window.inner_size();
    let width = size.width.max(1);
    let height = size.height.max(1);

    let surface_config = surface
        .get_default_config(&adapter, width, height)
        .expect("Failed to create surface config");
    surface.configure(&device, &surface_config);

    let layouts: Layouts = create_bind_group_layouts(&device);

    let mut scene = Scene::new();
    let model = match load_gltf_model(
        &device,
        &queue,
        &layouts.material_bgl,
        &mut scene,
        &model_path,
        LoadOptions {
            receive_shadow: false,
            cast_shadow: false,
        },
    )
    .await
    {
        Ok(model) => model,
        Err(err) => {
            log::error!("model load failed: {err:#}");
            return;
        }
    };

    let viewport = Viewport::new(
        &device,
        surface_config.format,
        surface_config.width,
        surface_config.height,
    );

    let renderer = Renderer3D::new(
        &device,
        surface_config.format,
        surface_config.width,
        surface_config.height,
        model,
        &layouts,
    );

    let initial_eye = initial_camera_position();
    let camera = OrbitCamera::new(initial_eye, CAMERA_TARGET);
    let sweep = IntroSweep::new(initial_eye, CAMERA_TARGET);
    let controller = OrbitController::new();

    update_camera_buffer(&queue, &renderer.camera_buf, &camera);

    let gfx = Graphics {
        window,
        instance,
        surface,
        surface_config,
        adapter,
        device,
        queue,
        renderer,
        scene,
        camera,
        controller,
        sweep,
        intro: IntroTimer::new(),
        viewport,
        last_frame_time: Instant::now(),
        dispose: DisposeOnce::default(),
    };

    let _ = proxy.send_event(gfx);
}

#[allow(dead_code)]
pub struct Graphics {
    pub(crate) window: RcWindow,
    pub viewport: Viewport,
    instance: Instance,
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,
    adapter: Adapter,
    device: Device,
    queue: Queue,
    renderer: Renderer3D,
    scene: Scene,
    camera: OrbitCamera,
    controller: OrbitController,
    sweep: IntroSweep,
    intro: IntroTimer,
    last_frame_time: Instant,
    dispose: DisposeOnce,
}

impl Graphics {
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    pub fn viewport_view(&self) -> &TextureView {
        &self.viewport.color_view
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if self.dispose.is_done() {
            return;
        }
        self.surface_config.width = new_size.width.max(1);
        self.surface_config.height = new_size.height.max(1);
        self.surface.configure(&self.device, &self.surface_config);
        self.viewport.resize(
            &self.device,
            self.surface_config.width,
            self.surface_config.height,
        );
        self.renderer
            .resize(&self.device, self.viewport.width, self.viewport.height);
    }

    /// Re-reads the live scale inputs. Called once per frame by the UI layer
    /// with whatever the text fields currently hold; NaN from bad input is
    /// applied as-is.
    pub fn set_scale_params(&mut self, params: &ScaleParams) {
        self.scene.set_scale(params.to_scale());
    }

    /// Pointer drag on the viewport, in pixels. Ignored while the intro owns
    /// the camera.
    pub fn orbit_drag(&mut self, dx: f32, dy: f32) {
        if self.intro.phase() == CameraPhase::Interactive {
            self.controller.rotate(dx, dy);
        }
    }

    /// Scroll over the viewport. Ignored while the intro owns the camera.
    pub fn orbit_zoom(&mut self, scroll: f32) {
        if self.intro.phase() == CameraPhase::Interactive {
            self.controller.zoom(scroll);
        }
    }

    pub fn draw<F>(&mut self, overlay: F)
    where
        F: FnOnce(&mut Self, &TextureView, &mut wgpu::CommandEncoder),
    {
        if self.dispose.is_done() {
            return;
        }

        let now = Instant::now();
        let mut dt = (now - self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;
        if dt > 0.1 {
            dt = 0.1;
        }

        // The whole scene scales by the latest inputs, then exactly one of
        // the two camera owners runs: the scripted sweep until the counter
        // passes its ceiling, the orbit controller afterwards.
        self.renderer
            .set_scene_scale(&self.queue, self.scene.scale_matrix());

        self.intro.tick();
        match self.intro.phase() {
            CameraPhase::Scripted => {
                self.camera.eye = self.sweep.eye_at(self.intro.frame());
            }
            CameraPhase::Interactive => {
                self.controller.update(&mut self.camera, dt);
            }
        }

        update_camera_buffer(&self.queue, &self.renderer.camera_buf, &self.camera);

        let frame = self
            .surface
            .get_current_texture()
            .expect("Failed to acquire next swap chain texture.");

        let swap_view = frame.texture.create_view(&TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: None });
        self.renderer
            .render(&mut encoder, &self.viewport.color_view);
        overlay(self, &swap_view, &mut encoder);
        self.queue.submit(Some(encoder.finish()));
        frame.present();
    }

    /// Releases the GPU device exactly once; draws after this are no-ops.
    pub fn dispose(&mut self) {
        if self.dispose.arm() {
            self.device.destroy();
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn surface_config(&self) -> &SurfaceConfiguration {
        &self.surface_config
    }

    pub fn model_name(&self) -> Option<&str> {
        self.renderer.model.name.as_deref()
    }

    pub fn camera_phase(&self) -> CameraPhase {
        self.intro.phase()
    }

    pub fn intro_frame(&self) -> u32 {
        self.intro.frame()
    }

    pub fn eye(&self) -> Vec3 {
        self.camera.eye
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinth_camera::{INTRO_FRAME_CEILING, IntroTimer};

    #[test]
    fn initial_eye_sits_on_the_seed_circle() {
        let eye = initial_camera_position();
        assert!((eye.y - 10.0).abs() < 1e-6);
        let radius = (eye.x * eye.x + eye.z * eye.z).sqrt();
        assert!((radius - SWEEP_RADIUS).abs() < 1e-4);
    }

    // The phase type is re-exported here so the binary never reaches past
    // this crate for it.
    #[test]
    fn phase_is_reachable_through_this_crate() {
        let mut intro = IntroTimer::new();
        assert_eq!(intro.phase(), CameraPhase::Scripted);
        for _ in 0..=INTRO_FRAME_CEILING {
            intro.tick();
        }
        assert_eq!(intro.phase(), CameraPhase::Interactive);
    }

    #[test]
    fn dispose_latch_fires_exactly_once() {
        let mut latch = DisposeOnce::default();
        assert!(!latch.is_done());
        assert!(latch.arm());
        assert!(latch.is_done());
        assert!(!latch.arm());
        assert!(latch.is_done());
    }
}

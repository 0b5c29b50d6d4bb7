use crate::config::ViewerConfig;
use egui::Sense;
use egui::load::SizedTexture;
use plinth_runtime::{CameraPhase, Graphics, RcWindow, create_graphics};
use plinth_scene::ScaleParams;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{StartCause, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy},
    window::{Window, WindowId},
};

const FPS: u64 = 120;
const FRAME_TIME: Duration = Duration::from_nanos(1_000_000_000 / FPS);

enum State {
    Ready(ReadyState),
    Init(Option<EventLoopProxy<Graphics>>),
}

struct ReadyState {
    gfx: Graphics,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
    viewport_tex_id: egui::TextureId,
}

/// The three live scale inputs, held as raw text and sampled every frame.
pub struct ViewerUi {
    pub scale_x: String,
    pub scale_y: String,
    pub scale_z: String,
}

impl ViewerUi {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            scale_x: config.scale.x.clone(),
            scale_y: config.scale.y.clone(),
            scale_z: config.scale.z.clone(),
        }
    }
}

pub struct App {
    state: State,
    render_target: Instant,
    ui: ViewerUi,
    title: String,
    model_path: PathBuf,
    window_size: LogicalSize<u32>,
}

impl App {
    pub fn new(event_loop: &EventLoop<Graphics>, config: ViewerConfig) -> Self {
        Self {
            state: State::Init(Some(event_loop.create_proxy())),
            render_target: Instant::now(),
            ui: ViewerUi::new(&config),
            title: config.window.title.clone(),
            model_path: config.model.path.clone(),
            window_size: LogicalSize::new(config.window.width, config.window.height),
        }
    }

    fn init_egui_for_graphics(
        gfx: &Graphics,
    ) -> (
        egui::Context,
        egui_winit::State,
        egui_wgpu::Renderer,
        egui::TextureId,
    ) {
        let egui_ctx = egui::Context::default();
        let viewport_id = egui_ctx.viewport_id();

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            viewport_id,
            gfx.window(),
            None,
            None,
            None,
        );

        let mut egui_renderer = egui_wgpu::Renderer::new(
            gfx.device(),
            gfx.surface_config().format,
            egui_wgpu::RendererOptions::default(),
        );

        let viewport_tex_id = egui_renderer.register_native_texture(
            gfx.device(),
            gfx.viewport_view(),
            wgpu::FilterMode::Linear,
        );

        (egui_ctx, egui_state, egui_renderer, viewport_tex_id)
    }

    fn draw(&mut self) {
        if let State::Ready(ready) = &mut self.state {
            Self::draw_viewer(ready, &mut self.ui);
        }
    }

    fn resized(&mut self, size: PhysicalSize<u32>) {
        if let State::Ready(ready) = &mut self.state {
            ready.gfx.resize(size);
            ready.egui_renderer.free_texture(&ready.viewport_tex_id);
            ready.viewport_tex_id = ready.egui_renderer.register_native_texture(
                ready.gfx.device(),
                ready.gfx.viewport_view(),
                wgpu::FilterMode::Linear,
            );
        }
    }

    fn draw_viewer(ready: &mut ReadyState, ui_state: &mut ViewerUi) {
        let raw_input = ready.egui_state.take_egui_input(ready.gfx.window());
        let viewport_tex_id = ready.viewport_tex_id;
        let surface_cfg = ready.gfx.surface_config();
        let viewport_w = surface_cfg.width as f32;
        let viewport_h = surface_cfg.height as f32;
        let model_name = ready.gfx.model_name().unwrap_or("model").to_string();
        let interactive = ready.gfx.camera_phase() == CameraPhase::Interactive;
        let cam_eye = ready.gfx.eye();
        let intro_frame = ready.gfx.intro_frame();
        let egui_ctx = ready.egui_ctx.clone();

        let mut drag_delta = egui::Vec2::ZERO;
        let mut scroll_delta = 0.0f32;

        let full_output = egui_ctx.run(raw_input, |ctx| {
            egui::TopBottomPanel::top("hints").show(ctx, |ui| {
                ui.label("Click and drag to move around.");
                ui.label("Edit the values to rescale the model.");
            });

            egui::SidePanel::right("scale_panel")
                .resizable(false)
                .default_width(160.0)
                .show(ctx, |ui| {
                    ui.heading("Scale");
                    ui.separator();

                    ui.horizontal(|ui| {
                        ui.label("X:");
                        ui.text_edit_singleline(&mut ui_state.scale_x);
                    });
                    ui.horizontal(|ui| {
                        ui.label("Y:");
                        ui.text_edit_singleline(&mut ui_state.scale_y);
                    });
                    ui.horizontal(|ui| {
                        ui.label("Z:");
                        ui.text_edit_singleline(&mut ui_state.scale_z);
                    });

                    ui.separator();
                    ui.label(format!("Model: {model_name}"));
                    ui.monospace(format!(
                        "eye: [{:.1}, {:.1}, {:.1}]",
                        cam_eye.x, cam_eye.y, cam_eye.z
                    ));
                    if !interactive {
                        ui.label(format!("Intro sweep… frame {intro_frame}"));
                    }
                });

            egui::CentralPanel::default().show(ctx, |ui| {
                let available = ui.available_size();

                if available.x > 0.0 && available.y > 0.0 && viewport_w > 0.0 && viewport_h > 0.0 {
                    let tex_aspect = viewport_w / viewport_h;
                    let panel_aspect = available.x / available.y;
                    let (w, h) = if panel_aspect > tex_aspect {
                        let h = available.y;
                        let w = h * tex_aspect;
                        (w, h)
                    } else {
                        let w = available.x;
                        let h = w / tex_aspect;
                        (w, h)
                    };

                    let viewport_size = egui::vec2(w, h);
                    let sized = SizedTexture::new(viewport_tex_id, viewport_size);
                    let image = egui::Image::from_texture(sized).sense(Sense::click_and_drag());
                    let response = ui.add(image);

                    if response.dragged() {
                        drag_delta += response.drag_delta();
                    }
                    if response.hovered() {
                        scroll_delta += ui.ctx().input(|i| i.raw_scroll_delta.y);
                    }
                } else {
                    ui.label("Viewport area is too small.");
                }
            });
        });

        let egui::FullOutput {
            platform_output,
            textures_delta,
            shapes,
            pixels_per_point,
            ..
        } = full_output;

        ready
            .egui_state
            .handle_platform_output(ready.gfx.window(), platform_output);

        let paint_jobs = ready.egui_ctx.tessellate(shapes, pixels_per_point);

        // Live inputs are sampled once per frame, whatever they hold.
        let params = ScaleParams::new(
            ui_state.scale_x.clone(),
            ui_state.scale_y.clone(),
            ui_state.scale_z.clone(),
        );
        ready.gfx.set_scale_params(&params);

        if drag_delta != egui::Vec2::ZERO {
            ready.gfx.orbit_drag(drag_delta.x, drag_delta.y);
        }
        if scroll_delta != 0.0 {
            ready.gfx.orbit_zoom(scroll_delta);
        }

        ready.gfx.draw(|gfx_inner, swap_view, encoder| {
            for (id, image_delta) in &textures_delta.set {
                ready.egui_renderer.update_texture(
                    gfx_inner.device(),
                    gfx_inner.queue(),
                    *id,
                    image_delta,
                );
            }
            for id in &textures_delta.free {
                ready.egui_renderer.free_texture(id);
            }

            let screen_descriptor = egui_wgpu::ScreenDescriptor {
                size_in_pixels: [
                    gfx_inner.surface_config().width,
                    gfx_inner.surface_config().height,
                ],
                pixels_per_point,
            };

            ready.egui_renderer.update_buffers(
                gfx_inner.device(),
                gfx_inner.queue(),
                encoder,
                &paint_jobs,
                &screen_descriptor,
            );

            let rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui_overlay_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: swap_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let mut rpass = rpass.forget_lifetime();
            ready
                .egui_renderer
                .render(&mut rpass, &paint_jobs, &screen_descriptor);
        });
    }
}

impl ApplicationHandler<Graphics> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let State::Init(proxy) = &mut self.state {
            if let Some(proxy) = proxy.take() {
                let win_attr = Window::default_attributes()
                    .with_title(format!("{} (loading model…)", self.title))
                    .with_inner_size(self.window_size);

                let window: RcWindow = std::sync::Arc::new(
                    event_loop
                        .create_window(win_attr)
                        .expect("create window err."),
                );
                pollster::block_on(create_graphics(window, proxy, self.model_path.clone()));
            }
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, graphics: Graphics) {
        let (egui_ctx, egui_state, egui_renderer, viewport_tex_id) =
            App::init_egui_for_graphics(&graphics);

        graphics.window().set_title(&self.title);
        graphics.request_redraw();
        self.state = State::Ready(ReadyState {
            gfx: graphics,
            egui_ctx,
            egui_state,
            egui_renderer,
            viewport_tex_id,
        });
    }

    fn new_events(&mut self, _event_loop: &ActiveEventLoop, _cause: StartCause) {
        if self.render_target <= Instant::now() {
            self.render_target += FRAME_TIME;
            if let State::Ready(ready) = &mut self.state {
                ready.gfx.request_redraw();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::Resized(size) => self.resized(size),
            WindowEvent::RedrawRequested => {
                self.draw();
                let now = Instant::now();
                if self.render_target <= now {
                    self.render_target = now + FRAME_TIME;
                    if let State::Ready(ready) = &mut self.state {
                        ready.gfx.request_redraw();
                    }
                }
            }
            WindowEvent::CloseRequested => {
                if let State::Ready(ready) = &mut self.state {
                    ready.gfx.dispose();
                }
                event_loop.exit();
            }
            other => {
                if let State::Ready(ready) = &mut self.state {
                    let response = ready.egui_state.on_window_event(ready.gfx.window(), &other);
                    if response.repaint {
                        ready.gfx.request_redraw();
                    }
                }
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.render_target));
    }
}

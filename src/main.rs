use std::sync::Arc;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{DeviceEvent, ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use glam::Vec2;

mod renderer;
mod settings;
mod surface;

use renderer::{Camera, GpuMesh, GpuState};
use settings::{RenderSettings, SurfaceKind};
use surface::{grid_resolution, tessellate};

#[derive(Default)]
struct MouseState {
    left_down: bool,
    right_down: bool,
}

struct App {
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,

    camera: Camera,
    settings: RenderSettings,
    mesh: Option<GpuMesh>,
    mesh_dirty: bool,

    clock: f32,
    last_frame: Instant,

    mouse: MouseState,
    shift_down: bool,
}

impl App {
    fn new() -> Self {
        Self {
            window: None,
            gpu: None,

            camera: Camera::default(),
            settings: RenderSettings::default(),
            mesh: None,
            mesh_dirty: false,

            clock: 0.0,
            last_frame: Instant::now(),

            mouse: MouseState::default(),
            shift_down: false,
        }
    }

    /// Builds the mesh for the current settings and swaps it in. The old
    /// mesh is destroyed only after the replacement exists, so an allocation
    /// failure leaves the previous geometry current.
    fn regenerate_geometry(&mut self) {
        let Some(gpu) = &self.gpu else { return };

        let n = grid_resolution(self.settings.tessellation);
        let spec = self.settings.surface_spec(self.clock);
        let data = tessellate(&spec, n, n);

        match GpuMesh::create(&gpu.device, &data) {
            Ok(new_mesh) => {
                log::debug!(
                    "rebuilt {n}x{n} grid: {} vertices, {} indices",
                    new_mesh.num_vertices(),
                    new_mesh.num_indices()
                );
                if let Some(mut old) = self.mesh.replace(new_mesh) {
                    old.destroy();
                }
            }
            Err(err) => {
                log::error!("mesh rebuild failed, keeping previous geometry: {err}");
            }
        }
        self.mesh_dirty = false;
    }

    fn update(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        if self.settings.animate && self.settings.surface == SurfaceKind::Wave {
            self.clock += dt;
            // CPU wave geometry depends on the clock; the GPU path reads the
            // time uniform instead and needs no rebuild.
            if !self.settings.gpu_surface {
                self.mesh_dirty = true;
            }
        }

        if self.mesh_dirty {
            self.regenerate_geometry();
        }
    }

    fn render(&mut self) {
        let (Some(gpu), Some(window)) = (&mut self.gpu, &self.window) else {
            return;
        };

        let output = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.resize(gpu.size);
                return;
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("surface out of GPU memory");
                return;
            }
            Err(wgpu::SurfaceError::Timeout) => {
                return;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        gpu.update_camera(&self.camera);
        gpu.update_shading(&self.settings, self.clock);

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Main Encoder"),
            });

        if let Some(mesh) = &self.mesh {
            gpu.render_scene(&view, &mut encoder, mesh, &self.settings);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        window.request_redraw();
    }

    fn handle_toggle(&mut self, key: KeyCode) {
        match key {
            KeyCode::KeyG => {
                self.settings.surface = self.settings.surface.next();
                log::info!("surface: {}", self.settings.surface.name());
                self.mesh_dirty = true;
            }
            KeyCode::KeyT => {
                let changed = if self.shift_down {
                    self.settings.raise_tessellation()
                } else {
                    self.settings.lower_tessellation()
                };
                if changed {
                    let n = grid_resolution(self.settings.tessellation);
                    log::info!(
                        "tessellation: level {} ({n}x{n})",
                        self.settings.tessellation
                    );
                    self.mesh_dirty = true;
                }
            }
            KeyCode::KeyS => {
                self.settings.gpu_surface = !self.settings.gpu_surface;
                log::info!("gpu surface evaluation: {}", self.settings.gpu_surface);
                self.mesh_dirty = true;
            }
            KeyCode::KeyA => {
                self.settings.animate = !self.settings.animate;
                log::info!("wave animation: {}", self.settings.animate);
            }
            KeyCode::KeyW => {
                let supported = self.gpu.as_ref().is_some_and(|g| g.wireframe_supported());
                if supported {
                    self.settings.wireframe = !self.settings.wireframe;
                    log::info!("wireframe: {}", self.settings.wireframe);
                } else {
                    log::warn!("wireframe unavailable: adapter lacks line polygon mode");
                }
            }
            KeyCode::KeyL => {
                self.settings.lighting = !self.settings.lighting;
                log::info!("lighting: {}", self.settings.lighting);
            }
            KeyCode::KeyM => {
                self.settings.phong_specular = !self.settings.phong_specular;
                log::info!(
                    "specular model: {}",
                    if self.settings.phong_specular {
                        "phong"
                    } else {
                        "blinn-phong"
                    }
                );
            }
            KeyCode::KeyV => {
                self.settings.local_viewer = !self.settings.local_viewer;
                log::info!("local viewer: {}", self.settings.local_viewer);
            }
            KeyCode::KeyK => {
                self.settings.directional_light = !self.settings.directional_light;
                log::info!(
                    "light type: {}",
                    if self.settings.directional_light {
                        "directional"
                    } else {
                        "point"
                    }
                );
            }
            KeyCode::KeyH => {
                if self.shift_down {
                    self.settings.raise_shininess();
                } else {
                    self.settings.lower_shininess();
                }
                log::info!("shininess: {}", self.settings.shininess);
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let window_attrs = Window::default_attributes()
            .with_title("Parametric Surfaces")
            .with_inner_size(PhysicalSize::new(1280, 720));

        let window = match event_loop.create_window(window_attrs) {
            Ok(w) => Arc::new(w),
            Err(err) => {
                log::error!("window creation failed: {err}");
                event_loop.exit();
                return;
            }
        };

        match pollster::block_on(GpuState::new(window.clone())) {
            Ok(gpu) => {
                let size = window.inner_size();
                self.camera.set_aspect(size.width as f32, size.height as f32);
                self.window = Some(window);
                self.gpu = Some(gpu);
                self.regenerate_geometry();
            }
            Err(err) => {
                log::error!("GPU init failed: {err:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(size);
                    self.camera.set_aspect(size.width as f32, size.height as f32);
                }
            }

            WindowEvent::ModifiersChanged(modifiers) => {
                self.shift_down = modifiers.state().shift_key();
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed {
                    if let PhysicalKey::Code(key) = event.physical_key {
                        if key == KeyCode::Escape {
                            event_loop.exit();
                        } else {
                            self.handle_toggle(key);
                        }
                    }
                }
            }

            WindowEvent::MouseInput { button, state, .. } => {
                let down = state == ElementState::Pressed;
                match button {
                    MouseButton::Left => self.mouse.left_down = down,
                    MouseButton::Right => self.mouse.right_down = down,
                    _ => {}
                }
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    winit::event::MouseScrollDelta::LineDelta(_, y) => y,
                    winit::event::MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 50.0,
                };
                self.camera.process_zoom(scroll);
            }

            WindowEvent::RedrawRequested => {
                self.update();
                self.render();
            }

            _ => {}
        }
    }

    fn device_event(&mut self, _: &ActiveEventLoop, _: winit::event::DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.mouse.left_down {
                self.camera
                    .process_drag(Vec2::new(delta.0 as f32, delta.1 as f32));
            } else if self.mouse.right_down {
                self.camera.process_zoom(-delta.1 as f32 * 0.3);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    event_loop.run_app(&mut app)?;
    Ok(())
}

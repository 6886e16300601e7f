use anyhow::Context;
use thiserror::Error;
use wgpu::util::DeviceExt;

use crate::renderer::camera::{Camera, CameraUniform};
use crate::settings::RenderSettings;
use crate::surface::MeshData;

/// GPU buffer allocation failed while building a mesh. The build is aborted
/// and whatever mesh was current before stays current.
#[derive(Debug, Error)]
#[error("gpu buffer allocation failed: {0}")]
pub struct AllocationError(#[from] wgpu::Error);

pub const FLAG_LIGHTING: u32 = 1;
pub const FLAG_PHONG: u32 = 1 << 1;
pub const FLAG_LOCAL_VIEWER: u32 = 1 << 2;
pub const FLAG_POINT_LIGHT: u32 = 1 << 3;
pub const FLAG_GPU_SURFACE: u32 = 1 << 4;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadingUniform {
    pub flags: u32,
    pub shininess: f32,
    pub time: f32,
    pub surface_id: u32,
}

impl ShadingUniform {
    pub fn from_settings(settings: &RenderSettings, time: f32) -> Self {
        let mut flags = 0;
        if settings.lighting {
            flags |= FLAG_LIGHTING;
        }
        if settings.phong_specular {
            flags |= FLAG_PHONG;
        }
        if settings.local_viewer {
            flags |= FLAG_LOCAL_VIEWER;
        }
        if !settings.directional_light {
            flags |= FLAG_POINT_LIGHT;
        }
        if settings.gpu_surface {
            flags |= FLAG_GPU_SURFACE;
        }
        Self {
            flags,
            shininess: settings.shininess,
            time,
            surface_id: settings.surface.shader_id(),
        }
    }
}

/// A drawable mesh: the vertex and index buffers it exclusively owns plus
/// their element counts. Either fully constructed or not returned at all.
pub struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_vertices: u32,
    num_indices: u32,
}

impl GpuMesh {
    /// Uploads host-side mesh data into fresh static buffers. Allocation
    /// failures are caught with an out-of-memory error scope instead of the
    /// default uncaptured-error panic.
    pub fn create(device: &wgpu::Device, data: &MeshData) -> Result<Self, AllocationError> {
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Surface Vertex Buffer"),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Surface Index Buffer"),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(AllocationError(err));
        }

        Ok(Self {
            vertex_buffer,
            index_buffer,
            num_vertices: data.vertices.len() as u32,
            num_indices: data.indices.len() as u32,
        })
    }

    pub fn num_vertices(&self) -> u32 {
        self.num_vertices
    }

    pub fn num_indices(&self) -> u32 {
        self.num_indices
    }

    /// Releases both buffers and zeroes the counts. Safe to call more than
    /// once; a destroyed mesh simply draws nothing.
    pub fn destroy(&mut self) {
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
        self.num_vertices = 0;
        self.num_indices = 0;
    }
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct AxisVertex {
    position: [f32; 3],
    color: [f32; 3],
}

fn axes_vertices(length: f32) -> Vec<AxisVertex> {
    let axis = |to: [f32; 3], color: [f32; 3]| {
        [
            AxisVertex {
                position: [0.0; 3],
                color,
            },
            AxisVertex {
                position: to,
                color,
            },
        ]
    };
    let mut v = Vec::with_capacity(6);
    v.extend(axis([length, 0.0, 0.0], [1.0, 0.0, 0.0]));
    v.extend(axis([0.0, length, 0.0], [0.0, 1.0, 0.0]));
    v.extend(axis([0.0, 0.0, length], [0.0, 0.0, 1.0]));
    v
}

fn mesh_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    // Stride and normal offset follow directly from the Vertex layout:
    // three position floats, then three normal floats.
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<crate::surface::Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x3,
            },
        ],
    }
}

fn axes_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<AxisVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x3,
            },
        ],
    }
}

pub struct GpuState {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,

    pipeline_fill: wgpu::RenderPipeline,
    pipeline_wire: Option<wgpu::RenderPipeline>,
    pipeline_axes: wgpu::RenderPipeline,

    camera_buffer: wgpu::Buffer,
    shading_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,

    axes_buffer: wgpu::Buffer,
    axes_vertex_count: u32,

    depth_texture: wgpu::TextureView,
}

impl GpuState {
    pub async fn new(window: std::sync::Arc<winit::window::Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no compatible GPU adapter")?;

        // Wireframe needs the line polygon mode; take it only if offered so
        // the demo still runs on adapters without it.
        let required_features = adapter.features() & wgpu::Features::POLYGON_MODE_LINE;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features,
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .context("GPU device request failed")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders.wgsl").into()),
        });

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Buffer"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let shading_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shading Buffer"),
            size: std::mem::size_of::<ShadingUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: shading_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let surface_pipeline = |polygon_mode: wgpu::PolygonMode| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Surface Render Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_surface"),
                    buffers: &[mesh_vertex_layout()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_surface"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: config.format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    strip_index_format: Some(wgpu::IndexFormat::Uint32),
                    cull_mode: None,
                    polygon_mode,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: wgpu::TextureFormat::Depth32Float,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let pipeline_fill = surface_pipeline(wgpu::PolygonMode::Fill);
        let pipeline_wire = device
            .features()
            .contains(wgpu::Features::POLYGON_MODE_LINE)
            .then(|| surface_pipeline(wgpu::PolygonMode::Line));

        let pipeline_axes = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Axes Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_axes"),
                buffers: &[axes_vertex_layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_axes"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let axes = axes_vertices(2.0);
        let axes_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Axes Vertex Buffer"),
            contents: bytemuck::cast_slice(&axes),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let depth_texture = Self::create_depth_texture(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            pipeline_fill,
            pipeline_wire,
            pipeline_axes,
            camera_buffer,
            shading_buffer,
            bind_group,
            axes_buffer,
            axes_vertex_count: axes.len() as u32,
            depth_texture,
        })
    }

    pub fn wireframe_supported(&self) -> bool {
        self.pipeline_wire.is_some()
    }

    fn create_depth_texture(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
    ) -> wgpu::TextureView {
        let size = wgpu::Extent3d {
            width: config.width.max(1),
            height: config.height.max(1),
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.depth_texture = Self::create_depth_texture(&self.device, &self.config);
        }
    }

    pub fn update_camera(&self, camera: &Camera) {
        let uniform = CameraUniform::from_camera(camera);
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    pub fn update_shading(&self, settings: &RenderSettings, time: f32) {
        let uniform = ShadingUniform::from_settings(settings, time);
        self.queue
            .write_buffer(&self.shading_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    /// One indexed triangle-strip draw for the surface, then the unlit axes
    /// overlay on top.
    pub fn render_scene(
        &self,
        view: &wgpu::TextureView,
        encoder: &mut wgpu::CommandEncoder,
        mesh: &GpuMesh,
        settings: &RenderSettings,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_texture,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let pipeline = match (&self.pipeline_wire, settings.wireframe) {
            (Some(wire), true) => wire,
            _ => &self.pipeline_fill,
        };

        if mesh.num_indices > 0 {
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &self.bind_group, &[]);
            render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..mesh.num_indices, 0, 0..1);
        }

        render_pass.set_pipeline(&self.pipeline_axes);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.axes_buffer.slice(..));
        render_pass.draw(0..self.axes_vertex_count, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SurfaceKind;
    use crate::surface::{SurfaceSpec, tessellate};

    /// Headless device for buffer tests. None on machines without any
    /// adapter (tests that need a device skip themselves then).
    fn request_test_device() -> Option<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .or_else(|| {
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: None,
                force_fallback_adapter: true,
            }))
        })?;

        pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default(), None)).ok()
    }

    #[test]
    fn shading_flags_mirror_settings() {
        let settings = RenderSettings {
            surface: SurfaceKind::Wave,
            ..Default::default()
        };

        let u = ShadingUniform::from_settings(&settings, 2.5);
        assert_eq!(u.flags, FLAG_LIGHTING | FLAG_LOCAL_VIEWER);
        assert_eq!(u.surface_id, 2);
        assert_eq!(u.time, 2.5);

        let settings = RenderSettings {
            lighting: false,
            directional_light: false,
            gpu_surface: true,
            phong_specular: true,
            ..settings
        };
        let u = ShadingUniform::from_settings(&settings, 0.0);
        assert_eq!(
            u.flags,
            FLAG_PHONG | FLAG_LOCAL_VIEWER | FLAG_POINT_LIGHT | FLAG_GPU_SURFACE
        );
    }

    #[test]
    fn destroy_twice_is_a_no_op() {
        let Some((device, _queue)) = request_test_device() else {
            eprintln!("no GPU adapter available, skipping");
            return;
        };

        let data = tessellate(
            &SurfaceSpec::Torus {
                major: 1.0,
                minor: 0.5,
            },
            5,
            5,
        );
        let mut mesh = GpuMesh::create(&device, &data).expect("buffer allocation");
        assert_eq!(mesh.num_vertices(), 25);
        assert_eq!(mesh.num_indices(), 48);

        mesh.destroy();
        assert_eq!(mesh.num_vertices(), 0);
        assert_eq!(mesh.num_indices(), 0);

        // Second destroy must neither panic nor double-free.
        mesh.destroy();
        assert_eq!(mesh.num_vertices(), 0);
        assert_eq!(mesh.num_indices(), 0);
    }

    #[test]
    fn axes_come_in_three_colored_pairs() {
        let axes = axes_vertices(2.0);
        assert_eq!(axes.len(), 6);
        assert_eq!(axes[1].position, [2.0, 0.0, 0.0]);
        assert_eq!(axes[1].color, [1.0, 0.0, 0.0]);
        assert_eq!(axes[3].position, [0.0, 2.0, 0.0]);
        assert_eq!(axes[5].position, [0.0, 0.0, 2.0]);
    }
}

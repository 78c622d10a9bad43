use spine_axmol::{
    BlendFactor, BlendFunc, CommandId, SamplerAddressMode, SamplerFilter, SkeletonBatch,
    TexParams, TextureHandle,
};
use std::collections::HashMap;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [u8; 4],
    pub dark_color: [u8; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Globals {
    clip_from_world: [[f32; 4]; 4],
}

/// One indexed draw over [`DrawList::indices`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DrawCall {
    pub texture: TextureHandle,
    pub blend_func: BlendFunc,
    pub first_index: u32,
    pub index_count: u32,
}

/// Frame geometry flattened out of a [`SkeletonBatch`]: positions are in world space and indices
/// address the whole vertex array.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DrawList {
    pub vertices: Vec<GpuVertex>,
    pub indices: Vec<u32>,
    pub draws: Vec<DrawCall>,
}

impl DrawList {
    /// Collects `commands` (in submission order) from `batch`.
    ///
    /// Each command's vertices are transformed by its model-view matrix. Consecutive commands with
    /// the same material id are folded into one draw call.
    pub fn build(batch: &SkeletonBatch, commands: &[CommandId]) -> Self {
        let mut list = DrawList::default();
        let mut last_material = None;

        for &id in commands {
            let command = batch.command(id);
            let Some(texture) = command.texture else {
                continue;
            };
            let base = list.vertices.len() as u32;
            let model_view = command.model_view;
            list.vertices.extend(
                batch
                    .vertices(command.triangles.vertices)
                    .iter()
                    .map(|v| {
                        let p = model_view.transform_point3(glam::Vec3::from(v.position));
                        GpuVertex {
                            position: [p.x, p.y],
                            uv: v.uv,
                            color: v.color,
                            dark_color: v.dark_color,
                        }
                    }),
            );
            let first_index = list.indices.len() as u32;
            list.indices.extend(
                batch
                    .indices(command.triangles.indices)
                    .iter()
                    .map(|&i| base + u32::from(i)),
            );
            let index_count = list.indices.len() as u32 - first_index;

            let material = command.material_id();
            match list.draws.last_mut() {
                Some(draw) if last_material == Some(material) => draw.index_count += index_count,
                _ => list.draws.push(DrawCall {
                    texture,
                    blend_func: command.blend_func,
                    first_index,
                    index_count,
                }),
            }
            last_material = Some(material);
        }
        list
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Executes skeleton batches with wgpu.
///
/// Pipelines are created lazily, one per blend function, sharing one two-color shader. Page
/// textures are bound through a [`TextureProvider`].
pub struct WgpuSkeletonRenderer {
    shader: wgpu::ShaderModule,
    pipeline_layout: wgpu::PipelineLayout,
    color_format: wgpu::TextureFormat,
    pipelines: HashMap<BlendFunc, wgpu::RenderPipeline>,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    texture_bind_group_layout: wgpu::BindGroupLayout,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    vertex_capacity: usize,
    index_capacity: usize,
    draw_list: DrawList,
}

impl WgpuSkeletonRenderer {
    pub fn new(device: &wgpu::Device, color_format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("spine-axmol shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let globals_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("spine-axmol globals layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("spine-axmol texture layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("spine-axmol pipeline layout"),
            bind_group_layouts: &[&globals_bind_group_layout, &texture_bind_group_layout],
            push_constant_ranges: &[],
        });

        let globals = Globals {
            clip_from_world: glam::Mat4::IDENTITY.to_cols_array_2d(),
        };
        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("spine-axmol globals"),
            contents: bytemuck::bytes_of(&globals),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("spine-axmol globals"),
            layout: &globals_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let vertex_capacity = 1024;
        let index_capacity = 2048;
        let vertex_buffer = create_vertex_buffer(device, vertex_capacity);
        let index_buffer = create_index_buffer(device, index_capacity);

        Self {
            shader,
            pipeline_layout,
            color_format,
            pipelines: HashMap::new(),
            globals_buffer,
            globals_bind_group,
            texture_bind_group_layout,
            vertex_buffer,
            index_buffer,
            vertex_capacity,
            index_capacity,
            draw_list: DrawList::default(),
        }
    }

    pub fn texture_bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.texture_bind_group_layout
    }

    /// Sets the projection applied to every vertex; usually the host camera's projection.
    pub fn set_projection(&self, queue: &wgpu::Queue, projection: glam::Mat4) {
        let globals = Globals {
            clip_from_world: projection.to_cols_array_2d(),
        };
        queue.write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));
    }

    /// Treats world coordinates as pixels centered on the viewport.
    pub fn set_projection_ortho_centered(&self, queue: &wgpu::Queue, width: f32, height: f32) {
        let half_w = width.max(1.0) / 2.0;
        let half_h = height.max(1.0) / 2.0;
        self.set_projection(
            queue,
            glam::Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, -1.0, 1.0),
        );
    }

    /// Flattens the frame's commands, uploads them and creates any missing pipelines.
    ///
    /// `commands` must come from the batch's current frame, in draw order (for example
    /// [`CommandQueue::drain_sorted`](spine_axmol::CommandQueue::drain_sorted)).
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        batch: &SkeletonBatch,
        commands: &[CommandId],
    ) {
        self.draw_list = DrawList::build(batch, commands);
        if self.draw_list.is_empty() {
            return;
        }

        for draw in &self.draw_list.draws {
            if !self.pipelines.contains_key(&draw.blend_func) {
                log::debug!("creating pipeline for {:?}", draw.blend_func);
                let pipeline = create_pipeline(
                    device,
                    &self.pipeline_layout,
                    &self.shader,
                    self.color_format,
                    draw.blend_func,
                );
                self.pipelines.insert(draw.blend_func, pipeline);
            }
        }

        self.ensure_buffers(
            device,
            self.draw_list.vertices.len(),
            self.draw_list.indices.len(),
        );
        queue.write_buffer(
            &self.vertex_buffer,
            0,
            bytemuck::cast_slice(&self.draw_list.vertices),
        );
        queue.write_buffer(
            &self.index_buffer,
            0,
            bytemuck::cast_slice(&self.draw_list.indices),
        );
    }

    /// The geometry uploaded by the last [`prepare`](Self::prepare).
    pub fn draw_list(&self) -> &DrawList {
        &self.draw_list
    }

    /// Records the prepared draws. Draws whose texture has no bind group are skipped.
    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>, textures: &dyn TextureProvider) {
        if self.draw_list.is_empty() {
            return;
        }

        pass.set_bind_group(0, &self.globals_bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);

        for draw in &self.draw_list.draws {
            let Some(pipeline) = self.pipelines.get(&draw.blend_func) else {
                continue;
            };
            let Some(bind_group) = textures.bind_group(draw.texture) else {
                log::warn!("no bind group for texture {}", draw.texture.get());
                continue;
            };
            pass.set_pipeline(pipeline);
            pass.set_bind_group(1, bind_group, &[]);
            let end = draw.first_index + draw.index_count;
            pass.draw_indexed(draw.first_index..end, 0, 0..1);
        }
    }

    fn ensure_buffers(&mut self, device: &wgpu::Device, vertices: usize, indices: usize) {
        if vertices > self.vertex_capacity {
            while self.vertex_capacity < vertices {
                self.vertex_capacity *= 2;
            }
            self.vertex_buffer = create_vertex_buffer(device, self.vertex_capacity);
        }
        if indices > self.index_capacity {
            while self.index_capacity < indices {
                self.index_capacity *= 2;
            }
            self.index_buffer = create_index_buffer(device, self.index_capacity);
        }
    }
}

fn create_vertex_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("spine-axmol vertices"),
        size: (capacity * std::mem::size_of::<GpuVertex>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_index_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("spine-axmol indices"),
        size: (capacity * std::mem::size_of::<u32>()) as u64,
        usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    color_format: wgpu::TextureFormat,
    blend_func: BlendFunc,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("spine-axmol pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<GpuVertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![
                    0 => Float32x2,
                    1 => Float32x2,
                    2 => Unorm8x4,
                    3 => Unorm8x4
                ],
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(blend_state(blend_func)),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Color uses the command's factors; alpha always takes the source with weight one, as
/// `glBlendFuncSeparate(src, dst, ONE, dst)` does in the Spine runtimes.
pub fn blend_state(blend_func: BlendFunc) -> wgpu::BlendState {
    use wgpu::{BlendComponent, BlendOperation};

    let dst = blend_factor(blend_func.dst);
    wgpu::BlendState {
        color: BlendComponent {
            src_factor: blend_factor(blend_func.src),
            dst_factor: dst,
            operation: BlendOperation::Add,
        },
        alpha: BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: dst,
            operation: BlendOperation::Add,
        },
    }
}

fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
    }
}

pub trait TextureProvider {
    fn bind_group(&self, texture: TextureHandle) -> Option<&wgpu::BindGroup>;
}

#[derive(Default)]
pub struct HashMapTextureProvider {
    pub bind_groups: HashMap<TextureHandle, wgpu::BindGroup>,
}

impl TextureProvider for HashMapTextureProvider {
    fn bind_group(&self, texture: TextureHandle) -> Option<&wgpu::BindGroup> {
        self.bind_groups.get(&texture)
    }
}

pub fn create_texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("spine-axmol texture bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

/// Sampler matching the parameters an atlas page was loaded with.
pub fn create_sampler(device: &wgpu::Device, params: &TexParams) -> wgpu::Sampler {
    device.create_sampler(&sampler_descriptor(params))
}

pub fn sampler_descriptor(params: &TexParams) -> wgpu::SamplerDescriptor<'static> {
    wgpu::SamplerDescriptor {
        label: Some("spine-axmol page sampler"),
        address_mode_u: address_mode(params.s_address_mode),
        address_mode_v: address_mode(params.t_address_mode),
        mag_filter: filter_mode(params.mag_filter),
        min_filter: filter_mode(params.min_filter),
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    }
}

fn address_mode(mode: SamplerAddressMode) -> wgpu::AddressMode {
    match mode {
        SamplerAddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        SamplerAddressMode::Repeat => wgpu::AddressMode::Repeat,
    }
}

fn filter_mode(filter: SamplerFilter) -> wgpu::FilterMode {
    match filter {
        SamplerFilter::Nearest => wgpu::FilterMode::Nearest,
        SamplerFilter::Linear => wgpu::FilterMode::Linear,
    }
}

const SHADER: &str = r#"
struct Globals {
  clip_from_world: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> globals: Globals;

struct VsIn {
  @location(0) position: vec2<f32>,
  @location(1) uv: vec2<f32>,
  @location(2) light_color: vec4<f32>,
  @location(3) dark_color: vec4<f32>,
};

struct VsOut {
  @builtin(position) position: vec4<f32>,
  @location(0) uv: vec2<f32>,
  @location(1) light_color: vec4<f32>,
  @location(2) dark_color: vec4<f32>,
};

@vertex
fn vs_main(in: VsIn) -> VsOut {
  var out: VsOut;
  out.position = globals.clip_from_world * vec4<f32>(in.position, 0.0, 1.0);
  out.uv = in.uv;
  out.light_color = in.light_color;
  out.dark_color = in.dark_color;
  return out;
}

@group(1) @binding(0)
var tex: texture_2d<f32>;

@group(1) @binding(1)
var samp: sampler;

// A black dark color reduces this to texture * light.
@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
  let tex_color = textureSample(tex, samp, in.uv);
  let alpha = tex_color.a * in.light_color.a;
  let rgb = ((tex_color.a - 1.0) * in.dark_color.a + 1.0 - tex_color.rgb) * in.dark_color.rgb
    + tex_color.rgb * in.light_color.rgb;
  return vec4<f32>(rgb, alpha);
}
"#;

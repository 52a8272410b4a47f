use std::mem::offset_of;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use wgpu::util::DeviceExt;

use crate::math::bounds::AABB;
use crate::rendering::context::RenderContext;
use crate::rendering::material::Material;
use crate::rendering::shader::ShaderLibrary;
use crate::rendering::uniforms::{object_bind_group_layout, ObjectUniforms};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

pub const VERTEX_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, position) as wgpu::BufferAddress,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, normal) as wgpu::BufferAddress,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, tex_coords) as wgpu::BufferAddress,
            shader_location: 2,
            format: wgpu::VertexFormat::Float32x2,
        },
    ],
};

/// CPU-side mesh data. Indices may be empty, in which case the mesh draws
/// as a plain vertex list.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    pub fn bounds(&self) -> AABB {
        AABB::from_points(self.vertices.iter().map(|vertex| vertex.position.into()))
    }

    /// Fullscreen quad in the XY plane spanning [-1, 1]; resolution
    /// independent, used by the post processor.
    pub fn quad() -> Self {
        let vertices = vec![
            Vertex {
                position: [-1.0, -1.0, 0.0],
                normal: [0.0, 0.0, 1.0],
                tex_coords: [0.0, 1.0],
            },
            Vertex {
                position: [1.0, -1.0, 0.0],
                normal: [0.0, 0.0, 1.0],
                tex_coords: [1.0, 1.0],
            },
            Vertex {
                position: [1.0, 1.0, 0.0],
                normal: [0.0, 0.0, 1.0],
                tex_coords: [1.0, 0.0],
            },
            Vertex {
                position: [-1.0, 1.0, 0.0],
                normal: [0.0, 0.0, 1.0],
                tex_coords: [0.0, 0.0],
            },
        ];
        let indices = vec![0, 1, 2, 0, 2, 3];
        Self { vertices, indices }
    }

    /// Axis-aligned box centered at the origin.
    pub fn cuboid(half_extents: Vec3) -> Self {
        let h = half_extents;
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            // (normal, tangent u, tangent v)
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, u, v) in faces {
            let n = Vec3::from(normal);
            let u = Vec3::from(u);
            let v = Vec3::from(v);
            let base = vertices.len() as u32;
            for (su, sv, uv) in [
                (-1.0, -1.0, [0.0, 1.0]),
                (1.0, -1.0, [1.0, 1.0]),
                (1.0, 1.0, [1.0, 0.0]),
                (-1.0, 1.0, [0.0, 0.0]),
            ] {
                let position = (n + u * su + v * sv) * h;
                vertices.push(Vertex {
                    position: position.into(),
                    normal,
                    tex_coords: uv,
                });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Self { vertices, indices }
    }
}

/// A drawable unit: geometry buffers, a material, and per-pass uniform
/// buffers. This is the seam the renderer and shadow pass see.
pub trait Renderable {
    fn material(&self) -> Option<&Material>;
    fn update(&self, queue: &wgpu::Queue, uniforms: &ObjectUniforms);
    fn update_shadow(&self, queue: &wgpu::Queue, uniforms: &ObjectUniforms);
    fn draw(&self, pass: &mut wgpu::RenderPass<'_>);
    fn draw_shadow(&self, pass: &mut wgpu::RenderPass<'_>);
    fn cast_shadow(&self) -> bool;
    fn drawable(&self, shaders: &ShaderLibrary) -> bool;
}

pub struct Mesh {
    pub label: String,
    pub material: Material,
    pub cast_shadow: bool,
    pub bounds: AABB,

    vertex_buffer: wgpu::Buffer,
    index_buffer: Option<wgpu::Buffer>,
    vertex_count: u32,
    index_count: u32,

    // The shadow pass writes its own uniforms so the queued copies for the
    // main pass are not clobbered before submission.
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    shadow_uniform_buffer: wgpu::Buffer,
    shadow_bind_group: wgpu::BindGroup,
}

impl Mesh {
    pub fn new(
        context: &RenderContext,
        geometry: &Geometry,
        material: Material,
        label: impl Into<String>,
    ) -> Self {
        let label = label.into();
        let device = &context.device;

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("Vertex Buffer ({label})")),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = if geometry.indices.is_empty() {
            None
        } else {
            Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("Index Buffer ({label})")),
                contents: bytemuck::cast_slice(&geometry.indices),
                usage: wgpu::BufferUsages::INDEX,
            }))
        };

        let layout = object_bind_group_layout(device);
        let (uniform_buffer, bind_group) = Self::uniforms(device, &layout, &label, "Uniforms");
        let (shadow_uniform_buffer, shadow_bind_group) =
            Self::uniforms(device, &layout, &label, "Shadow Uniforms");

        Self {
            label,
            material,
            cast_shadow: true,
            bounds: geometry.bounds(),
            vertex_buffer,
            index_buffer,
            vertex_count: geometry.vertices.len() as u32,
            index_count: geometry.indices.len() as u32,
            uniform_buffer,
            bind_group,
            shadow_uniform_buffer,
            shadow_bind_group,
        }
    }

    fn uniforms(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        label: &str,
        kind: &str,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{kind} ({label})")),
            size: std::mem::size_of::<ObjectUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{kind} Bind Group ({label})")),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        (buffer, bind_group)
    }

    fn issue_draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        match &self.index_buffer {
            Some(index_buffer) => {
                pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..self.index_count, 0, 0..1);
            }
            None => pass.draw(0..self.vertex_count, 0..1),
        }
    }
}

impl Renderable for Mesh {
    fn material(&self) -> Option<&Material> {
        Some(&self.material)
    }

    fn update(&self, queue: &wgpu::Queue, uniforms: &ObjectUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    fn update_shadow(&self, queue: &wgpu::Queue, uniforms: &ObjectUniforms) {
        queue.write_buffer(&self.shadow_uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_bind_group(0, &self.bind_group, &[]);
        self.issue_draw(pass);
    }

    fn draw_shadow(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_bind_group(0, &self.shadow_bind_group, &[]);
        self.issue_draw(pass);
    }

    fn cast_shadow(&self) -> bool {
        self.cast_shadow
    }

    fn drawable(&self, shaders: &ShaderLibrary) -> bool {
        self.material.is_ready(shaders)
    }
}

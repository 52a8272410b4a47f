use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use crate::scene_graph::camera::Camera;
use crate::scene_graph::light::{Light, LightData};
use crate::scene_graph::scene::Scene;

/// Per-renderable uniforms, rewritten against the active camera before each
/// draw.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectUniforms {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub normal_matrix: Mat4,
    pub camera_position: Vec4,
    pub viewport: Vec4,
}

impl ObjectUniforms {
    pub fn new(frame: &CameraFrame, model: Mat4) -> Self {
        Self {
            model,
            view: frame.view,
            projection: frame.projection,
            view_projection: frame.view_projection,
            normal_matrix: model.inverse().transpose(),
            camera_position: frame.camera_position,
            viewport: frame.viewport,
        }
    }
}

/// Camera-dependent part of [`ObjectUniforms`], computed once per pass and
/// combined with each node's world matrix during traversal.
#[derive(Debug, Clone, Copy)]
pub struct CameraFrame {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub camera_position: Vec4,
    pub viewport: Vec4,
}

impl CameraFrame {
    pub fn new(scene: &Scene, camera: &Camera, viewport: Vec4) -> Self {
        Self {
            view: camera.view_matrix(scene),
            projection: camera.projection_matrix(),
            view_projection: camera.view_projection_matrix(scene),
            camera_position: scene.world_position(camera.node()).extend(1.0),
            viewport,
        }
    }
}

/// What a shadow-receiving material needs to sample the shadow map:
/// the light-space view-projection and (strength, bias, radius, texel size).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ShadowUniforms {
    pub view_projection: Mat4,
    pub params: Vec4,
}

/// Layout of bind group 0, the per-renderable [`ObjectUniforms`] buffer.
/// Meshes and pipeline layouts build it independently; compatibility is
/// structural.
pub(crate) fn object_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Object Uniforms Layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

/// Fixed-capacity GPU list of packed light records: a vec4-aligned count
/// header followed by [`LightData`] entries.
pub struct LightBuffer {
    buffer: wgpu::Buffer,
    capacity: usize,
}

impl LightBuffer {
    pub fn new(device: &wgpu::Device, capacity: usize) -> Self {
        let size = 16 + capacity * std::mem::size_of::<LightData>();
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Light Buffer"),
            size: size as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self { buffer, capacity }
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Uploads the packed records; lights beyond the buffer capacity are
    /// dropped with a warning.
    pub fn update(&self, queue: &wgpu::Queue, scene: &Scene, lights: &[&Light]) {
        if lights.len() > self.capacity {
            log::warn!(
                "light buffer holds {} lights, {} supplied; extras are ignored",
                self.capacity,
                lights.len()
            );
        }
        let count = lights.len().min(self.capacity);
        let header = [count as u32, 0, 0, 0];

        let mut bytes = Vec::with_capacity(16 + count * std::mem::size_of::<LightData>());
        bytes.extend_from_slice(bytemuck::cast_slice(&header));
        for light in &lights[..count] {
            bytes.extend_from_slice(bytemuck::bytes_of(&light.data(scene)));
        }
        queue.write_buffer(&self.buffer, 0, &bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn object_uniforms_carry_the_inverse_transpose_normal_matrix() {
        let mut scene = Scene::new();
        let camera = Camera::perspective(&mut scene, 45.0, 1.0, 0.1, 100.0);
        let frame = CameraFrame::new(&scene, &camera, Vec4::new(0.0, 0.0, 640.0, 480.0));

        let model = Mat4::from_scale(Vec3::new(2.0, 2.0, 2.0));
        let uniforms = ObjectUniforms::new(&frame, model);

        let normal = uniforms.normal_matrix;
        assert!((normal.x_axis.x - 0.5).abs() < 1e-6);
        assert_eq!(uniforms.viewport.z, 640.0);
    }
}

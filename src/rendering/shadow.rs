use glam::Vec4;

use crate::math::bounds::AABB;
use crate::math::transforms::WORLD_UP;
use crate::rendering::context::RenderContext;
use crate::rendering::material::ShadowBindings;
use crate::rendering::mesh::Renderable;
use crate::rendering::shader::ShaderLibrary;
use crate::rendering::texture::{attachment_descriptor, RenderTexture};
use crate::rendering::uniforms::{CameraFrame, ObjectUniforms, ShadowUniforms};
use crate::scene_graph::camera::Camera;
use crate::scene_graph::light::Light;
use crate::scene_graph::scene::Scene;
use crate::scene_graph::Revision;

pub const SHADOW_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Depth-only shadow pass for one directional light.
///
/// Owns an orthographic camera that is re-aimed from the light every update:
/// positioned at the light's world position, looking along the light's
/// forward direction with the world up vector as reference. The depth
/// texture is sized independently of the main render target and recreated
/// only when resolution or format changes.
///
/// Consumers poll the revision counters once per frame: `texture_revision`
/// moves when the depth texture is replaced, `resolution_revision` on
/// resolution changes, and `data_revision` when strength/bias/radius change.
pub struct DirectionalShadow {
    pub label: String,
    camera: Camera,

    resolution: (u32, u32),
    pixel_format: wgpu::TextureFormat,
    texture: Option<RenderTexture>,
    update_texture: bool,

    strength: f32,
    bias: f32,
    radius: f32,

    texture_revision: Revision,
    resolution_revision: Revision,
    data_revision: Revision,

    sampler: Option<wgpu::Sampler>,
    uniform_buffer: Option<wgpu::Buffer>,
}

impl DirectionalShadow {
    pub fn new(scene: &mut Scene, label: impl Into<String>) -> Self {
        let label = label.into();
        let camera = Camera::orthographic(scene, -5.0, 5.0, -5.0, 5.0, 0.01, 50.0);
        if let Some(node) = scene.node_mut(camera.node()) {
            node.label = format!("{label} Shadow Camera");
        }

        Self {
            label,
            camera,
            resolution: (1024, 1024),
            pixel_format: SHADOW_FORMAT,
            texture: None,
            update_texture: true,
            strength: 1.0,
            bias: 1e-5,
            radius: 1.0,
            texture_revision: Revision::default(),
            resolution_revision: Revision::default(),
            data_revision: Revision::default(),
            sampler: None,
            uniform_buffer: None,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    pub fn set_resolution(&mut self, resolution: (u32, u32)) {
        if self.resolution != resolution {
            self.resolution = resolution;
            self.update_texture = true;
            self.resolution_revision.bump();
        }
    }

    pub fn pixel_format(&self) -> wgpu::TextureFormat {
        self.pixel_format
    }

    pub fn set_pixel_format(&mut self, format: wgpu::TextureFormat) {
        if self.pixel_format != format {
            self.pixel_format = format;
            self.update_texture = true;
        }
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub fn set_strength(&mut self, strength: f32) {
        if self.strength != strength {
            self.strength = strength;
            self.data_revision.bump();
        }
    }

    pub fn bias(&self) -> f32 {
        self.bias
    }

    pub fn set_bias(&mut self, bias: f32) {
        if self.bias != bias {
            self.bias = bias;
            self.data_revision.bump();
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: f32) {
        if self.radius != radius {
            self.radius = radius;
            self.data_revision.bump();
        }
    }

    pub fn texture(&self) -> Option<&RenderTexture> {
        self.texture.as_ref()
    }

    pub fn texture_revision(&self) -> u64 {
        self.texture_revision.get()
    }

    pub fn resolution_revision(&self) -> u64 {
        self.resolution_revision.get()
    }

    pub fn data_revision(&self) -> u64 {
        self.data_revision.get()
    }

    /// Shadow shading parameters in the packed uniform order:
    /// (strength, bias, radius, texel size).
    pub fn params(&self) -> Vec4 {
        Vec4::new(
            self.strength,
            self.bias,
            self.radius,
            1.0 / self.resolution.0.max(1) as f32,
        )
    }

    /// Re-derives the shadow camera from the light: moved to the light's
    /// world position, aimed along its forward direction.
    pub fn update(&mut self, scene: &mut Scene, light: &Light) {
        let position = scene.world_position(light.node());
        let forward = scene.world_forward(light.node());
        scene.set_world_position(self.camera.node(), position);
        scene.look_at(self.camera.node(), position + forward, WORLD_UP);
    }

    /// World-space bounds of every visible shadow caster.
    pub fn caster_bounds(&self, scene: &Scene) -> AABB {
        let mut bounds = AABB::EMPTY;
        scene.visit_visible(|id, node| {
            let Some(mesh) = node.mesh.and_then(|mesh| scene.mesh(mesh)) else {
                return;
            };
            if mesh.cast_shadow {
                bounds = bounds.merge(&mesh.bounds.transform(&scene.world_matrix(id)));
            }
        });
        bounds
    }

    /// Fits the orthographic frustum to `world_bounds` plus a padding
    /// margin, as seen from the current camera orientation.
    pub fn fit_to_bounds(&mut self, scene: &Scene, world_bounds: &AABB, padding: f32) {
        if world_bounds.is_empty() {
            return;
        }
        let view = self.camera.view_matrix(scene);
        let local = world_bounds.transform(&view);

        self.camera.set_orthographic_bounds(
            local.min.x - padding,
            local.max.x + padding,
            local.min.y - padding,
            local.max.y + padding,
        );
        // View space looks down -Z, so the closest plane is at -max.z.
        self.camera.set_near(-local.max.z - padding);
        self.camera.set_far(-local.min.z + padding);
    }

    pub fn fit_to_casters(&mut self, scene: &Scene, padding: f32) {
        let bounds = self.caster_bounds(scene);
        self.fit_to_bounds(scene, &bounds, padding);
    }

    /// Resources a receiving material binds; `None` until the first draw
    /// has created them.
    pub fn binding(&self) -> Option<ShadowBindings> {
        Some(ShadowBindings {
            view: &self.texture.as_ref()?.view,
            sampler: self.sampler.as_ref()?,
            uniforms: self.uniform_buffer.as_ref()?,
        })
    }

    /// Depth-only pass over every visible caster with a compiled shadow
    /// pipeline. Clears depth to the reverse-Z far value (0) and stores the
    /// result for receivers to sample.
    pub fn draw(
        &mut self,
        context: &RenderContext,
        encoder: &mut wgpu::CommandEncoder,
        scene: &Scene,
        shaders: &ShaderLibrary,
    ) {
        self.prepare(context);
        let Some(texture) = &self.texture else {
            return;
        };

        let uniforms = ShadowUniforms {
            view_projection: self.camera.view_projection_matrix(scene),
            params: self.params(),
        };
        if let Some(buffer) = &self.uniform_buffer {
            context
                .queue
                .write_buffer(buffer, 0, bytemuck::bytes_of(&uniforms));
        }

        let viewport = Vec4::new(
            0.0,
            0.0,
            self.resolution.0 as f32,
            self.resolution.1 as f32,
        );
        let frame = CameraFrame::new(scene, &self.camera, viewport);

        let pass_label = format!("{} Shadow Pass", self.label);
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&pass_label),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &texture.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(0.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_viewport(viewport.x, viewport.y, viewport.z, viewport.w, 0.0, 1.0);

        scene.visit_visible(|id, node| {
            let Some(mesh) = node.mesh.and_then(|mesh| scene.mesh(mesh)) else {
                return;
            };
            if !mesh.cast_shadow {
                return;
            }
            let Some(pipeline) = mesh
                .material
                .shadow_pipeline_id()
                .and_then(|id| shaders.pipeline(id))
            else {
                return;
            };
            let uniforms = ObjectUniforms::new(&frame, scene.world_matrix(id));
            mesh.update_shadow(&context.queue, &uniforms);

            pass.set_pipeline(pipeline);
            mesh.draw_shadow(&mut pass);
        });
    }

    fn prepare(&mut self, context: &RenderContext) {
        if self.sampler.is_none() {
            self.sampler = Some(context.device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("Shadow Sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                compare: Some(wgpu::CompareFunction::GreaterEqual),
                ..Default::default()
            }));
        }
        if self.uniform_buffer.is_none() {
            self.uniform_buffer = Some(context.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Shadow Uniforms"),
                size: std::mem::size_of::<ShadowUniforms>() as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }

        if !self.update_texture || self.resolution.0 <= 1 || self.resolution.1 <= 1 {
            return;
        }
        self.texture = Some(RenderTexture::new(
            &context.device,
            &attachment_descriptor("Shadow Depth Texture", self.resolution, self.pixel_format, 1),
        ));
        self.update_texture = false;
        self.texture_revision.bump();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn update_moves_the_camera_to_the_light_and_aims_it_along_the_forward() {
        let mut scene = Scene::new();
        let light = Light::directional(&mut scene, Vec3::ONE, 1.0);
        scene.set_position(light.node(), Vec3::new(0.0, 5.0, 0.0));
        scene.look_at(light.node(), Vec3::ZERO, WORLD_UP);

        let mut shadow = DirectionalShadow::new(&mut scene, "Sun");
        shadow.update(&mut scene, &light);

        let camera_node = shadow.camera().node();
        assert!((scene.world_position(camera_node) - Vec3::new(0.0, 5.0, 0.0)).length() < 1e-5);
        assert!((scene.world_forward(camera_node) - Vec3::new(0.0, -1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn fit_to_bounds_wraps_the_casters_in_light_space() {
        let mut scene = Scene::new();
        let light = Light::directional(&mut scene, Vec3::ONE, 1.0);
        scene.set_position(light.node(), Vec3::new(0.0, 5.0, 0.0));
        scene.look_at(light.node(), Vec3::ZERO, WORLD_UP);

        let mut shadow = DirectionalShadow::new(&mut scene, "Sun");
        shadow.update(&mut scene, &light);

        let casters = AABB::new(Vec3::new(-2.0, 0.0, -3.0), Vec3::new(2.0, 1.0, 3.0));
        shadow.fit_to_bounds(&scene, &casters, 0.5);

        match shadow.camera().projection() {
            crate::scene_graph::camera::Projection::Orthographic {
                left,
                right,
                bottom,
                top,
            } => {
                assert!((left + 2.5).abs() < 1e-4);
                assert!((right - 2.5).abs() < 1e-4);
                assert!((bottom + 3.5).abs() < 1e-4);
                assert!((top - 3.5).abs() < 1e-4);
            }
            _ => panic!("shadow camera must stay orthographic"),
        }
        assert!((shadow.camera().near() - 3.5).abs() < 1e-4);
        assert!((shadow.camera().far() - 5.5).abs() < 1e-4);
    }

    #[test]
    fn parameter_and_resolution_changes_bump_their_revisions() {
        let mut scene = Scene::new();
        let mut shadow = DirectionalShadow::new(&mut scene, "Sun");

        let data_before = shadow.data_revision();
        shadow.set_strength(1.0);
        assert_eq!(shadow.data_revision(), data_before);
        shadow.set_strength(0.5);
        shadow.set_bias(1e-4);
        assert_eq!(shadow.data_revision(), data_before + 2);

        let resolution_before = shadow.resolution_revision();
        shadow.set_resolution((1024, 1024));
        assert_eq!(shadow.resolution_revision(), resolution_before);
        shadow.set_resolution((2048, 2048));
        assert_eq!(shadow.resolution_revision(), resolution_before + 1);

        assert_eq!(shadow.params().x, 0.5);
        assert!((shadow.params().w - 1.0 / 2048.0).abs() < 1e-9);
    }
}

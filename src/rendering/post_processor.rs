use std::sync::Arc;

use crate::rendering::context::RenderContext;
use crate::rendering::material::Material;
use crate::rendering::mesh::{Geometry, Mesh};
use crate::rendering::pass::PassDescriptor;
use crate::rendering::renderer::Renderer;
use crate::rendering::shader::ShaderLibrary;
use crate::scene_graph::camera::Camera;
use crate::scene_graph::node::Node;
use crate::scene_graph::scene::Scene;
use crate::scene_graph::MeshId;

/// Chains an extra pass that reads the previous pass's output: a fullscreen
/// quad with a material, drawn by a private renderer into whatever target
/// the descriptor supplies.
///
/// The inner renderer draws over the previous contents (`auto_clear_color`
/// off) through an orthographic camera spanning [-1, 1]; the quad geometry
/// is resolution independent, so `resize` only touches the renderer.
pub struct PostProcessor {
    pub label: String,
    pub renderer: Renderer,
    scene: Scene,
    camera: Camera,
    mesh: MeshId,
}

impl PostProcessor {
    pub fn new(context: Arc<RenderContext>, material: Material, label: impl Into<String>) -> Self {
        let label = label.into();
        let mut scene = Scene::new();
        let camera = Camera::orthographic(&mut scene, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0);

        let mut quad = Mesh::new(
            &context,
            &Geometry::quad(),
            material,
            format!("{label} Quad"),
        );
        quad.cast_shadow = false;
        let mesh = scene.add_mesh(quad);
        scene.add_node(Node::with_mesh(format!("{label} Quad"), mesh));

        let mut renderer = Renderer::new(context);
        renderer.label = format!("{label} Renderer");
        renderer.auto_clear_color = false;

        Self {
            label,
            renderer,
            scene,
            camera,
            mesh,
        }
    }

    pub fn material(&self) -> &Material {
        &self.scene.mesh(self.mesh).expect("post quad mesh").material
    }

    pub fn material_mut(&mut self) -> &mut Material {
        &mut self
            .scene
            .mesh_mut(self.mesh)
            .expect("post quad mesh")
            .material
    }

    pub fn update(&mut self) {
        self.renderer.update(&mut self.scene, &self.camera);
    }

    pub fn draw(
        &mut self,
        descriptor: &mut PassDescriptor,
        encoder: &mut wgpu::CommandEncoder,
        shaders: &ShaderLibrary,
    ) {
        self.renderer
            .draw(descriptor, encoder, &self.scene, &self.camera, shaders);
    }

    pub fn draw_to_target(
        &mut self,
        descriptor: &mut PassDescriptor,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        shaders: &ShaderLibrary,
    ) {
        self.renderer.draw_to_target(
            descriptor,
            encoder,
            target,
            &self.scene,
            &self.camera,
            shaders,
        );
    }

    /// The quad is resolution independent; only the inner renderer's
    /// targets and viewport follow the new size.
    pub fn resize(&mut self, size: (u32, u32)) {
        self.renderer.resize(size);
    }
}

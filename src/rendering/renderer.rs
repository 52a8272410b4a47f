use std::sync::Arc;

use glam::Vec4;

use crate::rendering::context::RenderContext;
use crate::rendering::mesh::Renderable;
use crate::rendering::pass::PassDescriptor;
use crate::rendering::render_target::RenderTargets;
use crate::rendering::shader::ShaderLibrary;
use crate::rendering::uniforms::{CameraFrame, ObjectUniforms};
use crate::scene_graph::camera::Camera;
use crate::scene_graph::scene::Scene;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    pub fn as_vec4(&self) -> Vec4 {
        Vec4::new(self.x, self.y, self.width, self.height)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Traverses a scene into one render pass per draw call, managing its own
/// multisample color, depth and stencil attachments.
///
/// The external pass descriptor supplies the color destination (a surface
/// view or an offscreen texture); everything else is derived here. Load and
/// store configuration mirrors what the pass needs: `auto_clear_color`
/// decides between clearing and drawing over, and with multisampling on,
/// `color_store` maps Store to store-and-resolve and Discard to
/// resolve-only.
pub struct Renderer {
    pub label: String,
    context: Arc<RenderContext>,
    pub targets: RenderTargets,

    pub auto_clear_color: bool,
    pub clear_color: wgpu::Color,
    pub color_store: wgpu::StoreOp,
    pub depth_ops: wgpu::Operations<f32>,
    pub stencil_ops: wgpu::Operations<u32>,

    pub viewport: Viewport,
}

impl Renderer {
    pub fn new(context: Arc<RenderContext>) -> Self {
        let targets = RenderTargets::new(&context);
        Self {
            label: "Renderer".to_string(),
            context,
            targets,
            auto_clear_color: true,
            clear_color: wgpu::Color::BLACK,
            color_store: wgpu::StoreOp::Store,
            // Reverse-Z: clear depth to 0, the far plane.
            depth_ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(0.0),
                store: wgpu::StoreOp::Store,
            },
            stencil_ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(0),
                store: wgpu::StoreOp::Store,
            },
            viewport: Viewport::default(),
        }
    }

    pub fn context(&self) -> &Arc<RenderContext> {
        &self.context
    }

    pub fn size(&self) -> (u32, u32) {
        self.targets.size()
    }

    /// Updates the target size and viewport; attachment textures are
    /// rebuilt lazily on the next draw.
    pub fn resize(&mut self, size: (u32, u32)) {
        self.targets.set_size(size);
        self.viewport = Viewport::new(size.0 as f32, size.1 as f32);
    }

    /// Advances cached state for the frame: world matrices and the camera's
    /// view/projection caches are warmed so draw-time reads are cheap.
    pub fn update(&mut self, scene: &mut Scene, camera: &Camera) {
        scene.update();
        camera.update(scene);
    }

    /// Renders the scene into the descriptor's color target (resolving
    /// multisampling if on), using this renderer's own depth and stencil
    /// attachments.
    pub fn draw(
        &mut self,
        descriptor: &mut PassDescriptor,
        encoder: &mut wgpu::CommandEncoder,
        scene: &Scene,
        camera: &Camera,
        shaders: &ShaderLibrary,
    ) {
        self.targets.prepare(&self.context.device);

        // Re-point the descriptor at this frame's textures. When an
        // attachment texture is gone its reference is detached, so a stale
        // view from a previous frame can never leak into the pass.
        descriptor.depth_target = self.targets.depth().map(|t| t.view.clone());
        descriptor.stencil_target = if self.targets.depth_is_combined() {
            None
        } else {
            self.targets.stencil().map(|t| t.view.clone())
        };

        let color_load = if self.auto_clear_color {
            wgpu::LoadOp::Clear(self.clear_color)
        } else {
            wgpu::LoadOp::Load
        };

        let multisampled = self.targets.sample_count() > 1;
        let color_attachment = match (&descriptor.color_target, self.targets.color()) {
            (Some(target), Some(msaa)) if multisampled => {
                Some(wgpu::RenderPassColorAttachment {
                    view: &msaa.view,
                    resolve_target: Some(target),
                    ops: wgpu::Operations {
                        load: color_load,
                        store: self.color_store,
                    },
                })
            }
            (Some(target), _) => Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: self.color_store,
                },
            }),
            (None, _) => None,
        };

        // wgpu exposes a single depth-stencil attachment: a combined format
        // serves both aspects from the depth texture, and a standalone
        // stencil texture is only attachable when no depth texture exists.
        let depth_stencil_attachment = match (&descriptor.depth_target, &descriptor.stencil_target)
        {
            (Some(depth), _) => Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: Some(self.depth_ops),
                stencil_ops: self
                    .targets
                    .depth_is_combined()
                    .then_some(self.stencil_ops),
            }),
            (None, Some(stencil)) => Some(wgpu::RenderPassDepthStencilAttachment {
                view: stencil,
                depth_ops: None,
                stencil_ops: Some(self.stencil_ops),
            }),
            (None, None) => None,
        };

        if color_attachment.is_none() && depth_stencil_attachment.is_none() {
            log::debug!("{}: no attachments to render into, skipping draw", self.label);
            return;
        }

        let frame = CameraFrame::new(scene, camera, self.viewport.as_vec4());

        let pass_label = format!("{} Pass", self.label);
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&pass_label),
            color_attachments: &[color_attachment],
            depth_stencil_attachment,
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        if self.viewport.width > 0.0 && self.viewport.height > 0.0 {
            pass.set_viewport(
                self.viewport.x,
                self.viewport.y,
                self.viewport.width,
                self.viewport.height,
                self.viewport.min_depth,
                self.viewport.max_depth,
            );
        }

        // Visibility gates recursion (handled by the traversal); a node
        // that merely is not drawable still recurses into its children.
        scene.visit_visible(|id, node| {
            let Some(mesh) = node.mesh.and_then(|mesh| scene.mesh(mesh)) else {
                return;
            };
            let Some(pipeline) = shaders.pipeline(mesh.material.pipeline_id()) else {
                return;
            };
            let uniforms = ObjectUniforms::new(&frame, scene.world_matrix(id));
            mesh.update(&self.context.queue, &uniforms);

            pass.set_pipeline(pipeline);
            mesh.material.bind(&mut pass);
            mesh.draw(&mut pass);
        });
    }

    /// Render-to-texture entry point: temporarily substitutes the color
    /// destination, delegates to `draw`, then restores the descriptor.
    pub fn draw_to_target(
        &mut self,
        descriptor: &mut PassDescriptor,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        scene: &Scene,
        camera: &Camera,
        shaders: &ShaderLibrary,
    ) {
        let previous = std::mem::replace(&mut descriptor.color_target, Some(target.clone()));
        self.draw(descriptor, encoder, scene, camera, shaders);
        descriptor.color_target = previous;
    }
}

use std::cell::{Cell, RefCell};

use glam::{Mat4, Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::math::transforms::{orthographic_matrix, perspective_matrix};
use crate::scene_graph::node::Node;
use crate::scene_graph::scene::Scene;
use crate::scene_graph::NodeId;

/// Projection kind and its parameters. Perspective `fov` is the vertical
/// field of view in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    Perspective {
        fov: f32,
        aspect: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
    },
}

/// A camera is a scene node plus cached view and projection matrices.
///
/// The two caches go stale independently: transform changes (through the
/// node's version stamps) invalidate the view matrix, projection parameter
/// setters invalidate the projection matrix, and neither touches the other.
pub struct Camera {
    node: NodeId,
    near: f32,
    far: f32,
    projection: Projection,

    projection_version: Cell<u64>,
    projection_cache: RefCell<(Mat4, u64)>,
    view_cache: RefCell<(Mat4, u64)>,
    view_projection_cache: RefCell<(Mat4, (u64, u64))>,

    view_recomputes: Cell<u64>,
    projection_recomputes: Cell<u64>,
}

impl Camera {
    pub fn perspective(scene: &mut Scene, fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::new(scene, Projection::Perspective { fov, aspect }, near, far)
    }

    pub fn orthographic(
        scene: &mut Scene,
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self::new(
            scene,
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
            },
            near,
            far,
        )
    }

    fn new(scene: &mut Scene, projection: Projection, near: f32, far: f32) -> Self {
        let node = scene.add_node(Node::new("Camera"));
        Self {
            node,
            near,
            far,
            projection,
            projection_version: Cell::new(1),
            projection_cache: RefCell::new((Mat4::IDENTITY, 0)),
            view_cache: RefCell::new((Mat4::IDENTITY, u64::MAX)),
            view_projection_cache: RefCell::new((Mat4::IDENTITY, (u64::MAX, 0))),
            view_recomputes: Cell::new(0),
            projection_recomputes: Cell::new(0),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn set_near(&mut self, near: f32) {
        self.near = near;
        self.invalidate_projection();
    }

    pub fn set_far(&mut self, far: f32) {
        self.far = far;
        self.invalidate_projection();
    }

    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
        self.invalidate_projection();
    }

    /// Updates the field of view; ignored for an orthographic camera.
    pub fn set_fov(&mut self, fov: f32) {
        if let Projection::Perspective { aspect, .. } = self.projection {
            self.projection = Projection::Perspective { fov, aspect };
            self.invalidate_projection();
        }
    }

    /// Updates the aspect ratio; ignored for an orthographic camera.
    pub fn set_aspect(&mut self, aspect: f32) {
        if let Projection::Perspective { fov, .. } = self.projection {
            self.projection = Projection::Perspective { fov, aspect };
            self.invalidate_projection();
        }
    }

    /// Updates the bounds of an orthographic camera; ignored for a
    /// perspective one.
    pub fn set_orthographic_bounds(&mut self, left: f32, right: f32, bottom: f32, top: f32) {
        if matches!(self.projection, Projection::Orthographic { .. }) {
            self.projection = Projection::Orthographic {
                left,
                right,
                bottom,
                top,
            };
            self.invalidate_projection();
        }
    }

    fn invalidate_projection(&self) {
        self.projection_version.set(self.projection_version.get() + 1);
    }

    /// Inverse of the node's world matrix.
    pub fn view_matrix(&self, scene: &Scene) -> Mat4 {
        let world = scene.world_matrix(self.node);
        let version = scene
            .node(self.node)
            .map(|node| node.world_version())
            .unwrap_or(0);
        {
            let cache = self.view_cache.borrow();
            if cache.1 == version {
                return cache.0;
            }
        }
        let view = world.inverse();
        *self.view_cache.borrow_mut() = (view, version);
        self.view_recomputes.set(self.view_recomputes.get() + 1);
        view
    }

    /// Writes the node's local matrix as the inverse of `view`.
    pub fn set_view_matrix(&self, scene: &mut Scene, view: Mat4) {
        if let Some(node) = scene.node_mut(self.node) {
            node.set_local_matrix(view.inverse());
        }
    }

    pub fn projection_matrix(&self) -> Mat4 {
        let version = self.projection_version.get();
        {
            let cache = self.projection_cache.borrow();
            if cache.1 == version {
                return cache.0;
            }
        }
        let matrix = match self.projection {
            Projection::Perspective { fov, aspect } => {
                perspective_matrix(fov, aspect, self.near, self.far)
            }
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
            } => orthographic_matrix(left, right, bottom, top, self.near, self.far),
        };
        *self.projection_cache.borrow_mut() = (matrix, version);
        self.projection_recomputes
            .set(self.projection_recomputes.get() + 1);
        matrix
    }

    /// Recovers the projection parameters from an explicit matrix, assuming
    /// it was built with this camera's projection kind and conventions.
    pub fn set_projection_matrix(&mut self, matrix: Mat4) {
        match self.projection {
            Projection::Perspective { .. } => {
                let sy = matrix.y_axis.y;
                let sx = matrix.x_axis.x;
                let c = matrix.z_axis.z;
                let d = matrix.w_axis.z;
                self.projection = Projection::Perspective {
                    fov: (2.0 * (1.0 / sy).atan()).to_degrees(),
                    aspect: sy / sx,
                };
                self.near = d / (1.0 + c);
                self.far = d / c;
            }
            Projection::Orthographic { .. } => {
                let width = 2.0 / matrix.x_axis.x;
                let height = 2.0 / matrix.y_axis.y;
                let tx = matrix.w_axis.x;
                let ty = matrix.w_axis.y;
                let right = width * (1.0 - tx) * 0.5;
                let top = height * (1.0 - ty) * 0.5;
                let near = matrix.w_axis.z / matrix.z_axis.z;
                self.projection = Projection::Orthographic {
                    left: right - width,
                    right,
                    bottom: top - height,
                    top,
                };
                self.near = near;
                self.far = near - 1.0 / matrix.z_axis.z;
            }
        }
        self.invalidate_projection();
    }

    pub fn view_projection_matrix(&self, scene: &Scene) -> Mat4 {
        // Refresh the node's world cache first; its version stamp only
        // moves when the cached matrix is actually recomputed.
        scene.world_matrix(self.node);
        let view_version = scene
            .node(self.node)
            .map(|node| node.world_version())
            .unwrap_or(0);
        let stamp = (view_version, self.projection_version.get());
        {
            let cache = self.view_projection_cache.borrow();
            if cache.1 == stamp {
                return cache.0;
            }
        }
        let matrix = self.projection_matrix() * self.view_matrix(scene);
        *self.view_projection_cache.borrow_mut() = (matrix, stamp);
        matrix
    }

    /// Projects a world-space point into NDC, with the perspective divide
    /// applied. `x`/`y` land in [-1, 1] inside the frustum; `z` follows the
    /// projection's depth convention.
    pub fn project(&self, scene: &Scene, world: Vec3) -> Vec3 {
        let clip = self.view_projection_matrix(scene) * world.extend(1.0);
        clip.truncate() / clip.w
    }

    /// Projects a world-space point to pixel coordinates in a view of
    /// `view_size`.
    pub fn project_to_screen(&self, scene: &Scene, world: Vec3, view_size: Vec2) -> Vec2 {
        let ndc = self.project(scene, world);
        view_size * ((Vec2::new(ndc.x, ndc.y) + 1.0) * 0.5)
    }

    /// Maps an NDC coordinate back into world space at the projection's
    /// reference depth. Inverse of [`project`](Self::project) in `x`/`y`.
    pub fn unproject(&self, scene: &Scene, ndc: Vec2) -> Vec3 {
        let depth = match self.projection {
            Projection::Perspective { .. } => self.near / (self.far - self.near),
            Projection::Orthographic { .. } => -self.near / (self.far - self.near),
        };
        let world = scene.world_matrix(self.node)
            * self.projection_matrix().inverse()
            * glam::Vec4::new(ndc.x, ndc.y, depth, 1.0);
        world.truncate() / world.w
    }

    /// Warms both caches; a frame driver calls this once per frame so later
    /// reads during encoding are cache hits.
    pub fn update(&self, scene: &Scene) {
        self.view_projection_matrix(scene);
    }

    pub fn descriptor(&self, scene: &Scene) -> CameraDescriptor {
        let node = scene.node(self.node);
        CameraDescriptor {
            position: node.map(|node| node.position()).unwrap_or(Vec3::ZERO),
            orientation: node.map(|node| node.orientation()).unwrap_or(Quat::IDENTITY),
            scale: node.map(|node| node.scale()).unwrap_or(Vec3::ONE),
            near: self.near,
            far: self.far,
            projection: self.projection,
        }
    }

    pub fn from_descriptor(scene: &mut Scene, descriptor: &CameraDescriptor) -> Self {
        let mut camera = Self::new(scene, descriptor.projection, descriptor.near, descriptor.far);
        camera.apply_descriptor(scene, descriptor);
        camera
    }

    pub fn apply_descriptor(&mut self, scene: &mut Scene, descriptor: &CameraDescriptor) {
        self.near = descriptor.near;
        self.far = descriptor.far;
        self.projection = descriptor.projection;
        self.invalidate_projection();
        if let Some(node) = scene.node_mut(self.node) {
            node.set_position(descriptor.position);
            node.set_orientation(descriptor.orientation);
            node.set_scale(descriptor.scale);
        }
    }

    #[cfg(test)]
    pub(crate) fn view_recomputes(&self) -> u64 {
        self.view_recomputes.get()
    }

    #[cfg(test)]
    pub(crate) fn projection_recomputes(&self) -> u64 {
        self.projection_recomputes.get()
    }
}

/// Flat, serializable record of everything a camera needs to be rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraDescriptor {
    pub position: Vec3,
    pub orientation: Quat,
    pub scale: Vec3,
    pub near: f32,
    pub far: f32,
    pub projection: Projection,
}

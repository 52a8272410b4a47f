use std::cell::{Cell, RefCell};

use glam::{Mat4, Quat, Vec3};

use crate::math::transforms::{look_at_matrix, WORLD_FORWARD, WORLD_RIGHT, WORLD_UP};
use crate::scene_graph::{MeshId, NodeId};

/// A node in the scene hierarchy: a local TRS transform, an ordered list of
/// children, and an optional mesh attachment.
///
/// Matrix caching uses the pull model. Every transform setter bumps
/// `local_version`; cached matrices carry the version stamps they were
/// computed from and recompute only when a stamp is stale. Nothing is pushed
/// down the tree on mutation, so moving a leaf is O(1) no matter how deep it
/// sits.
pub struct Node {
    pub label: String,
    pub visible: bool,
    pub mesh: Option<MeshId>,

    position: Vec3,
    scale: Vec3,
    orientation: Quat,

    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,

    local_version: Cell<u64>,
    local_cache: RefCell<(Mat4, u64)>,
    world_cache: RefCell<(Mat4, (u64, u64))>,
    world_version: Cell<u64>,
    world_recomputes: Cell<u64>,
}

impl Node {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            visible: true,
            mesh: None,
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            orientation: Quat::IDENTITY,
            parent: None,
            children: Vec::new(),
            local_version: Cell::new(1),
            local_cache: RefCell::new((Mat4::IDENTITY, 0)),
            world_cache: RefCell::new((Mat4::IDENTITY, (0, 0))),
            world_version: Cell::new(0),
            world_recomputes: Cell::new(0),
        }
    }

    pub fn with_mesh(label: impl Into<String>, mesh: MeshId) -> Self {
        let mut node = Self::new(label);
        node.mesh = Some(mesh);
        node
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.touch();
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.touch();
    }

    pub fn set_orientation(&mut self, orientation: Quat) {
        self.orientation = orientation;
        self.touch();
    }

    pub fn translate(&mut self, delta: Vec3) {
        self.set_position(self.position + delta);
    }

    pub fn rotate(&mut self, rotation: Quat) {
        self.set_orientation(self.orientation * rotation);
    }

    /// Replaces the whole local transform by decomposing `matrix` into
    /// translation, rotation and scale.
    pub fn set_local_matrix(&mut self, matrix: Mat4) {
        let (scale, orientation, position) = matrix.to_scale_rotation_translation();
        self.position = position;
        self.scale = scale;
        self.orientation = orientation;
        self.touch();
    }

    /// Re-orients the node so its forward axis aims at `target` from the
    /// current position. Scale resets to one, as with `set_local_matrix`.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        self.set_local_matrix(look_at_matrix(self.position, target, up));
    }

    /// Local-space direction the node faces (-Z rotated by orientation).
    pub fn forward(&self) -> Vec3 {
        (self.orientation * WORLD_FORWARD).normalize()
    }

    pub fn up(&self) -> Vec3 {
        (self.orientation * WORLD_UP).normalize()
    }

    pub fn right(&self) -> Vec3 {
        (self.orientation * WORLD_RIGHT).normalize()
    }

    pub fn local_matrix(&self) -> Mat4 {
        let version = self.local_version.get();
        {
            let cache = self.local_cache.borrow();
            if cache.1 == version {
                return cache.0;
            }
        }
        let matrix =
            Mat4::from_scale_rotation_translation(self.scale, self.orientation, self.position);
        *self.local_cache.borrow_mut() = (matrix, version);
        matrix
    }

    /// Marks every derived matrix stale. Also used by the scene when the
    /// node is re-parented, since the parent contribution changed identity,
    /// not just value.
    pub(crate) fn touch(&self) {
        self.local_version.set(self.local_version.get() + 1);
    }

    /// Version of the cached world matrix; bumped only when the cache is
    /// actually recomputed. Children stamp their caches with it, and tests
    /// use it to observe idempotent reads.
    pub fn world_version(&self) -> u64 {
        self.world_version.get()
    }

    #[cfg(test)]
    pub(crate) fn world_recomputes(&self) -> u64 {
        self.world_recomputes.get()
    }

    pub(crate) fn world_matrix_with(&self, parent_world: Mat4, parent_version: u64) -> Mat4 {
        let stamp = (self.local_version.get(), parent_version);
        {
            let cache = self.world_cache.borrow();
            if cache.1 == stamp {
                return cache.0;
            }
        }
        let world = parent_world * self.local_matrix();
        *self.world_cache.borrow_mut() = (world, stamp);
        self.world_version.set(self.world_version.get() + 1);
        self.world_recomputes.set(self.world_recomputes.get() + 1);
        world
    }
}

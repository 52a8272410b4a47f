use glam::{Mat4, Quat, Vec3};
use id_arena::Arena;

use crate::math::transforms::{WORLD_FORWARD, WORLD_RIGHT, WORLD_UP};
use crate::rendering::mesh::Mesh;
use crate::scene_graph::node::Node;
use crate::scene_graph::{MeshId, NodeId};

/// Owns the node hierarchy and the meshes nodes draw with. Relations are
/// ids into the arenas; parents own children, back-references are plain ids.
pub struct Scene {
    pub nodes: Arena<Node>,
    pub meshes: Arena<Mesh>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            nodes: Arena::new(),
            meshes: Arena::new(),
        }
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        self.nodes.alloc(node)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.alloc(mesh)
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id)
    }

    pub fn mesh_mut(&mut self, id: MeshId) -> Option<&mut Mesh> {
        self.meshes.get_mut(id)
    }

    pub fn node_by_label(&self, label: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.label == label)
            .map(|(id, _)| id)
    }

    /// Attaches `child` under `parent`, detaching it from any previous
    /// parent first. The child's cached matrices go stale because the parent
    /// contribution changed identity, not just value.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        if parent == child {
            return;
        }
        self.detach(child);

        let Some(parent_node) = self.nodes.get_mut(parent) else {
            return;
        };
        if !parent_node.children.contains(&child) {
            parent_node.children.push(child);
        }
        if let Some(child_node) = self.nodes.get_mut(child) {
            child_node.parent = Some(parent);
            child_node.touch();
        }
    }

    /// Removes `child` from `parent`'s children and clears the
    /// back-reference. No-op when the pair is not actually related.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        let Some(parent_node) = self.nodes.get_mut(parent) else {
            return;
        };
        let before = parent_node.children.len();
        parent_node.children.retain(|&id| id != child);
        if parent_node.children.len() == before {
            return;
        }
        if let Some(child_node) = self.nodes.get_mut(child) {
            if child_node.parent == Some(parent) {
                child_node.parent = None;
            }
            child_node.touch();
        }
    }

    pub fn remove_from_parent(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes.get(child).and_then(|node| node.parent) {
            self.remove_child(parent, child);
        }
    }

    fn detach(&mut self, child: NodeId) {
        self.remove_from_parent(child);
    }

    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(id, _)| id)
    }

    /// World transform composed through the ancestor chain, recomputed only
    /// for nodes whose version stamps went stale.
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let Some(node) = self.nodes.get(id) else {
            return Mat4::IDENTITY;
        };
        let (parent_world, parent_version) = match node.parent {
            Some(parent) => (
                self.world_matrix(parent),
                self.nodes
                    .get(parent)
                    .map(|parent| parent.world_version())
                    .unwrap_or(0),
            ),
            None => (Mat4::IDENTITY, 0),
        };
        node.world_matrix_with(parent_world, parent_version)
    }

    pub fn world_position(&self, id: NodeId) -> Vec3 {
        self.world_matrix(id).w_axis.truncate()
    }

    pub fn world_scale(&self, id: NodeId) -> Vec3 {
        self.world_matrix(id).to_scale_rotation_translation().0
    }

    pub fn world_orientation(&self, id: NodeId) -> Quat {
        self.world_matrix(id).to_scale_rotation_translation().1
    }

    pub fn world_forward(&self, id: NodeId) -> Vec3 {
        (self.world_orientation(id) * WORLD_FORWARD).normalize()
    }

    pub fn world_up(&self, id: NodeId) -> Vec3 {
        (self.world_orientation(id) * WORLD_UP).normalize()
    }

    pub fn world_right(&self, id: NodeId) -> Vec3 {
        (self.world_orientation(id) * WORLD_RIGHT).normalize()
    }

    /// Sets the local position so the node lands at `position` in world
    /// space, compensating for the parent transform.
    pub fn set_world_position(&mut self, id: NodeId, position: Vec3) {
        let local = match self.nodes.get(id).and_then(|node| node.parent) {
            Some(parent) => self
                .world_matrix(parent)
                .inverse()
                .transform_point3(position),
            None => position,
        };
        if let Some(node) = self.nodes.get_mut(id) {
            node.set_position(local);
        }
    }

    /// Sets the local orientation so the node's world orientation equals
    /// `orientation`.
    pub fn set_world_orientation(&mut self, id: NodeId, orientation: Quat) {
        let local = match self.nodes.get(id).and_then(|node| node.parent) {
            Some(parent) => self.world_orientation(parent).inverse() * orientation,
            None => orientation,
        };
        if let Some(node) = self.nodes.get_mut(id) {
            node.set_orientation(local);
        }
    }

    /// Sets the local scale so the node's world scale equals `scale`.
    pub fn set_world_scale(&mut self, id: NodeId, scale: Vec3) {
        let local = match self.nodes.get(id).and_then(|node| node.parent) {
            Some(parent) => scale / self.world_scale(parent),
            None => scale,
        };
        if let Some(node) = self.nodes.get_mut(id) {
            node.set_scale(local);
        }
    }

    pub fn set_position(&mut self, id: NodeId, position: Vec3) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.set_position(position);
        }
    }

    pub fn set_scale(&mut self, id: NodeId, scale: Vec3) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.set_scale(scale);
        }
    }

    pub fn set_orientation(&mut self, id: NodeId, orientation: Quat) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.set_orientation(orientation);
        }
    }

    pub fn look_at(&mut self, id: NodeId, target: Vec3, up: Vec3) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.look_at(target, up);
        }
    }

    /// True when the node and every ancestor are visible.
    pub fn is_visible(&self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        if !node.visible {
            return false;
        }
        match node.parent {
            Some(parent) => self.is_visible(parent),
            None => true,
        }
    }

    /// Depth-first traversal in draw order: parents before children,
    /// children in insertion order, invisible subtrees skipped entirely.
    pub fn visit_visible(&self, mut f: impl FnMut(NodeId, &Node)) {
        let roots: Vec<NodeId> = self.roots().collect();
        for root in roots {
            self.visit_node(root, &mut f);
        }
    }

    fn visit_node(&self, id: NodeId, f: &mut impl FnMut(NodeId, &Node)) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if !node.visible {
            return;
        }
        f(id, node);
        for &child in &node.children {
            self.visit_node(child, f);
        }
    }

    /// Warms every world-matrix cache once so draw-time reads are pure cache
    /// hits. Called from `Renderer::update` each frame.
    pub fn update(&mut self) {
        let roots: Vec<NodeId> = self.roots().collect();
        for root in roots {
            self.warm(root);
        }
    }

    fn warm(&self, id: NodeId) {
        self.world_matrix(id);
        if let Some(node) = self.nodes.get(id) {
            for &child in &node.children {
                self.warm(child);
            }
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

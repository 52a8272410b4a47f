use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::scene_graph::node::Node;
use crate::scene_graph::scene::Scene;
use crate::scene_graph::{NodeId, Revision};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

impl LightKind {
    /// Tag stored in the packed record's position.w, matched by shaders.
    pub fn tag(self) -> f32 {
        match self {
            LightKind::Directional => 0.0,
            LightKind::Point => 1.0,
            LightKind::Spot => 2.0,
        }
    }
}

/// GPU-packed light record, four vec4 lanes:
/// color = (rgb | intensity), position = (xyz | kind tag),
/// direction = (unit vector toward the light | inverse radius),
/// spot_info = (scale | offset | cos inner | cos outer).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightData {
    pub color: Vec4,
    pub position: Vec4,
    pub direction: Vec4,
    pub spot_info: Vec4,
}

/// A light is a scene node plus shading parameters. World position and
/// facing come from the node; parameter changes bump `revision` so
/// consumers can re-upload without watching every field.
pub struct Light {
    node: NodeId,
    kind: LightKind,
    color: Vec3,
    intensity: f32,
    radius: f32,
    angle_inner: f32,
    angle_outer: f32,
    revision: Revision,
}

impl Light {
    pub fn directional(scene: &mut Scene, color: Vec3, intensity: f32) -> Self {
        Self::new(scene, "Directional Light", LightKind::Directional, color, intensity, 0.0, 0.0, 0.0)
    }

    pub fn point(scene: &mut Scene, color: Vec3, intensity: f32, radius: f32) -> Self {
        Self::new(scene, "Point Light", LightKind::Point, color, intensity, radius, 0.0, 0.0)
    }

    /// Cone angles are in degrees, measured from the axis to the edge.
    pub fn spot(
        scene: &mut Scene,
        color: Vec3,
        intensity: f32,
        radius: f32,
        angle_inner: f32,
        angle_outer: f32,
    ) -> Self {
        Self::new(
            scene,
            "Spot Light",
            LightKind::Spot,
            color,
            intensity,
            radius,
            angle_inner,
            angle_outer,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn new(
        scene: &mut Scene,
        label: &str,
        kind: LightKind,
        color: Vec3,
        intensity: f32,
        radius: f32,
        angle_inner: f32,
        angle_outer: f32,
    ) -> Self {
        let node = scene.add_node(Node::new(label));
        Self {
            node,
            kind,
            color,
            intensity,
            radius,
            angle_inner,
            angle_outer,
            revision: Revision::default(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn kind(&self) -> LightKind {
        self.kind
    }

    pub fn color(&self) -> Vec3 {
        self.color
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn set_color(&mut self, color: Vec3) {
        if self.color != color {
            self.color = color;
            self.revision.bump();
        }
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        if self.intensity != intensity {
            self.intensity = intensity;
            self.revision.bump();
        }
    }

    pub fn set_radius(&mut self, radius: f32) {
        if self.radius != radius {
            self.radius = radius;
            self.revision.bump();
        }
    }

    pub fn set_cone_angles(&mut self, inner: f32, outer: f32) {
        if self.angle_inner != inner || self.angle_outer != outer {
            self.angle_inner = inner;
            self.angle_outer = outer;
            self.revision.bump();
        }
    }

    /// Parameter-change counter. Transform changes are visible separately
    /// through the node's world version; `change_stamp` combines both.
    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    pub fn change_stamp(&self, scene: &Scene) -> (u64, u64) {
        scene.world_matrix(self.node);
        let world = scene
            .node(self.node)
            .map(|node| node.world_version())
            .unwrap_or(0);
        (self.revision.get(), world)
    }

    pub fn data(&self, scene: &Scene) -> LightData {
        let position = scene.world_position(self.node);
        // Shaders want the vector from surfaces toward the light, the
        // negation of the direction the light travels.
        let toward_light = -scene.world_forward(self.node);
        let inverse_radius = if self.radius > 0.0 {
            1.0 / self.radius
        } else {
            0.0
        };
        let spot_info = match self.kind {
            LightKind::Spot => {
                let cos_outer = self.angle_outer.to_radians().cos();
                let cos_inner = self.angle_inner.to_radians().cos();
                let scale = 1.0 / (cos_inner - cos_outer).max(1e-4);
                let offset = -cos_outer * scale;
                Vec4::new(scale, offset, cos_inner, cos_outer)
            }
            _ => Vec4::ZERO,
        };

        LightData {
            color: self.color.extend(self.intensity),
            position: position.extend(self.kind.tag()),
            direction: toward_light.extend(inverse_radius),
            spot_info,
        }
    }

    pub fn descriptor(&self, scene: &Scene) -> LightDescriptor {
        let node = scene.node(self.node);
        LightDescriptor {
            kind: self.kind,
            position: node.map(|node| node.position()).unwrap_or(Vec3::ZERO),
            orientation: node.map(|node| node.orientation()).unwrap_or(Quat::IDENTITY),
            color: self.color,
            intensity: self.intensity,
            radius: self.radius,
            angle_inner: self.angle_inner,
            angle_outer: self.angle_outer,
        }
    }

    pub fn from_descriptor(scene: &mut Scene, descriptor: &LightDescriptor) -> Self {
        let light = Self::new(
            scene,
            match descriptor.kind {
                LightKind::Directional => "Directional Light",
                LightKind::Point => "Point Light",
                LightKind::Spot => "Spot Light",
            },
            descriptor.kind,
            descriptor.color,
            descriptor.intensity,
            descriptor.radius,
            descriptor.angle_inner,
            descriptor.angle_outer,
        );
        if let Some(node) = scene.node_mut(light.node) {
            node.set_position(descriptor.position);
            node.set_orientation(descriptor.orientation);
        }
        light
    }
}

/// Flat, serializable record of a light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightDescriptor {
    pub kind: LightKind,
    pub position: Vec3,
    pub orientation: Quat,
    pub color: Vec3,
    pub intensity: f32,
    pub radius: f32,
    pub angle_inner: f32,
    pub angle_outer: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::transforms::WORLD_FORWARD;

    #[test]
    fn directional_data_packs_color_position_and_direction() {
        let mut scene = Scene::new();
        let mut light = Light::directional(&mut scene, Vec3::new(1.0, 0.5, 0.25), 2.0);
        scene.set_position(light.node(), Vec3::new(0.0, 5.0, 0.0));
        scene.look_at(light.node(), Vec3::ZERO, Vec3::Z);
        light.set_radius(0.0);

        let data = light.data(&scene);
        assert_eq!(data.color, Vec4::new(1.0, 0.5, 0.25, 2.0));
        assert_eq!(data.position, Vec4::new(0.0, 5.0, 0.0, 0.0));
        // Facing straight down, so "toward the light" is straight up.
        assert!((data.direction.truncate() - Vec3::Y).length() < 1e-5);
        assert_eq!(data.spot_info, Vec4::ZERO);
    }

    #[test]
    fn spot_data_packs_cone_cosines() {
        let mut scene = Scene::new();
        let light = Light::spot(&mut scene, Vec3::ONE, 1.0, 4.0, 30.0, 45.0);
        let data = light.data(&scene);

        let cos_inner = 30.0_f32.to_radians().cos();
        let cos_outer = 45.0_f32.to_radians().cos();
        assert!((data.spot_info.z - cos_inner).abs() < 1e-6);
        assert!((data.spot_info.w - cos_outer).abs() < 1e-6);
        assert!((data.spot_info.x - 1.0 / (cos_inner - cos_outer)).abs() < 1e-4);
        assert!((data.direction.w - 0.25).abs() < 1e-6);
        assert_eq!(data.position.w, LightKind::Spot.tag());
        // An un-rotated light faces -Z; toward the light is +Z.
        assert!((data.direction.truncate() + WORLD_FORWARD).length() < 1e-6);
    }

    #[test]
    fn parameter_changes_bump_the_revision_once() {
        let mut scene = Scene::new();
        let mut light = Light::point(&mut scene, Vec3::ONE, 1.0, 4.0);
        let before = light.revision();

        light.set_intensity(1.0);
        assert_eq!(light.revision(), before);

        light.set_intensity(3.0);
        assert_eq!(light.revision(), before + 1);
    }

    #[test]
    fn descriptor_roundtrips_through_json() {
        let mut scene = Scene::new();
        let mut light = Light::spot(&mut scene, Vec3::new(0.9, 0.8, 0.7), 5.0, 10.0, 20.0, 35.0);
        scene.set_position(light.node(), Vec3::new(1.0, 2.0, 3.0));
        light.set_radius(12.0);

        let descriptor = light.descriptor(&scene);
        let json = serde_json::to_string(&descriptor).unwrap();
        let decoded: LightDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, descriptor);

        let mut restored_scene = Scene::new();
        let restored = Light::from_descriptor(&mut restored_scene, &decoded);
        assert_eq!(restored.kind(), LightKind::Spot);
        assert_eq!(restored_scene.world_position(restored.node()), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(restored.radius(), 12.0);
    }
}

pub mod math;
pub mod rendering;
pub mod scene_graph;

pub use math::bounds::AABB;
pub use rendering::{
    context::RenderContext,
    material::{Material, MaterialFeatures, ShadowBindings},
    mesh::{Geometry, Mesh, Renderable, Vertex},
    pass::PassDescriptor,
    post_processor::PostProcessor,
    render_target::{AttachmentPlan, RenderTargets},
    renderer::{Renderer, Viewport},
    shader::{RenderPipelineId, ShaderDefinition, ShaderLibrary},
    shadow::DirectionalShadow,
    texture::RenderTexture,
    uniforms::{CameraFrame, LightBuffer, ObjectUniforms, ShadowUniforms},
};
pub use scene_graph::{
    camera::{Camera, CameraDescriptor, Projection},
    light::{Light, LightData, LightDescriptor, LightKind},
    node::Node,
    scene::Scene,
    MeshId, NodeId, Revision,
};

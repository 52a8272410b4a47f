pub mod context;
pub mod material;
pub mod mesh;
pub mod pass;
pub mod post_processor;
pub mod render_target;
pub mod renderer;
pub mod shader;
pub mod shadow;
pub mod texture;
pub mod uniforms;

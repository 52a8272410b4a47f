/// Externally supplied attachment targets for one render pass.
///
/// The color target is where the pass output finally lands: bound directly
/// when single-sampled, or as the resolve target of the renderer's internal
/// multisample texture otherwise. Depth and stencil targets are normally
/// filled in by the renderer from its own textures each draw; whatever was
/// left from a previous frame is overwritten or detached, never reused.
#[derive(Default, Clone)]
pub struct PassDescriptor {
    pub color_target: Option<wgpu::TextureView>,
    pub depth_target: Option<wgpu::TextureView>,
    pub stencil_target: Option<wgpu::TextureView>,
}

impl PassDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_color_target(view: wgpu::TextureView) -> Self {
        Self {
            color_target: Some(view),
            ..Self::default()
        }
    }
}

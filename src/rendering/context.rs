/// The one GPU context shared read-only by renderers, materials and shadow
/// passes: device, queue, default attachment formats and the multisample
/// count. Attachment formats are `None` when that attachment kind is unused.
pub struct RenderContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub color_format: Option<wgpu::TextureFormat>,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub stencil_format: Option<wgpu::TextureFormat>,
    pub sample_count: u32,
}

impl RenderContext {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_format: wgpu::TextureFormat,
        sample_count: u32,
    ) -> Self {
        Self {
            device,
            queue,
            color_format: Some(color_format),
            depth_format: Some(wgpu::TextureFormat::Depth32Float),
            stencil_format: None,
            sample_count,
        }
    }
}

/// True for formats that carry both depth and stencil aspects; the renderer
/// then reuses one texture for both attachments.
pub fn is_depth_stencil_format(format: wgpu::TextureFormat) -> bool {
    matches!(
        format,
        wgpu::TextureFormat::Depth24PlusStencil8 | wgpu::TextureFormat::Depth32FloatStencil8
    )
}

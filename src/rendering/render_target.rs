use crate::rendering::context::{is_depth_stencil_format, RenderContext};
use crate::rendering::texture::{attachment_descriptor, RenderTexture};

/// What to do with one attachment texture this frame.
#[derive(Debug, PartialEq)]
pub enum AttachmentPlan {
    /// Nothing changed; keep whatever texture exists.
    Keep,
    /// The attachment became ineligible (no format, degenerate size);
    /// release the texture so no stale attachment is ever referenced.
    Drop,
    /// (Re)allocate from this descriptor.
    Allocate(wgpu::TextureDescriptor<'static>),
}

/// Lifecycle state for the renderer-owned color/depth/stencil textures.
///
/// Each attachment has its own needs-update flag, set by size, sample-count
/// or format changes and consumed at draw time, so a stencil format change
/// never reallocates the color texture. Planning is pure data; only
/// `prepare` touches the device.
pub struct RenderTargets {
    size: (u32, u32),
    sample_count: u32,
    color_format: Option<wgpu::TextureFormat>,
    depth_format: Option<wgpu::TextureFormat>,
    stencil_format: Option<wgpu::TextureFormat>,

    update_color: bool,
    update_depth: bool,
    update_stencil: bool,

    color: Option<RenderTexture>,
    depth: Option<RenderTexture>,
    stencil: Option<RenderTexture>,

    color_allocations: u64,
    depth_allocations: u64,
    stencil_allocations: u64,
}

impl RenderTargets {
    pub fn new(context: &RenderContext) -> Self {
        Self::with_formats(
            context.color_format,
            context.depth_format,
            context.stencil_format,
            context.sample_count,
        )
    }

    pub fn with_formats(
        color_format: Option<wgpu::TextureFormat>,
        depth_format: Option<wgpu::TextureFormat>,
        stencil_format: Option<wgpu::TextureFormat>,
        sample_count: u32,
    ) -> Self {
        Self {
            size: (0, 0),
            sample_count,
            color_format,
            depth_format,
            stencil_format,
            update_color: true,
            update_depth: true,
            update_stencil: true,
            color: None,
            depth: None,
            stencil: None,
            color_allocations: 0,
            depth_allocations: 0,
            stencil_allocations: 0,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn depth_format(&self) -> Option<wgpu::TextureFormat> {
        self.depth_format
    }

    pub fn stencil_format(&self) -> Option<wgpu::TextureFormat> {
        self.stencil_format
    }

    /// True when the depth format carries a stencil aspect, in which case
    /// the depth texture doubles as the stencil attachment.
    pub fn depth_is_combined(&self) -> bool {
        self.depth_format.is_some_and(is_depth_stencil_format)
    }

    pub fn set_size(&mut self, size: (u32, u32)) {
        if self.size != size {
            self.size = size;
            self.invalidate();
        }
    }

    pub fn set_sample_count(&mut self, sample_count: u32) {
        if self.sample_count != sample_count {
            self.sample_count = sample_count;
            self.invalidate();
        }
    }

    pub fn set_color_format(&mut self, format: Option<wgpu::TextureFormat>) {
        if self.color_format != format {
            self.color_format = format;
            self.update_color = true;
        }
    }

    pub fn set_depth_format(&mut self, format: Option<wgpu::TextureFormat>) {
        if self.depth_format != format {
            self.depth_format = format;
            self.update_depth = true;
        }
    }

    pub fn set_stencil_format(&mut self, format: Option<wgpu::TextureFormat>) {
        if self.stencil_format != format {
            self.stencil_format = format;
            self.update_stencil = true;
        }
    }

    pub fn invalidate(&mut self) {
        self.update_color = true;
        self.update_depth = true;
        self.update_stencil = true;
    }

    fn size_is_drawable(&self) -> bool {
        self.size.0 > 1 && self.size.1 > 1
    }

    /// The internal multisample color texture only exists when multisampling
    /// is on; single-sample rendering goes straight to the external target.
    pub fn take_color_plan(&mut self) -> AttachmentPlan {
        if !self.update_color {
            return AttachmentPlan::Keep;
        }
        self.update_color = false;
        match self.color_format {
            Some(format) if self.size_is_drawable() && self.sample_count > 1 => {
                self.color_allocations += 1;
                AttachmentPlan::Allocate(attachment_descriptor(
                    "Multisample Color Texture",
                    self.size,
                    format,
                    self.sample_count,
                ))
            }
            _ => AttachmentPlan::Drop,
        }
    }

    pub fn take_depth_plan(&mut self) -> AttachmentPlan {
        if !self.update_depth {
            return AttachmentPlan::Keep;
        }
        self.update_depth = false;
        match self.depth_format {
            Some(format) if self.size_is_drawable() => {
                self.depth_allocations += 1;
                AttachmentPlan::Allocate(attachment_descriptor(
                    "Depth Texture",
                    self.size,
                    format,
                    self.sample_count,
                ))
            }
            _ => AttachmentPlan::Drop,
        }
    }

    pub fn take_stencil_plan(&mut self) -> AttachmentPlan {
        if !self.update_stencil {
            return AttachmentPlan::Keep;
        }
        self.update_stencil = false;
        match self.stencil_format {
            Some(format) if self.size_is_drawable() => {
                self.stencil_allocations += 1;
                AttachmentPlan::Allocate(attachment_descriptor(
                    "Stencil Texture",
                    self.size,
                    format,
                    self.sample_count,
                ))
            }
            _ => AttachmentPlan::Drop,
        }
    }

    /// Applies the pending plans. Always runs before any draw references the
    /// textures within the same draw call.
    pub fn prepare(&mut self, device: &wgpu::Device) {
        match self.take_color_plan() {
            AttachmentPlan::Keep => {}
            AttachmentPlan::Drop => self.color = None,
            AttachmentPlan::Allocate(descriptor) => {
                log::debug!(
                    "allocating {}x{} multisample color target",
                    self.size.0,
                    self.size.1
                );
                self.color = Some(RenderTexture::new(device, &descriptor));
            }
        }
        match self.take_depth_plan() {
            AttachmentPlan::Keep => {}
            AttachmentPlan::Drop => self.depth = None,
            AttachmentPlan::Allocate(descriptor) => {
                self.depth = Some(RenderTexture::new(device, &descriptor));
            }
        }
        match self.take_stencil_plan() {
            AttachmentPlan::Keep => {}
            AttachmentPlan::Drop => self.stencil = None,
            AttachmentPlan::Allocate(descriptor) => {
                self.stencil = Some(RenderTexture::new(device, &descriptor));
            }
        }
    }

    pub fn color(&self) -> Option<&RenderTexture> {
        self.color.as_ref()
    }

    pub fn depth(&self) -> Option<&RenderTexture> {
        self.depth.as_ref()
    }

    pub fn stencil(&self) -> Option<&RenderTexture> {
        self.stencil.as_ref()
    }

    #[cfg(test)]
    fn allocation_counts(&self) -> (u64, u64, u64) {
        (
            self.color_allocations,
            self.depth_allocations,
            self.stencil_allocations,
        )
    }
}

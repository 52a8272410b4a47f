use wgpu::PipelineCompilationOptions;

use crate::rendering::context::RenderContext;
use crate::rendering::mesh::VERTEX_LAYOUT;
use crate::rendering::shader::{RenderPipelineId, ShaderDefinition, ShaderLibrary};
use crate::rendering::shadow::SHADOW_FORMAT;
use crate::rendering::uniforms::{object_bind_group_layout, LightBuffer};

/// Capability set injected into the shader as defs. Replaces a subclass
/// ladder of shader types with flat feature composition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialFeatures {
    pub lighting: bool,
    pub receive_shadow: bool,
}

impl MaterialFeatures {
    // Defs use presence semantics (`#ifdef`), so only enabled flags are
    // injected.
    fn shader_defs(&self) -> Vec<(&'static str, bool)> {
        let mut defs = Vec::new();
        if self.lighting {
            defs.push(("LIGHTING", true));
        }
        if self.receive_shadow {
            defs.push(("RECEIVE_SHADOW", true));
        }
        defs
    }
}

/// Shadow-map resources a receiving material binds: the depth texture, a
/// comparison sampler and the light-space uniforms.
pub struct ShadowBindings<'a> {
    pub view: &'a wgpu::TextureView,
    pub sampler: &'a wgpu::Sampler,
    pub uniforms: &'a wgpu::Buffer,
}

/// A compiled pipeline plus the per-material bind group. The pipeline lives
/// in the shader library's cache slot; an empty slot (compile failure) makes
/// the material not ready and its renderables are skipped.
pub struct Material {
    pub label: String,
    pipeline: RenderPipelineId,
    shadow_pipeline: Option<RenderPipelineId>,
    pub features: MaterialFeatures,
    bind_group: Option<wgpu::BindGroup>,
}

impl Material {
    pub fn new(
        label: impl Into<String>,
        pipeline: RenderPipelineId,
        shadow_pipeline: Option<RenderPipelineId>,
        features: MaterialFeatures,
    ) -> Self {
        Self {
            label: label.into(),
            pipeline,
            shadow_pipeline,
            features,
            bind_group: None,
        }
    }

    pub fn with_bind_group(mut self, bind_group: wgpu::BindGroup) -> Self {
        self.bind_group = Some(bind_group);
        self
    }

    /// Replaces the material resources, e.g. after a shadow map was
    /// recreated at a new resolution.
    pub fn set_bind_group(&mut self, bind_group: Option<wgpu::BindGroup>) {
        self.bind_group = bind_group;
    }

    pub fn pipeline_id(&self) -> RenderPipelineId {
        self.pipeline
    }

    pub fn shadow_pipeline_id(&self) -> Option<RenderPipelineId> {
        self.shadow_pipeline
    }

    pub fn is_ready(&self, shaders: &ShaderLibrary) -> bool {
        shaders.pipeline(self.pipeline).is_some()
    }

    pub fn bind(&self, pass: &mut wgpu::RenderPass<'_>) {
        if let Some(bind_group) = &self.bind_group {
            pass.set_bind_group(1, bind_group, &[]);
        }
    }

    /// The standard lit material: forward lighting from a light buffer,
    /// optional shadow receiving, plus a depth-only pipeline variant for
    /// the shadow pass.
    pub fn standard(
        context: &RenderContext,
        shaders: &mut ShaderLibrary,
        label: impl Into<String>,
        features: MaterialFeatures,
        lights: &LightBuffer,
        shadow: Option<ShadowBindings>,
    ) -> Self {
        let label = label.into();
        let device = &context.device;

        let material_layout = standard_bind_group_layout(device, features);
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: lights.buffer().as_entire_binding(),
        }];
        if features.receive_shadow {
            if let Some(shadow) = &shadow {
                entries.push(wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(shadow.view),
                });
                entries.push(wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(shadow.sampler),
                });
                entries.push(wgpu::BindGroupEntry {
                    binding: 3,
                    resource: shadow.uniforms.as_entire_binding(),
                });
            }
        }
        // A receiver without shadow resources yet keeps an empty bind group
        // slot; the host re-binds once the first shadow pass has run.
        let bind_group = if !features.receive_shadow || shadow.is_some() {
            Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{label} Bind Group")),
                layout: &material_layout,
                entries: &entries,
            }))
        } else {
            None
        };

        let object_layout = object_bind_group_layout(device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} Pipeline Layout")),
            bind_group_layouts: &[&object_layout, &material_layout],
            push_constant_ranges: &[],
        });

        let color_format = context
            .color_format
            .unwrap_or(wgpu::TextureFormat::Bgra8UnormSrgb);
        let depth_stencil = context
            .depth_format
            .map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: true,
                // Reverse-Z: nearer fragments have larger depth.
                depth_compare: wgpu::CompareFunction::Greater,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            });
        let sample_count = context.sample_count;

        let pipeline_label = format!("{label} Pipeline");
        let pipeline = shaders.add_shader(
            ShaderDefinition {
                name: "standard",
                path: "standard.wgsl",
                defs: features.shader_defs(),
            },
            Box::new(move |device, source| {
                let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&pipeline_label),
                    source: wgpu::ShaderSource::Wgsl(source.into()),
                });

                Ok(
                    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                        label: Some(&pipeline_label),
                        layout: Some(&pipeline_layout),
                        vertex: wgpu::VertexState {
                            module: &shader,
                            entry_point: Some("vs_main"),
                            buffers: &[VERTEX_LAYOUT],
                            compilation_options: PipelineCompilationOptions::default(),
                        },
                        fragment: Some(wgpu::FragmentState {
                            module: &shader,
                            entry_point: Some("fs_main"),
                            targets: &[Some(wgpu::ColorTargetState {
                                format: color_format,
                                blend: Some(wgpu::BlendState::REPLACE),
                                write_mask: wgpu::ColorWrites::ALL,
                            })],
                            compilation_options: PipelineCompilationOptions::default(),
                        }),
                        primitive: wgpu::PrimitiveState {
                            cull_mode: Some(wgpu::Face::Back),
                            ..Default::default()
                        },
                        depth_stencil: depth_stencil.clone(),
                        multisample: wgpu::MultisampleState {
                            count: sample_count,
                            ..Default::default()
                        },
                        multiview: None,
                        cache: None,
                    }),
                )
            }),
        );

        let shadow_pipeline = Some(shadow_pipeline(context, shaders, &label, features));

        Self {
            label,
            pipeline,
            shadow_pipeline,
            features,
            bind_group,
        }
    }

    /// Material for a post-process pass: samples the previous pass's output
    /// over a fullscreen quad.
    pub fn post(
        context: &RenderContext,
        shaders: &mut ShaderLibrary,
        label: impl Into<String>,
        input: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) -> Self {
        let label = label.into();
        let device = &context.device;

        let material_layout = post_bind_group_layout(device);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label} Bind Group")),
            layout: &material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(input),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        let object_layout = object_bind_group_layout(device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} Pipeline Layout")),
            bind_group_layouts: &[&object_layout, &material_layout],
            push_constant_ranges: &[],
        });

        let color_format = context
            .color_format
            .unwrap_or(wgpu::TextureFormat::Bgra8UnormSrgb);
        let depth_stencil = context
            .depth_format
            .map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            });
        let sample_count = context.sample_count;

        let pipeline_label = format!("{label} Pipeline");
        let pipeline = shaders.add_shader(
            ShaderDefinition {
                name: "post",
                path: "post.wgsl",
                defs: Vec::new(),
            },
            Box::new(move |device, source| {
                let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&pipeline_label),
                    source: wgpu::ShaderSource::Wgsl(source.into()),
                });

                Ok(
                    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                        label: Some(&pipeline_label),
                        layout: Some(&pipeline_layout),
                        vertex: wgpu::VertexState {
                            module: &shader,
                            entry_point: Some("vs_main"),
                            buffers: &[VERTEX_LAYOUT],
                            compilation_options: PipelineCompilationOptions::default(),
                        },
                        fragment: Some(wgpu::FragmentState {
                            module: &shader,
                            entry_point: Some("fs_main"),
                            targets: &[Some(wgpu::ColorTargetState {
                                format: color_format,
                                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                                write_mask: wgpu::ColorWrites::ALL,
                            })],
                            compilation_options: PipelineCompilationOptions::default(),
                        }),
                        primitive: wgpu::PrimitiveState::default(),
                        depth_stencil: depth_stencil.clone(),
                        multisample: wgpu::MultisampleState {
                            count: sample_count,
                            ..Default::default()
                        },
                        multiview: None,
                        cache: None,
                    }),
                )
            }),
        );

        Self {
            label,
            pipeline,
            shadow_pipeline: None,
            features: MaterialFeatures::default(),
            bind_group: Some(bind_group),
        }
    }
}

/// Depth-only pipeline variant used by the shadow pass: vertex stage only,
/// no fragment color output.
fn shadow_pipeline(
    context: &RenderContext,
    shaders: &mut ShaderLibrary,
    label: &str,
    features: MaterialFeatures,
) -> RenderPipelineId {
    let object_layout = object_bind_group_layout(&context.device);
    let pipeline_layout = context
        .device
        .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} Shadow Pipeline Layout")),
            bind_group_layouts: &[&object_layout],
            push_constant_ranges: &[],
        });

    let pipeline_label = format!("{label} Shadow Pipeline");
    let mut defs = features.shader_defs();
    defs.push(("SHADOW_PASS", true));

    shaders.add_shader(
        ShaderDefinition {
            name: "standard (shadow)",
            path: "standard.wgsl",
            defs,
        },
        Box::new(move |device, source| {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&pipeline_label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });

            Ok(
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(&pipeline_label),
                    layout: Some(&pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &shader,
                        entry_point: Some("vs_main"),
                        buffers: &[VERTEX_LAYOUT],
                        compilation_options: PipelineCompilationOptions::default(),
                    },
                    fragment: None,
                    primitive: wgpu::PrimitiveState {
                        cull_mode: Some(wgpu::Face::Front),
                        ..Default::default()
                    },
                    depth_stencil: Some(wgpu::DepthStencilState {
                        format: SHADOW_FORMAT,
                        depth_write_enabled: true,
                        depth_compare: wgpu::CompareFunction::Greater,
                        stencil: wgpu::StencilState::default(),
                        bias: wgpu::DepthBiasState::default(),
                    }),
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                    cache: None,
                }),
            )
        }),
    )
}

fn standard_bind_group_layout(
    device: &wgpu::Device,
    features: MaterialFeatures,
) -> wgpu::BindGroupLayout {
    let mut entries = vec![wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }];

    if features.receive_shadow {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Depth,
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 3,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
    }

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Standard Material Layout"),
        entries: &entries,
    })
}

fn post_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Post Material Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

use std::collections::HashMap;
use std::sync::Arc;

use crate::asset::Assets;
use crate::submit::error::SubmitError;
use crate::submit::internal::bindings::LayoutKey;
use crate::submit::pipeline::ResolvedPipelineSpec;

/// Cache key: the fully resolved pipeline configuration plus the canonical
/// shapes of the drawable and texture bind groups. Hash lookups re-check
/// equality on collision, courtesy of `HashMap` itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub spec: ResolvedPipelineSpec,
    pub bindings: LayoutKey,
    pub textures: LayoutKey,
}

/// Exact-match pipeline cache. Entries are immutable once created and are
/// only evicted by an explicit [`reset`](PipelineCache::reset).
#[derive(Default)]
pub struct PipelineCache {
    pipelines: HashMap<PipelineKey, Arc<wgpu::RenderPipeline>>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Callers must not hold pipeline handles across a reset.
    pub fn reset(&mut self) {
        self.pipelines.clear();
    }

    pub(crate) fn resolve(
        &mut self,
        device: &wgpu::Device,
        assets: &Assets,
        key: PipelineKey,
        frame_layout: &wgpu::BindGroupLayout,
        binding_layout: &wgpu::BindGroupLayout,
        texture_layout: &wgpu::BindGroupLayout,
    ) -> Result<Arc<wgpu::RenderPipeline>, SubmitError> {
        if let Some(pipeline) = self.pipelines.get(&key) {
            return Ok(pipeline.clone());
        }

        log::debug!("Compiling pipeline `{}`", key.spec.label.unwrap_or("unnamed"));
        let pipeline = Arc::new(create_pipeline(
            device,
            assets,
            &key.spec,
            frame_layout,
            binding_layout,
            texture_layout,
        )?);
        self.pipelines.insert(key, pipeline.clone());
        Ok(pipeline)
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    assets: &Assets,
    spec: &ResolvedPipelineSpec,
    frame_layout: &wgpu::BindGroupLayout,
    binding_layout: &wgpu::BindGroupLayout,
    texture_layout: &wgpu::BindGroupLayout,
) -> Result<wgpu::RenderPipeline, SubmitError> {
    let shader = assets
        .shaders
        .get(spec.shader)
        .ok_or(SubmitError::UnknownHandle {
            kind: "shader",
            index: spec.shader.index(),
        })?;

    let label = spec.label.unwrap_or("unnamed pipeline");

    let vertex_entry = shader
        .vertex_entry
        .as_deref()
        .ok_or_else(|| SubmitError::MissingVertexStage {
            label: label.to_owned(),
        })?;

    let fragment_entry = if spec.color_formats.is_empty() {
        None
    } else {
        Some(shader.fragment_entry.as_deref().ok_or_else(|| {
            SubmitError::MissingFragmentStage {
                label: label.to_owned(),
            }
        })?)
    };

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("SubmitPipelineLayout"),
        bind_group_layouts: &[frame_layout, binding_layout, texture_layout],
        push_constant_ranges: &[],
    });

    let color_targets: Vec<Option<wgpu::ColorTargetState>> = spec
        .color_formats
        .iter()
        .map(|&format| {
            Some(wgpu::ColorTargetState {
                format,
                blend: Some(spec.blend.unwrap_or(wgpu::BlendState::REPLACE)),
                write_mask: wgpu::ColorWrites::ALL,
            })
        })
        .collect();

    let depth_stencil = spec.depth_format.map(|format| wgpu::DepthStencilState {
        format,
        depth_write_enabled: spec.depth.write,
        depth_compare: if spec.depth.test {
            spec.depth.compare
        } else {
            wgpu::CompareFunction::Always
        },
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    });

    let vertex_buffers = [wgpu::VertexBufferLayout {
        array_stride: spec.vertex_layout.stride,
        step_mode: spec.vertex_layout.step_mode,
        attributes: &spec.vertex_layout.attributes,
    }];

    Ok(
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader.module,
                entry_point: Some(vertex_entry),
                buffers: &vertex_buffers,
                compilation_options: Default::default(),
            },
            fragment: fragment_entry.map(|entry| wgpu::FragmentState {
                module: &shader.module,
                entry_point: Some(entry),
                targets: &color_targets,
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: spec.topology,
                cull_mode: spec.cull_mode,
                front_face: spec.front_face,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
            depth_stencil,
            multisample: wgpu::MultisampleState {
                count: spec.sample_count,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        }),
    )
}

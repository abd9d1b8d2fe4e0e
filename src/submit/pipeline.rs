use crate::asset::{Handle, ShaderSet};
use crate::submit::error::SubmitError;

/// Vertex buffer shape as a hashable value, mirrored into
/// `wgpu::VertexBufferLayout` at pipeline construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayoutSpec {
    pub stride: u64,
    pub step_mode: wgpu::VertexStepMode,
    pub attributes: Vec<wgpu::VertexAttribute>,
}

impl VertexLayoutSpec {
    pub fn vertex(stride: u64, attributes: Vec<wgpu::VertexAttribute>) -> Self {
        Self {
            stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthSpec {
    pub test: bool,
    pub write: bool,
    pub compare: wgpu::CompareFunction,
}

impl Default for DepthSpec {
    fn default() -> Self {
        Self {
            test: true,
            write: true,
            compare: wgpu::CompareFunction::LessEqual,
        }
    }
}

/// Full, comparable-by-value pipeline configuration carried on a drawable.
///
/// Producers may leave `color_formats`, `depth_format` and `sample_count`
/// unset; the orchestrator fills them from the active render target before
/// the cache lookup. Pinned values that contradict the target are a fatal
/// mismatch, not a silent override.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineSpec {
    pub label: Option<&'static str>,
    pub shader: Handle<ShaderSet>,
    pub vertex_layout: VertexLayoutSpec,
    pub topology: wgpu::PrimitiveTopology,
    pub cull_mode: Option<wgpu::Face>,
    pub front_face: wgpu::FrontFace,
    pub blend: Option<wgpu::BlendState>,
    pub depth: DepthSpec,
    pub color_formats: Vec<wgpu::TextureFormat>,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub sample_count: Option<u32>,
}

impl PipelineSpec {
    pub fn new(shader: Handle<ShaderSet>, vertex_layout: VertexLayoutSpec) -> Self {
        Self {
            label: None,
            shader,
            vertex_layout,
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            front_face: wgpu::FrontFace::Ccw,
            blend: None,
            depth: DepthSpec::default(),
            color_formats: Vec::new(),
            depth_format: None,
            sample_count: None,
        }
    }

    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn with_blend(mut self, blend: wgpu::BlendState) -> Self {
        self.blend = Some(blend);
        self
    }

    pub fn with_depth(mut self, depth: DepthSpec) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_no_culling(mut self) -> Self {
        self.cull_mode = None;
        self
    }

    pub fn with_topology(mut self, topology: wgpu::PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Fill target-derived fields, validating pinned ones against the target.
    pub fn resolve(&self, target: &TargetInfo) -> Result<ResolvedPipelineSpec, SubmitError> {
        let color_formats = if self.color_formats.is_empty() {
            target.color_formats.clone()
        } else {
            if self.color_formats != target.color_formats {
                return Err(SubmitError::AttachmentMismatch {
                    expected: self.color_formats.len(),
                    got: target.color_formats.len(),
                });
            }
            self.color_formats.clone()
        };

        let depth_format = match (self.depth_format, target.depth_format) {
            (Some(pinned), Some(actual)) if pinned != actual => {
                return Err(SubmitError::AttachmentMismatch {
                    expected: 1,
                    got: 1,
                });
            }
            (Some(pinned), _) => Some(pinned),
            (None, actual) => actual,
        };

        let sample_count = self.sample_count.unwrap_or(target.sample_count);
        if sample_count != target.sample_count {
            return Err(SubmitError::AttachmentMismatch {
                expected: self.color_formats.len(),
                got: target.color_formats.len(),
            });
        }

        Ok(ResolvedPipelineSpec {
            label: self.label,
            shader: self.shader,
            vertex_layout: self.vertex_layout.clone(),
            topology: self.topology,
            cull_mode: self.cull_mode,
            front_face: self.front_face,
            blend: self.blend,
            depth: self.depth,
            color_formats,
            depth_format,
            sample_count,
        })
    }
}

/// [`PipelineSpec`] with every target-derived field filled in. This is the
/// value the pipeline cache keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedPipelineSpec {
    pub label: Option<&'static str>,
    pub shader: Handle<ShaderSet>,
    pub vertex_layout: VertexLayoutSpec,
    pub topology: wgpu::PrimitiveTopology,
    pub cull_mode: Option<wgpu::Face>,
    pub front_face: wgpu::FrontFace,
    pub blend: Option<wgpu::BlendState>,
    pub depth: DepthSpec,
    pub color_formats: Vec<wgpu::TextureFormat>,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub sample_count: u32,
}

/// Attachment shape of a render target, separable from the live views so
/// resolution logic stays testable without a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInfo {
    pub color_formats: Vec<wgpu::TextureFormat>,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub sample_count: u32,
}

/// Compiled shader module plus the entry points a pipeline draws with.
///
/// Shader compilation itself lives outside the engine; producers register the
/// finished module here and reference it by handle from pipeline specs.
pub struct ShaderSet {
    pub module: wgpu::ShaderModule,
    pub vertex_entry: Option<String>,
    pub fragment_entry: Option<String>,
}

impl ShaderSet {
    pub fn new(module: wgpu::ShaderModule, vertex_entry: &str, fragment_entry: &str) -> Self {
        Self {
            module,
            vertex_entry: Some(vertex_entry.to_owned()),
            fragment_entry: Some(fragment_entry.to_owned()),
        }
    }

    /// Vertex-only set for depth or parameter-less passes.
    pub fn depth_only(module: wgpu::ShaderModule, vertex_entry: &str) -> Self {
        Self {
            module,
            vertex_entry: Some(vertex_entry.to_owned()),
            fragment_entry: None,
        }
    }
}

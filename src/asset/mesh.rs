use bytemuck::Pod;
use wgpu::util::DeviceExt;

/// Index buffer of a mesh, absent for pure vertex-stream geometry.
pub struct MeshIndices {
    pub buffer: wgpu::Buffer,
    pub count: u32,
    pub format: wgpu::IndexFormat,
}

/// Shared, read-only-per-frame geometry referenced by drawables.
///
/// Whether a mesh carries indices decides which indirect parameter buffer its
/// draws route to.
pub struct Mesh {
    vertex_buffer: wgpu::Buffer,
    vertex_count: u32,
    indices: Option<MeshIndices>,
}

impl Mesh {
    pub fn from_vertices<V: Pod>(
        device: &wgpu::Device,
        vertices: &[V],
        indices: Option<&[u32]>,
    ) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh.VertexBuffer"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let indices = indices.map(|indices| MeshIndices {
            buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh.IndexBuffer"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            }),
            count: indices.len() as u32,
            format: wgpu::IndexFormat::Uint32,
        });

        Self {
            vertex_buffer,
            vertex_count: vertices.len() as u32,
            indices,
        }
    }

    pub fn vertex_buffer(&self) -> &wgpu::Buffer {
        &self.vertex_buffer
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn indices(&self) -> Option<&MeshIndices> {
        self.indices.as_ref()
    }

    pub fn is_indexed(&self) -> bool {
        self.indices.is_some()
    }
}

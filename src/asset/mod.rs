pub mod buffer;
pub mod handle;
pub mod mesh;
pub mod shader;
pub mod store;
pub mod texture;

pub use buffer::GpuBuffer;
pub use handle::Handle;
pub use mesh::{Mesh, MeshIndices};
pub use shader::ShaderSet;
pub use store::AssetStore;
pub use texture::Texture;

/// Registry of every GPU object drawables may reference by handle.
///
/// Owned by the caller and passed into `advance_and_record`; the engine
/// treats everything in here as read-only for the duration of a frame.
#[derive(Default)]
pub struct Assets {
    pub meshes: AssetStore<Mesh>,
    pub textures: AssetStore<Texture>,
    pub buffers: AssetStore<GpuBuffer>,
    pub shaders: AssetStore<ShaderSet>,
}

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Sampled image referenced by drawables through the bindless table.
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Texture {
    pub fn new(texture: wgpu::Texture) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    pub fn from_parts(texture: wgpu::Texture, view: wgpu::TextureView) -> Self {
        Self { texture, view }
    }
}

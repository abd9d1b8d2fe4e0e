/// Per-instance material parameters carried by a drawable.
///
/// These are plain record data, not a cache key: they land verbatim in the
/// frame's material storage array, one entry per drawable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialParams {
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: f32,
    pub unlit: bool,
}

impl MaterialParams {
    pub fn new(base_color: [f32; 4]) -> Self {
        Self {
            base_color,
            metallic: 0.0,
            roughness: 1.0,
            emissive: 0.0,
            unlit: false,
        }
    }

    pub fn with_metallic(mut self, metallic: f32) -> Self {
        self.metallic = metallic.clamp(0.0, 1.0);
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness.clamp(0.0, 1.0);
        self
    }

    pub fn with_emissive(mut self, emissive: f32) -> Self {
        self.emissive = emissive.max(0.0);
        self
    }

    pub fn unlit(mut self) -> Self {
        self.unlit = true;
        self
    }

    pub fn white() -> Self {
        Self::new([1.0, 1.0, 1.0, 1.0])
    }
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self::white()
    }
}

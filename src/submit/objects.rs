// GPU-facing record layouts. Strides are asserted in tests because the WGSL
// side hard-codes them.
use bytemuck::{Pod, Zeroable};

use crate::submit::drawable::Drawable;
use crate::submit::material::MaterialParams;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
pub struct ObjectData {
    pub model: [[f32; 4]; 4],  // 64 bytes
    pub bindless_base: u32,    // 4 bytes
    pub flags: u32,            // 4 bytes
    pub _padding: [u32; 2],    // 8 bytes (80 byte stride)
}

impl ObjectData {
    pub fn from_drawable(drawable: &Drawable) -> Self {
        Self {
            model: drawable.transform.to_cols_array_2d(),
            bindless_base: drawable.bindless_base,
            flags: drawable.flags.bits(),
            _padding: [0; 2],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
pub struct HistoryData {
    pub model: [[f32; 4]; 4], // 64 bytes
}

impl HistoryData {
    /// Previous-frame transform, falling back to the current one so the
    /// history array never holds undefined entries.
    pub fn from_drawable(drawable: &Drawable) -> Self {
        let model = drawable.previous_transform.unwrap_or(drawable.transform);
        Self {
            model: model.to_cols_array_2d(),
        }
    }
}

pub const MATERIAL_UNLIT: u32 = 1 << 0;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
pub struct MaterialData {
    pub base_color: [f32; 4], // 16 bytes
    pub metallic: f32,        // 4 bytes
    pub roughness: f32,       // 4 bytes
    pub emissive: f32,        // 4 bytes
    pub flags: u32,           // 4 bytes (32 byte stride)
}

impl MaterialData {
    pub fn from_params(params: &MaterialParams) -> Self {
        Self {
            base_color: params.base_color,
            metallic: params.metallic,
            roughness: params.roughness,
            emissive: params.emissive,
            flags: if params.unlit { MATERIAL_UNLIT } else { 0 },
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, Default)]
pub struct FrameUniform {
    pub jitter: [f32; 2],    // 8 bytes
    pub frame_index: u32,    // 4 bytes
    pub drawable_count: u32, // 4 bytes (16 byte stride)
}

impl FrameUniform {
    pub fn new(jitter: [f32; 2], frame_index: u32, drawable_count: u32) -> Self {
        Self {
            jitter,
            frame_index,
            drawable_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_data_is_80_bytes() {
        // 64 (model) + 4 (bindless base) + 4 (flags) + 8 padding
        assert_eq!(std::mem::size_of::<ObjectData>(), 80);
    }

    #[test]
    fn history_data_is_64_bytes() {
        assert_eq!(std::mem::size_of::<HistoryData>(), 64);
    }

    #[test]
    fn material_data_is_32_bytes() {
        assert_eq!(std::mem::size_of::<MaterialData>(), 32);
    }

    #[test]
    fn frame_uniform_is_16_bytes() {
        assert_eq!(std::mem::size_of::<FrameUniform>(), 16);
    }

    #[test]
    fn material_record_carries_unlit_flag() {
        let params = MaterialParams::new([0.5, 0.25, 0.125, 1.0])
            .with_metallic(0.75)
            .unlit();
        let record = MaterialData::from_params(&params);

        assert_eq!(record.base_color, [0.5, 0.25, 0.125, 1.0]);
        assert!((record.metallic - 0.75).abs() < 1e-6);
        assert_eq!(record.flags & MATERIAL_UNLIT, MATERIAL_UNLIT);
    }
}

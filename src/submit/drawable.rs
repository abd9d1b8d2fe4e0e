use std::collections::BTreeMap;

use bitflags::bitflags;
use glam::Mat4;

use crate::asset::{GpuBuffer, Handle, Mesh, Texture};
use crate::submit::material::MaterialParams;
use crate::submit::pipeline::PipelineSpec;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DrawableFlags: u32 {
        /// Geometry comes from buffers the producer manages itself rather
        /// than a shared mesh pool.
        const OWNS_VERTEX_BUFFERS = 1 << 0;
        /// Material record is shared with other drawables staged this frame.
        const SHARED_MATERIAL = 1 << 1;
    }
}

/// Engine-owned sampler selection; samplers carry no caller identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SamplerKind {
    Linear,
    Nearest,
}

/// A resource bound at one slot of a drawable's binding map, by handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundResource {
    Uniform(Handle<GpuBuffer>),
    Storage(Handle<GpuBuffer>),
    Texture(Handle<Texture>),
    Sampler(SamplerKind),
}

impl BoundResource {
    pub(crate) fn kind(&self) -> BindingKind {
        match self {
            BoundResource::Uniform(_) => BindingKind::UniformBuffer,
            BoundResource::Storage(_) => BindingKind::StorageBuffer,
            BoundResource::Texture(_) => BindingKind::SampledTexture,
            BoundResource::Sampler(kind) => BindingKind::Sampler(*kind),
        }
    }
}

/// Binding shape with resource identity erased; see [`BindingMap::layout_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum BindingKind {
    UniformBuffer,
    StorageBuffer,
    SampledTexture,
    Sampler(SamplerKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingEntry {
    pub resource: BoundResource,
    pub visibility: wgpu::ShaderStages,
}

/// Ordered map of binding slot to resource for one drawable.
///
/// Slot order is part of the value: two maps binding the same resources at
/// the same slots are equal regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BindingMap {
    entries: BTreeMap<u32, BindingEntry>,
}

impl BindingMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, slot: u32, resource: BoundResource, visibility: wgpu::ShaderStages) {
        self.entries.insert(
            slot,
            BindingEntry {
                resource,
                visibility,
            },
        );
    }

    pub fn uniform(mut self, slot: u32, buffer: Handle<GpuBuffer>) -> Self {
        self.bind(
            slot,
            BoundResource::Uniform(buffer),
            wgpu::ShaderStages::VERTEX_FRAGMENT,
        );
        self
    }

    pub fn storage(mut self, slot: u32, buffer: Handle<GpuBuffer>) -> Self {
        self.bind(
            slot,
            BoundResource::Storage(buffer),
            wgpu::ShaderStages::VERTEX_FRAGMENT,
        );
        self
    }

    pub fn texture(mut self, slot: u32, texture: Handle<Texture>) -> Self {
        self.bind(
            slot,
            BoundResource::Texture(texture),
            wgpu::ShaderStages::FRAGMENT,
        );
        self
    }

    pub fn sampler(mut self, slot: u32, kind: SamplerKind) -> Self {
        self.bind(
            slot,
            BoundResource::Sampler(kind),
            wgpu::ShaderStages::FRAGMENT,
        );
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (u32, &BindingEntry)> {
        self.entries.iter().map(|(slot, entry)| (*slot, entry))
    }

    /// Canonical shape of this map: slot, resource type and visibility with
    /// the identity-bearing handles erased. Maps that differ only in which
    /// buffer or texture is bound produce the same key and therefore share
    /// one layout object.
    pub(crate) fn layout_key(&self) -> super::internal::bindings::LayoutKey {
        super::internal::bindings::LayoutKey::fixed(
            self.entries
                .iter()
                .map(|(slot, entry)| (*slot, entry.resource.kind(), entry.visibility))
                .collect(),
        )
    }
}

/// One frame's request to draw one object.
///
/// Created by the producer each frame; content is its only identity. The
/// engine fills in `bindless_base` during table construction and otherwise
/// never mutates a drawable.
#[derive(Debug, Clone)]
pub struct Drawable {
    pub mesh: Handle<Mesh>,
    pub pipeline: PipelineSpec,
    pub bindings: BindingMap,
    /// Textures this draw samples through the shared table, in shader order.
    pub textures: Vec<Handle<Texture>>,
    pub transform: Mat4,
    /// Last frame's transform when the producer tracked one; `None` falls
    /// back to `transform` in the history array.
    pub previous_transform: Option<Mat4>,
    pub material: MaterialParams,
    pub flags: DrawableFlags,
    pub(crate) bindless_base: u32,
}

impl Drawable {
    pub fn new(mesh: Handle<Mesh>, pipeline: PipelineSpec) -> Self {
        Self {
            mesh,
            pipeline,
            bindings: BindingMap::new(),
            textures: Vec::new(),
            transform: Mat4::IDENTITY,
            previous_transform: None,
            material: MaterialParams::default(),
            flags: DrawableFlags::empty(),
            bindless_base: 0,
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_previous_transform(mut self, transform: Mat4) -> Self {
        self.previous_transform = Some(transform);
        self
    }

    pub fn with_material(mut self, material: MaterialParams) -> Self {
        self.material = material;
        self
    }

    pub fn with_bindings(mut self, bindings: BindingMap) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn with_textures(mut self, textures: Vec<Handle<Texture>>) -> Self {
        self.textures = textures;
        self
    }

    pub fn with_flags(mut self, flags: DrawableFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Base offset into the frame's bindless table, valid after the table
    /// has been built for the frame this drawable was taken in.
    pub fn bindless_base(&self) -> u32 {
        self.bindless_base
    }
}

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::asset::{Assets, Handle, Mesh};
use crate::submit::drawable::{BindingKind, BindingMap, BoundResource, SamplerKind};
use crate::submit::error::SubmitError;

/// Canonical binding shape: slot, resource type and visibility, with the
/// handles erased. Variable-count layouts (the texture table) live in their
/// own partition so they never unify with a fixed layout of the same static
/// shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct LayoutKey {
    entries: Vec<(u32, BindingKind, wgpu::ShaderStages)>,
    variable_count: Option<NonZeroU32>,
}

impl LayoutKey {
    pub(crate) fn fixed(entries: Vec<(u32, BindingKind, wgpu::ShaderStages)>) -> Self {
        Self {
            entries,
            variable_count: None,
        }
    }

    pub(crate) fn variable(entries: Vec<(u32, BindingKind, wgpu::ShaderStages)>, count: NonZeroU32) -> Self {
        Self {
            entries,
            variable_count: Some(count),
        }
    }
}

/// Full identity of one binding-set object: the mesh it draws and every
/// bound resource including which buffer/texture sits at each slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SetKey {
    pub mesh: Handle<Mesh>,
    pub bindings: BindingMap,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BindingCacheStats {
    pub set_hits: u32,
    pub set_misses: u32,
}

/// Content-addressed cache of binding-set layouts and objects with
/// two-generation recycling.
///
/// Lookups search the `current` generation (entries the previous frame
/// produced, possibly still referenced by in-flight GPU work) and move hits
/// into `next`; misses create into `next`. `end_frame` drops whatever the
/// frame did not touch and swaps the maps, so a stable binding pattern
/// converges to a single allocation per distinct set.
pub(crate) struct BindingCache {
    layouts_current: HashMap<LayoutKey, Arc<wgpu::BindGroupLayout>>,
    layouts_next: HashMap<LayoutKey, Arc<wgpu::BindGroupLayout>>,
    sets_current: HashMap<SetKey, Arc<wgpu::BindGroup>>,
    sets_next: HashMap<SetKey, Arc<wgpu::BindGroup>>,
    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,
    stats: BindingCacheStats,
}

impl BindingCache {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        Self {
            layouts_current: HashMap::new(),
            layouts_next: HashMap::new(),
            sets_current: HashMap::new(),
            sets_next: HashMap::new(),
            linear_sampler: create_sampler(device, wgpu::FilterMode::Linear, "BindingSamplerLinear"),
            nearest_sampler: create_sampler(
                device,
                wgpu::FilterMode::Nearest,
                "BindingSamplerNearest",
            ),
            stats: BindingCacheStats::default(),
        }
    }

    pub(crate) fn resolve_layout(
        &mut self,
        device: &wgpu::Device,
        key: &LayoutKey,
    ) -> Arc<wgpu::BindGroupLayout> {
        if let Some(layout) = self.layouts_current.remove(key) {
            self.layouts_next.insert(key.clone(), layout.clone());
            return layout;
        }
        if let Some(layout) = self.layouts_next.get(key) {
            return layout.clone();
        }

        log::debug!("Creating binding layout for shape {:?}", key);
        let layout = Arc::new(create_layout(device, key));
        self.layouts_next.insert(key.clone(), layout.clone());
        layout
    }

    pub(crate) fn resolve_set(
        &mut self,
        device: &wgpu::Device,
        assets: &Assets,
        key: SetKey,
        layout: &wgpu::BindGroupLayout,
    ) -> Result<Arc<wgpu::BindGroup>, SubmitError> {
        if let Some(set) = self.sets_current.remove(&key) {
            // Identical key means identical contents; the reused object needs
            // no rewrite because bind groups are immutable by construction.
            self.stats.set_hits += 1;
            self.sets_next.insert(key, set.clone());
            return Ok(set);
        }
        if let Some(set) = self.sets_next.get(&key) {
            self.stats.set_hits += 1;
            return Ok(set.clone());
        }

        self.stats.set_misses += 1;
        let set = Arc::new(self.create_set(device, assets, &key, layout)?);
        self.sets_next.insert(key, set.clone());
        Ok(set)
    }

    /// Retire the untouched generation and make this frame's entries the
    /// lookup source for the next one.
    pub(crate) fn end_frame(&mut self) {
        let retired = self.layouts_current.len() + self.sets_current.len();
        if retired > 0 {
            log::trace!("Retiring {} unused binding objects", retired);
        }
        self.layouts_current = std::mem::take(&mut self.layouts_next);
        self.sets_current = std::mem::take(&mut self.sets_next);
    }

    pub(crate) fn reset(&mut self) {
        self.layouts_current.clear();
        self.layouts_next.clear();
        self.sets_current.clear();
        self.sets_next.clear();
        self.stats = BindingCacheStats::default();
    }

    pub(crate) fn take_stats(&mut self) -> BindingCacheStats {
        std::mem::take(&mut self.stats)
    }

    #[cfg(test)]
    pub(crate) fn live_sets(&self) -> usize {
        self.sets_current.len() + self.sets_next.len()
    }

    fn create_set(
        &self,
        device: &wgpu::Device,
        assets: &Assets,
        key: &SetKey,
        layout: &wgpu::BindGroupLayout,
    ) -> Result<wgpu::BindGroup, SubmitError> {
        let mut entries = Vec::with_capacity(key.bindings.len());
        for (slot, entry) in key.bindings.iter() {
            let resource = match entry.resource {
                BoundResource::Uniform(handle) | BoundResource::Storage(handle) => {
                    let buffer = assets.buffers.get(handle).ok_or(SubmitError::UnknownHandle {
                        kind: "buffer",
                        index: handle.index(),
                    })?;
                    buffer.buffer.as_entire_binding()
                }
                BoundResource::Texture(handle) => {
                    let texture =
                        assets
                            .textures
                            .get(handle)
                            .ok_or(SubmitError::UnknownHandle {
                                kind: "texture",
                                index: handle.index(),
                            })?;
                    wgpu::BindingResource::TextureView(&texture.view)
                }
                BoundResource::Sampler(SamplerKind::Linear) => {
                    wgpu::BindingResource::Sampler(&self.linear_sampler)
                }
                BoundResource::Sampler(SamplerKind::Nearest) => {
                    wgpu::BindingResource::Sampler(&self.nearest_sampler)
                }
            };
            entries.push(wgpu::BindGroupEntry {
                binding: slot,
                resource,
            });
        }

        Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("DrawableBindGroup"),
            layout,
            entries: &entries,
        }))
    }
}

fn create_layout(device: &wgpu::Device, key: &LayoutKey) -> wgpu::BindGroupLayout {
    let entries: Vec<wgpu::BindGroupLayoutEntry> = key
        .entries
        .iter()
        .map(|&(slot, kind, visibility)| wgpu::BindGroupLayoutEntry {
            binding: slot,
            visibility,
            ty: match kind {
                BindingKind::UniformBuffer => wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                BindingKind::StorageBuffer => wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                BindingKind::SampledTexture => wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                BindingKind::Sampler(SamplerKind::Linear) => {
                    wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
                }
                BindingKind::Sampler(SamplerKind::Nearest) => {
                    wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering)
                }
            },
            count: if key.variable_count.is_some() && kind == BindingKind::SampledTexture {
                key.variable_count
            } else {
                None
            },
        })
        .collect();

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("DrawableBindLayout"),
        entries: &entries,
    })
}

fn create_sampler(device: &wgpu::Device, filter: wgpu::FilterMode, label: &str) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: filter,
        ..Default::default()
    })
}

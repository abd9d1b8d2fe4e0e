use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::asset::{Assets, Handle, Mesh, Texture};
use crate::submit::drawable::{BindingKind, Drawable, SamplerKind};
use crate::submit::error::SubmitError;
use crate::submit::internal::bindings::LayoutKey;

/// Textures bound per run when the device cannot index a texture array.
pub(crate) const TEXTURES_PER_DRAW: usize = 4;

/// Key under which drawables share a contiguous range of the table.
pub(crate) type TableKey = (Handle<Mesh>, Vec<Handle<Texture>>);

/// Frame-scoped table of texture references plus per-key base offsets.
///
/// Only drawables with an identical (mesh, texture-list) key share storage;
/// the same texture referenced from two different keys is appended twice.
#[derive(Debug, Default)]
pub(crate) struct BindlessTable {
    entries: Vec<Handle<Texture>>,
    bases: HashMap<TableKey, u32>,
}

impl BindlessTable {
    /// Walk the taken drawables in staged order, assign base offsets and
    /// stamp each drawable with its resolved base.
    pub(crate) fn build(drawables: &mut [Drawable]) -> Self {
        let mut table = Self::default();

        for drawable in drawables.iter_mut() {
            let key = (drawable.mesh, drawable.textures.clone());
            let entries = &mut table.entries;
            let textures = &drawable.textures;
            let base = *table.bases.entry(key).or_insert_with(|| {
                let base = entries.len() as u32;
                entries.extend(textures.iter().copied());
                base
            });
            drawable.bindless_base = base;
        }

        table
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn entries(&self) -> &[Handle<Texture>] {
        &self.entries
    }

    #[cfg(test)]
    pub(crate) fn base_of(&self, key: &TableKey) -> Option<u32> {
        self.bases.get(key).copied()
    }
}

/// How drawable textures reach the shaders this frame.
pub(crate) enum TextureBinding {
    /// One variable-count array holding the whole table, indexed
    /// `table[base + local]` per draw.
    Table(TextureTableBinder),
    /// Fixed per-run bindings for devices without array indexing; mesh runs
    /// additionally split on the texture list in this mode.
    Classic(ClassicTextureBinder),
}

impl TextureBinding {
    pub(crate) fn new(device: &wgpu::Device, capacity: u32) -> Self {
        let arrays_supported = device
            .features()
            .contains(wgpu::Features::TEXTURE_BINDING_ARRAY)
            && device.features().contains(
                wgpu::Features::SAMPLED_TEXTURE_AND_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING,
            );

        if arrays_supported {
            log::info!("Texture table binding enabled ({} entries)", capacity);
            TextureBinding::Table(TextureTableBinder::new(device, capacity))
        } else {
            log::warn!("Texture arrays not supported; falling back to per-run texture binding");
            TextureBinding::Classic(ClassicTextureBinder::new(device))
        }
    }

    pub(crate) fn is_table(&self) -> bool {
        matches!(self, TextureBinding::Table(_))
    }

    pub(crate) fn layout(&self) -> &Arc<wgpu::BindGroupLayout> {
        match self {
            TextureBinding::Table(binder) => &binder.layout,
            TextureBinding::Classic(binder) => &binder.layout,
        }
    }

    pub(crate) fn layout_key(&self) -> LayoutKey {
        let sampler_slots = vec![
            (
                1,
                BindingKind::Sampler(SamplerKind::Linear),
                wgpu::ShaderStages::FRAGMENT,
            ),
            (
                2,
                BindingKind::Sampler(SamplerKind::Nearest),
                wgpu::ShaderStages::FRAGMENT,
            ),
        ];
        match self {
            TextureBinding::Table(binder) => {
                let mut entries = vec![(
                    0,
                    BindingKind::SampledTexture,
                    wgpu::ShaderStages::FRAGMENT,
                )];
                entries.extend(sampler_slots);
                LayoutKey::variable(entries, NonZeroU32::new(binder.capacity).expect("capacity"))
            }
            TextureBinding::Classic(_) => {
                let mut entries: Vec<_> = (0..TEXTURES_PER_DRAW as u32)
                    .map(|slot| {
                        (
                            slot,
                            BindingKind::SampledTexture,
                            wgpu::ShaderStages::FRAGMENT,
                        )
                    })
                    .collect();
                entries.push((
                    TEXTURES_PER_DRAW as u32,
                    BindingKind::Sampler(SamplerKind::Linear),
                    wgpu::ShaderStages::FRAGMENT,
                ));
                entries.push((
                    TEXTURES_PER_DRAW as u32 + 1,
                    BindingKind::Sampler(SamplerKind::Nearest),
                    wgpu::ShaderStages::FRAGMENT,
                ));
                LayoutKey::fixed(entries)
            }
        }
    }

    pub(crate) fn reset(&mut self) {
        if let TextureBinding::Classic(binder) = self {
            binder.run_groups.clear();
        }
    }
}

/// Owns the variable-count table bind group, padded to capacity with a 1x1
/// fallback view. Rebuilt only when the table contents change.
pub(crate) struct TextureTableBinder {
    pub(crate) layout: Arc<wgpu::BindGroupLayout>,
    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,
    _fallback_texture: wgpu::Texture,
    fallback_view: wgpu::TextureView,
    bind_group: Arc<wgpu::BindGroup>,
    capacity: u32,
    last_entries: Vec<Handle<Texture>>,
}

impl TextureTableBinder {
    fn new(device: &wgpu::Device, capacity: u32) -> Self {
        let layout = Arc::new(
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("TextureTableBindLayout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: NonZeroU32::new(capacity),
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                        count: None,
                    },
                ],
            }),
        );

        let linear_sampler = table_sampler(device, wgpu::FilterMode::Linear, "TableSamplerLinear");
        let nearest_sampler =
            table_sampler(device, wgpu::FilterMode::Nearest, "TableSamplerNearest");

        let fallback_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("TableFallbackTexture"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let fallback_view = fallback_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = Arc::new(Self::create_bind_group(
            device,
            &layout,
            &linear_sampler,
            &nearest_sampler,
            vec![&fallback_view; capacity as usize],
        ));

        Self {
            layout,
            linear_sampler,
            nearest_sampler,
            _fallback_texture: fallback_texture,
            fallback_view,
            bind_group,
            capacity,
            last_entries: Vec::new(),
        }
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        linear_sampler: &wgpu::Sampler,
        nearest_sampler: &wgpu::Sampler,
        views: Vec<&wgpu::TextureView>,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("TextureTableBindGroup"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureViewArray(&views),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(linear_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(nearest_sampler),
                },
            ],
        })
    }

    /// Rebuild the padded view array when the frame's table changed. Runs
    /// before any draw is recorded so every entry is ready to sample.
    pub(crate) fn update(
        &mut self,
        device: &wgpu::Device,
        assets: &Assets,
        table: &BindlessTable,
    ) -> Result<Arc<wgpu::BindGroup>, SubmitError> {
        if table.len() > self.capacity as usize {
            return Err(SubmitError::TableCapacityExceeded {
                required: table.len(),
                capacity: self.capacity as usize,
            });
        }

        if table.entries() == self.last_entries.as_slice() {
            return Ok(self.bind_group.clone());
        }

        let fallback = &self.fallback_view;
        let mut views: Vec<&wgpu::TextureView> = Vec::with_capacity(self.capacity as usize);
        for &handle in table.entries() {
            let view = assets
                .textures
                .get(handle)
                .map(|texture| &texture.view)
                .ok_or(SubmitError::UnknownHandle {
                    kind: "texture",
                    index: handle.index(),
                })?;
            views.push(view);
        }
        views.resize(self.capacity as usize, fallback);

        self.bind_group = Arc::new(Self::create_bind_group(
            device,
            &self.layout,
            &self.linear_sampler,
            &self.nearest_sampler,
            views,
        ));
        self.last_entries = table.entries().to_vec();

        log::debug!("Rebuilt texture table with {} entries", table.len());
        Ok(self.bind_group.clone())
    }
}

/// Per-run fixed bindings for devices without texture arrays; bind groups
/// are cached by the run's texture list.
pub(crate) struct ClassicTextureBinder {
    pub(crate) layout: Arc<wgpu::BindGroupLayout>,
    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,
    _fallback_texture: wgpu::Texture,
    fallback_view: wgpu::TextureView,
    run_groups: HashMap<Vec<Handle<Texture>>, Arc<wgpu::BindGroup>>,
}

impl ClassicTextureBinder {
    fn new(device: &wgpu::Device) -> Self {
        let mut entries: Vec<wgpu::BindGroupLayoutEntry> = (0..TEXTURES_PER_DRAW as u32)
            .map(|binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            })
            .collect();
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: TEXTURES_PER_DRAW as u32,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: TEXTURES_PER_DRAW as u32 + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
            count: None,
        });

        let layout = Arc::new(
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("ClassicTextureBindLayout"),
                entries: &entries,
            }),
        );

        let fallback_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("ClassicFallbackTexture"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let fallback_view = fallback_texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            layout,
            linear_sampler: table_sampler(device, wgpu::FilterMode::Linear, "ClassicSamplerLinear"),
            nearest_sampler: table_sampler(
                device,
                wgpu::FilterMode::Nearest,
                "ClassicSamplerNearest",
            ),
            _fallback_texture: fallback_texture,
            fallback_view,
            run_groups: HashMap::new(),
        }
    }

    pub(crate) fn bind_group_for_run(
        &mut self,
        device: &wgpu::Device,
        assets: &Assets,
        textures: &[Handle<Texture>],
    ) -> Arc<wgpu::BindGroup> {
        if let Some(group) = self.run_groups.get(textures) {
            return group.clone();
        }

        if textures.len() > TEXTURES_PER_DRAW {
            log::warn!(
                "Run references {} textures; only the first {} are bound in classic mode",
                textures.len(),
                TEXTURES_PER_DRAW
            );
        }

        let fallback = &self.fallback_view;
        let views: Vec<&wgpu::TextureView> = (0..TEXTURES_PER_DRAW)
            .map(|i| {
                textures
                    .get(i)
                    .and_then(|&handle| assets.textures.get(handle))
                    .map(|texture| &texture.view)
                    .unwrap_or(fallback)
            })
            .collect();

        let mut entries: Vec<wgpu::BindGroupEntry> = views
            .iter()
            .enumerate()
            .map(|(i, view)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: TEXTURES_PER_DRAW as u32,
            resource: wgpu::BindingResource::Sampler(&self.linear_sampler),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: TEXTURES_PER_DRAW as u32 + 1,
            resource: wgpu::BindingResource::Sampler(&self.nearest_sampler),
        });

        let group = Arc::new(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ClassicTextureBindGroup"),
            layout: &self.layout,
            entries: &entries,
        }));
        self.run_groups.insert(textures.to_vec(), group.clone());
        group
    }
}

fn table_sampler(device: &wgpu::Device, filter: wgpu::FilterMode, label: &str) -> wgpu::Sampler {
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

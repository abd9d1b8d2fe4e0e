use std::mem;
use std::sync::Arc;

use crate::submit::drawable::Drawable;
use crate::submit::objects::{FrameUniform, HistoryData, MaterialData, ObjectData};

/// Pack the three index-aligned record arrays, one entry per drawable in
/// taken order. The history entry falls back to the current transform when
/// the producer supplied none.
pub(crate) fn pack_records(
    drawables: &[Drawable],
) -> (Vec<ObjectData>, Vec<HistoryData>, Vec<MaterialData>) {
    let mut objects = Vec::with_capacity(drawables.len());
    let mut history = Vec::with_capacity(drawables.len());
    let mut materials = Vec::with_capacity(drawables.len());

    for drawable in drawables {
        objects.push(ObjectData::from_drawable(drawable));
        history.push(HistoryData::from_drawable(drawable));
        materials.push(MaterialData::from_params(&drawable.material));
    }

    (objects, history, materials)
}

/// The engine-owned bind group layout shared by every frame slot: frame
/// uniform plus the three per-drawable storage arrays.
pub(crate) fn create_frame_layout(device: &wgpu::Device) -> Arc<wgpu::BindGroupLayout> {
    let storage_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };

    Arc::new(
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("FrameBindLayout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            mem::size_of::<FrameUniform>() as u64
                        ),
                    },
                    count: None,
                },
                storage_entry(1),
                storage_entry(2),
                storage_entry(3),
            ],
        }),
    )
}

/// One slot's storage buffers: transform, transform-history and material
/// arrays plus the frame uniform, bound together at group 0.
///
/// Buffers grow double-or-required and are otherwise overwritten in place;
/// three bulk uploads replace per-draw uniform updates.
pub(crate) struct FrameStorageBuffers {
    objects: wgpu::Buffer,
    history: wgpu::Buffer,
    materials: wgpu::Buffer,
    frame_uniform: wgpu::Buffer,
    capacity: u32,
    bind_group: wgpu::BindGroup,
    bind_layout: Arc<wgpu::BindGroupLayout>,
}

impl FrameStorageBuffers {
    pub(crate) fn new(
        device: &wgpu::Device,
        layout: Arc<wgpu::BindGroupLayout>,
        capacity: u32,
    ) -> Self {
        let capacity = capacity.max(1);
        let objects = create_storage(device, "FrameObjectsBuffer", capacity as usize * mem::size_of::<ObjectData>());
        let history = create_storage(device, "FrameHistoryBuffer", capacity as usize * mem::size_of::<HistoryData>());
        let materials = create_storage(device, "FrameMaterialsBuffer", capacity as usize * mem::size_of::<MaterialData>());

        let frame_uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("FrameUniformBuffer"),
            size: mem::size_of::<FrameUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = create_bind_group(
            device,
            &layout,
            &frame_uniform,
            &objects,
            &history,
            &materials,
        );

        Self {
            objects,
            history,
            materials,
            frame_uniform,
            capacity,
            bind_group,
            bind_layout: layout,
        }
    }

    pub(crate) fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub(crate) fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Upload the frame's records, growing the arrays first if the drawable
    /// count exceeds the current capacity.
    pub(crate) fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        drawables: &[Drawable],
        uniform: FrameUniform,
    ) {
        let (objects, history, materials) = pack_records(drawables);

        let required = objects.len() as u32;
        if required > self.capacity {
            self.grow(device, required);
        }

        if !objects.is_empty() {
            queue.write_buffer(&self.objects, 0, bytemuck::cast_slice(&objects));
            queue.write_buffer(&self.history, 0, bytemuck::cast_slice(&history));
            queue.write_buffer(&self.materials, 0, bytemuck::cast_slice(&materials));
        }
        queue.write_buffer(&self.frame_uniform, 0, bytemuck::bytes_of(&uniform));
    }

    fn grow(&mut self, device: &wgpu::Device, required: u32) {
        let new_capacity = required.max(self.capacity * 2);
        log::info!(
            "Growing frame storage buffers: {} -> {}",
            self.capacity,
            new_capacity
        );

        self.objects = create_storage(
            device,
            "FrameObjectsBuffer",
            new_capacity as usize * mem::size_of::<ObjectData>(),
        );
        self.history = create_storage(
            device,
            "FrameHistoryBuffer",
            new_capacity as usize * mem::size_of::<HistoryData>(),
        );
        self.materials = create_storage(
            device,
            "FrameMaterialsBuffer",
            new_capacity as usize * mem::size_of::<MaterialData>(),
        );

        self.bind_group = create_bind_group(
            device,
            &self.bind_layout,
            &self.frame_uniform,
            &self.objects,
            &self.history,
            &self.materials,
        );
        self.capacity = new_capacity;
    }
}

fn create_storage(device: &wgpu::Device, label: &str, size: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size as u64,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    frame_uniform: &wgpu::Buffer,
    objects: &wgpu::Buffer,
    history: &wgpu::Buffer,
    materials: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("FrameBindGroup"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_uniform.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: objects.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: history.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: materials.as_entire_binding(),
            },
        ],
    })
}

use std::mem;

use bytemuck::{Pod, Zeroable};

use crate::asset::Assets;
use crate::submit::internal::batches::PipelineGroup;

/// Matches wgpu's indexed indirect command layout.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct DrawIndexedParams {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

/// Matches wgpu's non-indexed indirect command layout.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct DrawParams {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

/// Where one mesh run's parameter records live.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RunCommands {
    pub indexed: bool,
    /// Record index into the indexed or non-indexed scratch array.
    pub first: u32,
    pub count: u32,
}

impl RunCommands {
    pub(crate) fn byte_offset(&self) -> u64 {
        let stride = if self.indexed {
            mem::size_of::<DrawIndexedParams>()
        } else {
            mem::size_of::<DrawParams>()
        };
        self.first as u64 * stride as u64
    }
}

/// Per-object draw parameters for the frame, split into the two parallel
/// buffers (indexed and non-indexed meshes route to exactly one).
#[derive(Debug, Default)]
pub(crate) struct FrameCommands {
    pub indexed: Vec<DrawIndexedParams>,
    pub plain: Vec<DrawParams>,
    /// One entry per run, in group order.
    pub runs: Vec<RunCommands>,
}

impl FrameCommands {
    /// Write one parameter record per object. `first_instance` carries the
    /// object's storage-buffer slot so shaders recover per-object data via
    /// the instance index.
    pub(crate) fn build(assets: &Assets, groups: &[PipelineGroup]) -> Self {
        let mut commands = Self::default();

        for group in groups {
            for run in &group.runs {
                let Some(mesh) = assets.meshes.get(run.mesh) else {
                    log::warn!("Skipping run with invalid mesh handle {:?}", run.mesh);
                    commands.runs.push(RunCommands {
                        indexed: false,
                        first: commands.plain.len() as u32,
                        count: 0,
                    });
                    continue;
                };

                let run_commands = if let Some(indices) = mesh.indices() {
                    let first = commands.indexed.len() as u32;
                    for &slot in &run.objects {
                        commands.indexed.push(DrawIndexedParams {
                            index_count: indices.count,
                            instance_count: 1,
                            first_index: 0,
                            base_vertex: 0,
                            first_instance: slot,
                        });
                    }
                    RunCommands {
                        indexed: true,
                        first,
                        count: run.objects.len() as u32,
                    }
                } else {
                    let first = commands.plain.len() as u32;
                    for &slot in &run.objects {
                        commands.plain.push(DrawParams {
                            vertex_count: mesh.vertex_count(),
                            instance_count: 1,
                            first_vertex: 0,
                            first_instance: slot,
                        });
                    }
                    RunCommands {
                        indexed: false,
                        first,
                        count: run.objects.len() as u32,
                    }
                };

                commands.runs.push(run_commands);
            }
        }

        commands
    }
}

/// One slot's pair of host-visible indirect parameter buffers.
pub(crate) struct IndirectBuffers {
    indexed: wgpu::Buffer,
    indexed_capacity: u32,
    plain: wgpu::Buffer,
    plain_capacity: u32,
}

impl IndirectBuffers {
    pub(crate) fn new(device: &wgpu::Device, capacity: u32) -> Self {
        let capacity = capacity.max(1);
        Self {
            indexed: create_indirect(
                device,
                "IndirectIndexedBuffer",
                capacity as usize * mem::size_of::<DrawIndexedParams>(),
            ),
            indexed_capacity: capacity,
            plain: create_indirect(
                device,
                "IndirectBuffer",
                capacity as usize * mem::size_of::<DrawParams>(),
            ),
            plain_capacity: capacity,
        }
    }

    pub(crate) fn indexed(&self) -> &wgpu::Buffer {
        &self.indexed
    }

    pub(crate) fn plain(&self) -> &wgpu::Buffer {
        &self.plain
    }

    pub(crate) fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        commands: &FrameCommands,
    ) {
        let required_indexed = commands.indexed.len() as u32;
        if required_indexed > self.indexed_capacity {
            let new_capacity = required_indexed.max(self.indexed_capacity * 2);
            log::info!(
                "Growing indexed indirect buffer: {} -> {}",
                self.indexed_capacity,
                new_capacity
            );
            self.indexed = create_indirect(
                device,
                "IndirectIndexedBuffer",
                new_capacity as usize * mem::size_of::<DrawIndexedParams>(),
            );
            self.indexed_capacity = new_capacity;
        }

        let required_plain = commands.plain.len() as u32;
        if required_plain > self.plain_capacity {
            let new_capacity = required_plain.max(self.plain_capacity * 2);
            log::info!(
                "Growing indirect buffer: {} -> {}",
                self.plain_capacity,
                new_capacity
            );
            self.plain = create_indirect(
                device,
                "IndirectBuffer",
                new_capacity as usize * mem::size_of::<DrawParams>(),
            );
            self.plain_capacity = new_capacity;
        }

        if !commands.indexed.is_empty() {
            queue.write_buffer(&self.indexed, 0, bytemuck::cast_slice(&commands.indexed));
        }
        if !commands.plain.is_empty() {
            queue.write_buffer(&self.plain, 0, bytemuck::cast_slice(&commands.plain));
        }
    }
}

fn create_indirect(device: &wgpu::Device, label: &str, size: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size as u64,
        usage: wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

use std::sync::Arc;

use crate::submit::internal::buffers::FrameStorageBuffers;
use crate::submit::internal::indirect::IndirectBuffers;

/// One slot of the frame-resource ring.
///
/// A slot's buffers are rewritten every N-th frame; the caller keeps prior
/// GPU work on them out of flight, either by tracking the returned slot
/// index or by running a ring deep enough to absorb the lag.
pub(crate) struct FrameSlot {
    pub storage: FrameStorageBuffers,
    pub indirect: IndirectBuffers,
    /// Frame counter value of the last advance that wrote this slot.
    pub last_used_frame: u64,
}

impl FrameSlot {
    pub(crate) fn new(
        device: &wgpu::Device,
        frame_layout: Arc<wgpu::BindGroupLayout>,
        object_capacity: u32,
        draw_capacity: u32,
    ) -> Self {
        Self {
            storage: FrameStorageBuffers::new(device, frame_layout, object_capacity),
            indirect: IndirectBuffers::new(device, draw_capacity),
            last_used_frame: 0,
        }
    }
}

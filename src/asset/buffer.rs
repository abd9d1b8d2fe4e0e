/// Caller-owned uniform or storage buffer bound through a drawable's
/// binding map. The engine never writes into these.
pub struct GpuBuffer {
    pub buffer: wgpu::Buffer,
    pub size: u64,
}

impl GpuBuffer {
    pub fn new(buffer: wgpu::Buffer) -> Self {
        let size = buffer.size();
        Self { buffer, size }
    }
}

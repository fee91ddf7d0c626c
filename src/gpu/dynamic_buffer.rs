//! Grow-only GPU buffers for per-draw instance and uniform data.
//!
//! Buffers double when data exceeds capacity and never shrink, so steady
//! state frames only issue `write_buffer` calls.

/// Smallest allocation handed to wgpu.
const MIN_CAPACITY: usize = 64;

/// New capacity for `needed` bytes, or `None` when `current` suffices.
///
/// Growth is 2x the requirement and at least 1KB over the old capacity.
fn grown_capacity(current: usize, needed: usize) -> Option<usize> {
    (needed > current).then(|| (needed * 2).max(current + 1024))
}

/// A GPU buffer that can grow dynamically.
pub struct DynamicBuffer {
    buffer: wgpu::Buffer,
    capacity: usize,
    usage: wgpu::BufferUsages,
    label: String,
}

impl DynamicBuffer {
    /// Buffer with the given initial byte capacity.
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        initial_capacity: usize,
        usage: wgpu::BufferUsages,
    ) -> Self {
        let capacity = initial_capacity.max(MIN_CAPACITY);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity as u64,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            buffer,
            capacity,
            usage,
            label: label.to_owned(),
        }
    }

    /// Write raw bytes to the buffer, growing if necessary.
    ///
    /// Returns `true` if the buffer was reallocated (bind groups need
    /// recreation).
    pub fn write_bytes(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data: &[u8],
    ) -> bool {
        let needed = data.len();
        let reallocated = if let Some(new_capacity) =
            grown_capacity(self.capacity, needed)
        {
            log::debug!(
                "{}: growing {} -> {} bytes",
                self.label,
                self.capacity,
                new_capacity
            );
            self.buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&self.label),
                size: new_capacity as u64,
                usage: self.usage | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.capacity = new_capacity;
            true
        } else {
            false
        };

        if needed > 0 {
            queue.write_buffer(&self.buffer, 0, data);
        }

        reallocated
    }

    /// The underlying `wgpu::Buffer`.
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

/// Typed wrapper for [`DynamicBuffer`] holding vertex streams.
///
/// Vertex buffers are bound by slice on every draw, so unlike uniforms a
/// reallocation leaves nothing stale and is not reported.
pub struct TypedBuffer<T> {
    inner: DynamicBuffer,
    _marker: std::marker::PhantomData<T>,
}

impl<T: bytemuck::Pod> TypedBuffer<T> {
    /// Buffer with room for `capacity` items.
    pub fn with_capacity(
        device: &wgpu::Device,
        label: &str,
        capacity: usize,
        usage: wgpu::BufferUsages,
    ) -> Self {
        let initial_capacity = size_of::<T>() * capacity;
        Self {
            inner: DynamicBuffer::new(device, label, initial_capacity, usage),
            _marker: std::marker::PhantomData,
        }
    }

    /// Write data to the buffer, growing if necessary.
    pub fn write(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data: &[T],
    ) {
        let _ = self
            .inner
            .write_bytes(device, queue, bytemuck::cast_slice(data));
    }

    /// The underlying `wgpu::Buffer`.
    pub fn buffer(&self) -> &wgpu::Buffer {
        self.inner.buffer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_without_growth() {
        assert_eq!(grown_capacity(1024, 1024), None);
        assert_eq!(grown_capacity(1024, 0), None);
    }

    #[test]
    fn grows_to_twice_the_requirement() {
        assert_eq!(grown_capacity(1024, 4096), Some(8192));
    }

    #[test]
    fn small_overflow_grows_by_at_least_a_kilobyte() {
        assert_eq!(grown_capacity(64, 100), Some(64 + 1024));
    }
}

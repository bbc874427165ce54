// Transient upload staging.
//
// Staging buffers created mid-frame must outlive the command lists that read
// from them. The pool adopts each staging buffer at acquire time and only
// releases the lot when the caller has proven the GPU is done (a full flush
// or shutdown), never on a per-frame heuristic.

use ash::vk;
use std::sync::Arc;

use super::buffer::{self, GpuBuffer};
use super::RenderDevice;
use crate::error::DeviceResult;

/// Generic keep-alive pool. Pure bookkeeping, no GPU types, so the retention
/// rules are testable on their own.
#[derive(Debug, Default)]
pub struct TransientPool<T> {
    entries: Vec<T>,
}

impl<T> TransientPool<T> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Take ownership of a resource until the next `drain`.
    pub fn adopt(&mut self, entry: T) {
        self.entries.push(entry);
    }

    /// Release every pooled resource to the caller. Only valid once the GPU
    /// can no longer be reading any of them.
    pub fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Pool of host-visible staging buffers backing in-frame uploads.
pub struct UploadPool {
    device: Arc<RenderDevice>,
    pool: TransientPool<GpuBuffer>,
}

impl UploadPool {
    pub fn new(device: Arc<RenderDevice>) -> Self {
        Self {
            device,
            pool: TransientPool::new(),
        }
    }

    /// Create a staging buffer holding `data` and keep it alive until the
    /// next `drain`. Returns the buffer handle for recording copy commands.
    pub fn acquire(&mut self, name: &str, data: &[u8]) -> DeviceResult<vk::Buffer> {
        let staging = buffer::create_buffer_with_data(
            &self.device,
            name,
            vk::BufferUsageFlags::TRANSFER_SRC,
            data,
        )?;
        let handle = staging.buffer;
        self.pool.adopt(staging);
        Ok(handle)
    }

    /// Destroy all pooled staging buffers. The caller must have blocked until
    /// every submitted command list has completed.
    pub fn drain(&mut self) {
        let count = self.pool.len();
        for staging in self.pool.drain() {
            staging.destroy(&self.device);
        }
        if count > 0 {
            log::debug!("Drained {} staging buffers", count);
        }
    }

    pub fn pending(&self) -> usize {
        self.pool.len()
    }
}

impl Drop for UploadPool {
    fn drop(&mut self) {
        if !self.pool.is_empty() {
            log::warn!(
                "Upload pool dropped with {} live staging buffers; draining",
                self.pool.len()
            );
            self.drain();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adopt_accumulates_until_drain() {
        let mut pool = TransientPool::new();
        assert!(pool.is_empty());

        pool.adopt("a");
        pool.adopt("b");
        pool.adopt("c");
        assert_eq!(pool.len(), 3);

        let drained = pool.drain();
        assert_eq!(drained, vec!["a", "b", "c"]);
        assert!(pool.is_empty());
    }

    #[test]
    fn drain_on_empty_pool_is_a_no_op() {
        let mut pool: TransientPool<u32> = TransientPool::new();
        assert!(pool.drain().is_empty());
        assert!(pool.drain().is_empty());
    }

    #[test]
    fn entries_survive_multiple_adoptions_between_drains() {
        let mut pool = TransientPool::new();
        // Frames do not drain; entries from several frames coexist.
        for frame in 0..3 {
            for i in 0..4 {
                pool.adopt(frame * 10 + i);
            }
        }
        assert_eq!(pool.len(), 12);
        assert_eq!(pool.drain().len(), 12);
    }
}
